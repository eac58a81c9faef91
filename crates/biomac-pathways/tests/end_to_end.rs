//! End-to-end checks of a study run.
//!
//! These tests verify that:
//! - A single pathway study yields the expected MFSP, CI and MAC
//! - Co-product credits lower the selling price
//! - Hybrid allocation fractions of a pathway sum to one
//! - CCS netting conserves the total fossil burden
//! - Costs are inflated to the study dollar year
//! - A pathway missing a CI is reported by the MAC stage
//! - Unit conversions through the registry round-trip

use approx::assert_relative_eq;
use biomac_core::records::{
    Displacement, LineItem, ParameterCategory, RawEmissionFactor, ReferenceCi, ReferencePrice,
};
use biomac_core::units::{Category, DatedUnit, Quantity, RatioUnit, UnitRegistry, UNIT_REGISTRY};
use biomac_core::{AllocationPolicy, DiagnosticKind, PriceIndex, Stage, StudyConfig};
use biomac_pathways::{allocate, compute_mac, net_ccs, Study, StudyInputs};
use is_close::is_close;

const PATHWAY: &str = "Renewable diesel from corn stover";

fn unit(s: &str) -> RatioUnit {
    RatioUnit::parse(s).unwrap()
}

fn config() -> StudyConfig {
    let mut config = StudyConfig::default();
    config.study.first_year = 2030;
    config.study.last_year = 2030;
    config.study.cost_year = 2020;
    config
}

fn feedstock() -> LineItem {
    LineItem::new(PATHWAY, ParameterCategory::InputSupplyChains, "Corn stover")
        .with_group("Feedstock")
        .with_stream_flow("Corn stover")
        .with_unit_cost("Corn stover", 2.0, unit("USD/lb"))
        .with_total_flow(500.0, unit("lb/yr"))
        .with_total_cost(1000.0, unit("USD/yr"), 2020)
}

fn coproduct() -> LineItem {
    LineItem::new(PATHWAY, ParameterCategory::CoproductCredits, "Electricity")
        .with_unit_cost("Electricity", 0.05, unit("USD/kWh"))
        .with_total_flow(4000.0, unit("kWh/yr"))
        .with_total_cost(200.0, unit("USD/yr"), 2020)
}

fn fuel() -> LineItem {
    LineItem::new(PATHWAY, ParameterCategory::FuelUse, "Renewable diesel")
        .primary()
        .with_total_flow(10_000.0, unit("MJ/yr"))
}

fn emission_factor(label: &str, value: Option<f64>) -> RawEmissionFactor {
    RawEmissionFactor {
        context: ParameterCategory::InputSupplyChains,
        stream_flow: "Corn stover".into(),
        stream_name: "Corn stover".into(),
        year: 2030,
        label: label.into(),
        value,
        unit: Some(unit("g/lb")),
    }
}

fn inputs() -> StudyInputs {
    StudyInputs {
        line_items: vec![feedstock(), coproduct(), fuel()],
        emission_factors: vec![
            emission_factor("Total Emissions: grams/ton", None),
            emission_factor("CO2", Some(0.02)),
        ],
        price_index: PriceIndex::new().with(2015, 100.0).with(2020, 120.0),
        displacements: vec![Displacement {
            pathway_id: PATHWAY.into(),
            stream_name: "Renewable diesel".into(),
            replaced_fuel: "Diesel".into(),
        }],
        reference_ci: vec![ReferenceCi {
            year: 2030,
            fuel: "Diesel".into(),
            ci: 90.0,
            unit: unit("g/MJ"),
        }],
        reference_prices: vec![ReferencePrice {
            year: 2030,
            fuel: "Diesel".into(),
            price: 0.03,
            unit: DatedUnit::parse("2020 $/MJ").unwrap(),
        }],
    }
}

mod study {
    use super::*;

    /// Feedstock of $1000 less a $200 credit over 10000 MJ, with 10 g of
    /// CO2e over the same energy, against diesel at $0.03/MJ and 90 g/MJ.
    #[test]
    fn test_single_pathway_study() {
        let registry = UnitRegistry::new();
        let study = Study::new(config(), &registry);
        let outputs = study.run(&inputs()).unwrap();

        let mfsp = outputs.cost.mfsp_for(PATHWAY, 2030).unwrap();
        assert_relative_eq!(mfsp.mfsp.unwrap(), 0.08, max_relative = 1e-12);
        assert_eq!(mfsp.unit.to_string(), "USD/MJ");

        let ci = outputs.lca.ci_for(PATHWAY, 2030).unwrap();
        assert_relative_eq!(ci.ci.unwrap(), 0.001, max_relative = 1e-12);
        assert_eq!(ci.unit.to_string(), "g/MJ");

        assert_eq!(outputs.mac.len(), 1);
        let row = &outputs.mac[0];
        assert_eq!(row.replaced_fuel.as_deref(), Some("Diesel"));
        assert_relative_eq!(row.mfsp_displaced, 0.03, max_relative = 1e-12);
        assert_relative_eq!(row.ci_displaced, 90.0);
        assert_relative_eq!(row.mac.unwrap(), 0.05 / 89.999 * 1e6, max_relative = 1e-9);
        assert!(is_close!(row.mac.unwrap(), 555.561_728_463_65));
        assert!(!row.not_effective);
        assert!(row.displaced_ci_higher);
        assert!(!row.displaced_cost_higher);
    }

    /// Dropping the credit raises MFSP back to the gross cost.
    #[test]
    fn test_coproduct_credit_lowers_mfsp() {
        let registry = UnitRegistry::new();
        let mut no_credit = config();
        no_credit.study.coproduct_cost_credit = false;

        let credited = Study::new(config(), &registry).run(&inputs()).unwrap();
        let uncredited = Study::new(no_credit, &registry).run(&inputs()).unwrap();

        let credited = credited.cost.mfsp_for(PATHWAY, 2030).unwrap().mfsp.unwrap();
        let uncredited = uncredited.cost.mfsp_for(PATHWAY, 2030).unwrap().mfsp.unwrap();
        assert_relative_eq!(uncredited, 0.1, max_relative = 1e-12);
        assert!(credited < uncredited);
    }

    /// Costs in an older dollar year are scaled by the price index ratio.
    #[test]
    fn test_costs_are_inflated() {
        let mut inputs = inputs();
        inputs.line_items = vec![
            LineItem::new(PATHWAY, ParameterCategory::InputSupplyChains, "Corn stover")
                .with_unit_cost("Corn stover", 0.1, unit("USD/lb"))
                .with_total_flow(500.0, unit("lb/yr"))
                .with_total_cost(50.0, unit("USD/yr"), 2015),
            fuel(),
        ];
        let registry = UnitRegistry::new();
        let outputs = Study::new(config(), &registry).run(&inputs).unwrap();

        assert_relative_eq!(outputs.cost.items[0].adjusted_cost, 60.0, max_relative = 1e-12);
        assert_eq!(outputs.cost.items[0].adjusted_cost_year, 2020);
        let index = PriceIndex::new().with(2015, 100.0).with(2020, 120.0);
        assert_relative_eq!(index.inflate(50.0, 2015, 2020).unwrap(), 60.0, max_relative = 1e-12);
    }

    /// A pathway priced but without emission factors drops out of the MAC
    /// table with a MAC-stage diagnostic naming it.
    #[test]
    fn test_pathway_without_ci_is_reported_at_mac() {
        let mut inputs = inputs();
        inputs.emission_factors.clear();
        let registry = UnitRegistry::new();
        let outputs = Study::new(config(), &registry).run(&inputs).unwrap();

        assert!(outputs.cost.mfsp_for(PATHWAY, 2030).unwrap().mfsp.is_some());
        assert!(outputs.mac.is_empty());
        assert!(outputs
            .diagnostics
            .for_stage(Stage::Mac)
            .any(|d| d.pathway.as_deref() == Some(PATHWAY)
                && d.kind
                    == DiagnosticKind::MissingPathwayResult {
                        quantity: "CI".into(),
                        year: 2030,
                    }));
    }
}

mod properties {
    use super::*;

    /// Lower CI and higher price than the displaced fuel gives a positive
    /// cost per ton avoided.
    #[test]
    fn test_mac_value() {
        let result = compute_mac(5.0, 20.0, 4.0, 90.0);
        assert_relative_eq!(result.mac.unwrap(), 14_285.714_285_714, max_relative = 1e-9);
    }

    /// Hybrid fractions of all fuel products of a pathway sum to one.
    #[test]
    fn test_hybrid_fractions_sum_to_one() {
        let items = vec![
            fuel().with_total_flow(7500.0, unit("MJ/yr")),
            LineItem::new(PATHWAY, ParameterCategory::FuelUse, "Naphtha")
                .with_total_flow(2000.0, unit("MJ/yr")),
            LineItem::new(PATHWAY, ParameterCategory::FuelUse, "Propane")
                .with_total_flow(500.0, unit("MJ/yr")),
        ];
        let registry = UnitRegistry::new();
        let allocation = allocate(
            &items,
            AllocationPolicy::Hybrid,
            &biomac_core::units::UnitConverter::new(&registry),
            "MJ",
            &mut biomac_core::Diagnostics::new(),
        );

        let total: f64 = allocation
            .fractions
            .iter()
            .filter(|f| f.pathway_id == PATHWAY)
            .map(|f| f.fraction)
            .sum();
        assert_relative_eq!(total, 1.0, max_relative = 1e-12);
        let yield_ = allocation.yield_for(PATHWAY).unwrap();
        assert_relative_eq!(yield_.fraction, 0.75, max_relative = 1e-12);
        assert_relative_eq!(yield_.flow, 7500.0);
    }

    /// Netting moves CCS into combustion without changing the sum.
    #[test]
    fn test_ccs_netting_conserves_burden() {
        for (combustion, ccs) in [(100.0, -40.0), (100.0, -150.0), (12.5, -12.5)] {
            let netting = net_ccs(combustion, ccs);
            assert_relative_eq!(netting.net_combustion + netting.ccs, combustion + ccs);
            assert_relative_eq!(netting.ccs, 0.0);
            assert_eq!(netting.is_negative, combustion + ccs < 0.0);
        }
    }

    /// Converting to another unit and back returns the starting value.
    #[test]
    fn test_unit_round_trip() {
        let mass = Category::Quantity(Quantity::Mass);
        let there = UNIT_REGISTRY.convert(&mass, 3.5, "ton", "kg");
        assert!(there.harmonized);
        let back = UNIT_REGISTRY.convert(&mass, there.value, "kg", "ton");
        assert!(back.harmonized);
        assert_relative_eq!(back.value, 3.5, max_relative = 1e-12);
    }
}
