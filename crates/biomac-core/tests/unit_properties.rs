//! Properties of the unit registry and converter seen through the public API.
//!
//! These tests verify that:
//! - Converting a unit to itself is the identity
//! - Harmonizing to a unit and back restores the original value
//! - Heating values added at runtime take part in energy chains
//! - A full study configuration loads from TOML

use approx::assert_relative_eq;
use biomac_core::units::{
    Category, HeatingValue, Quantity, RatioUnit, TargetUnit, UnitConverter, UnitPosition,
    UnitRegistry, UnitValue, UNIT_REGISTRY,
};
use biomac_core::{AllocationPolicy, StudyConfig};

fn unit(s: &str) -> RatioUnit {
    RatioUnit::parse(s).unwrap()
}

mod conversion {
    use super::*;

    /// Every registered energy unit converts to itself with factor one.
    #[test]
    fn test_identity() {
        let energy = Category::Quantity(Quantity::Energy);
        for symbol in ["MJ", "kWh", "Btu", "mmBtu", "GJ"] {
            let converted = UNIT_REGISTRY.convert(&energy, 42.0, symbol, symbol);
            assert!(converted.harmonized, "{symbol}");
            assert_relative_eq!(converted.value, 42.0);
        }
    }

    /// Denominator harmonization there and back restores the price.
    #[test]
    fn test_denominator_round_trip() {
        let converter = UnitConverter::new(&UNIT_REGISTRY);
        let price = vec![UnitValue::new(Some(0.12), unit("USD/kWh"))];

        let per_mj = converter.harmonize(
            &price,
            &TargetUnit::Given("MJ".into()),
            UnitPosition::Denominator,
        );
        let back: Vec<UnitValue> = per_mj
            .values
            .iter()
            .map(|v| UnitValue::new(v.value, v.unit.clone()))
            .collect();
        let per_kwh = converter.harmonize(
            &back,
            &TargetUnit::Given("kWh".into()),
            UnitPosition::Denominator,
        );

        assert_eq!(per_kwh.values[0].unit.to_string(), "USD/kWh");
        assert_relative_eq!(per_kwh.values[0].value.unwrap(), 0.12, max_relative = 1e-12);
    }

    /// A heating value registered at runtime converts volume to energy.
    #[test]
    fn test_runtime_heating_value() {
        let registry = UnitRegistry::new().with_heating_value(HeatingValue::new(
            "Pyrolysis oil",
            60_000.0,
            unit("Btu/gal"),
        ));
        let converter = UnitConverter::new(&registry);
        let rows = vec![UnitValue::new(Some(10.0), unit("gal/yr")).with_commodity("Pyrolysis oil")];

        let out = converter.harmonize(&rows, &TargetUnit::Given("Btu".into()), UnitPosition::Numerator);

        assert!(out.ignored.is_empty());
        assert_relative_eq!(out.values[0].value.unwrap(), 600_000.0, max_relative = 1e-12);
        assert_eq!(out.values[0].unit.to_string(), "Btu/yr");
    }
}

mod configuration {
    use super::*;

    /// Settings, constants and sweeps all load from one document.
    #[test]
    fn test_full_config() {
        let config = StudyConfig::from_toml_str(
            r#"
            [study]
            first_year = 2025
            last_year = 2035
            allocation = "Hybrid"
            baseline_substitution = true

            [gwp]
            ch4 = 28.0

            [[baselines]]
            pathway = "Biopower A"
            baseline = "Coal A"

            [[variability]]
            target = "CostItem"
            field = "UnitCost"
            name = "Natural gas"
            min = 1.0
            max = 2.0
            step = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.study.allocation, AllocationPolicy::Hybrid);
        assert_eq!(config.production_years().count(), 11);
        assert_relative_eq!(config.gwp.ch4, 28.0);
        assert_eq!(config.baseline_for("Biopower A"), Some("Coal A"));
        assert!(config.is_baseline("Coal A"));
        assert_eq!(config.variability[0].values().len(), 3);
    }
}
