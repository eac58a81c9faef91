//! End-to-end study runs.
//!
//! A study runs its stages in a fixed order: emission factors are prepared,
//! fuel products are allocated, then MFSP, CI and MAC are computed. Each
//! stage reads the outputs of the previous ones and never modifies them.

use crate::allocation::{allocate, Allocation};
use crate::cost::{compute_mfsp, CostOutputs};
use crate::emissions::{prepare_emission_factors, EmissionFactorTable};
use crate::lca::{compute_ci, LcaOutputs};
use crate::mac::{compute_mac_table, MacRow, References};
use crate::variability::{expand_cases, VariabilityCase};
use biomac_core::errors::{BiomacError, BiomacResult};
use biomac_core::records::{Displacement, LineItem, RawEmissionFactor, ReferenceCi, ReferencePrice};
use biomac_core::units::{UnitConverter, UnitRegistry};
use biomac_core::{DiagnosticKind, Diagnostics, PriceIndex, Stage, StudyConfig};
use tracing::{info, info_span};

/// Everything a study reads.
#[derive(Debug, Clone, Default)]
pub struct StudyInputs {
    pub line_items: Vec<LineItem>,
    pub emission_factors: Vec<RawEmissionFactor>,
    pub price_index: PriceIndex,
    pub displacements: Vec<Displacement>,
    pub reference_ci: Vec<ReferenceCi>,
    pub reference_prices: Vec<ReferencePrice>,
}

/// Everything a study produces.
#[derive(Debug, Clone)]
pub struct StudyOutputs {
    pub emission_factors: EmissionFactorTable,
    pub allocation: Allocation,
    pub cost: CostOutputs,
    pub lca: LcaOutputs,
    pub mac: Vec<MacRow>,
    pub diagnostics: Diagnostics,
}

/// Outputs of one variability case.
#[derive(Debug, Clone)]
pub struct CaseOutputs {
    pub case: VariabilityCase,
    pub outputs: StudyOutputs,
}

/// A configured study.
#[derive(Debug, Clone)]
pub struct Study<'a> {
    config: StudyConfig,
    registry: &'a UnitRegistry,
}

impl<'a> Study<'a> {
    pub fn new(config: StudyConfig, registry: &'a UnitRegistry) -> Self {
        Self { config, registry }
    }

    #[must_use]
    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Runs the base case.
    pub fn run(&self, inputs: &StudyInputs) -> BiomacResult<StudyOutputs> {
        check_inputs(inputs)?;
        let converter = UnitConverter::new(self.registry);
        let mut diagnostics = Diagnostics::new();
        let factors = prepare_emission_factors(
            &inputs.emission_factors,
            &converter,
            &self.config,
            &mut diagnostics,
        );
        self.run_stages(&inputs.line_items, factors, inputs, diagnostics)
    }

    /// Runs every variability case. Each case starts from the base inputs.
    pub fn run_variability(&self, inputs: &StudyInputs) -> BiomacResult<Vec<CaseOutputs>> {
        check_inputs(inputs)?;
        let converter = UnitConverter::new(self.registry);
        let mut base_diagnostics = Diagnostics::new();
        let base_factors = prepare_emission_factors(
            &inputs.emission_factors,
            &converter,
            &self.config,
            &mut base_diagnostics,
        );

        let cases = expand_cases(&self.config.variability);
        info!(cases = cases.len(), "Running variability cases");
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let _span = info_span!("case", id = case.variability_id, name = %case.name).entered();
            let mut items = inputs.line_items.clone();
            let mut factors = base_factors.clone();
            let mut diagnostics = base_diagnostics.clone();
            if case.apply(&mut items, &mut factors) == 0 {
                diagnostics.record(
                    Stage::Variability,
                    None,
                    DiagnosticKind::UnmatchedSweep {
                        parameter: case.name.clone(),
                    },
                );
            }
            let outputs = self.run_stages(&items, factors, inputs, diagnostics)?;
            results.push(CaseOutputs { case, outputs });
        }
        Ok(results)
    }

    fn run_stages(
        &self,
        items: &[LineItem],
        factors: EmissionFactorTable,
        inputs: &StudyInputs,
        mut diagnostics: Diagnostics,
    ) -> BiomacResult<StudyOutputs> {
        let config = &self.config;
        let converter = UnitConverter::new(self.registry);

        let allocation = allocate(
            items,
            config.study.allocation,
            &converter,
            &config.study.energy_unit,
            &mut diagnostics,
        );
        let cost = compute_mfsp(
            items,
            &allocation,
            &inputs.price_index,
            &converter,
            config,
            &mut diagnostics,
        )?;
        let lca = compute_ci(items, &factors, &allocation, &converter, config, &mut diagnostics);
        let references = References {
            displacements: &inputs.displacements,
            ci: &inputs.reference_ci,
            prices: &inputs.reference_prices,
        };
        let mac = compute_mac_table(
            &cost,
            &lca,
            &allocation,
            &references,
            &inputs.price_index,
            &converter,
            config,
            &mut diagnostics,
        )?;

        info!(
            pathways = allocation.yields().count(),
            mac_rows = mac.len(),
            diagnostics = diagnostics.len(),
            "Study complete"
        );
        Ok(StudyOutputs {
            emission_factors: factors,
            allocation,
            cost,
            lca,
            mac,
            diagnostics,
        })
    }
}

fn check_inputs(inputs: &StudyInputs) -> BiomacResult<()> {
    if inputs.line_items.is_empty() {
        return Err(BiomacError::EmptyInput("techno-economic line items".to_string()));
    }
    if inputs.price_index.is_empty() {
        return Err(BiomacError::EmptyInput("price index".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use biomac_core::config::{SweepField, SweepTarget, VariabilityParameter};
    use biomac_core::records::ParameterCategory;
    use biomac_core::units::RatioUnit;
    use is_close::is_close;

    fn unit(s: &str) -> RatioUnit {
        RatioUnit::parse(s).unwrap()
    }

    fn inputs() -> StudyInputs {
        StudyInputs {
            line_items: vec![
                LineItem::new("P", ParameterCategory::InputSupplyChains, "Natural gas")
                    .with_stream_flow("Natural gas")
                    .with_flow(1.0, unit("lb/hr"), 1000.0, "hr/yr")
                    .with_unit_cost("Natural gas", 1.0, unit("USD/lb"))
                    .with_total_flow(1000.0, unit("lb/yr"))
                    .with_total_cost(1000.0, unit("USD/yr"), 2020),
                LineItem::new("P", ParameterCategory::FuelUse, "Renewable diesel")
                    .primary()
                    .with_total_flow(10_000.0, unit("MJ/yr")),
            ],
            price_index: PriceIndex::new().with(2020, 100.0),
            ..StudyInputs::default()
        }
    }

    fn config() -> StudyConfig {
        let mut config = StudyConfig::default();
        config.study.first_year = 2030;
        config.study.last_year = 2030;
        config
    }

    #[test]
    fn test_empty_inputs_are_fatal() {
        let registry = UnitRegistry::new();
        let study = Study::new(config(), &registry);
        let err = study.run(&StudyInputs::default()).unwrap_err();
        assert!(matches!(err, BiomacError::EmptyInput(_)));

        let mut no_index = inputs();
        no_index.price_index = PriceIndex::new();
        assert!(matches!(
            study.run(&no_index).unwrap_err(),
            BiomacError::EmptyInput(_)
        ));
    }

    #[test]
    fn test_run_base_case() {
        let registry = UnitRegistry::new();
        let study = Study::new(config(), &registry);
        let outputs = study.run(&inputs()).unwrap();
        let mfsp = outputs.cost.mfsp_for("P", 2030).unwrap().mfsp.unwrap();
        assert!(is_close!(mfsp, 0.1));
        assert!(outputs.mac.is_empty());
    }

    #[test]
    fn test_variability_cases_are_independent() {
        let mut config = config();
        config.variability.push(VariabilityParameter {
            target: SweepTarget::CostItem,
            field: SweepField::UnitCost,
            name: "Natural gas".into(),
            min: 1.0,
            max: 3.0,
            step: 1.0,
        });
        config.variability.push(VariabilityParameter {
            target: SweepTarget::CostItem,
            field: SweepField::UnitCost,
            name: "Hydrogen".into(),
            min: 1.0,
            max: 1.0,
            step: 1.0,
        });
        let registry = UnitRegistry::new();
        let study = Study::new(config, &registry);

        let cases = study.run_variability(&inputs()).unwrap();
        assert_eq!(cases.len(), 4);
        let prices: Vec<f64> = cases[..3]
            .iter()
            .map(|c| c.outputs.cost.mfsp_for("P", 2030).unwrap().mfsp.unwrap())
            .collect();
        assert!(is_close!(prices[0], 0.1));
        assert!(is_close!(prices[1], 0.2));
        assert!(is_close!(prices[2], 0.3));
        assert!(!cases[0].outputs.diagnostics.contains("unmatched_sweep"));
        assert!(cases[3].outputs.diagnostics.contains("unmatched_sweep"));
    }
}
