//! Study configuration.
//!
//! A [`StudyConfig`] is built once (usually from a TOML file) and passed by
//! reference into every stage. Every field has a default, so a config file
//! only needs the values that differ.
//!
//! ```toml
//! [study]
//! first_year = 2022
//! last_year = 2030
//! cost_year = 2020
//! allocation = "Hybrid"
//!
//! [gwp]
//! ch4 = 29.8
//!
//! [[baselines]]
//! pathway = "Biopower: 100% biomass, w/o BECCS, 130 MWe"
//! baseline = "Baseline for Biopower, 100% coal, w/o CCS, 650 MWe"
//! ```

use crate::errors::{BiomacError, BiomacResult};
use crate::units::{Quantity, UNIT_REGISTRY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// How shared costs and emissions are split between co-produced fuels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AllocationPolicy {
    /// All fuel products are summed and share one pathway intensity.
    Pathway,
    /// All fuel products are summed on an energy basis.
    #[default]
    Energy,
    /// One primary fuel carries its energy share of inputs and credits;
    /// non-primary fuels are treated as displacement credits.
    Hybrid,
}

impl fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pathway => "Pathway",
            Self::Energy => "Energy",
            Self::Hybrid => "Hybrid",
        };
        write!(f, "{name}")
    }
}

impl FromStr for AllocationPolicy {
    type Err = BiomacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Pathway" | "pathway" => Ok(Self::Pathway),
            "Energy" | "energy" => Ok(Self::Energy),
            "Hybrid" | "hybrid" => Ok(Self::Hybrid),
            other => Err(BiomacError::UnknownAllocationPolicy(other.to_string())),
        }
    }
}

/// Global warming potentials used to combine pollutants into CO2e.
///
/// Defaults are 100-year values from AR6 as used by GREET 2022.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GwpFactors {
    /// Default: 1.0
    pub co2: f64,
    /// Applied to CO2 including carbon in VOC and CO.
    ///
    /// Default: 1.0
    pub co2_w_voc_co: f64,
    /// Default: 29.8
    pub ch4: f64,
    /// Default: 273.0
    pub n2o: f64,
    /// Default: 0.0
    pub voc: f64,
    /// Default: 0.0
    pub co: f64,
    /// Default: 0.0
    pub nox: f64,
    /// Black carbon.
    ///
    /// Default: 0.0
    pub bc: f64,
    /// Organic carbon.
    ///
    /// Default: 0.0
    pub oc: f64,
}

impl Default for GwpFactors {
    fn default() -> Self {
        Self {
            co2: 1.0,
            co2_w_voc_co: 1.0,
            ch4: 29.8,
            n2o: 273.0,
            voc: 0.0,
            co: 0.0,
            nox: 0.0,
            bc: 0.0,
            oc: 0.0,
        }
    }
}

/// Carbon mass fractions used to convert pollutants to carbon-equivalent CO2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonRatios {
    /// Default: 0.85
    pub voc: f64,
    /// Default: 0.43
    pub co: f64,
    /// Default: 0.75
    pub ch4: f64,
    /// Default: 0.27
    pub co2: f64,
}

impl Default for CarbonRatios {
    fn default() -> Self {
        Self {
            voc: 0.85,
            co: 0.43,
            ch4: 0.75,
            co2: 0.27,
        }
    }
}

/// Replaces a pathway's displaced-fuel reference with another pathway's own
/// results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineSubstitution {
    pub pathway: String,
    pub baseline: String,
}

impl BaselineSubstitution {
    pub fn new(pathway: &str, baseline: &str) -> Self {
        Self {
            pathway: pathway.to_string(),
            baseline: baseline.to_string(),
        }
    }
}

/// Which records a variability sweep modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepTarget {
    /// Line items whose cost item matches the parameter name.
    CostItem,
    /// Line items or emission factors whose LCA stream matches the name.
    StreamLca,
}

/// Which value a variability sweep sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepField {
    UnitCost,
    Flow,
    EmissionFactor,
}

/// Largest number of cases one sweep may expand to.
pub const MAX_SWEEP_CASES: usize = 10_000;

/// A linear parameter sweep from `min` to `max` (inclusive) in `step`
/// increments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariabilityParameter {
    pub target: SweepTarget,
    pub field: SweepField,
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// Run-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudySettings {
    /// First production year (inclusive).
    ///
    /// Default: 2022
    pub first_year: i32,
    /// Last production year (inclusive).
    ///
    /// Default: 2050
    pub last_year: i32,
    /// Dollar year all costs are inflated to.
    ///
    /// Default: 2020
    pub cost_year: i32,
    /// Default: Energy
    pub allocation: AllocationPolicy,
    /// Include co-product cost credits in aggregated MFSP.
    ///
    /// Default: true
    pub coproduct_cost_credit: bool,
    /// Include co-product emission credits in aggregated CI.
    ///
    /// Default: true
    pub coproduct_env_credit: bool,
    /// Recompute CO2 including carbon in VOC and CO even when the emission
    /// factor table provides it.
    ///
    /// Default: true
    pub always_calc_co2_w_voc_co: bool,
    /// Net fossil CCS streams against fossil combustion emissions.
    ///
    /// Default: true
    pub harmonize_ccs_fossil: bool,
    /// Use the configured baseline pathways instead of displaced-fuel
    /// references for MAC.
    ///
    /// Default: false
    pub baseline_substitution: bool,
    /// Energy unit MFSP and CI are expressed per.
    ///
    /// Default: MJ
    pub energy_unit: String,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            first_year: 2022,
            last_year: 2050,
            cost_year: 2020,
            allocation: AllocationPolicy::default(),
            coproduct_cost_credit: true,
            coproduct_env_credit: true,
            always_calc_co2_w_voc_co: true,
            harmonize_ccs_fossil: true,
            baseline_substitution: false,
            energy_unit: "MJ".to_string(),
        }
    }
}

/// Full configuration of a study run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub study: StudySettings,
    pub gwp: GwpFactors,
    pub carbon_ratios: CarbonRatios,
    pub baselines: Vec<BaselineSubstitution>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variability: Vec<VariabilityParameter>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            study: StudySettings::default(),
            gwp: GwpFactors::default(),
            carbon_ratios: CarbonRatios::default(),
            baselines: default_biopower_baselines(),
            variability: Vec::new(),
        }
    }
}

fn default_biopower_baselines() -> Vec<BaselineSubstitution> {
    let without_ccs = "Baseline for Biopower, 100% coal, w/o CCS, 650 MWe";
    let with_ccs = "Baseline for Biopower, 100% coal, w/ CCS, 650 MWe";
    vec![
        BaselineSubstitution::new("Biopower: 80% coal, w/o BECCS, 650 MWe", without_ccs),
        BaselineSubstitution::new("Biopower: 100% biomass, w/o BECCS, 130 MWe", without_ccs),
        BaselineSubstitution::new("Biopower: 80% coal, w/ BECCS, 650 MWe", with_ccs),
        BaselineSubstitution::new("Biopower: 100% biomass, w/ BECCS, 130 MWe", with_ccs),
    ]
}

impl StudyConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(input: &str) -> BiomacResult<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot check.
    pub fn validate(&self) -> BiomacResult<()> {
        let study = &self.study;
        if study.last_year < study.first_year {
            return Err(BiomacError::InvalidConfig(format!(
                "last_year {} is before first_year {}",
                study.last_year, study.first_year
            )));
        }
        if UNIT_REGISTRY.quantity_of(&study.energy_unit) != Some(Quantity::Energy) {
            return Err(BiomacError::InvalidConfig(format!(
                "energy_unit '{}' is not a known energy unit",
                study.energy_unit
            )));
        }
        for parameter in &self.variability {
            parameter.validate()?;
        }
        Ok(())
    }

    /// Production years as an inclusive range.
    #[must_use]
    pub fn production_years(&self) -> RangeInclusive<i32> {
        self.study.first_year..=self.study.last_year
    }

    /// Baseline pathway configured for `pathway`, if substitution is on.
    #[must_use]
    pub fn baseline_for(&self, pathway: &str) -> Option<&str> {
        if !self.study.baseline_substitution {
            return None;
        }
        self.baselines
            .iter()
            .find(|b| b.pathway == pathway)
            .map(|b| b.baseline.as_str())
    }

    /// Whether `pathway` serves as a baseline for another pathway.
    #[must_use]
    pub fn is_baseline(&self, pathway: &str) -> bool {
        self.study.baseline_substitution && self.baselines.iter().any(|b| b.baseline == pathway)
    }
}

impl VariabilityParameter {
    /// Checks that the sweep is finite and the field fits the target.
    pub fn validate(&self) -> BiomacResult<()> {
        let invalid = |reason: &str| BiomacError::InvalidSweep {
            target: self.name.clone(),
            reason: reason.to_string(),
        };
        if !(self.step > 0.0) || !self.step.is_finite() {
            return Err(invalid("step must be a positive number"));
        }
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(invalid("min and max must be finite"));
        }
        if self.max < self.min {
            return Err(invalid("max is below min"));
        }
        if (self.max - self.min) / self.step >= MAX_SWEEP_CASES as f64 {
            return Err(invalid(&format!(
                "sweep expands to more than {MAX_SWEEP_CASES} cases"
            )));
        }
        match (self.target, self.field) {
            (SweepTarget::CostItem, SweepField::EmissionFactor) => {
                Err(invalid("cost item sweeps cannot set emission factors"))
            }
            (SweepTarget::StreamLca, SweepField::UnitCost) => {
                Err(invalid("LCA stream sweeps cannot set unit costs"))
            }
            _ => Ok(()),
        }
    }

    /// Sweep values from `min` to `max` inclusive.
    ///
    /// Values are computed as `min + i * step` so rounding does not
    /// accumulate; a value within half a step's rounding of `max` is kept.
    /// At most [`MAX_SWEEP_CASES`] values are returned.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        if !(self.step > 0.0) || !self.min.is_finite() || self.max < self.min {
            return Vec::new();
        }
        let tolerance = self.step * 1e-9;
        (0_u32..)
            .map(|i| self.min + f64::from(i) * self.step)
            .take_while(|v| *v <= self.max + tolerance)
            .take(MAX_SWEEP_CASES)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StudyConfig::default();
        assert_eq!(config.production_years(), 2022..=2050);
        assert_eq!(config.study.cost_year, 2020);
        assert_eq!(config.study.allocation, AllocationPolicy::Energy);
        assert!(config.study.coproduct_cost_credit);
        assert!(config.study.always_calc_co2_w_voc_co);
        assert_eq!(config.gwp.n2o, 273.0);
        assert_eq!(config.carbon_ratios.co2, 0.27);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = StudyConfig::from_toml_str(
            r#"
            [study]
            first_year = 2030
            last_year = 2030
            allocation = "Hybrid"

            [gwp]
            ch4 = 28.0
            "#,
        )
        .unwrap();
        assert_eq!(config.production_years(), 2030..=2030);
        assert_eq!(config.study.allocation, AllocationPolicy::Hybrid);
        assert_eq!(config.gwp.ch4, 28.0);
        assert_eq!(config.gwp.n2o, 273.0);
        assert_eq!(config.study.cost_year, 2020);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result = StudyConfig::from_toml_str(
            r#"
            [study]
            allocation = "Mass"
            "#,
        );
        assert!(matches!(result, Err(BiomacError::InvalidConfig(_))));

        let parsed: Result<AllocationPolicy, _> = "Mass".parse();
        assert!(matches!(
            parsed,
            Err(BiomacError::UnknownAllocationPolicy(_))
        ));
        assert_eq!("hybrid".parse::<AllocationPolicy>().unwrap(), AllocationPolicy::Hybrid);
    }

    #[test]
    fn test_year_range_validation() {
        let result = StudyConfig::from_toml_str(
            r#"
            [study]
            first_year = 2040
            last_year = 2030
            "#,
        );
        assert!(matches!(result, Err(BiomacError::InvalidConfig(_))));
    }

    #[test]
    fn test_energy_unit_validation() {
        let result = StudyConfig::from_toml_str(
            r#"
            [study]
            energy_unit = "gal"
            "#,
        );
        assert!(matches!(result, Err(BiomacError::InvalidConfig(_))));
    }

    #[test]
    fn test_baseline_lookup_requires_toggle() {
        let mut config = StudyConfig::default();
        let pathway = "Biopower: 100% biomass, w/ BECCS, 130 MWe";
        assert_eq!(config.baseline_for(pathway), None);

        config.study.baseline_substitution = true;
        assert_eq!(
            config.baseline_for(pathway),
            Some("Baseline for Biopower, 100% coal, w/ CCS, 650 MWe")
        );
        assert!(config.is_baseline("Baseline for Biopower, 100% coal, w/ CCS, 650 MWe"));
        assert!(!config.is_baseline(pathway));
    }

    #[test]
    fn test_sweep_values() {
        let parameter = VariabilityParameter {
            target: SweepTarget::CostItem,
            field: SweepField::UnitCost,
            name: "Corn stover".into(),
            min: 0.1,
            max: 0.3,
            step: 0.1,
        };
        let values = parameter.values();
        assert_eq!(values.len(), 3);
        assert!((values[2] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_sweep_validation() {
        let mut parameter = VariabilityParameter {
            target: SweepTarget::CostItem,
            field: SweepField::EmissionFactor,
            name: "Natural gas".into(),
            min: 1.0,
            max: 2.0,
            step: 0.5,
        };
        assert!(parameter.validate().is_err());

        parameter.target = SweepTarget::StreamLca;
        assert!(parameter.validate().is_ok());

        parameter.step = 0.0;
        assert!(parameter.validate().is_err());
    }

    #[test]
    fn test_unbounded_sweep_is_rejected() {
        let mut parameter = VariabilityParameter {
            target: SweepTarget::CostItem,
            field: SweepField::UnitCost,
            name: "Natural gas".into(),
            min: 0.0,
            max: f64::INFINITY,
            step: 1.0,
        };
        assert!(matches!(
            parameter.validate(),
            Err(BiomacError::InvalidSweep { .. })
        ));
        assert_eq!(parameter.values().len(), MAX_SWEEP_CASES);

        parameter.min = f64::NAN;
        parameter.max = 1.0;
        assert!(parameter.validate().is_err());
        assert!(parameter.values().is_empty());

        parameter.min = 0.0;
        parameter.max = 1e6;
        assert!(matches!(
            parameter.validate(),
            Err(BiomacError::InvalidSweep { .. })
        ));
        parameter.max = (MAX_SWEEP_CASES - 1) as f64;
        assert!(parameter.validate().is_ok());
        assert_eq!(parameter.values().len(), MAX_SWEEP_CASES);
    }

    #[test]
    fn test_infinite_sweep_in_toml_is_rejected() {
        let result = StudyConfig::from_toml_str(
            r#"
            [[variability]]
            target = "CostItem"
            field = "UnitCost"
            name = "Natural gas"
            min = 0.0
            max = inf
            step = 1.0
            "#,
        );
        assert!(matches!(result, Err(BiomacError::InvalidSweep { .. })));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = StudyConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back = StudyConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
