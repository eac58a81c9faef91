//! Input records of a study.
//!
//! - [`LineItem`]: one row of a pathway's techno-economic inventory (a cost,
//!   a material or energy flow, or both)
//! - [`RawEmissionFactor`] / [`EmissionFactor`]: life-cycle emission factors
//!   before and after canonicalization
//! - Reference data for the displaced (fossil) fuels used by MAC

use crate::units::{DatedUnit, RatioUnit};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a line item within a pathway's inventory (the `Parameter_B`
/// column of the source workbook).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParameterCategory {
    InputSupplyChains,
    CoproductCredits,
    AvoidedEmsCredits,
    FuelUse,
    FixedCosts,
    CapitalDepreciation,
    AverageIncomeTax,
    AverageReturnOnInvestment,
    CostByProcessSteps,
    CombustionEmsFossil,
    CombustionEmsBiogenic,
    NonCombustionEmsFossil,
    NonCombustionEmsBiogenic,
    CcsStreamFossil,
    CcsStreamBiogenic,
    Other(String),
}

impl ParameterCategory {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::InputSupplyChains => "Conversion: Input Supply Chains",
            Self::CoproductCredits => "Coproduct Credits",
            Self::AvoidedEmsCredits => "Avoided Ems Credits",
            Self::FuelUse => "Fuel Use",
            Self::FixedCosts => "Fixed Costs",
            Self::CapitalDepreciation => "Capital Depreciation",
            Self::AverageIncomeTax => "Average Income Tax",
            Self::AverageReturnOnInvestment => "Average Return on Investment",
            Self::CostByProcessSteps => "Cost by process steps",
            Self::CombustionEmsFossil => "Conversion: Combustion Ems, Fossil",
            Self::CombustionEmsBiogenic => "Conversion: Combustion Ems, Biogenic",
            Self::NonCombustionEmsFossil => "Conversion: Non-Combustion Ems, Fossil",
            Self::NonCombustionEmsBiogenic => "Conversion: Non-Combustion Ems, Biogenic",
            Self::CcsStreamFossil => "CCS Stream, Fossil",
            Self::CcsStreamBiogenic => "CCS Stream, Biogenic",
            Self::Other(name) => name,
        }
    }

    /// Categories that enter the MFSP calculation.
    #[must_use]
    pub fn is_cost(&self) -> bool {
        matches!(
            self,
            Self::InputSupplyChains
                | Self::CoproductCredits
                | Self::AvoidedEmsCredits
                | Self::FuelUse
                | Self::FixedCosts
                | Self::CapitalDepreciation
                | Self::AverageIncomeTax
                | Self::AverageReturnOnInvestment
                | Self::CostByProcessSteps
        )
    }

    /// Categories that enter the carbon intensity calculation.
    #[must_use]
    pub fn is_lca(&self) -> bool {
        matches!(
            self,
            Self::InputSupplyChains
                | Self::AvoidedEmsCredits
                | Self::CombustionEmsFossil
                | Self::CombustionEmsBiogenic
                | Self::NonCombustionEmsFossil
                | Self::NonCombustionEmsBiogenic
                | Self::CoproductCredits
                | Self::FuelUse
                | Self::CcsStreamFossil
                | Self::CcsStreamBiogenic
        )
    }

    /// Costs reported as annual totals rather than per unit of flow.
    #[must_use]
    pub fn is_fixed_cost(&self) -> bool {
        matches!(
            self,
            Self::FixedCosts
                | Self::CapitalDepreciation
                | Self::AverageIncomeTax
                | Self::AverageReturnOnInvestment
        )
    }
}

impl From<&str> for ParameterCategory {
    fn from(value: &str) -> Self {
        match value.trim() {
            "Conversion: Input Supply Chains" => Self::InputSupplyChains,
            "Coproduct Credits" => Self::CoproductCredits,
            "Avoided Ems Credits" => Self::AvoidedEmsCredits,
            "Fuel Use" => Self::FuelUse,
            "Fixed Costs" => Self::FixedCosts,
            "Capital Depreciation" => Self::CapitalDepreciation,
            "Average Income Tax" => Self::AverageIncomeTax,
            "Average Return on Investment" => Self::AverageReturnOnInvestment,
            "Cost by process steps" => Self::CostByProcessSteps,
            "Conversion: Combustion Ems, Fossil" => Self::CombustionEmsFossil,
            "Conversion: Combustion Ems, Biogenic" => Self::CombustionEmsBiogenic,
            "Conversion: Non-Combustion Ems, Fossil" => Self::NonCombustionEmsFossil,
            "Conversion: Non-Combustion Ems, Biogenic" => Self::NonCombustionEmsBiogenic,
            "CCS Stream, Fossil" => Self::CcsStreamFossil,
            "CCS Stream, Biogenic" => Self::CcsStreamBiogenic,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ParameterCategory {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ParameterCategory> for String {
    fn from(category: ParameterCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for ParameterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Groups of `Parameter_A` that carry annual totals and are exempt from the
/// flow/cost unit check.
pub const FIXED_COST_GROUPS: [&str; 4] = [
    "Fixed Costs",
    "Capital Depreciation",
    "Average Income Tax",
    "Average Return on Investment",
];

/// One row of a pathway's techno-economic inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub pathway_id: String,
    /// Coarse grouping, e.g. `Feedstock` or `Fixed Costs`.
    pub parameter_group: String,
    pub category: ParameterCategory,
    /// Material of the stream, e.g. `Natural gas`.
    pub stream_flow: String,
    /// Life-cycle stream the emission factors are keyed by.
    pub stream_name: String,
    /// The stream is the pathway's primary fuel product.
    pub is_primary_fuel: bool,
    pub flow: Option<f64>,
    pub flow_unit: Option<RatioUnit>,
    pub cost_item: Option<String>,
    pub unit_cost: Option<f64>,
    pub cost_unit: Option<RatioUnit>,
    pub operating_time: Option<f64>,
    pub operating_time_unit: Option<String>,
    pub total_cost: Option<f64>,
    pub total_cost_unit: Option<RatioUnit>,
    pub total_flow: Option<f64>,
    pub total_flow_unit: Option<RatioUnit>,
    /// Dollar year of `unit_cost` and `total_cost`.
    pub cost_year: Option<i32>,
}

impl LineItem {
    /// Creates a line item with no values.
    pub fn new(pathway_id: &str, category: ParameterCategory, stream_name: &str) -> Self {
        Self {
            pathway_id: pathway_id.to_string(),
            parameter_group: String::new(),
            category,
            stream_flow: String::new(),
            stream_name: stream_name.to_string(),
            is_primary_fuel: false,
            flow: None,
            flow_unit: None,
            cost_item: None,
            unit_cost: None,
            cost_unit: None,
            operating_time: None,
            operating_time_unit: None,
            total_cost: None,
            total_cost_unit: None,
            total_flow: None,
            total_flow_unit: None,
            cost_year: None,
        }
    }

    #[must_use]
    pub fn with_group(mut self, group: &str) -> Self {
        self.parameter_group = group.to_string();
        self
    }

    #[must_use]
    pub fn with_stream_flow(mut self, stream_flow: &str) -> Self {
        self.stream_flow = stream_flow.to_string();
        self
    }

    #[must_use]
    pub fn primary(mut self) -> Self {
        self.is_primary_fuel = true;
        self
    }

    #[must_use]
    pub fn with_total_flow(mut self, value: f64, unit: RatioUnit) -> Self {
        self.total_flow = Some(value);
        self.total_flow_unit = Some(unit);
        self
    }

    #[must_use]
    pub fn with_total_cost(mut self, value: f64, unit: RatioUnit, cost_year: i32) -> Self {
        self.total_cost = Some(value);
        self.total_cost_unit = Some(unit);
        self.cost_year = Some(cost_year);
        self
    }

    #[must_use]
    pub fn with_unit_cost(mut self, cost_item: &str, value: f64, unit: RatioUnit) -> Self {
        self.cost_item = Some(cost_item.to_string());
        self.unit_cost = Some(value);
        self.cost_unit = Some(unit);
        self
    }

    #[must_use]
    pub fn with_flow(mut self, value: f64, unit: RatioUnit, operating_time: f64, time_unit: &str) -> Self {
        self.flow = Some(value);
        self.flow_unit = Some(unit);
        self.operating_time = Some(operating_time);
        self.operating_time_unit = Some(time_unit.to_string());
        self
    }

    /// Credit lines whose contribution is subtracted.
    #[must_use]
    pub fn is_coproduct(&self) -> bool {
        self.category == ParameterCategory::CoproductCredits
    }

    /// Annual-total costs exempt from the flow/cost unit check.
    #[must_use]
    pub fn is_fixed_cost(&self) -> bool {
        self.category.is_fixed_cost() || FIXED_COST_GROUPS.contains(&self.parameter_group.as_str())
    }

    /// Recomputes the totals from the per-hour flow, operating time and unit
    /// cost. Totals whose inputs are incomplete are left unchanged.
    pub fn recompute_totals(&mut self) {
        if let (Some(flow), Some(time)) = (self.flow, self.operating_time) {
            self.total_flow = Some(flow * time);
            if let Some(unit_cost) = self.unit_cost {
                self.total_cost = Some(flow * time * unit_cost);
            }
        }
    }
}

/// Impact group of an emission factor row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    EnergyDemand,
    WaterConsumption,
    TotalEmissions,
    UrbanEmissions,
}

impl Metric {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnergyDemand => "Energy demand",
            Self::WaterConsumption => "Water consumption",
            Self::TotalEmissions => "Total emissions",
            Self::UrbanEmissions => "Urban emissions",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical pollutant or resource of an emission factor row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pollutant {
    TotalEnergy,
    FossilFuels,
    Coal,
    NaturalGas,
    Petroleum,
    Water,
    Voc,
    Co,
    Nox,
    Pm10,
    Pm25,
    Sox,
    Bc,
    Oc,
    Ch4,
    N2o,
    Co2,
    Co2WithVocCo,
    Ghgs,
    OtherGhg,
    BiogenicCh4,
    BiogenicCo2,
    /// Combined greenhouse gas burden.
    Co2e,
}

impl Pollutant {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TotalEnergy => "Total energy",
            Self::FossilFuels => "Fossil fuels",
            Self::Coal => "Coal",
            Self::NaturalGas => "Natural gas",
            Self::Petroleum => "Petroleum",
            Self::Water => "Water",
            Self::Voc => "VOC",
            Self::Co => "CO",
            Self::Nox => "NOx",
            Self::Pm10 => "PM10",
            Self::Pm25 => "PM2.5",
            Self::Sox => "SOx",
            Self::Bc => "BC",
            Self::Oc => "OC",
            Self::Ch4 => "CH4",
            Self::N2o => "N2O",
            Self::Co2 => "CO2",
            Self::Co2WithVocCo => "CO2 (w/ C in VOC & CO)",
            Self::Ghgs => "GHGs",
            Self::OtherGhg => "Other GHG Emissions",
            Self::BiogenicCh4 => "Biogenic CH4",
            Self::BiogenicCo2 => "Biogenic CO2",
            Self::Co2e => "CO2e",
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An emission factor row as read from the correspondence table, before
/// label canonicalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEmissionFactor {
    pub context: ParameterCategory,
    pub stream_flow: String,
    pub stream_name: String,
    pub year: i32,
    /// Metric label as spelled in the source; may be a group header.
    pub label: String,
    pub value: Option<f64>,
    pub unit: Option<RatioUnit>,
}

/// Join key between line items and emission factors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmissionKey {
    pub context: ParameterCategory,
    pub stream_flow: String,
    pub stream_name: String,
    pub year: i32,
}

/// A canonical emission factor: one value per key and pollutant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactor {
    pub key: EmissionKey,
    pub metric: Metric,
    pub pollutant: Pollutant,
    pub value: f64,
    /// Emitted mass over the throughput unit, e.g. `g/lb`.
    pub unit: RatioUnit,
    pub is_harmonized: bool,
}

/// Maps a pathway's fuel product to the fossil fuel it displaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Displacement {
    pub pathway_id: String,
    pub stream_name: String,
    pub replaced_fuel: String,
}

/// Life-cycle carbon intensity of a displaced fuel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCi {
    pub year: i32,
    pub fuel: String,
    pub ci: f64,
    pub unit: RatioUnit,
}

/// Market price of a displaced fuel in a given dollar year.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePrice {
    pub year: i32,
    pub fuel: String,
    pub price: f64,
    pub unit: DatedUnit,
}

/// A pathway evaluated in one production year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathwayYear {
    pub pathway_id: String,
    pub production_year: i32,
}

impl PathwayYear {
    pub fn new(pathway_id: &str, production_year: i32) -> Self {
        Self {
            pathway_id: pathway_id.to_string(),
            production_year,
        }
    }
}
