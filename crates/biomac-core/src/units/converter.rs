//! Batch harmonization of unit-bearing values.
//!
//! Every stage that combines values first brings them to a common unit with
//! [`UnitConverter::harmonize`]. The converter never drops a row: rows it
//! cannot convert are passed through unchanged with `is_harmonized` false,
//! and are listed once in the returned [`Harmonization::ignored`] batch so
//! the caller can report them together.

use super::conversion::{Category, ProvenanceStep};
use super::parser::RatioUnit;
use super::registry::{canonical_symbol, UnitRegistry};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Stage};
use std::collections::BTreeSet;

/// Unit to harmonize to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetUnit {
    /// A specific unit, e.g. `MJ`.
    Given(String),
    /// The standard unit of the quantity inferred from each row's unit.
    Standard,
}

/// Which side of a ratio unit is converted.
///
/// Converting the denominator divides the value by the factor: 2 USD/kWh is
/// 2 / 3.6 USD/MJ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPosition {
    Numerator,
    Denominator,
}

/// A value to harmonize.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitValue {
    pub value: Option<f64>,
    pub unit: RatioUnit,
    /// Material used for commodity factors and heating values.
    pub commodity: Option<String>,
}

impl UnitValue {
    pub fn new(value: Option<f64>, unit: RatioUnit) -> Self {
        Self {
            value,
            unit,
            commodity: None,
        }
    }

    #[must_use]
    pub fn with_commodity(mut self, commodity: &str) -> Self {
        self.commodity = Some(commodity.to_string());
        self
    }
}

/// A harmonized value. When `is_harmonized` is false the value and unit are
/// the inputs unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonizedValue {
    pub value: Option<f64>,
    pub unit: RatioUnit,
    pub is_harmonized: bool,
    pub provenance: Vec<ProvenanceStep>,
}

/// Why a row was passed through unconverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NonNumeric,
    NoDenominator,
    UnknownUnit,
    NoFactor { target: String },
}

/// A row the converter could not harmonize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredUnit {
    pub row: usize,
    pub unit: String,
    pub reason: IgnoreReason,
}

/// Output of a batch harmonization, one value per input row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Harmonization {
    pub values: Vec<HarmonizedValue>,
    pub ignored: Vec<IgnoredUnit>,
}

impl Harmonization {
    /// Records all ignored rows as a single diagnostic.
    pub fn report(&self, stage: Stage, pathway: Option<&str>, diagnostics: &mut Diagnostics) {
        if self.ignored.is_empty() {
            return;
        }
        let units: BTreeSet<String> = self.ignored.iter().map(|i| i.unit.clone()).collect();
        diagnostics.record(
            stage,
            pathway,
            DiagnosticKind::UnharmonizedUnits {
                rows: self.ignored.len(),
                units: units.into_iter().collect(),
            },
        );
    }
}

/// Harmonizes batches of values against a registry.
#[derive(Debug, Clone, Copy)]
pub struct UnitConverter<'a> {
    registry: &'a UnitRegistry,
}

impl<'a> UnitConverter<'a> {
    pub fn new(registry: &'a UnitRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &'a UnitRegistry {
        self.registry
    }

    /// Harmonizes one side of every row's unit to `target`.
    pub fn harmonize(
        &self,
        rows: &[UnitValue],
        target: &TargetUnit,
        position: UnitPosition,
    ) -> Harmonization {
        let mut harmonization = Harmonization::default();
        for (index, row) in rows.iter().enumerate() {
            match self.harmonize_one(row, target, position) {
                Ok(value) => harmonization.values.push(value),
                Err((unit, reason)) => {
                    harmonization.ignored.push(IgnoredUnit {
                        row: index,
                        unit,
                        reason,
                    });
                    harmonization.values.push(HarmonizedValue {
                        value: row.value,
                        unit: row.unit.clone(),
                        is_harmonized: false,
                        provenance: Vec::new(),
                    });
                }
            }
        }
        harmonization
    }

    fn harmonize_one(
        &self,
        row: &UnitValue,
        target: &TargetUnit,
        position: UnitPosition,
    ) -> Result<HarmonizedValue, (String, IgnoreReason)> {
        let part = match position {
            UnitPosition::Numerator => row.unit.numerator(),
            UnitPosition::Denominator => row
                .unit
                .denominator()
                .ok_or_else(|| (row.unit.to_string(), IgnoreReason::NoDenominator))?,
        };
        let value = row
            .value
            .filter(|v| v.is_finite())
            .ok_or_else(|| (part.to_string(), IgnoreReason::NonNumeric))?;

        let target = match target {
            TargetUnit::Given(unit) => canonical_symbol(unit.trim()).to_string(),
            TargetUnit::Standard => self
                .registry
                .quantity_of(part)
                .map(|q| q.standard_unit().to_string())
                .ok_or_else(|| (part.to_string(), IgnoreReason::UnknownUnit))?,
        };

        let (factor, provenance) = self
            .factor_for(part, &target, row.commodity.as_deref())
            .ok_or_else(|| {
                (
                    part.to_string(),
                    IgnoreReason::NoFactor {
                        target: target.clone(),
                    },
                )
            })?;

        let (value, unit) = match position {
            UnitPosition::Numerator => (value * factor, row.unit.with_numerator(&target)),
            UnitPosition::Denominator => (value / factor, row.unit.with_denominator(&target)),
        };
        Ok(HarmonizedValue {
            value: Some(value),
            unit,
            is_harmonized: true,
            provenance,
        })
    }

    /// Finds the factor from `from` to `to`: identity, same-quantity scaling,
    /// a direct commodity factor, then a heating-value chain to energy.
    fn factor_for(
        &self,
        from: &str,
        to: &str,
        commodity: Option<&str>,
    ) -> Option<(f64, Vec<ProvenanceStep>)> {
        if canonical_symbol(from) == to {
            return Some((1.0, Vec::new()));
        }
        if let Some(quantity) = self.registry.quantity_of(from) {
            let category = Category::Quantity(quantity);
            if let Some(factor) = self.registry.factor(&category, from, to) {
                return Some((factor, vec![step(category, from, to, factor)]));
            }
        }
        let commodity = commodity?;
        let category = Category::commodity(commodity);
        if let Some(factor) = self.registry.factor(&category, from, to) {
            return Some((factor, vec![step(category, from, to, factor)]));
        }
        let path = self.registry.energy_path(commodity, from, to)?;
        let chained = self.registry.convert_path(1.0, &path).ok()?;
        Some((chained.factor(), chained.steps))
    }
}

fn step(category: Category, from: &str, to: &str, factor: f64) -> ProvenanceStep {
    ProvenanceStep {
        category,
        from: canonical_symbol(from).to_string(),
        to: to.to_string(),
        factor,
    }
}
