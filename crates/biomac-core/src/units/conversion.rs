//! Single-hop conversions and explicit conversion chains.
//!
//! A single hop converts a value between two units of one [`Category`]:
//! either a physical [`Quantity`] (linear scaling through the standard unit)
//! or a named commodity (a registered material-specific factor).
//!
//! Conversions that need more than one hop, such as gallons of diesel to
//! megajoules, are expressed as a [`ConversionPath`]. Each hop is applied in
//! order and recorded as a [`ProvenanceStep`] so that every converted value
//! can be traced back to the factors that produced it.
//!
//! # Example
//!
//! ```
//! use biomac_core::units::{Category, ConversionPath, Hop, Quantity, UNIT_REGISTRY};
//!
//! let path = ConversionPath::new(vec![
//!     Hop::new(Category::commodity("Diesel"), "gal", "Btu"),
//!     Hop::new(Category::Quantity(Quantity::Energy), "Btu", "MJ"),
//! ])
//! .unwrap();
//! let converted = UNIT_REGISTRY.convert_path(1.0, &path).unwrap();
//! assert_eq!(converted.unit, "MJ");
//! assert_eq!(converted.steps.len(), 2);
//! ```

use super::registry::{canonical_symbol, Quantity, UnitRegistry};
use crate::errors::{BiomacError, BiomacResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a conversion factor depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Any two units of the quantity convert by linear scaling.
    Quantity(Quantity),
    /// A material-specific factor such as a bushel weight or a heating value.
    Commodity(String),
}

impl Category {
    pub fn commodity(name: impl Into<String>) -> Self {
        Self::Commodity(name.into())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quantity(quantity) => write!(f, "{quantity}"),
            Self::Commodity(name) => write!(f, "commodity '{name}'"),
        }
    }
}

/// Result of a single conversion.
///
/// When no factor is known, `value` and `unit` are the inputs unchanged and
/// `harmonized` is false.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub value: f64,
    pub unit: String,
    pub harmonized: bool,
}

/// One step of a conversion chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub category: Category,
    pub from: String,
    pub to: String,
}

impl Hop {
    pub fn new(category: Category, from: &str, to: &str) -> Self {
        Self {
            category,
            from: canonical_symbol(from.trim()).to_string(),
            to: canonical_symbol(to.trim()).to_string(),
        }
    }
}

/// A hop that was applied, with the factor used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceStep {
    pub category: Category,
    pub from: String,
    pub to: String,
    pub factor: f64,
}

/// An ordered chain of hops where each hop starts at the unit the previous
/// one ended at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionPath {
    hops: Vec<Hop>,
}

impl ConversionPath {
    /// Builds a chain, checking that consecutive hops connect.
    pub fn new(hops: Vec<Hop>) -> BiomacResult<Self> {
        for (index, pair) in hops.windows(2).enumerate() {
            if pair[0].to != pair[1].from {
                return Err(BiomacError::BrokenConversionChain {
                    index: index + 1,
                    expected: pair[0].to.clone(),
                    found: pair[1].from.clone(),
                });
            }
        }
        Ok(Self { hops })
    }

    pub fn single(hop: Hop) -> Self {
        Self { hops: vec![hop] }
    }

    #[must_use]
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    #[must_use]
    pub fn from_unit(&self) -> Option<&str> {
        self.hops.first().map(|hop| hop.from.as_str())
    }

    #[must_use]
    pub fn to_unit(&self) -> Option<&str> {
        self.hops.last().map(|hop| hop.to.as_str())
    }

    /// The same chain walked backwards.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            hops: self
                .hops
                .iter()
                .rev()
                .map(|hop| Hop {
                    category: hop.category.clone(),
                    from: hop.to.clone(),
                    to: hop.from.clone(),
                })
                .collect(),
        }
    }
}

/// A value converted through a chain, with its provenance trail.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainedConversion {
    pub value: f64,
    pub unit: String,
    pub steps: Vec<ProvenanceStep>,
}

impl ChainedConversion {
    /// Product of the factors of every applied hop.
    #[must_use]
    pub fn factor(&self) -> f64 {
        self.steps.iter().map(|step| step.factor).product()
    }
}

/// The hop of a chain for which no factor is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmappedHop {
    pub index: usize,
    pub hop: Hop,
}

impl fmt::Display for UnmappedHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no {} factor from '{}' to '{}' (hop {})",
            self.hop.category, self.hop.from, self.hop.to, self.index
        )
    }
}

impl UnitRegistry {
    /// Factor of a single hop, `None` when nothing is registered.
    #[must_use]
    pub fn factor(&self, category: &Category, from: &str, to: &str) -> Option<f64> {
        match category {
            Category::Quantity(quantity) => self.quantity_factor(*quantity, from, to),
            Category::Commodity(name) => self.commodity_factor(name, from, to),
        }
    }

    /// Converts a value between two units of one category.
    ///
    /// A miss returns the input unchanged with `harmonized` false.
    #[must_use]
    pub fn convert(&self, category: &Category, value: f64, from: &str, to: &str) -> Converted {
        match self.factor(category, from, to) {
            Some(factor) => Converted {
                value: value * factor,
                unit: canonical_symbol(to.trim()).to_string(),
                harmonized: true,
            },
            None => Converted {
                value,
                unit: from.to_string(),
                harmonized: false,
            },
        }
    }

    /// Applies every hop of a chain in order.
    pub fn convert_path(
        &self,
        value: f64,
        path: &ConversionPath,
    ) -> Result<ChainedConversion, UnmappedHop> {
        let mut current = value;
        let mut steps = Vec::with_capacity(path.hops.len());
        for (index, hop) in path.hops.iter().enumerate() {
            let factor = self
                .factor(&hop.category, &hop.from, &hop.to)
                .ok_or_else(|| UnmappedHop {
                    index,
                    hop: hop.clone(),
                })?;
            current *= factor;
            steps.push(ProvenanceStep {
                category: hop.category.clone(),
                from: hop.from.clone(),
                to: hop.to.clone(),
                factor,
            });
        }
        let unit = path
            .to_unit()
            .map(str::to_string)
            .unwrap_or_default();
        Ok(ChainedConversion {
            value: current,
            unit,
            steps,
        })
    }

    /// Builds the chain that converts a quantity of `fuel` expressed in
    /// `from` into the energy unit `to`.
    ///
    /// Energy units convert directly. Volume or mass units go through the
    /// fuel's heating value, scaling to the heating value's denominator unit
    /// first and from its numerator unit afterwards when needed.
    #[must_use]
    pub fn energy_path(&self, fuel: &str, from: &str, to: &str) -> Option<ConversionPath> {
        let energy = Category::Quantity(Quantity::Energy);
        let from_quantity = self.quantity_of(from)?;
        if self.quantity_of(to)? != Quantity::Energy {
            return None;
        }
        if from_quantity == Quantity::Energy {
            return Some(ConversionPath::single(Hop::new(energy, from, to)));
        }

        let heating_value = self.heating_value(fuel)?;
        let per_unit = heating_value.unit.denominator()?;
        let energy_unit = heating_value.unit.numerator();
        if self.quantity_of(per_unit)? != from_quantity {
            return None;
        }

        let mut hops = Vec::with_capacity(3);
        if canonical_symbol(from) != per_unit {
            hops.push(Hop::new(Category::Quantity(from_quantity), from, per_unit));
        }
        hops.push(Hop::new(Category::commodity(fuel), per_unit, energy_unit));
        if canonical_symbol(to) != energy_unit {
            hops.push(Hop::new(energy, energy_unit, to));
        }
        ConversionPath::new(hops).ok()
    }
}
