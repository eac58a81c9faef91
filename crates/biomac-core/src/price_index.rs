//! Consumer price index used to bring costs to a common dollar year.

use crate::errors::{BiomacError, BiomacResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Price index values by year.
///
/// `adjusted = value * index(to_year) / index(from_year)`. A year missing
/// from the index is a fatal error: costs cannot be compared without it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceIndex {
    values: BTreeMap<i32, f64>,
}

impl PriceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: i32, value: f64) {
        self.values.insert(year, value);
    }

    #[must_use]
    pub fn with(mut self, year: i32, value: f64) -> Self {
        self.insert(year, value);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, year: i32) -> BiomacResult<f64> {
        match self.values.get(&year) {
            Some(value) if *value > 0.0 => Ok(*value),
            Some(&value) => Err(BiomacError::InvalidPriceIndex { year, value }),
            None => Err(BiomacError::MissingPriceIndex { year }),
        }
    }

    /// Multiplier that converts `from_year` dollars to `to_year` dollars.
    pub fn factor(&self, from_year: i32, to_year: i32) -> BiomacResult<f64> {
        Ok(self.get(to_year)? / self.get(from_year)?)
    }

    /// Converts a value from `from_year` dollars to `to_year` dollars.
    pub fn inflate(&self, value: f64, from_year: i32, to_year: i32) -> BiomacResult<f64> {
        Ok(value * self.factor(from_year, to_year)?)
    }
}

impl FromIterator<(i32, f64)> for PriceIndex {
    fn from_iter<T: IntoIterator<Item = (i32, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
