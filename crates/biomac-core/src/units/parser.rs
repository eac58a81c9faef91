//! Ratio unit parser.
//!
//! Cost, flow and emission records carry combined unit strings such as
//! `$/gal`, `lb/hr`, `g/MJ` or `grams per ton`. These are parsed once, at
//! ingestion, into a [`RatioUnit`] so that later stages compare and convert
//! numerators and denominators directly instead of re-splitting strings.
//!
//! # Grammar
//!
//! ```text
//! ratio_unit = symbol (('/' | ' per ') symbol)?
//! dated_unit = year? ratio_unit
//! symbol     = any text without '/'; whitespace is collapsed
//! ```
//!
//! Symbols are canonicalized through the alias table of the unit registry,
//! so `Short Tons` and `ton`, or `$` and `USD`, compare equal.

use super::registry::canonical_symbol;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for unit parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Empty unit string.
    #[error("empty unit string")]
    EmptyUnit,
    /// One side of a ratio is empty, e.g. `/gal`.
    #[error("missing {0} in unit")]
    EmptyPart(&'static str),
    /// More than one division, e.g. `USD/gal/yr`.
    #[error("unit '{0}' has more than one division")]
    TooManyDivisions(String),
}

/// A unit with a numerator and an optional denominator.
///
/// Both parts are stored as canonical symbols. Equality is symbol equality
/// after canonicalization, so `"$ / gallon"` equals `"USD/gal"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RatioUnit {
    numerator: String,
    denominator: Option<String>,
}

impl RatioUnit {
    /// Parses a unit string.
    ///
    /// ```
    /// use biomac_core::units::RatioUnit;
    ///
    /// let unit = RatioUnit::parse("$ / gallon").unwrap();
    /// assert_eq!(unit.numerator(), "USD");
    /// assert_eq!(unit.denominator(), Some("gal"));
    /// ```
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let input = collapse_whitespace(input);
        if input.is_empty() {
            return Err(ParseError::EmptyUnit);
        }

        let parts: Vec<&str> = if input.contains('/') {
            input.split('/').collect()
        } else {
            input.split(" per ").collect()
        };

        match parts.as_slice() {
            [numerator] => Ok(Self::scalar(numerator)),
            [numerator, denominator] => {
                let numerator = numerator.trim();
                let denominator = denominator.trim();
                if numerator.is_empty() {
                    return Err(ParseError::EmptyPart("numerator"));
                }
                if denominator.is_empty() {
                    return Err(ParseError::EmptyPart("denominator"));
                }
                Ok(Self::per(numerator, denominator))
            }
            _ => Err(ParseError::TooManyDivisions(input)),
        }
    }

    /// Creates a unit without a denominator.
    #[must_use]
    pub fn scalar(numerator: &str) -> Self {
        Self {
            numerator: canonical_symbol(numerator.trim()).to_string(),
            denominator: None,
        }
    }

    /// Creates a `numerator/denominator` unit.
    #[must_use]
    pub fn per(numerator: &str, denominator: &str) -> Self {
        Self {
            numerator: canonical_symbol(numerator.trim()).to_string(),
            denominator: Some(canonical_symbol(denominator.trim()).to_string()),
        }
    }

    #[must_use]
    pub fn numerator(&self) -> &str {
        &self.numerator
    }

    #[must_use]
    pub fn denominator(&self) -> Option<&str> {
        self.denominator.as_deref()
    }

    /// Returns a copy with the numerator replaced.
    #[must_use]
    pub fn with_numerator(&self, numerator: &str) -> Self {
        Self {
            numerator: canonical_symbol(numerator).to_string(),
            denominator: self.denominator.clone(),
        }
    }

    /// Returns a copy with the denominator replaced.
    #[must_use]
    pub fn with_denominator(&self, denominator: &str) -> Self {
        Self {
            numerator: self.numerator.clone(),
            denominator: Some(canonical_symbol(denominator).to_string()),
        }
    }
}

impl fmt::Display for RatioUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.denominator {
            Some(denominator) => write!(f, "{}/{}", self.numerator, denominator),
            None => write!(f, "{}", self.numerator),
        }
    }
}

impl FromStr for RatioUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RatioUnit {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RatioUnit> for String {
    fn from(unit: RatioUnit) -> Self {
        unit.to_string()
    }
}

/// A price unit carrying its dollar year, e.g. `2020 $/gal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedUnit {
    pub year: Option<i32>,
    pub unit: RatioUnit,
}

impl DatedUnit {
    /// Parses a unit with an optional leading four-digit year.
    ///
    /// ```
    /// use biomac_core::units::DatedUnit;
    ///
    /// let dated = DatedUnit::parse("2020 $/gal").unwrap();
    /// assert_eq!(dated.year, Some(2020));
    /// assert_eq!(dated.unit.to_string(), "USD/gal");
    /// ```
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let input = input.trim();
        if let Some((head, rest)) = input.split_once(char::is_whitespace) {
            if head.len() == 4 {
                if let Ok(year) = head.parse::<i32>() {
                    return Ok(Self {
                        year: Some(year),
                        unit: RatioUnit::parse(rest)?,
                    });
                }
            }
        }
        Ok(Self {
            year: None,
            unit: RatioUnit::parse(input)?,
        })
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
