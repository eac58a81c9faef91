use thiserror::Error;

use crate::units::ParseError;

/// Error type for failures that stop a study from producing results.
///
/// Recoverable data problems are not errors; they are recorded as
/// [`crate::diagnostics::Diagnostic`]s and the affected rows are excluded.
#[derive(Error, Debug)]
pub enum BiomacError {
    #[error("Price index has no entry for year {year}")]
    MissingPriceIndex { year: i32 },
    #[error("Price index for year {year} must be positive, got {value}")]
    InvalidPriceIndex { year: i32, value: f64 },
    #[error("Line item '{stream}' of pathway '{pathway}' has no cost year")]
    MissingCostYear { pathway: String, stream: String },
    #[error("Required input '{0}' is empty")]
    EmptyInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Unknown allocation policy '{0}'. Expected one of: Pathway, Energy, Hybrid")]
    UnknownAllocationPolicy(String),
    #[error("Invalid unit '{unit}': {source}")]
    InvalidUnit {
        unit: String,
        #[source]
        source: ParseError,
    },
    #[error("Conversion chain is broken: hop {index} starts at '{found}' but the previous hop ended at '{expected}'")]
    BrokenConversionChain {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("Invalid variability sweep for '{target}': {reason}")]
    InvalidSweep { target: String, reason: String },
}

/// Convenience type for `Result<T, BiomacError>`.
pub type BiomacResult<T> = Result<T, BiomacError>;

impl From<toml::de::Error> for BiomacError {
    fn from(e: toml::de::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}
