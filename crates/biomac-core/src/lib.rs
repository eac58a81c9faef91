//! Core types for biofuel pathway studies.
//!
//! This crate holds what every stage of a study shares: the unit registry
//! and converter, the study configuration, the input record types, the price
//! index, fatal errors and the collection of recoverable diagnostics.

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod price_index;
pub mod records;
pub mod units;

pub use config::{AllocationPolicy, StudyConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Stage};
pub use errors::{BiomacError, BiomacResult};
pub use price_index::PriceIndex;
