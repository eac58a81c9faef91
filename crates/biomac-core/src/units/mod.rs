//! Unit parsing, registry and conversion for pathway data.
//!
//! Cost, flow and emission records arrive with heterogeneous units: pounds
//! and short tons, kWh and MJ, `$/gal` and `$/MMBtu`. This module brings them
//! to a common basis.
//!
//! # Quick Start
//!
//! ```
//! use biomac_core::units::{
//!     RatioUnit, TargetUnit, UnitConverter, UnitPosition, UnitValue, UNIT_REGISTRY,
//! };
//!
//! let converter = UnitConverter::new(&UNIT_REGISTRY);
//! let rows = vec![UnitValue::new(Some(0.36), RatioUnit::parse("$/kWh").unwrap())];
//! let out = converter.harmonize(&rows, &TargetUnit::Given("MJ".into()), UnitPosition::Denominator);
//! assert_eq!(out.values[0].unit.to_string(), "USD/MJ");
//! assert!((out.values[0].value.unwrap() - 0.1).abs() < 1e-12);
//! ```
//!
//! # Layers
//!
//! | Layer | Purpose |
//! |-------|---------|
//! | [`parser`] | Parse `num/den` unit strings once, canonicalizing aliases |
//! | [`registry`] | Physical units by quantity, commodity factors, heating values |
//! | [`conversion`] | Single hops and explicit multi-hop chains with provenance |
//! | [`converter`] | Batch harmonization that passes unconvertible rows through |
//!
//! A missing factor is never treated as `1.0`: the value is passed through
//! unchanged and flagged as not harmonized.

pub mod conversion;
pub mod converter;
pub mod parser;
pub mod registry;

pub use conversion::{Category, ChainedConversion, ConversionPath, Converted, Hop, ProvenanceStep, UnmappedHop};
pub use converter::{
    Harmonization, HarmonizedValue, IgnoreReason, IgnoredUnit, TargetUnit, UnitConverter,
    UnitPosition, UnitValue,
};
pub use parser::{DatedUnit, ParseError, RatioUnit};
pub use registry::{
    canonical_symbol, HeatingValue, Quantity, UnitInfo, UnitRegistry, MJ_PER_GGE, MJ_PER_KWH,
    UNIT_REGISTRY,
};
