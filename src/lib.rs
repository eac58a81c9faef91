//! Biofuel marginal abatement cost studies
//!
//! Harmonizes the units of techno-economic and life-cycle inventories of
//! biomass conversion pathways, allocates them between co-produced fuels and
//! reports minimum fuel selling price, carbon intensity and marginal
//! abatement cost per pathway and production year.
//!
//! # Module Organisation
//!
//! - `io`: CSV tables in and out, and TOML configuration loading
//!
//! The study itself lives in the member crates, re-exported here:
//! - [`biomac_core`]: units, records, configuration and diagnostics
//! - [`biomac_pathways`]: allocation, MFSP, CI, MAC and variability

pub mod io;

pub use biomac_core;
pub use biomac_pathways;
