//! Pathway aggregation for biofuel marginal abatement cost studies
//!
//! This crate turns harmonized techno-economic and life-cycle line items into
//! per-pathway fuel selling prices, carbon intensities and marginal abatement
//! costs.
//!
//! # Module Organisation
//!
//! Stages are organised in the order a study runs them:
//! - `emissions`: Emission factor canonicalization and CO2e combination
//! - `allocation`: Splitting shared flows between co-produced fuels
//! - `cost`: Minimum fuel selling price (MFSP)
//! - `lca`: Carbon intensity (CI), including CCS netting
//! - `mac`: Marginal abatement cost against displaced fuels
//! - `variability`: Linear parameter sweeps
//! - `pipeline`: Running all stages for a study

pub mod allocation;
pub mod cost;
pub mod emissions;
pub mod lca;
pub mod mac;
pub mod pipeline;
pub mod variability;

pub use allocation::{allocate, Allocation, AllocationFraction, PathwayYield};
pub use cost::{compute_mfsp, CostItem, CostOutputs, MfspAggregate};
pub use emissions::{prepare_emission_factors, EmissionFactorTable};
pub use lca::{compute_ci, net_ccs, CiAggregate, LcaItem, LcaOutputs};
pub use mac::{compute_mac, compute_mac_table, MacResult, MacRow, References};
pub use pipeline::{CaseOutputs, Study, StudyInputs, StudyOutputs};
pub use variability::{expand_cases, VariabilityCase};
