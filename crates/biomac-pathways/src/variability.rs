//! Linear parameter sweeps over cost items and LCA streams.
//!
//! Each value of each configured [`VariabilityParameter`] becomes one
//! [`VariabilityCase`]. A case is applied to copies of the study inputs and
//! the whole study is rerun, so cases never affect each other.

use crate::emissions::EmissionFactorTable;
use biomac_core::config::{SweepField, SweepTarget, VariabilityParameter};
use biomac_core::records::LineItem;
use serde::Serialize;

/// One value of a parameter sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariabilityCase {
    pub variability_id: usize,
    pub target: SweepTarget,
    pub field: SweepField,
    pub name: String,
    pub value: f64,
}

/// Expands parameters into cases, numbered in order.
pub fn expand_cases(parameters: &[VariabilityParameter]) -> Vec<VariabilityCase> {
    parameters
        .iter()
        .flat_map(|parameter| {
            parameter.values().into_iter().map(|value| VariabilityCase {
                variability_id: 0,
                target: parameter.target,
                field: parameter.field,
                name: parameter.name.clone(),
                value,
            })
        })
        .enumerate()
        .map(|(variability_id, case)| VariabilityCase {
            variability_id,
            ..case
        })
        .collect()
}

impl VariabilityCase {
    fn matches(&self, item: &LineItem) -> bool {
        match self.target {
            SweepTarget::CostItem => item.cost_item.as_deref() == Some(self.name.as_str()),
            SweepTarget::StreamLca => item.stream_name == self.name,
        }
    }

    /// Applies the case to line items and emission factors. Returns the
    /// number of rows changed.
    pub fn apply(&self, items: &mut [LineItem], factors: &mut EmissionFactorTable) -> usize {
        if self.field == SweepField::EmissionFactor {
            let mut changed = 0;
            for factor in factors.iter_mut() {
                if factor.key.stream_name == self.name {
                    factor.value = self.value;
                    changed += 1;
                }
            }
            return changed;
        }

        let mut changed = 0;
        for item in items.iter_mut().filter(|i| self.matches(i)) {
            match self.field {
                SweepField::UnitCost => {
                    item.unit_cost = Some(self.value);
                    if item.flow.is_none() || item.operating_time.is_none() {
                        item.total_cost = item.total_flow.map(|flow| flow * self.value);
                    }
                }
                SweepField::Flow => {
                    item.flow = Some(self.value);
                    if item.operating_time.is_none() {
                        item.total_flow = Some(self.value);
                        item.total_cost = item.unit_cost.map(|cost| cost * self.value);
                    }
                }
                SweepField::EmissionFactor => {}
            }
            item.recompute_totals();
            changed += 1;
        }
        changed
    }
}
