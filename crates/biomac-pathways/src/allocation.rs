//! Allocation of shared costs and emissions between co-produced fuels.
//!
//! The fuel products of a pathway are its `Fuel Use` line items. Their flows
//! are first harmonized to the study energy unit, so that electricity in kWh
//! and liquid fuels in MJ (or in gallons, through their heating value) form
//! one group. Each policy then defines the yield every cost and emission is
//! divided by:
//!
//! | Policy | Yield | Multiplier on other lines |
//! |--------|-------|---------------------------|
//! | Pathway | sum of all fuel flows | 1 |
//! | Energy | sum of all fuel flows | 1 |
//! | Hybrid | sum of primary fuel flows | primary energy share |
//!
//! Under every policy, lines flagged as primary fuel (its transport and
//! distribution) are divided by their own stream flow and are not scaled.

use biomac_core::config::AllocationPolicy;
use biomac_core::records::{LineItem, ParameterCategory};
use biomac_core::units::{RatioUnit, TargetUnit, UnitConverter, UnitPosition, UnitValue};
use biomac_core::{DiagnosticKind, Diagnostics, Stage};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// A fuel product flow of a pathway.
#[derive(Debug, Clone, PartialEq)]
pub struct FuelFlow {
    pub pathway_id: String,
    pub stream_name: String,
    pub flow: f64,
    pub unit: RatioUnit,
    pub is_primary: bool,
}

impl FuelFlow {
    /// Collects the fuel-use flows of a set of line items. Items without a
    /// numeric total flow and unit are skipped.
    pub fn from_line_items(items: &[LineItem]) -> Vec<Self> {
        items
            .iter()
            .filter(|item| item.category == ParameterCategory::FuelUse)
            .filter_map(|item| {
                Some(Self {
                    pathway_id: item.pathway_id.clone(),
                    stream_name: item.stream_name.clone(),
                    flow: item.total_flow.filter(|v| v.is_finite())?,
                    unit: item.total_flow_unit.clone()?,
                    is_primary: item.is_primary_fuel,
                })
            })
            .collect()
    }
}

/// Share of a pathway's fuel group carried by one stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationFraction {
    pub pathway_id: String,
    pub stream_name: String,
    pub fraction: f64,
    pub is_primary: bool,
}

/// The flow MFSP and CI of a pathway are expressed per.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathwayYield {
    pub pathway_id: String,
    pub flow: f64,
    pub unit: RatioUnit,
    /// Multiplier applied to the pathway's non-primary lines.
    pub fraction: f64,
    pub streams: Vec<String>,
}

/// Result of allocating one study's pathways.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub policy: AllocationPolicy,
    pub fractions: Vec<AllocationFraction>,
    yields: BTreeMap<String, PathwayYield>,
    stream_flows: BTreeMap<(String, String), (f64, RatioUnit)>,
}

impl Allocation {
    #[must_use]
    pub fn yield_for(&self, pathway_id: &str) -> Option<&PathwayYield> {
        self.yields.get(pathway_id)
    }

    pub fn yields(&self) -> impl Iterator<Item = &PathwayYield> {
        self.yields.values()
    }

    /// Harmonized flow of a single fuel stream.
    #[must_use]
    pub fn stream_flow(&self, pathway_id: &str, stream_name: &str) -> Option<(f64, &RatioUnit)> {
        self.stream_flows
            .get(&(pathway_id.to_string(), stream_name.to_string()))
            .map(|(flow, unit)| (*flow, unit))
    }

    /// Factor a line item's flows, costs and burdens are scaled by.
    #[must_use]
    pub fn multiplier(&self, item: &LineItem) -> f64 {
        if self.policy != AllocationPolicy::Hybrid || item.is_primary_fuel {
            return 1.0;
        }
        self.yield_for(&item.pathway_id)
            .map_or(1.0, |y| y.fraction)
    }

    /// Flow a line item's contribution is divided by: the stream's own flow
    /// for primary fuel lines, the pathway yield otherwise.
    #[must_use]
    pub fn denominator(&self, item: &LineItem) -> Option<(f64, &RatioUnit)> {
        if item.is_primary_fuel {
            return self.stream_flow(&item.pathway_id, &item.stream_name);
        }
        self.yield_for(&item.pathway_id)
            .map(|y| (y.flow, &y.unit))
    }

    /// Fuel stream whose heating value converts the denominator of a line
    /// item's per-yield values.
    #[must_use]
    pub fn yield_stream<'a>(&'a self, item: &'a LineItem) -> Option<&'a str> {
        if item.is_primary_fuel {
            return Some(item.stream_name.as_str());
        }
        self.yield_for(&item.pathway_id)
            .and_then(|y| y.streams.first())
            .map(String::as_str)
    }

    /// Non-primary fuel products credited as displaced fuel under Hybrid.
    #[must_use]
    pub fn is_displacement_credit(&self, item: &LineItem) -> bool {
        self.policy == AllocationPolicy::Hybrid
            && item.category == ParameterCategory::FuelUse
            && !item.is_primary_fuel
    }
}

/// Computes allocation fractions and yields for every pathway that has line
/// items.
pub fn allocate(
    items: &[LineItem],
    policy: AllocationPolicy,
    converter: &UnitConverter,
    energy_unit: &str,
    diagnostics: &mut Diagnostics,
) -> Allocation {
    let raw = FuelFlow::from_line_items(items);
    let values: Vec<UnitValue> = raw
        .iter()
        .map(|f| UnitValue::new(Some(f.flow), f.unit.clone()).with_commodity(&f.stream_name))
        .collect();
    let harmonized = converter.harmonize(
        &values,
        &TargetUnit::Given(energy_unit.to_string()),
        UnitPosition::Numerator,
    );
    harmonized.report(Stage::Allocate, None, diagnostics);

    let flows: Vec<FuelFlow> = raw
        .into_iter()
        .zip(harmonized.values)
        .map(|(flow, value)| FuelFlow {
            flow: value.value.unwrap_or(flow.flow),
            unit: value.unit,
            ..flow
        })
        .collect();

    let mut allocation = Allocation {
        policy,
        fractions: Vec::new(),
        yields: BTreeMap::new(),
        stream_flows: BTreeMap::new(),
    };

    let mut by_pathway: BTreeMap<&str, Vec<&FuelFlow>> = BTreeMap::new();
    for item in items {
        by_pathway.entry(item.pathway_id.as_str()).or_default();
    }
    for flow in &flows {
        by_pathway
            .entry(flow.pathway_id.as_str())
            .or_default()
            .push(flow);
        let entry = allocation
            .stream_flows
            .entry((flow.pathway_id.clone(), flow.stream_name.clone()))
            .or_insert((0.0, flow.unit.clone()));
        entry.0 += flow.flow;
    }

    for (pathway_id, flows) in by_pathway {
        if flows.is_empty() {
            diagnostics.record(
                Stage::Allocate,
                Some(pathway_id),
                DiagnosticKind::MissingPrimaryFuel,
            );
            continue;
        }
        allocate_pathway(&mut allocation, pathway_id, &flows, diagnostics);
    }

    debug!(
        policy = %policy,
        pathways = allocation.yields.len(),
        "Allocated fuel products"
    );
    allocation
}

fn allocate_pathway(
    allocation: &mut Allocation,
    pathway_id: &str,
    flows: &[&FuelFlow],
    diagnostics: &mut Diagnostics,
) {
    let mut groups: BTreeMap<&RatioUnit, Vec<&FuelFlow>> = BTreeMap::new();
    for flow in flows {
        groups.entry(&flow.unit).or_default().push(flow);
    }

    let primary_group = groups
        .iter()
        .find(|(_, members)| members.iter().any(|f| f.is_primary))
        .map(|(unit, _)| *unit);
    let chosen = match primary_group {
        Some(unit) => unit,
        None => {
            let units: Vec<&RatioUnit> = groups.keys().copied().collect();
            if units.len() > 1 {
                diagnostics.record(
                    Stage::Allocate,
                    Some(pathway_id),
                    DiagnosticKind::AmbiguousFuelGroup {
                        units: units.iter().map(|u| u.to_string()).collect(),
                    },
                );
            }
            units[0]
        }
    };

    for (unit, members) in &groups {
        let total: f64 = members.iter().map(|f| f.flow).sum();
        for flow in members {
            let fraction = match allocation.policy {
                AllocationPolicy::Pathway | AllocationPolicy::Energy => 1.0,
                AllocationPolicy::Hybrid if total != 0.0 => flow.flow / total,
                AllocationPolicy::Hybrid => 0.0,
            };
            allocation.fractions.push(AllocationFraction {
                pathway_id: pathway_id.to_string(),
                stream_name: flow.stream_name.clone(),
                fraction,
                is_primary: flow.is_primary,
            });
        }
        if *unit != chosen {
            continue;
        }

        let yield_ = match allocation.policy {
            AllocationPolicy::Pathway | AllocationPolicy::Energy => PathwayYield {
                pathway_id: pathway_id.to_string(),
                flow: total,
                unit: (*unit).clone(),
                fraction: 1.0,
                streams: members.iter().map(|f| f.stream_name.clone()).collect(),
            },
            AllocationPolicy::Hybrid => {
                let primaries: Vec<&&FuelFlow> = members.iter().filter(|f| f.is_primary).collect();
                if primaries.is_empty() {
                    diagnostics.record(
                        Stage::Allocate,
                        Some(pathway_id),
                        DiagnosticKind::MissingPrimaryFuel,
                    );
                    continue;
                }
                if primaries.len() > 1 {
                    diagnostics.record(
                        Stage::Allocate,
                        Some(pathway_id),
                        DiagnosticKind::DuplicatePrimaryFuel {
                            streams: primaries.iter().map(|f| f.stream_name.clone()).collect(),
                        },
                    );
                }
                let flow: f64 = primaries.iter().map(|f| f.flow).sum();
                PathwayYield {
                    pathway_id: pathway_id.to_string(),
                    flow,
                    unit: (*unit).clone(),
                    fraction: if total != 0.0 { flow / total } else { 0.0 },
                    streams: primaries.iter().map(|f| f.stream_name.clone()).collect(),
                }
            }
        };
        allocation.yields.insert(pathway_id.to_string(), yield_);
    }
}
