//! Marginal abatement cost (MAC) of pathways against the fuels they displace.
//!
//! `MAC = (mfsp - mfsp_displaced) / (ci_displaced - ci) * 1e6`, in currency
//! per metric ton of CO2e avoided when CI is in grams per unit energy.
//!
//! The displaced fuel of a pathway comes from the displacement map, with its
//! price and CI taken from the reference tables for the production year.
//! With baseline substitution enabled, configured pathways are instead
//! compared with a named baseline pathway of the same study, and the
//! baseline pathways themselves are removed from the table.

use crate::allocation::Allocation;
use crate::cost::CostOutputs;
use crate::lca::LcaOutputs;
use biomac_core::errors::BiomacResult;
use biomac_core::records::{Displacement, ReferenceCi, ReferencePrice};
use biomac_core::units::{canonical_symbol, RatioUnit, TargetUnit, UnitConverter, UnitPosition, UnitValue};
use biomac_core::{DiagnosticKind, Diagnostics, PriceIndex, Stage, StudyConfig};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Grams per metric ton.
const G_PER_TONNE: f64 = 1e6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacResult {
    /// `None` when the CI difference is zero.
    pub mac: Option<f64>,
    /// The pathway is not lower-carbon than the fuel it displaces.
    pub not_effective: bool,
}

/// Computes the MAC of a candidate fuel against a displaced fuel.
///
/// A non-positive CI reduction is still computed but marked
/// `not_effective`.
///
/// ```
/// use biomac_pathways::mac::compute_mac;
///
/// let result = compute_mac(5.0, 20.0, 4.0, 90.0);
/// assert!((result.mac.unwrap() - 14_285.714_285).abs() < 1e-3);
/// assert!(!result.not_effective);
/// ```
#[must_use]
pub fn compute_mac(mfsp: f64, ci: f64, mfsp_displaced: f64, ci_displaced: f64) -> MacResult {
    let abatement = ci_displaced - ci;
    MacResult {
        mac: (abatement != 0.0).then(|| (mfsp - mfsp_displaced) / abatement * G_PER_TONNE),
        not_effective: !(abatement > 0.0),
    }
}

/// Reference data for displaced fuels.
#[derive(Debug, Clone, Copy, Default)]
pub struct References<'a> {
    pub displacements: &'a [Displacement],
    pub ci: &'a [ReferenceCi],
    pub prices: &'a [ReferencePrice],
}

/// One row of the MAC table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacRow {
    pub pathway_id: String,
    pub production_year: i32,
    pub replaced_fuel: Option<String>,
    pub baseline: Option<String>,
    pub mfsp: f64,
    pub mfsp_unit: RatioUnit,
    pub ci: f64,
    pub ci_unit: RatioUnit,
    pub mfsp_displaced: f64,
    pub ci_displaced: f64,
    pub mac: Option<f64>,
    pub mac_unit: RatioUnit,
    pub not_effective: bool,
    pub displaced_ci_higher: bool,
    pub displaced_cost_higher: bool,
    pub ci_reduction_pct: Option<f64>,
    pub mfsp_increase_pct: Option<f64>,
    /// The pathway's CI was flagged during CCS netting.
    pub ci_flagged: bool,
}

#[derive(Debug, Clone)]
struct Candidate {
    mfsp: f64,
    mfsp_unit: RatioUnit,
    ci: f64,
    ci_unit: RatioUnit,
    ci_flagged: bool,
}

/// A displaced-fuel value normalized to the study units.
type Normalized = BTreeMap<(i32, String), (f64, RatioUnit)>;

/// Builds the MAC table from the MFSP and CI of every pathway.
///
/// Returns an error only when a reference price needs a dollar year the
/// price index does not cover.
#[allow(clippy::too_many_arguments)]
pub fn compute_mac_table(
    cost: &CostOutputs,
    lca: &LcaOutputs,
    allocation: &Allocation,
    references: &References,
    price_index: &PriceIndex,
    converter: &UnitConverter,
    config: &StudyConfig,
    diagnostics: &mut Diagnostics,
) -> BiomacResult<Vec<MacRow>> {
    let energy_unit = canonical_symbol(&config.study.energy_unit);

    let mut candidates: BTreeMap<(&str, i32), Candidate> = BTreeMap::new();
    for agg in &cost.mfsp {
        if agg.unit.denominator() != Some(energy_unit) {
            continue;
        }
        let missing = |quantity: &str| DiagnosticKind::MissingPathwayResult {
            quantity: quantity.to_string(),
            year: agg.production_year,
        };
        let Some(mfsp) = agg.mfsp else {
            diagnostics.record(Stage::Mac, Some(agg.pathway_id.as_str()), missing("MFSP"));
            continue;
        };
        let Some((ci, ci_value)) = lca
            .ci_for(&agg.pathway_id, agg.production_year)
            .and_then(|ci| Some((ci, ci.ci?)))
        else {
            diagnostics.record(Stage::Mac, Some(agg.pathway_id.as_str()), missing("CI"));
            continue;
        };
        candidates.insert(
            (agg.pathway_id.as_str(), agg.production_year),
            Candidate {
                mfsp,
                mfsp_unit: agg.unit.clone(),
                ci: ci_value,
                ci_unit: ci.unit.clone(),
                ci_flagged: ci.flagged,
            },
        );
    }

    // Displaced fuel of every pathway compared against reference data.
    let mut replaced: BTreeMap<&str, Option<&str>> = BTreeMap::new();
    for &(pathway_id, _) in candidates.keys() {
        if replaced.contains_key(pathway_id)
            || config.is_baseline(pathway_id)
            || config.baseline_for(pathway_id).is_some()
        {
            continue;
        }
        let fuel = displaced_fuel(pathway_id, allocation, references.displacements);
        if fuel.is_none() {
            let stream = allocation
                .yield_for(pathway_id)
                .and_then(|y| y.streams.first().cloned())
                .unwrap_or_default();
            diagnostics.record(
                Stage::Mac,
                Some(pathway_id),
                DiagnosticKind::MissingDisplacedFuel { stream },
            );
        }
        replaced.insert(pathway_id, fuel);
    }
    let needed: BTreeSet<(i32, &str)> = candidates
        .keys()
        .filter_map(|&(pathway_id, year)| Some((year, (*replaced.get(pathway_id)?)?)))
        .collect();

    let reference_ci = normalize_ci(references.ci, &needed, converter, config, diagnostics);
    let reference_prices =
        normalize_prices(references.prices, &needed, price_index, converter, config, diagnostics)?;

    let mut rows = Vec::new();
    for (&(pathway_id, year), candidate) in &candidates {
        if config.is_baseline(pathway_id) {
            continue;
        }

        let (mfsp_displaced, ci_displaced, replaced_fuel, baseline) =
            if let Some(baseline) = config.baseline_for(pathway_id) {
                let Some(reference) = candidates.get(&(baseline, year)) else {
                    diagnostics.record(
                        Stage::Mac,
                        Some(pathway_id),
                        DiagnosticKind::MissingBaseline {
                            baseline: baseline.to_string(),
                            year,
                        },
                    );
                    continue;
                };
                if !units_match(pathway_id, baseline, candidate, &reference.mfsp_unit, &reference.ci_unit, diagnostics) {
                    continue;
                }
                (reference.mfsp, reference.ci, None, Some(baseline.to_string()))
            } else {
                let Some(Some(fuel)) = replaced.get(pathway_id) else {
                    continue;
                };
                let key = (year, fuel.to_string());
                let Some((ci_d, ci_unit)) = reference_ci.get(&key) else {
                    diagnostics.record(
                        Stage::Mac,
                        Some(pathway_id),
                        DiagnosticKind::MissingReference {
                            fuel: fuel.to_string(),
                            year,
                            quantity: "CI".to_string(),
                        },
                    );
                    continue;
                };
                let Some((price, price_unit)) = reference_prices.get(&key) else {
                    diagnostics.record(
                        Stage::Mac,
                        Some(pathway_id),
                        DiagnosticKind::MissingReference {
                            fuel: fuel.to_string(),
                            year,
                            quantity: "price".to_string(),
                        },
                    );
                    continue;
                };
                if !units_match(pathway_id, fuel, candidate, price_unit, ci_unit, diagnostics) {
                    continue;
                }
                (*price, *ci_d, Some(fuel.to_string()), None)
            };

        if candidate.ci_unit.numerator() != "g" {
            diagnostics.record(
                Stage::Mac,
                Some(pathway_id),
                DiagnosticKind::UnitMismatch {
                    stream: pathway_id.to_string(),
                    expected: "g".to_string(),
                    found: candidate.ci_unit.numerator().to_string(),
                },
            );
            continue;
        }

        let result = compute_mac(candidate.mfsp, candidate.ci, mfsp_displaced, ci_displaced);
        if result.not_effective {
            diagnostics.record(
                Stage::Mac,
                Some(pathway_id),
                DiagnosticKind::NotEffective {
                    year,
                    ci_reduction: ci_displaced - candidate.ci,
                },
            );
        }
        rows.push(MacRow {
            pathway_id: pathway_id.to_string(),
            production_year: year,
            replaced_fuel,
            baseline,
            mfsp: candidate.mfsp,
            mfsp_unit: candidate.mfsp_unit.clone(),
            ci: candidate.ci,
            ci_unit: candidate.ci_unit.clone(),
            mfsp_displaced,
            ci_displaced,
            mac: result.mac,
            mac_unit: RatioUnit::per(candidate.mfsp_unit.numerator(), "tonne"),
            not_effective: result.not_effective,
            displaced_ci_higher: ci_displaced > candidate.ci,
            displaced_cost_higher: mfsp_displaced > candidate.mfsp,
            ci_reduction_pct: percent_change(ci_displaced, ci_displaced - candidate.ci),
            mfsp_increase_pct: percent_change(mfsp_displaced, candidate.mfsp - mfsp_displaced),
            ci_flagged: candidate.ci_flagged,
        });
    }

    info!(rows = rows.len(), "Computed marginal abatement costs");
    Ok(rows)
}

fn percent_change(base: f64, delta: f64) -> Option<f64> {
    (base != 0.0).then(|| delta / base * 100.0)
}

/// Displaced fuel of a pathway: a mapping for one of its yield streams,
/// else any mapping for the pathway.
fn displaced_fuel<'a>(
    pathway_id: &str,
    allocation: &Allocation,
    displacements: &'a [Displacement],
) -> Option<&'a str> {
    let streams = allocation
        .yield_for(pathway_id)
        .map(|y| y.streams.as_slice())
        .unwrap_or_default();
    displacements
        .iter()
        .filter(|d| d.pathway_id == pathway_id)
        .find(|d| streams.contains(&d.stream_name))
        .or_else(|| displacements.iter().find(|d| d.pathway_id == pathway_id))
        .map(|d| d.replaced_fuel.as_str())
}

fn units_match(
    pathway_id: &str,
    reference: &str,
    candidate: &Candidate,
    mfsp_unit: &RatioUnit,
    ci_unit: &RatioUnit,
    diagnostics: &mut Diagnostics,
) -> bool {
    for (expected, found) in [(&candidate.mfsp_unit, mfsp_unit), (&candidate.ci_unit, ci_unit)] {
        if expected != found {
            diagnostics.record(
                Stage::Mac,
                Some(pathway_id),
                DiagnosticKind::UnitMismatch {
                    stream: reference.to_string(),
                    expected: expected.to_string(),
                    found: found.to_string(),
                },
            );
            return false;
        }
    }
    true
}

/// Reference CIs of the needed fuels, per study energy unit.
fn normalize_ci(
    references: &[ReferenceCi],
    needed: &BTreeSet<(i32, &str)>,
    converter: &UnitConverter,
    config: &StudyConfig,
    diagnostics: &mut Diagnostics,
) -> Normalized {
    let selected: Vec<&ReferenceCi> = references
        .iter()
        .filter(|r| needed.contains(&(r.year, r.fuel.as_str())))
        .collect();
    let values: Vec<UnitValue> = selected
        .iter()
        .map(|r| UnitValue::new(Some(r.ci), r.unit.clone()).with_commodity(&r.fuel))
        .collect();
    let harmonized = converter.harmonize(
        &values,
        &TargetUnit::Given(config.study.energy_unit.clone()),
        UnitPosition::Denominator,
    );
    harmonized.report(Stage::Mac, None, diagnostics);

    selected
        .into_iter()
        .zip(harmonized.values)
        .filter(|(_, value)| value.is_harmonized)
        .filter_map(|(r, value)| Some(((r.year, r.fuel.clone()), (value.value?, value.unit))))
        .collect()
}

/// Reference prices of the needed fuels, inflated to the study dollar year
/// and expressed per study energy unit.
fn normalize_prices(
    references: &[ReferencePrice],
    needed: &BTreeSet<(i32, &str)>,
    price_index: &PriceIndex,
    converter: &UnitConverter,
    config: &StudyConfig,
    diagnostics: &mut Diagnostics,
) -> BiomacResult<Normalized> {
    let study = &config.study;
    let selected: Vec<&ReferencePrice> = references
        .iter()
        .filter(|r| needed.contains(&(r.year, r.fuel.as_str())))
        .collect();
    let mut values = Vec::with_capacity(selected.len());
    for reference in &selected {
        let dollar_year = reference.unit.year.unwrap_or(study.cost_year);
        let price = price_index.inflate(reference.price, dollar_year, study.cost_year)?;
        values.push(UnitValue::new(Some(price), reference.unit.unit.clone()).with_commodity(&reference.fuel));
    }
    let harmonized = converter.harmonize(
        &values,
        &TargetUnit::Given(study.energy_unit.clone()),
        UnitPosition::Denominator,
    );
    harmonized.report(Stage::Mac, None, diagnostics);

    Ok(selected
        .into_iter()
        .zip(harmonized.values)
        .filter(|(_, value)| value.is_harmonized)
        .filter_map(|(r, value)| Some(((r.year, r.fuel.clone()), (value.value?, value.unit))))
        .collect())
}
