//! Minimum fuel selling price (MFSP) aggregation.
//!
//! Each cost line is inflated to the study dollar year, scaled by its
//! allocation multiplier and divided by the fuel yield of its pathway. The
//! itemized prices are then summed per pathway and production year.

use crate::allocation::Allocation;
use biomac_core::errors::{BiomacError, BiomacResult};
use biomac_core::records::{LineItem, ParameterCategory};
use biomac_core::units::{RatioUnit, TargetUnit, UnitConverter, UnitPosition, UnitValue, MJ_PER_GGE};
use biomac_core::{DiagnosticKind, Diagnostics, PriceIndex, Stage, StudyConfig};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// A cost line in one production year, with its contribution to MFSP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostItem {
    pub pathway_id: String,
    pub parameter_group: String,
    pub category: ParameterCategory,
    pub stream_name: String,
    pub cost_item: Option<String>,
    pub is_primary_fuel: bool,
    pub production_year: i32,
    pub total_cost: f64,
    pub total_cost_unit: RatioUnit,
    pub cost_year: i32,
    /// Allocation multiplier applied to `total_cost`.
    pub multiplier: f64,
    pub adjusted_cost: f64,
    pub adjusted_cost_year: i32,
    /// Signed contribution to MFSP. `None` when the yield is zero or missing.
    pub mfsp: Option<f64>,
    pub mfsp_unit: RatioUnit,
    pub is_harmonized: bool,
}

/// MFSP of a pathway in one production year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MfspAggregate {
    pub pathway_id: String,
    pub production_year: i32,
    pub mfsp: Option<f64>,
    pub unit: RatioUnit,
    pub cost_year: i32,
}

impl MfspAggregate {
    /// MFSP per gasoline gallon equivalent, when expressed per MJ.
    #[must_use]
    pub fn per_gge(&self) -> Option<f64> {
        if self.unit.denominator() != Some("MJ") {
            return None;
        }
        self.mfsp.map(|mfsp| mfsp * MJ_PER_GGE)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostOutputs {
    pub items: Vec<CostItem>,
    pub mfsp: Vec<MfspAggregate>,
}

impl CostOutputs {
    #[must_use]
    pub fn mfsp_for(&self, pathway_id: &str, production_year: i32) -> Option<&MfspAggregate> {
        self.mfsp
            .iter()
            .find(|m| m.pathway_id == pathway_id && m.production_year == production_year)
    }
}

/// A cost line after inflation and allocation, before year expansion.
struct PreparedCost<'a> {
    item: &'a LineItem,
    total_cost: f64,
    total_cost_unit: RatioUnit,
    cost_year: i32,
    multiplier: f64,
    adjusted_cost: f64,
    mfsp: Option<f64>,
    mfsp_unit: RatioUnit,
    commodity: Option<String>,
}

/// Computes itemized and aggregated MFSP.
///
/// Returns an error when a cost line has no dollar year or the price index
/// is missing a year it needs.
pub fn compute_mfsp(
    items: &[LineItem],
    allocation: &Allocation,
    price_index: &PriceIndex,
    converter: &UnitConverter,
    config: &StudyConfig,
    diagnostics: &mut Diagnostics,
) -> BiomacResult<CostOutputs> {
    let study = &config.study;
    let mut prepared = Vec::new();

    for item in items.iter().filter(|i| i.category.is_cost()) {
        if !item.is_fixed_cost() {
            if let Some((expected, found)) = flow_cost_mismatch(item) {
                diagnostics.record(
                    Stage::Cost,
                    Some(&item.pathway_id),
                    DiagnosticKind::UnitMismatch {
                        stream: item.stream_name.clone(),
                        expected,
                        found,
                    },
                );
                continue;
            }
        }
        let Some(total_cost) = item.total_cost.filter(|c| *c != 0.0 && c.is_finite()) else {
            continue;
        };
        let cost_year = item.cost_year.ok_or_else(|| BiomacError::MissingCostYear {
            pathway: item.pathway_id.clone(),
            stream: item.stream_name.clone(),
        })?;

        let multiplier = allocation.multiplier(item);
        let adjusted_cost = price_index.inflate(total_cost * multiplier, cost_year, study.cost_year)?;
        let total_cost_unit = item
            .total_cost_unit
            .clone()
            .unwrap_or_else(|| RatioUnit::scalar("USD"));
        let sign = if item.is_coproduct() || allocation.is_displacement_credit(item) {
            -1.0
        } else {
            1.0
        };

        let (mfsp, mfsp_unit) = match allocation.denominator(item) {
            Some((flow, yield_unit)) if flow != 0.0 && flow.is_finite() => {
                if let (Some(cost_den), Some(yield_den)) =
                    (total_cost_unit.denominator(), yield_unit.denominator())
                {
                    if cost_den != yield_den {
                        diagnostics.record(
                            Stage::Cost,
                            Some(&item.pathway_id),
                            DiagnosticKind::UnitMismatch {
                                stream: item.stream_name.clone(),
                                expected: yield_unit.to_string(),
                                found: total_cost_unit.to_string(),
                            },
                        );
                        continue;
                    }
                }
                (
                    Some(sign * adjusted_cost / flow),
                    RatioUnit::per(total_cost_unit.numerator(), yield_unit.numerator()),
                )
            }
            _ => (
                None,
                RatioUnit::per(total_cost_unit.numerator(), &study.energy_unit),
            ),
        };

        prepared.push(PreparedCost {
            item,
            total_cost,
            total_cost_unit,
            cost_year,
            multiplier,
            adjusted_cost,
            mfsp,
            mfsp_unit,
            commodity: allocation.yield_stream(item).map(str::to_string),
        });
    }

    // Rows with an undefined price are not harmonized and not reported.
    let defined: Vec<usize> = (0..prepared.len())
        .filter(|i| prepared[*i].mfsp.is_some())
        .collect();
    let values: Vec<UnitValue> = defined
        .iter()
        .map(|i| {
            let row = &prepared[*i];
            let value = UnitValue::new(row.mfsp, row.mfsp_unit.clone());
            match &row.commodity {
                Some(commodity) => value.with_commodity(commodity),
                None => value,
            }
        })
        .collect();
    let harmonized = converter.harmonize(
        &values,
        &TargetUnit::Given(study.energy_unit.clone()),
        UnitPosition::Denominator,
    );
    harmonized.report(Stage::Cost, None, diagnostics);
    let mut is_harmonized = vec![false; prepared.len()];
    for (index, value) in defined.into_iter().zip(harmonized.values) {
        let row = &mut prepared[index];
        row.mfsp = value.value;
        row.mfsp_unit = value.unit;
        is_harmonized[index] = value.is_harmonized;
    }

    let mut outputs = CostOutputs::default();
    for (row, is_harmonized) in prepared.iter().zip(is_harmonized) {
        for production_year in config.production_years() {
            outputs.items.push(CostItem {
                pathway_id: row.item.pathway_id.clone(),
                parameter_group: row.item.parameter_group.clone(),
                category: row.item.category.clone(),
                stream_name: row.item.stream_name.clone(),
                cost_item: row.item.cost_item.clone(),
                is_primary_fuel: row.item.is_primary_fuel,
                production_year,
                total_cost: row.total_cost,
                total_cost_unit: row.total_cost_unit.clone(),
                cost_year: row.cost_year,
                multiplier: row.multiplier,
                adjusted_cost: row.adjusted_cost,
                adjusted_cost_year: study.cost_year,
                mfsp: row.mfsp,
                mfsp_unit: row.mfsp_unit.clone(),
                is_harmonized,
            });
        }
    }
    outputs.items.sort_by(|a, b| {
        (&a.pathway_id, a.production_year, &a.category, &a.stream_name).cmp(&(
            &b.pathway_id,
            b.production_year,
            &b.category,
            &b.stream_name,
        ))
    });

    outputs.mfsp = aggregate_mfsp(&outputs.items, study.coproduct_cost_credit, diagnostics);
    info!(
        items = outputs.items.len(),
        aggregates = outputs.mfsp.len(),
        "Computed MFSP"
    );
    Ok(outputs)
}

/// Sums itemized MFSP per pathway, production year, unit and dollar year.
///
/// Rows that could not be harmonized are excluded. A group containing an
/// undefined item is undefined and flagged.
pub fn aggregate_mfsp(
    items: &[CostItem],
    include_coproduct_credit: bool,
    diagnostics: &mut Diagnostics,
) -> Vec<MfspAggregate> {
    let mut groups: BTreeMap<(&str, i32, &RatioUnit, i32), Option<f64>> = BTreeMap::new();
    for item in items {
        if item.category == ParameterCategory::CoproductCredits && !include_coproduct_credit {
            continue;
        }
        if item.mfsp.is_some() && !item.is_harmonized {
            continue;
        }
        let key = (
            item.pathway_id.as_str(),
            item.production_year,
            &item.mfsp_unit,
            item.adjusted_cost_year,
        );
        let total = groups.entry(key).or_insert(Some(0.0));
        *total = total.zip(item.mfsp).map(|(sum, value)| sum + value);
    }

    groups
        .into_iter()
        .map(|((pathway_id, production_year, unit, cost_year), mfsp)| {
            if mfsp.is_none() {
                diagnostics.record(
                    Stage::Cost,
                    Some(pathway_id),
                    DiagnosticKind::UndefinedMfsp {
                        year: production_year,
                    },
                );
            }
            MfspAggregate {
                pathway_id: pathway_id.to_string(),
                production_year,
                mfsp,
                unit: unit.clone(),
                cost_year,
            }
        })
        .collect()
}

/// Returns `(expected, found)` when the total-flow numerator of a line does
/// not match the denominator of its unit cost.
fn flow_cost_mismatch(item: &LineItem) -> Option<(String, String)> {
    let flow_unit = item.total_flow_unit.as_ref()?;
    let cost_den = item.cost_unit.as_ref()?.denominator()?;
    (flow_unit.numerator() != cost_den)
        .then(|| (cost_den.to_string(), flow_unit.numerator().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::allocate;
    use approx::assert_relative_eq;
    use biomac_core::config::AllocationPolicy;
    use biomac_core::units::UnitRegistry;
    use is_close::is_close;

    fn unit(s: &str) -> RatioUnit {
        RatioUnit::parse(s).unwrap()
    }

    fn config(policy: AllocationPolicy) -> StudyConfig {
        let mut config = StudyConfig::default();
        config.study.first_year = 2025;
        config.study.last_year = 2026;
        config.study.cost_year = 2020;
        config.study.allocation = policy;
        config
    }

    fn index() -> PriceIndex {
        PriceIndex::new().with(2016, 100.0).with(2020, 120.0)
    }

    fn feedstock(cost: f64) -> LineItem {
        LineItem::new("P", ParameterCategory::InputSupplyChains, "Corn stover")
            .with_group("Feedstock")
            .with_unit_cost("Corn stover", cost / 500.0, unit("USD/lb"))
            .with_total_flow(500.0, unit("lb/yr"))
            .with_total_cost(cost, unit("USD/yr"), 2020)
    }

    fn fuel() -> LineItem {
        LineItem::new("P", ParameterCategory::FuelUse, "Renewable diesel")
            .primary()
            .with_total_flow(10_000.0, unit("MJ/yr"))
    }

    fn run(items: &[LineItem], config: &StudyConfig) -> (BiomacResult<CostOutputs>, Diagnostics) {
        let registry = UnitRegistry::new();
        let converter = UnitConverter::new(&registry);
        let mut diagnostics = Diagnostics::new();
        let allocation = allocate(
            items,
            config.study.allocation,
            &converter,
            &config.study.energy_unit,
            &mut diagnostics,
        );
        let outputs = compute_mfsp(items, &allocation, &index(), &converter, config, &mut diagnostics);
        (outputs, diagnostics)
    }

    #[test]
    fn test_mfsp_per_year() {
        let items = vec![feedstock(1000.0), fuel()];
        let (outputs, diagnostics) = run(&items, &config(AllocationPolicy::Energy));
        let outputs = outputs.unwrap();

        assert_eq!(outputs.items.len(), 2, "one row per production year");
        assert_eq!(outputs.mfsp.len(), 2);
        let agg = outputs.mfsp_for("P", 2025).unwrap();
        assert_relative_eq!(agg.mfsp.unwrap(), 0.1);
        assert_eq!(agg.unit.to_string(), "USD/MJ");
        assert_eq!(agg.cost_year, 2020);
        assert!(is_close!(agg.per_gge().unwrap(), 0.1 * 121.2));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_inflation_to_study_year() {
        let mut line = feedstock(50.0);
        line.cost_year = Some(2016);
        let items = vec![line, fuel()];
        let (outputs, _) = run(&items, &config(AllocationPolicy::Energy));
        let outputs = outputs.unwrap();

        assert_relative_eq!(outputs.items[0].adjusted_cost, 60.0);
        assert_relative_eq!(outputs.items[0].mfsp.unwrap(), 60.0 / 10_000.0);
    }

    #[test]
    fn test_missing_index_year_is_fatal() {
        let mut line = feedstock(50.0);
        line.cost_year = Some(2011);
        let (outputs, _) = run(&[line, fuel()], &config(AllocationPolicy::Energy));
        assert!(matches!(
            outputs,
            Err(BiomacError::MissingPriceIndex { year: 2011 })
        ));
    }

    #[test]
    fn test_missing_cost_year_is_fatal() {
        let mut line = feedstock(50.0);
        line.cost_year = None;
        let (outputs, _) = run(&[line, fuel()], &config(AllocationPolicy::Energy));
        assert!(matches!(outputs, Err(BiomacError::MissingCostYear { .. })));
    }

    #[test]
    fn test_coproduct_credit_lowers_mfsp() {
        let credit = LineItem::new("P", ParameterCategory::CoproductCredits, "Electricity")
            .with_unit_cost("Electricity", 0.05, unit("USD/kWh"))
            .with_total_flow(4000.0, unit("kWh/yr"))
            .with_total_cost(200.0, unit("USD/yr"), 2020);
        let items = vec![feedstock(1000.0), credit, fuel()];

        let with_credit = run(&items, &config(AllocationPolicy::Energy)).0.unwrap();
        let mut no_credit_config = config(AllocationPolicy::Energy);
        no_credit_config.study.coproduct_cost_credit = false;
        let without_credit = run(&items, &no_credit_config).0.unwrap();

        let credited = with_credit.mfsp_for("P", 2025).unwrap().mfsp.unwrap();
        let uncredited = without_credit.mfsp_for("P", 2025).unwrap().mfsp.unwrap();
        assert_relative_eq!(credited, 0.08, max_relative = 1e-12);
        assert_relative_eq!(uncredited, 0.1, max_relative = 1e-12);
        assert!(credited < uncredited);
    }

    #[test]
    fn test_unit_mismatch_is_quarantined() {
        let mut line = feedstock(1000.0);
        line.total_flow_unit = Some(unit("ton/yr"));
        let items = vec![line, feedstock(500.0), fuel()];
        let (outputs, diagnostics) = run(&items, &config(AllocationPolicy::Energy));

        let agg = outputs.unwrap().mfsp_for("P", 2025).cloned().unwrap();
        assert_relative_eq!(agg.mfsp.unwrap(), 0.05);
        assert!(diagnostics.contains("unit_mismatch"));
    }

    #[test]
    fn test_fixed_costs_are_exempt_from_unit_check() {
        let labor = LineItem::new("P", ParameterCategory::FixedCosts, "Labor")
            .with_group("Fixed Costs")
            .with_unit_cost("Labor", 1.0, unit("USD/hr"))
            .with_total_flow(1.0, unit("yr/yr"))
            .with_total_cost(300.0, unit("USD/yr"), 2020);
        let (outputs, diagnostics) = run(&[labor, fuel()], &config(AllocationPolicy::Energy));
        let agg = outputs.unwrap().mfsp_for("P", 2025).cloned().unwrap();
        assert_relative_eq!(agg.mfsp.unwrap(), 0.03);
        assert!(!diagnostics.contains("unit_mismatch"));
    }

    #[test]
    fn test_zero_and_blank_costs_are_dropped() {
        let mut blank = feedstock(1000.0);
        blank.total_cost = None;
        let zero = feedstock(0.0);
        let (outputs, _) = run(&[blank, zero, fuel()], &config(AllocationPolicy::Energy));
        assert!(outputs.unwrap().items.is_empty());
    }

    #[test]
    fn test_zero_yield_is_undefined() {
        let mut fuel = fuel();
        fuel.total_flow = Some(0.0);
        let (outputs, diagnostics) = run(&[feedstock(1000.0), fuel], &config(AllocationPolicy::Energy));
        let outputs = outputs.unwrap();

        let agg = outputs.mfsp_for("P", 2025).unwrap();
        assert!(agg.mfsp.is_none());
        assert_eq!(agg.unit.to_string(), "USD/MJ");
        assert!(diagnostics.contains("undefined_mfsp"));
        assert!(!diagnostics.contains("unharmonized_units"));
    }

    #[test]
    fn test_hybrid_credits_non_primary_fuel() {
        let naphtha = LineItem::new("P", ParameterCategory::FuelUse, "Naphtha")
            .with_unit_cost("Naphtha", 0.02, unit("USD/MJ"))
            .with_total_flow(2500.0, unit("MJ/yr"))
            .with_total_cost(50.0, unit("USD/yr"), 2020);
        let mut primary = fuel();
        primary.total_flow = Some(7500.0);
        let items = vec![feedstock(1000.0), naphtha, primary];

        let (outputs, _) = run(&items, &config(AllocationPolicy::Hybrid));
        let outputs = outputs.unwrap();
        let feed = outputs
            .items
            .iter()
            .find(|i| i.stream_name == "Corn stover" && i.production_year == 2025)
            .unwrap();
        assert_relative_eq!(feed.multiplier, 0.75);
        assert_relative_eq!(feed.mfsp.unwrap(), 750.0 / 7500.0);

        let credit = outputs
            .items
            .iter()
            .find(|i| i.stream_name == "Naphtha" && i.production_year == 2025)
            .unwrap();
        assert_relative_eq!(credit.mfsp.unwrap(), -(50.0 * 0.75) / 7500.0);
    }
}
