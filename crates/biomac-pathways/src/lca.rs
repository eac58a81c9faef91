//! Carbon intensity (CI) aggregation.
//!
//! Line items that carry a material or energy flow are joined to their
//! emission factors, turned into annual burdens and divided by the fuel
//! yield of the pathway. Fossil CCS streams are netted against fossil
//! combustion emissions of the same pathway and year before aggregation.

use crate::allocation::Allocation;
use crate::emissions::EmissionFactorTable;
use biomac_core::records::{EmissionKey, LineItem, Metric, ParameterCategory, Pollutant};
use biomac_core::units::{RatioUnit, TargetUnit, UnitConverter, UnitPosition, UnitValue};
use biomac_core::{DiagnosticKind, Diagnostics, Stage, StudyConfig};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Material of the CCS streams that are netted against combustion.
const CCS_STREAM_FLOW: &str = "Carbon Dioxide";

/// A flow line joined to one emission factor in one production year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LcaItem {
    pub pathway_id: String,
    pub category: ParameterCategory,
    pub stream_flow: String,
    pub stream_name: String,
    pub is_primary_fuel: bool,
    pub production_year: i32,
    pub metric: Metric,
    pub pollutant: Pollutant,
    /// Annual flow in the standard unit of its quantity.
    pub flow: f64,
    pub flow_unit: RatioUnit,
    pub emission_factor: f64,
    pub emission_factor_unit: RatioUnit,
    pub multiplier: f64,
    /// Signed annual burden, after CCS netting.
    pub burden: f64,
    pub burden_unit: RatioUnit,
    /// Contribution to CI. `None` when the yield is zero or missing.
    pub ci: Option<f64>,
    pub ci_unit: RatioUnit,
    pub is_harmonized: bool,
}

/// Carbon intensity of a pathway in one production year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CiAggregate {
    pub pathway_id: String,
    pub production_year: i32,
    pub metric: Metric,
    pub pollutant: Pollutant,
    pub ci: Option<f64>,
    pub unit: RatioUnit,
    /// Net combustion after CCS netting was negative; needs manual review.
    pub flagged: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LcaOutputs {
    pub items: Vec<LcaItem>,
    pub ci: Vec<CiAggregate>,
}

impl LcaOutputs {
    /// Total CO2e intensity of a pathway in a production year.
    #[must_use]
    pub fn ci_for(&self, pathway_id: &str, production_year: i32) -> Option<&CiAggregate> {
        self.ci.iter().find(|c| {
            c.pathway_id == pathway_id
                && c.production_year == production_year
                && c.metric == Metric::TotalEmissions
                && c.pollutant == Pollutant::Co2e
        })
    }
}

/// Outcome of netting a CCS credit against combustion emissions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CcsNetting {
    pub net_combustion: f64,
    /// Always zero: the credit is absorbed into `net_combustion`.
    pub ccs: f64,
    pub is_negative: bool,
}

/// Nets a (negative) CCS credit against combustion emissions.
///
/// A negative result is kept as computed and marked for review.
///
/// ```
/// use biomac_pathways::lca::net_ccs;
///
/// let netting = net_ccs(100.0, -40.0);
/// assert_eq!(netting.net_combustion, 60.0);
/// assert_eq!(netting.ccs, 0.0);
/// assert!(!netting.is_negative);
/// ```
#[must_use]
pub fn net_ccs(combustion: f64, ccs: f64) -> CcsNetting {
    let net_combustion = combustion + ccs;
    CcsNetting {
        net_combustion,
        ccs: 0.0,
        is_negative: net_combustion < 0.0,
    }
}

/// Denominator an item's burden is divided by.
struct Yield {
    flow: Option<(f64, RatioUnit)>,
    commodity: Option<String>,
}

/// Computes itemized and aggregated carbon intensity.
pub fn compute_ci(
    items: &[LineItem],
    factors: &EmissionFactorTable,
    allocation: &Allocation,
    converter: &UnitConverter,
    config: &StudyConfig,
    diagnostics: &mut Diagnostics,
) -> LcaOutputs {
    let study = &config.study;
    let lines: Vec<(&LineItem, f64, &RatioUnit)> = items
        .iter()
        .filter(|i| i.category.is_lca())
        .filter_map(|i| {
            let flow = i.total_flow.filter(|v| v.is_finite())?;
            Some((i, flow, i.total_flow_unit.as_ref()?))
        })
        .collect();

    let values: Vec<UnitValue> = lines
        .iter()
        .map(|(line, flow, unit)| {
            let material = if line.stream_flow.is_empty() {
                &line.stream_name
            } else {
                &line.stream_flow
            };
            UnitValue::new(Some(*flow), (*unit).clone()).with_commodity(material)
        })
        .collect();
    let harmonized = converter.harmonize(&values, &TargetUnit::Standard, UnitPosition::Numerator);
    harmonized.report(Stage::Lca, None, diagnostics);

    let mut missing: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut mismatched: BTreeSet<(&str, &str, String)> = BTreeSet::new();
    let mut lca_items = Vec::new();
    let mut yields = Vec::new();

    for ((line, raw_flow, _), flow) in lines.iter().zip(&harmonized.values) {
        let flow_value = flow.value.unwrap_or(*raw_flow);
        let multiplier = allocation.multiplier(line);
        let sign = if line.is_coproduct() { -1.0 } else { 1.0 };

        for production_year in config.production_years() {
            let key = EmissionKey {
                context: line.category.clone(),
                stream_flow: line.stream_flow.clone(),
                stream_name: line.stream_name.clone(),
                year: production_year,
            };
            let matches = factors.get(&key);
            if matches.is_empty() {
                missing
                    .entry(line.pathway_id.as_str())
                    .or_default()
                    .insert(line.stream_name.as_str());
                continue;
            }
            for factor in matches {
                if factor.unit.denominator() != Some(flow.unit.numerator()) {
                    if mismatched.insert((
                        line.pathway_id.as_str(),
                        line.stream_name.as_str(),
                        factor.unit.to_string(),
                    )) {
                        diagnostics.record(
                            Stage::Lca,
                            Some(&line.pathway_id),
                            DiagnosticKind::UnitMismatch {
                                stream: line.stream_name.clone(),
                                expected: factor.unit.denominator().unwrap_or_default().to_string(),
                                found: flow.unit.numerator().to_string(),
                            },
                        );
                    }
                    continue;
                }
                let burden_unit = match flow.unit.denominator() {
                    Some(den) => RatioUnit::per(factor.unit.numerator(), den),
                    None => RatioUnit::scalar(factor.unit.numerator()),
                };
                lca_items.push(LcaItem {
                    pathway_id: line.pathway_id.clone(),
                    category: line.category.clone(),
                    stream_flow: line.stream_flow.clone(),
                    stream_name: line.stream_name.clone(),
                    is_primary_fuel: line.is_primary_fuel,
                    production_year,
                    metric: factor.metric,
                    pollutant: factor.pollutant,
                    flow: flow_value,
                    flow_unit: flow.unit.clone(),
                    emission_factor: factor.value,
                    emission_factor_unit: factor.unit.clone(),
                    multiplier,
                    burden: sign * factor.value * flow_value * multiplier,
                    burden_unit,
                    ci: None,
                    ci_unit: RatioUnit::scalar(factor.unit.numerator()),
                    is_harmonized: false,
                });
                yields.push(Yield {
                    flow: allocation
                        .denominator(line)
                        .map(|(flow, unit)| (flow, unit.clone())),
                    commodity: allocation.yield_stream(line).map(str::to_string),
                });
            }
        }
    }

    for (pathway_id, streams) in missing {
        diagnostics.record(
            Stage::Lca,
            Some(pathway_id),
            DiagnosticKind::MissingEmissionFactor {
                streams: streams.into_iter().map(str::to_string).collect(),
            },
        );
    }

    let flagged = if study.harmonize_ccs_fossil {
        net_ccs_streams(&mut lca_items, diagnostics)
    } else {
        BTreeSet::new()
    };

    let (lca_items, yields): (Vec<_>, Vec<_>) = lca_items
        .into_iter()
        .zip(yields)
        .filter_map(|(mut item, yield_)| {
            if let Some((flow, unit)) = yield_.flow.as_ref().filter(|(f, _)| *f != 0.0 && f.is_finite()) {
                if let (Some(burden_den), Some(yield_den)) =
                    (item.burden_unit.denominator(), unit.denominator())
                {
                    if burden_den != yield_den {
                        diagnostics.record(
                            Stage::Lca,
                            Some(&item.pathway_id),
                            DiagnosticKind::UnitMismatch {
                                stream: item.stream_name.clone(),
                                expected: unit.to_string(),
                                found: item.burden_unit.to_string(),
                            },
                        );
                        return None;
                    }
                }
                item.ci = Some(item.burden / flow);
                item.ci_unit = RatioUnit::per(item.burden_unit.numerator(), unit.numerator());
            } else {
                item.ci_unit = RatioUnit::per(item.burden_unit.numerator(), &study.energy_unit);
            }
            Some((item, yield_))
        })
        .unzip();
    let mut lca_items = lca_items;

    let defined: Vec<usize> = (0..lca_items.len())
        .filter(|i| lca_items[*i].ci.is_some())
        .collect();
    let values: Vec<UnitValue> = defined
        .iter()
        .map(|i| {
            let value = UnitValue::new(lca_items[*i].ci, lca_items[*i].ci_unit.clone());
            match &yields[*i].commodity {
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
    harmonized.report(Stage::Lca, None, diagnostics);
    for (index, value) in defined.into_iter().zip(harmonized.values) {
        let item = &mut lca_items[index];
        item.ci = value.value;
        item.ci_unit = value.unit;
        item.is_harmonized = value.is_harmonized;
    }

    lca_items.sort_by(|a, b| {
        (&a.pathway_id, a.production_year, &a.category, &a.stream_name, a.pollutant).cmp(&(
            &b.pathway_id,
            b.production_year,
            &b.category,
            &b.stream_name,
            b.pollutant,
        ))
    });
    let ci = aggregate_ci(&lca_items, study.coproduct_env_credit, &flagged, diagnostics);
    info!(items = lca_items.len(), aggregates = ci.len(), "Computed carbon intensity");
    LcaOutputs {
        items: lca_items,
        ci,
    }
}

/// Nets fossil CCS burdens against fossil combustion burdens per pathway,
/// year and pollutant. Returns the pathway-years whose net combustion is
/// negative.
fn net_ccs_streams(items: &mut [LcaItem], diagnostics: &mut Diagnostics) -> BTreeSet<(String, i32)> {
    let ccs_pathways: BTreeSet<String> = items
        .iter()
        .filter(|i| i.category == ParameterCategory::CcsStreamFossil && i.stream_flow == CCS_STREAM_FLOW)
        .map(|i| i.pathway_id.clone())
        .collect();

    let mut groups: BTreeMap<(String, i32, Pollutant), (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for (index, item) in items.iter().enumerate() {
        if !ccs_pathways.contains(&item.pathway_id) {
            continue;
        }
        let key = (item.pathway_id.clone(), item.production_year, item.pollutant);
        match item.category {
            ParameterCategory::CombustionEmsFossil => groups.entry(key).or_default().0.push(index),
            ParameterCategory::CcsStreamFossil => groups.entry(key).or_default().1.push(index),
            _ => {}
        }
    }

    let mut flagged = BTreeSet::new();
    for ((pathway_id, year, _), (combustion, ccs)) in groups {
        if ccs.is_empty() {
            continue;
        }
        if combustion.is_empty() {
            diagnostics.record(
                Stage::Lca,
                Some(&pathway_id),
                DiagnosticKind::CcsWithoutCombustion { year },
            );
            continue;
        }
        let combustion_unit = items[combustion[0]].burden_unit.clone();
        if let Some(other) = combustion
            .iter()
            .chain(&ccs)
            .map(|i| &items[*i].burden_unit)
            .find(|u| **u != combustion_unit)
        {
            diagnostics.record(
                Stage::Lca,
                Some(&pathway_id),
                DiagnosticKind::CcsUnitMismatch {
                    year,
                    combustion_unit: combustion_unit.to_string(),
                    ccs_unit: other.to_string(),
                },
            );
            continue;
        }

        let combustion_total: f64 = combustion.iter().map(|i| items[*i].burden).sum();
        let ccs_total: f64 = ccs.iter().map(|i| items[*i].burden).sum();
        let netting = net_ccs(combustion_total, ccs_total);

        // Combustion rows keep their shares of the gross total.
        if combustion_total != 0.0 {
            let scale = netting.net_combustion / combustion_total;
            for i in &combustion {
                items[*i].burden *= scale;
            }
        } else {
            items[combustion[0]].burden = netting.net_combustion;
        }
        for i in &ccs {
            items[*i].burden = netting.ccs;
        }

        if netting.is_negative {
            diagnostics.record(
                Stage::Lca,
                Some(&pathway_id),
                DiagnosticKind::NegativeNetCombustion {
                    year,
                    net: netting.net_combustion,
                },
            );
            flagged.insert((pathway_id, year));
        }
    }
    flagged
}

/// Sums itemized CI per pathway, production year, metric, pollutant and
/// unit.
pub fn aggregate_ci(
    items: &[LcaItem],
    include_coproduct_credit: bool,
    flagged: &BTreeSet<(String, i32)>,
    diagnostics: &mut Diagnostics,
) -> Vec<CiAggregate> {
    let mut groups: BTreeMap<(&str, i32, Metric, Pollutant, &RatioUnit), Option<f64>> = BTreeMap::new();
    for item in items {
        if item.category == ParameterCategory::CoproductCredits && !include_coproduct_credit {
            continue;
        }
        if item.ci.is_some() && !item.is_harmonized {
            continue;
        }
        let key = (
            item.pathway_id.as_str(),
            item.production_year,
            item.metric,
            item.pollutant,
            &item.ci_unit,
        );
        let total = groups.entry(key).or_insert(Some(0.0));
        *total = total.zip(item.ci).map(|(sum, value)| sum + value);
    }

    groups
        .into_iter()
        .map(|((pathway_id, production_year, metric, pollutant, unit), ci)| {
            if ci.is_none() {
                diagnostics.record(
                    Stage::Lca,
                    Some(pathway_id),
                    DiagnosticKind::UndefinedCi {
                        year: production_year,
                    },
                );
            }
            CiAggregate {
                pathway_id: pathway_id.to_string(),
                production_year,
                metric,
                pollutant,
                ci,
                unit: unit.clone(),
                flagged: flagged.contains(&(pathway_id.to_string(), production_year)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::allocate;
    use approx::assert_relative_eq;
    use biomac_core::records::EmissionFactor;
    use biomac_core::units::UnitRegistry;

    fn unit(s: &str) -> RatioUnit {
        RatioUnit::parse(s).unwrap()
    }

    fn config() -> StudyConfig {
        let mut config = StudyConfig::default();
        config.study.first_year = 2030;
        config.study.last_year = 2030;
        config
    }

    fn factor(category: ParameterCategory, stream_flow: &str, stream: &str, value: f64, unit_: &str) -> EmissionFactor {
        EmissionFactor {
            key: EmissionKey {
                context: category,
                stream_flow: stream_flow.into(),
                stream_name: stream.into(),
                year: 2030,
            },
            metric: Metric::TotalEmissions,
            pollutant: Pollutant::Co2e,
            value,
            unit: unit(unit_),
            is_harmonized: true,
        }
    }

    fn line(category: ParameterCategory, stream_flow: &str, stream: &str, flow: f64, unit_: &str) -> LineItem {
        LineItem::new("P", category, stream)
            .with_stream_flow(stream_flow)
            .with_total_flow(flow, unit(unit_))
    }

    fn fuel() -> LineItem {
        line(ParameterCategory::FuelUse, "Renewable diesel", "Renewable diesel", 10_000.0, "MJ/yr").primary()
    }

    fn run(items: &[LineItem], table: &EmissionFactorTable, config: &StudyConfig) -> (LcaOutputs, Diagnostics) {
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
        let outputs = compute_ci(items, table, &allocation, &converter, config, &mut diagnostics);
        (outputs, diagnostics)
    }

    #[test]
    fn test_ccs_netting() {
        let netting = net_ccs(100.0, -40.0);
        assert_relative_eq!(netting.net_combustion, 60.0);
        assert_relative_eq!(netting.ccs, 0.0);
        assert!(!netting.is_negative);

        let netting = net_ccs(100.0, -150.0);
        assert_relative_eq!(netting.net_combustion, -50.0);
        assert_relative_eq!(netting.ccs, 0.0);
        assert!(netting.is_negative);
    }

    #[test]
    fn test_ci_of_feedstock() {
        let items = vec![
            line(ParameterCategory::InputSupplyChains, "Corn stover", "Corn stover", 500.0, "lb/yr"),
            fuel(),
        ];
        let table = EmissionFactorTable::from_factors([factor(
            ParameterCategory::InputSupplyChains,
            "Corn stover",
            "Corn stover",
            0.02,
            "g/lb",
        )]);
        let (outputs, diagnostics) = run(&items, &table, &config());

        let ci = outputs.ci_for("P", 2030).unwrap();
        assert_relative_eq!(ci.ci.unwrap(), 0.001, max_relative = 1e-12);
        assert_eq!(ci.unit.to_string(), "g/MJ");
        assert!(!ci.flagged);
        assert_eq!(outputs.items.len(), 1);
        assert_relative_eq!(outputs.items[0].burden, 10.0, max_relative = 1e-12);
        assert_eq!(outputs.items[0].burden_unit.to_string(), "g/yr");

        // The fuel line has no factor: reported once for the pathway.
        let missing: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.kind.code() == "missing_emission_factor")
            .collect();
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn test_flow_is_harmonized_before_join() {
        let items = vec![
            line(ParameterCategory::InputSupplyChains, "Corn stover", "Corn stover", 1.0, "ton/yr"),
            fuel(),
        ];
        let table = EmissionFactorTable::from_factors([factor(
            ParameterCategory::InputSupplyChains,
            "Corn stover",
            "Corn stover",
            5.0,
            "g/lb",
        )]);
        let (outputs, _) = run(&items, &table, &config());
        assert_relative_eq!(outputs.ci_for("P", 2030).unwrap().ci.unwrap(), 1.0, max_relative = 1e-12);
    }

    #[test]
    fn test_factor_unit_mismatch_is_excluded() {
        let items = vec![
            line(ParameterCategory::InputSupplyChains, "Water", "Water", 10.0, "gal/yr"),
            fuel(),
        ];
        let table = EmissionFactorTable::from_factors([factor(
            ParameterCategory::InputSupplyChains,
            "Water",
            "Water",
            1.0,
            "g/lb",
        )]);
        let (outputs, diagnostics) = run(&items, &table, &config());
        assert!(outputs.items.is_empty());
        assert!(diagnostics.contains("unit_mismatch"));
    }

    #[test]
    fn test_coproduct_credit_and_toggle() {
        let items = vec![
            line(ParameterCategory::InputSupplyChains, "Corn stover", "Corn stover", 500.0, "lb/yr"),
            line(ParameterCategory::CoproductCredits, "Electricity", "Electricity", 100.0, "MJ/yr"),
            fuel(),
        ];
        let table = EmissionFactorTable::from_factors([
            factor(ParameterCategory::InputSupplyChains, "Corn stover", "Corn stover", 0.02, "g/lb"),
            factor(ParameterCategory::CoproductCredits, "Electricity", "Electricity", 0.05, "g/MJ"),
        ]);
        let (credited, _) = run(&items, &table, &config());
        assert_relative_eq!(
            credited.ci_for("P", 2030).unwrap().ci.unwrap(),
            (10.0 - 5.0) / 10_000.0,
            max_relative = 1e-12
        );

        let mut no_credit = config();
        no_credit.study.coproduct_env_credit = false;
        let (uncredited, _) = run(&items, &table, &no_credit);
        assert_relative_eq!(
            uncredited.ci_for("P", 2030).unwrap().ci.unwrap(),
            0.001,
            max_relative = 1e-12
        );
    }

    fn ccs_case(combustion: f64, ccs: f64) -> (LcaOutputs, Diagnostics) {
        let items = vec![
            line(ParameterCategory::CombustionEmsFossil, "Natural gas", "Natural gas", 1.0, "MJ/yr"),
            line(ParameterCategory::CcsStreamFossil, CCS_STREAM_FLOW, "CO2 to storage", 1.0, "lb/yr"),
            fuel(),
        ];
        let table = EmissionFactorTable::from_factors([
            factor(ParameterCategory::CombustionEmsFossil, "Natural gas", "Natural gas", combustion, "g/MJ"),
            factor(ParameterCategory::CcsStreamFossil, CCS_STREAM_FLOW, "CO2 to storage", ccs, "g/lb"),
        ]);
        run(&items, &table, &config())
    }

    #[test]
    fn test_ccs_netting_in_pipeline() {
        let (outputs, diagnostics) = ccs_case(100.0, -40.0);
        let combustion = outputs
            .items
            .iter()
            .find(|i| i.category == ParameterCategory::CombustionEmsFossil)
            .unwrap();
        let ccs = outputs
            .items
            .iter()
            .find(|i| i.category == ParameterCategory::CcsStreamFossil)
            .unwrap();
        assert_relative_eq!(combustion.burden, 60.0, max_relative = 1e-12);
        assert_relative_eq!(ccs.burden, 0.0);
        assert!(!outputs.ci_for("P", 2030).unwrap().flagged);
        assert!(!diagnostics.contains("negative_net_combustion"));
    }

    #[test]
    fn test_negative_net_combustion_is_kept_and_flagged() {
        let (outputs, diagnostics) = ccs_case(100.0, -150.0);
        let ci = outputs.ci_for("P", 2030).unwrap();
        assert_relative_eq!(ci.ci.unwrap(), -50.0 / 10_000.0, max_relative = 1e-12);
        assert!(ci.flagged);
        assert!(diagnostics.contains("negative_net_combustion"));
    }

    #[test]
    fn test_ccs_netting_can_be_disabled() {
        let items = vec![
            line(ParameterCategory::CombustionEmsFossil, "Natural gas", "Natural gas", 1.0, "MJ/yr"),
            line(ParameterCategory::CcsStreamFossil, CCS_STREAM_FLOW, "CO2 to storage", 1.0, "lb/yr"),
            fuel(),
        ];
        let table = EmissionFactorTable::from_factors([
            factor(ParameterCategory::CombustionEmsFossil, "Natural gas", "Natural gas", 100.0, "g/MJ"),
            factor(ParameterCategory::CcsStreamFossil, CCS_STREAM_FLOW, "CO2 to storage", -150.0, "g/lb"),
        ]);
        let mut config = config();
        config.study.harmonize_ccs_fossil = false;
        let (outputs, diagnostics) = run(&items, &table, &config);
        let ccs = outputs
            .items
            .iter()
            .find(|i| i.category == ParameterCategory::CcsStreamFossil)
            .unwrap();
        assert_relative_eq!(ccs.burden, -150.0);
        assert!(!diagnostics.contains("negative_net_combustion"));
    }

    #[test]
    fn test_ccs_without_combustion() {
        let items = vec![
            line(ParameterCategory::CcsStreamFossil, CCS_STREAM_FLOW, "CO2 to storage", 1.0, "lb/yr"),
            fuel(),
        ];
        let table = EmissionFactorTable::from_factors([factor(
            ParameterCategory::CcsStreamFossil,
            CCS_STREAM_FLOW,
            "CO2 to storage",
            -40.0,
            "g/lb",
        )]);
        let (outputs, diagnostics) = run(&items, &table, &config());
        assert!(diagnostics.contains("ccs_without_combustion"));
        assert_relative_eq!(outputs.items[0].burden, -40.0);
    }

    #[test]
    fn test_zero_yield_is_undefined() {
        let mut fuel = fuel();
        fuel.total_flow = Some(0.0);
        let items = vec![
            line(ParameterCategory::InputSupplyChains, "Corn stover", "Corn stover", 500.0, "lb/yr"),
            fuel,
        ];
        let table = EmissionFactorTable::from_factors([factor(
            ParameterCategory::InputSupplyChains,
            "Corn stover",
            "Corn stover",
            0.02,
            "g/lb",
        )]);
        let (outputs, diagnostics) = run(&items, &table, &config());
        assert!(outputs.ci_for("P", 2030).unwrap().ci.is_none());
        assert!(diagnostics.contains("undefined_ci"));
    }
}
