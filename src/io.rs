//! CSV ingestion and output.
//!
//! Input tables keep the column names of the pathway workbooks. Units are
//! split over numerator and denominator columns and are joined and parsed
//! here, once, before anything reaches the study.

use anyhow::{bail, Context, Result};
use biomac_core::records::{
    Displacement, LineItem, ParameterCategory, RawEmissionFactor, ReferenceCi, ReferencePrice,
};
use biomac_core::units::{DatedUnit, HeatingValue, RatioUnit};
use biomac_core::{PriceIndex, StudyConfig};
use biomac_pathways::{CaseOutputs, StudyInputs, StudyOutputs};
use csv::{ReaderBuilder, Trim, Writer};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub const TEA_FILE: &str = "tea.csv";
pub const EMISSION_FACTORS_FILE: &str = "emission_factors.csv";
pub const PRICE_INDEX_FILE: &str = "price_index.csv";
pub const DISPLACEMENTS_FILE: &str = "displacements.csv";
pub const REFERENCE_CI_FILE: &str = "reference_ci.csv";
pub const REFERENCE_PRICES_FILE: &str = "reference_prices.csv";
pub const HEATING_VALUES_FILE: &str = "heating_values.csv";

#[derive(Debug, Deserialize)]
struct TeaRow {
    #[serde(rename = "Case/Scenario")]
    pathway_id: String,
    #[serde(rename = "Parameter_A", default)]
    parameter_group: String,
    #[serde(rename = "Parameter_B")]
    category: ParameterCategory,
    #[serde(rename = "Stream_Flow", default)]
    stream_flow: String,
    #[serde(rename = "Stream_LCA")]
    stream_name: String,
    #[serde(rename = "Energy_alloc_primary_fuel", default)]
    primary_fuel: Option<String>,
    #[serde(rename = "Flow", default, deserialize_with = "csv::invalid_option")]
    flow: Option<f64>,
    #[serde(rename = "Flow: Unit (numerator)", default)]
    flow_numerator: Option<String>,
    #[serde(rename = "Flow: Unit (denominator)", default)]
    flow_denominator: Option<String>,
    #[serde(rename = "Cost Item", default)]
    cost_item: Option<String>,
    #[serde(rename = "Unit Cost", default, deserialize_with = "csv::invalid_option")]
    unit_cost: Option<f64>,
    #[serde(rename = "Cost: Unit (numerator)", default)]
    cost_numerator: Option<String>,
    #[serde(rename = "Cost: Unit (denominator)", default)]
    cost_denominator: Option<String>,
    #[serde(rename = "Operating Time", default, deserialize_with = "csv::invalid_option")]
    operating_time: Option<f64>,
    #[serde(rename = "Operating Time: Unit", default)]
    operating_time_unit: Option<String>,
    #[serde(rename = "Total Cost", default, deserialize_with = "csv::invalid_option")]
    total_cost: Option<f64>,
    #[serde(rename = "Total Cost: Unit (numerator)", default)]
    total_cost_numerator: Option<String>,
    #[serde(rename = "Total Cost: Unit (denominator)", default)]
    total_cost_denominator: Option<String>,
    #[serde(rename = "Total Flow", default, deserialize_with = "csv::invalid_option")]
    total_flow: Option<f64>,
    #[serde(rename = "Total Flow: Unit (numerator)", default)]
    total_flow_numerator: Option<String>,
    #[serde(rename = "Total Flow: Unit (denominator)", default)]
    total_flow_denominator: Option<String>,
    #[serde(rename = "Cost Year", default, deserialize_with = "csv::invalid_option")]
    cost_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct EmissionFactorRow {
    #[serde(rename = "Parameter_B")]
    context: ParameterCategory,
    #[serde(rename = "Stream_Flow", default)]
    stream_flow: String,
    #[serde(rename = "Stream_LCA")]
    stream_name: String,
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "LCA_metric")]
    label: String,
    #[serde(rename = "LCA_value", default, deserialize_with = "csv::invalid_option")]
    value: Option<f64>,
    #[serde(rename = "LCA: Unit (numerator)", default)]
    numerator: Option<String>,
    #[serde(rename = "LCA: Unit (denominator)", default)]
    denominator: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceIndexRow {
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Index")]
    value: f64,
}

#[derive(Debug, Deserialize)]
struct DisplacementRow {
    #[serde(rename = "Case/Scenario")]
    pathway_id: String,
    #[serde(rename = "Biofuel Stream_LCA")]
    stream_name: String,
    #[serde(rename = "Replaced Fuel")]
    replaced_fuel: String,
}

#[derive(Debug, Deserialize)]
struct ReferenceCiRow {
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Replaced Fuel")]
    fuel: String,
    #[serde(rename = "CI replaced fuel")]
    ci: f64,
    #[serde(rename = "CI replaced fuel: Unit (Numerator)")]
    numerator: String,
    #[serde(rename = "CI replaced fuel: Unit (Denominator)")]
    denominator: String,
}

#[derive(Debug, Deserialize)]
struct ReferencePriceRow {
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Replaced Fuel")]
    fuel: String,
    #[serde(rename = "Cost_replaced fuel")]
    price: f64,
    #[serde(rename = "Cost replaced fuel: Unit (Numerator)")]
    numerator: String,
    #[serde(rename = "Cost replaced fuel: Unit (Denominator)")]
    denominator: String,
    /// Dollar year, when not already part of the numerator.
    #[serde(rename = "Year_Cost_replaced fuel", default, deserialize_with = "csv::invalid_option")]
    dollar_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct HeatingValueRow {
    #[serde(rename = "Fuel")]
    fuel: String,
    #[serde(rename = "LHV")]
    value: f64,
    #[serde(rename = "LHV_numerator")]
    numerator: String,
    #[serde(rename = "LHV_denominator")]
    denominator: String,
}

/// Joins split unit columns into one parsed unit.
///
/// A missing numerator means no unit. A missing denominator gives a scalar
/// unit.
fn join_unit(numerator: Option<&str>, denominator: Option<&str>) -> Result<Option<RatioUnit>> {
    let numerator = match numerator.map(str::trim) {
        Some(n) if !n.is_empty() && n != "-" => n,
        _ => return Ok(None),
    };
    let text = match denominator.map(str::trim) {
        Some(d) if !d.is_empty() && d != "-" => format!("{numerator}/{d}"),
        _ => numerator.to_string(),
    };
    let unit = RatioUnit::parse(&text).with_context(|| format!("invalid unit '{text}'"))?;
    Ok(Some(unit))
}

fn required_unit(numerator: &str, denominator: &str) -> Result<RatioUnit> {
    match join_unit(Some(numerator), Some(denominator))? {
        Some(unit) => Ok(unit),
        None => bail!("missing unit numerator"),
    }
}

fn is_flag_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("y"))
}

impl TeaRow {
    fn into_line_item(self) -> Result<LineItem> {
        let blank_to_none = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        Ok(LineItem {
            flow_unit: join_unit(self.flow_numerator.as_deref(), self.flow_denominator.as_deref())?,
            cost_unit: join_unit(self.cost_numerator.as_deref(), self.cost_denominator.as_deref())?,
            total_cost_unit: join_unit(
                self.total_cost_numerator.as_deref(),
                self.total_cost_denominator.as_deref(),
            )?,
            total_flow_unit: join_unit(
                self.total_flow_numerator.as_deref(),
                self.total_flow_denominator.as_deref(),
            )?,
            pathway_id: self.pathway_id,
            parameter_group: self.parameter_group,
            category: self.category,
            stream_flow: self.stream_flow,
            stream_name: self.stream_name,
            is_primary_fuel: is_flag_set(self.primary_fuel.as_deref()),
            flow: self.flow,
            cost_item: blank_to_none(self.cost_item),
            unit_cost: self.unit_cost,
            operating_time: self.operating_time,
            operating_time_unit: blank_to_none(self.operating_time_unit),
            total_cost: self.total_cost,
            total_flow: self.total_flow,
            cost_year: self.cost_year,
        })
    }
}

impl EmissionFactorRow {
    fn into_raw(self) -> Result<RawEmissionFactor> {
        Ok(RawEmissionFactor {
            unit: join_unit(self.numerator.as_deref(), self.denominator.as_deref())?,
            context: self.context,
            stream_flow: self.stream_flow,
            stream_name: self.stream_name,
            year: self.year,
            label: self.label,
            value: self.value,
        })
    }
}

impl ReferencePriceRow {
    fn into_price(self) -> Result<ReferencePrice> {
        let text = format!("{}/{}", self.numerator.trim(), self.denominator.trim());
        let mut unit =
            DatedUnit::parse(&text).with_context(|| format!("invalid price unit '{text}'"))?;
        if unit.year.is_none() {
            unit.year = self.dollar_year;
        }
        Ok(ReferencePrice {
            year: self.year,
            fuel: self.fuel,
            price: self.price,
            unit,
        })
    }
}

/// Deserializes every row of a CSV source. `source` names it in errors.
pub fn read_rows<T: DeserializeOwned, R: Read>(reader: R, source: &str) -> Result<Vec<T>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);
    reader
        .deserialize()
        .enumerate()
        .map(|(index, row)| row.with_context(|| format!("parsing row {} of {source}", index + 2)))
        .collect()
}

fn read_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let rows = read_rows(file, &path.display().to_string())?;
    debug!(path = %path.display(), rows = rows.len(), "Read table");
    Ok(rows)
}

/// Reads a table that may be absent; an absent file reads as empty.
fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if path.exists() {
        read_file(path)
    } else {
        debug!(path = %path.display(), "Optional table not found");
        Ok(Vec::new())
    }
}

/// Reads the techno-economic line items.
pub fn parse_line_items<R: Read>(reader: R, source: &str) -> Result<Vec<LineItem>> {
    read_rows::<TeaRow, _>(reader, source)?
        .into_iter()
        .map(TeaRow::into_line_item)
        .collect()
}

/// Reads the emission factor correspondence table.
pub fn parse_emission_factors<R: Read>(reader: R, source: &str) -> Result<Vec<RawEmissionFactor>> {
    read_rows::<EmissionFactorRow, _>(reader, source)?
        .into_iter()
        .map(EmissionFactorRow::into_raw)
        .collect()
}

/// Reads every study input from `data_dir`.
///
/// The TEA table and the price index are required. The other tables read
/// as empty when missing.
pub fn load_inputs(data_dir: &Path) -> Result<StudyInputs> {
    let tea_path = data_dir.join(TEA_FILE);
    let tea = fs::File::open(&tea_path).with_context(|| format!("opening {}", tea_path.display()))?;
    let line_items = parse_line_items(tea, &tea_path.display().to_string())?;

    let ef_path = data_dir.join(EMISSION_FACTORS_FILE);
    let emission_factors = if ef_path.exists() {
        let file = fs::File::open(&ef_path).with_context(|| format!("opening {}", ef_path.display()))?;
        parse_emission_factors(file, &ef_path.display().to_string())?
    } else {
        Vec::new()
    };

    let mut price_index = PriceIndex::new();
    for row in read_file::<PriceIndexRow>(&data_dir.join(PRICE_INDEX_FILE))? {
        price_index.insert(row.year, row.value);
    }

    let displacements = read_optional::<DisplacementRow>(&data_dir.join(DISPLACEMENTS_FILE))?
        .into_iter()
        .map(|row| Displacement {
            pathway_id: row.pathway_id,
            stream_name: row.stream_name,
            replaced_fuel: row.replaced_fuel,
        })
        .collect();

    let reference_ci = read_optional::<ReferenceCiRow>(&data_dir.join(REFERENCE_CI_FILE))?
        .into_iter()
        .map(|row| {
            Ok(ReferenceCi {
                unit: required_unit(&row.numerator, &row.denominator)?,
                year: row.year,
                fuel: row.fuel,
                ci: row.ci,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let reference_prices = read_optional::<ReferencePriceRow>(&data_dir.join(REFERENCE_PRICES_FILE))?
        .into_iter()
        .map(ReferencePriceRow::into_price)
        .collect::<Result<Vec<_>>>()?;

    let inputs = StudyInputs {
        line_items,
        emission_factors,
        price_index,
        displacements,
        reference_ci,
        reference_prices,
    };
    info!(
        line_items = inputs.line_items.len(),
        emission_factors = inputs.emission_factors.len(),
        index_years = inputs.price_index.len(),
        "Loaded study inputs"
    );
    Ok(inputs)
}

/// Reads and validates a study configuration file.
pub fn load_config(path: &Path) -> Result<StudyConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config = StudyConfig::from_toml_str(&text)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    Ok(config)
}

/// Reads extra heating values, if `heating_values.csv` exists.
pub fn load_heating_values(data_dir: &Path) -> Result<Vec<HeatingValue>> {
    read_optional::<HeatingValueRow>(&data_dir.join(HEATING_VALUES_FILE))?
        .into_iter()
        .map(|row| {
            Ok(HeatingValue::new(
                &row.fuel,
                row.value,
                required_unit(&row.numerator, &row.denominator)?,
            ))
        })
        .collect()
}

#[derive(Serialize)]
struct MfspItemRow<'a> {
    #[serde(rename = "Case/Scenario")]
    pathway_id: &'a str,
    #[serde(rename = "Parameter_A")]
    parameter_group: &'a str,
    #[serde(rename = "Parameter_B")]
    category: &'a str,
    #[serde(rename = "Stream_LCA")]
    stream_name: &'a str,
    #[serde(rename = "Cost Item")]
    cost_item: Option<&'a str>,
    #[serde(rename = "Energy_alloc_primary_fuel")]
    primary_fuel: &'a str,
    #[serde(rename = "Production Year")]
    production_year: i32,
    #[serde(rename = "Total Cost")]
    total_cost: f64,
    #[serde(rename = "Total Cost: Unit")]
    total_cost_unit: String,
    #[serde(rename = "Cost Year")]
    cost_year: i32,
    #[serde(rename = "Allocation multiplier")]
    multiplier: f64,
    #[serde(rename = "Adjusted Total Cost")]
    adjusted_cost: f64,
    #[serde(rename = "Adjusted Cost Year")]
    adjusted_cost_year: i32,
    #[serde(rename = "Itemized MFSP")]
    mfsp: Option<f64>,
    #[serde(rename = "Itemized MFSP: Unit")]
    mfsp_unit: String,
    #[serde(rename = "Harmonized")]
    is_harmonized: bool,
}

#[derive(Serialize)]
struct MfspAggRow<'a> {
    #[serde(rename = "Case/Scenario")]
    pathway_id: &'a str,
    #[serde(rename = "Production Year")]
    production_year: i32,
    #[serde(rename = "MFSP")]
    mfsp: Option<f64>,
    #[serde(rename = "MFSP: Unit")]
    unit: String,
    #[serde(rename = "MFSP per GGE")]
    mfsp_per_gge: Option<f64>,
    #[serde(rename = "Adjusted Cost Year")]
    cost_year: i32,
}

#[derive(Serialize)]
struct LcaItemRow<'a> {
    #[serde(rename = "Case/Scenario")]
    pathway_id: &'a str,
    #[serde(rename = "Parameter_B")]
    category: &'a str,
    #[serde(rename = "Stream_Flow")]
    stream_flow: &'a str,
    #[serde(rename = "Stream_LCA")]
    stream_name: &'a str,
    #[serde(rename = "Production Year")]
    production_year: i32,
    #[serde(rename = "LCA_metric")]
    metric: String,
    #[serde(rename = "Total Flow")]
    flow: f64,
    #[serde(rename = "Total Flow: Unit")]
    flow_unit: String,
    #[serde(rename = "LCA_value")]
    emission_factor: f64,
    #[serde(rename = "LCA: Unit")]
    emission_factor_unit: String,
    #[serde(rename = "Allocation multiplier")]
    multiplier: f64,
    #[serde(rename = "Total LCA")]
    burden: f64,
    #[serde(rename = "Total LCA: Unit")]
    burden_unit: String,
    #[serde(rename = "CI")]
    ci: Option<f64>,
    #[serde(rename = "CI: Unit")]
    ci_unit: String,
    #[serde(rename = "Harmonized")]
    is_harmonized: bool,
}

#[derive(Serialize)]
struct LcaAggRow<'a> {
    #[serde(rename = "Case/Scenario")]
    pathway_id: &'a str,
    #[serde(rename = "Production Year")]
    production_year: i32,
    #[serde(rename = "LCA_metric")]
    metric: String,
    #[serde(rename = "CI")]
    ci: Option<f64>,
    #[serde(rename = "CI: Unit")]
    unit: String,
    #[serde(rename = "Negative net combustion")]
    flagged: bool,
}

#[derive(Serialize)]
struct MacOutRow<'a> {
    #[serde(rename = "Case/Scenario")]
    pathway_id: &'a str,
    #[serde(rename = "Production Year")]
    production_year: i32,
    #[serde(rename = "Replaced Fuel")]
    replaced_fuel: Option<&'a str>,
    #[serde(rename = "Baseline")]
    baseline: Option<&'a str>,
    #[serde(rename = "MFSP replacing fuel")]
    mfsp: f64,
    #[serde(rename = "MFSP replacing fuel: Unit")]
    mfsp_unit: String,
    #[serde(rename = "CI replacing fuel")]
    ci: f64,
    #[serde(rename = "CI replacing fuel: Unit")]
    ci_unit: String,
    #[serde(rename = "Adjusted Cost_replaced fuel")]
    mfsp_displaced: f64,
    #[serde(rename = "CI replaced fuel")]
    ci_displaced: f64,
    #[serde(rename = "MAC_calculated")]
    mac: Option<f64>,
    #[serde(rename = "MAC_calculated: Unit")]
    mac_unit: String,
    #[serde(rename = "Not effective")]
    not_effective: bool,
    #[serde(rename = "CI of replaced fuel higher")]
    displaced_ci_higher: bool,
    #[serde(rename = "Cost of replaced fuel higher")]
    displaced_cost_higher: bool,
    #[serde(rename = "Percent CI reduction")]
    ci_reduction_pct: Option<f64>,
    #[serde(rename = "Percent MFSP increase")]
    mfsp_increase_pct: Option<f64>,
    #[serde(rename = "Negative net combustion")]
    ci_flagged: bool,
}

#[derive(Serialize)]
struct DiagnosticRow<'a> {
    #[serde(rename = "Stage")]
    stage: String,
    #[serde(rename = "Case/Scenario")]
    pathway: Option<&'a str>,
    #[serde(rename = "Code")]
    code: &'static str,
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct CaseRow<'a> {
    variability_id: usize,
    target: String,
    field: String,
    name: &'a str,
    value: f64,
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut writer = Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    let mut count = 0;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("writing {}", path.display()))?;
        count += 1;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = count, "Wrote table");
    Ok(())
}

fn primary_flag(is_primary: bool) -> &'static str {
    if is_primary {
        "Y"
    } else {
        ""
    }
}

/// Writes the itemized and aggregated tables of one run into `out_dir`.
pub fn write_outputs(out_dir: &Path, outputs: &StudyOutputs) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    write_rows(
        &out_dir.join("mfsp_itemized.csv"),
        outputs.cost.items.iter().map(|i| MfspItemRow {
            pathway_id: &i.pathway_id,
            parameter_group: &i.parameter_group,
            category: i.category.as_str(),
            stream_name: &i.stream_name,
            cost_item: i.cost_item.as_deref(),
            primary_fuel: primary_flag(i.is_primary_fuel),
            production_year: i.production_year,
            total_cost: i.total_cost,
            total_cost_unit: i.total_cost_unit.to_string(),
            cost_year: i.cost_year,
            multiplier: i.multiplier,
            adjusted_cost: i.adjusted_cost,
            adjusted_cost_year: i.adjusted_cost_year,
            mfsp: i.mfsp,
            mfsp_unit: i.mfsp_unit.to_string(),
            is_harmonized: i.is_harmonized,
        }),
    )?;
    write_rows(
        &out_dir.join("mfsp_agg.csv"),
        outputs.cost.mfsp.iter().map(|m| MfspAggRow {
            pathway_id: &m.pathway_id,
            production_year: m.production_year,
            mfsp: m.mfsp,
            unit: m.unit.to_string(),
            mfsp_per_gge: m.per_gge(),
            cost_year: m.cost_year,
        }),
    )?;
    write_rows(
        &out_dir.join("lca_itemized.csv"),
        outputs.lca.items.iter().map(|i| LcaItemRow {
            pathway_id: &i.pathway_id,
            category: i.category.as_str(),
            stream_flow: &i.stream_flow,
            stream_name: &i.stream_name,
            production_year: i.production_year,
            metric: format!("{}__{}", i.metric.as_str(), i.pollutant),
            flow: i.flow,
            flow_unit: i.flow_unit.to_string(),
            emission_factor: i.emission_factor,
            emission_factor_unit: i.emission_factor_unit.to_string(),
            multiplier: i.multiplier,
            burden: i.burden,
            burden_unit: i.burden_unit.to_string(),
            ci: i.ci,
            ci_unit: i.ci_unit.to_string(),
            is_harmonized: i.is_harmonized,
        }),
    )?;
    write_rows(
        &out_dir.join("lca_agg.csv"),
        outputs.lca.ci.iter().map(|c| LcaAggRow {
            pathway_id: &c.pathway_id,
            production_year: c.production_year,
            metric: format!("{}__{}", c.metric.as_str(), c.pollutant),
            ci: c.ci,
            unit: c.unit.to_string(),
            flagged: c.flagged,
        }),
    )?;
    write_rows(
        &out_dir.join("mac.csv"),
        outputs.mac.iter().map(|r| MacOutRow {
            pathway_id: &r.pathway_id,
            production_year: r.production_year,
            replaced_fuel: r.replaced_fuel.as_deref(),
            baseline: r.baseline.as_deref(),
            mfsp: r.mfsp,
            mfsp_unit: r.mfsp_unit.to_string(),
            ci: r.ci,
            ci_unit: r.ci_unit.to_string(),
            mfsp_displaced: r.mfsp_displaced,
            ci_displaced: r.ci_displaced,
            mac: r.mac,
            mac_unit: r.mac_unit.to_string(),
            not_effective: r.not_effective,
            displaced_ci_higher: r.displaced_ci_higher,
            displaced_cost_higher: r.displaced_cost_higher,
            ci_reduction_pct: r.ci_reduction_pct,
            mfsp_increase_pct: r.mfsp_increase_pct,
            ci_flagged: r.ci_flagged,
        }),
    )?;
    write_rows(
        &out_dir.join("diagnostics.csv"),
        outputs.diagnostics.iter().map(|d| DiagnosticRow {
            stage: d.stage.to_string(),
            pathway: d.pathway.as_deref(),
            code: d.kind.code(),
            message: d.kind.to_string(),
        }),
    )?;

    info!(out = %out_dir.display(), "Wrote study outputs");
    Ok(())
}

/// Writes each variability case into `out_dir/case_<id>` and an index of
/// cases into `out_dir/variability_cases.csv`.
pub fn write_variability(out_dir: &Path, cases: &[CaseOutputs]) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    write_rows(
        &out_dir.join("variability_cases.csv"),
        cases.iter().map(|c| CaseRow {
            variability_id: c.case.variability_id,
            target: format!("{:?}", c.case.target),
            field: format!("{:?}", c.case.field),
            name: &c.case.name,
            value: c.case.value,
        }),
    )?;
    for case in cases {
        let dir = out_dir.join(format!("case_{}", case.case.variability_id));
        write_outputs(&dir, &case.outputs)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TEA: &str = "\
Case/Scenario,Parameter_A,Parameter_B,Stream_Flow,Stream_LCA,Energy_alloc_primary_fuel,Flow,Flow: Unit (numerator),Flow: Unit (denominator),Cost Item,Unit Cost,Cost: Unit (numerator),Cost: Unit (denominator),Operating Time,Operating Time: Unit,Total Cost,Total Cost: Unit (numerator),Total Cost: Unit (denominator),Total Flow,Total Flow: Unit (numerator),Total Flow: Unit (denominator),Cost Year
P,Feedstock,Conversion: Input Supply Chains,Corn stover,Corn stover,,1,lb,hr,Corn stover,2,$,lb,500,hr/yr,1000,$,yr,500,lb,yr,2020
P,Fuel,Fuel Use,Renewable diesel,Renewable diesel, y ,-,,,,,,,,,,,,10000,MJ,yr,
";

    #[test]
    fn test_parse_line_items() {
        let items = parse_line_items(TEA.as_bytes(), "tea").unwrap();
        assert_eq!(items.len(), 2);

        let feed = &items[0];
        assert_eq!(feed.category, ParameterCategory::InputSupplyChains);
        assert_eq!(feed.cost_unit.as_ref().unwrap().to_string(), "USD/lb");
        assert_eq!(feed.total_flow_unit.as_ref().unwrap().to_string(), "lb/yr");
        assert_eq!(feed.operating_time_unit.as_deref(), Some("hr/yr"));
        assert_eq!(feed.cost_year, Some(2020));
        assert!(!feed.is_primary_fuel);

        let fuel = &items[1];
        assert!(fuel.is_primary_fuel);
        assert_eq!(fuel.flow, None);
        assert_eq!(fuel.flow_unit, None);
        assert_eq!(fuel.cost_item, None);
        assert_relative_eq!(fuel.total_flow.unwrap(), 10_000.0);
    }

    #[test]
    fn test_parse_emission_factors_keeps_headers() {
        let csv = "\
Parameter_B,Stream_Flow,Stream_LCA,Year,LCA_metric,LCA_value,LCA: Unit (numerator),LCA: Unit (denominator)
Conversion: Input Supply Chains,Natural gas,NG supply,2030,Total Emissions: grams/ton,,,
Conversion: Input Supply Chains,Natural gas,NG supply,2030,CO2,1000,grams,ton
";
        let rows = parse_emission_factors(csv.as_bytes(), "ef").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, None);
        assert_eq!(rows[0].unit, None);
        assert_eq!(rows[1].unit.as_ref().unwrap().denominator(), Some("ton"));
    }

    #[test]
    fn test_join_unit() {
        assert_eq!(join_unit(None, Some("gal")).unwrap(), None);
        assert_eq!(join_unit(Some("-"), None).unwrap(), None);
        assert_eq!(join_unit(Some("MJ"), Some("")).unwrap().unwrap().to_string(), "MJ");
        assert_eq!(join_unit(Some("$"), Some("gal")).unwrap().unwrap().to_string(), "USD/gal");
        assert!(join_unit(Some("USD/gal"), Some("yr")).is_err());
    }

    #[test]
    fn test_reference_price_dollar_year() {
        let csv = "\
Year,Replaced Fuel,Cost_replaced fuel,Cost replaced fuel: Unit (Numerator),Cost replaced fuel: Unit (Denominator),Year_Cost_replaced fuel
2030,Diesel,3.1,2016 $,gal,
2030,Gasoline,2.9,$,gal,2018
";
        let prices: Vec<ReferencePrice> = read_rows::<ReferencePriceRow, _>(csv.as_bytes(), "prices")
            .unwrap()
            .into_iter()
            .map(|r| r.into_price().unwrap())
            .collect();
        assert_eq!(prices[0].unit.year, Some(2016));
        assert_eq!(prices[1].unit.year, Some(2018));
        assert_eq!(prices[1].unit.unit.to_string(), "USD/gal");
    }

    #[test]
    fn test_row_errors_name_the_source() {
        let csv = "Year,Index\n2020,abc\n";
        let err = read_rows::<PriceIndexRow, _>(csv.as_bytes(), "price_index.csv").unwrap_err();
        assert!(format!("{err:#}").contains("row 2 of price_index.csv"));
    }
}
