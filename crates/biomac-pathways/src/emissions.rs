//! Emission factor preparation.
//!
//! Emission factors arrive as GREET-style tables: a header row names the
//! impact group (`Total Emissions: grams/ton`) and the rows below it list
//! pollutants under many spellings (`VOC: Total`, `Urban VOC`,
//! `CH4: combustion`, `Fossi lfuels`). Preparation turns these into one
//! CO2e factor per stream, context and year:
//!
//! 1. drop exact duplicates and `Loss factor` rows
//! 2. map every label to a canonical header or pollutant, forward-filling the
//!    header onto the pollutant rows below it
//! 3. keep the greenhouse-gas pollutants of the total-emissions group
//! 4. harmonize the throughput unit (the denominator) to its standard unit
//! 5. sum rows that collapsed to the same key
//! 6. combine the pollutants into CO2e
//!
//! # CO2e
//!
//! $$CO2_{wC} = CO2 + VOC \cdot \frac{f_{VOC}}{f_{CO2}} + CO \cdot \frac{f_{CO}}{f_{CO2}}$$
//!
//! is recomputed only when the direct CO2 term is non-zero and the
//! `always_calc_co2_w_voc_co` setting is on; otherwise the tabulated value
//! is used. Then
//!
//! $$CO2e = CO2_{wC} + \sum_p GWP_p \cdot E_p - CH4_{bio} \cdot \frac{f_{CH4}}{f_{CO2}}$$
//!
//! where $f$ are carbon mass fractions and the sum runs over CH4, N2O, VOC,
//! CO, NOx, BC and OC.

use biomac_core::config::{CarbonRatios, GwpFactors, StudyConfig};
use biomac_core::records::{
    EmissionFactor, EmissionKey, Metric, ParameterCategory, Pollutant, RawEmissionFactor,
};
use biomac_core::units::{RatioUnit, TargetUnit, UnitConverter, UnitPosition, UnitValue};
use biomac_core::{DiagnosticKind, Diagnostics, Stage};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::info;

/// A canonicalized metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Header(Metric),
    Pollutant(Pollutant),
}

static LABELS: LazyLock<HashMap<&'static str, Label>> = LazyLock::new(|| {
    let headers: [(Metric, &[&str]); 4] = [
        (
            Metric::EnergyDemand,
            &[
                "Energy demand",
                "Energy: mmBtu/ton",
                "Energy Use: mmBtu/ton of product",
                "Energy Use: mmBtu/ton",
                "Energy: Btu/g of material throughput, except as noted",
                "Energy use: Btu/mmBtu of fuel throughput (except as noted)",
                "Energy Use: mmBtu per ton",
                "Energy Consumption: Btu/mmBtu of fuel transported",
                "Energy use: Btu/gal treated",
                "Total energy, Btu",
                "Energy Use: MJ per MJ",
            ],
        ),
        (
            Metric::WaterConsumption,
            &[
                "Water consumption",
                "Water consumption, gallons/ton",
                "Water Consumption",
                "Water consumption: gallons",
                "Water consumption: gallons per ton",
                "Water consumption: gallon/ton",
                "Water consumption (gal/g)",
                "Water consumption: gallons/mmBtu of fuel throughput",
                "Water consumption: gallons/ton",
                "Water consumption: gallons/mmBtu of fuel transported",
                "Water consumption, gallons/gal treated",
                "Water consumption, gallons/mmBtu of fuel throughput",
                "Water consumption: gallons per MJ",
            ],
        ),
        (
            Metric::TotalEmissions,
            &[
                "Total emissions",
                "Total Emissions: grams/ton",
                "Total emissions: grams/mmBtu of fuel throughput, except as noted",
                "Total emissions: grams/g of material throughput, except as noted",
                "Total Emissions: grams per ton",
                "Total Emissions: grams/mmBtu fuel transported",
                "Total Emissions: grams/mmBtu of fuel transported",
                "Total emissions: grams/gal treated",
                "Total Emissions: grams/mmBtu of fuel throughput, except as noted",
                "Total emissions: grams",
                "Total emissions: grams/mmBtu of fuel throughput",
                "Total Emissions: grams per MJ",
            ],
        ),
        (
            Metric::UrbanEmissions,
            &[
                "Urban emissions",
                "Urban emissions: grams/ton",
                "Urban Emissions: grams/ton",
                "Urban emissions: grams/g of material throughput, except as noted",
                "5.2) Urban Emissions: Grams per mmBtu of Fuel Throughput at Each Stage",
                "4.2) Urban Emissions: Grams per mmBtu of Fuel Throughput at Each Stage",
                "Urban Emissions: grams/mmBtu of fuel transported",
                "Urban emissions: grams/gal treated",
                "Urban emissions: grams",
                "Urban emissions: grams/mmBtu of fuel throughput, except as noted",
                "Urban Emissions: grams per ton",
                "Urban emissions: grams/mmBtu of fuel throughput",
                "Urban Emissions: grams per MJ",
            ],
        ),
    ];
    let pollutants: [(Pollutant, &[&str]); 21] = [
        (Pollutant::TotalEnergy, &["Total Energy", "Total energy"]),
        (
            Pollutant::FossilFuels,
            &[
                "Fossil fuels",
                "Fossil Fuels",
                "Fossil energy",
                "Fossil fuels, Btu",
                "Fossi lfuels",
            ],
        ),
        (Pollutant::Coal, &["Coal", "Coal, Btu"]),
        (
            Pollutant::NaturalGas,
            &["Natural gas", "Natural Gas", "Natural gas, Btu"],
        ),
        (Pollutant::Petroleum, &["Petroleum", "Petroleum, Btu"]),
        (
            Pollutant::Voc,
            &[
                "VOC",
                "Urban VOC",
                "VOC from bulk terminal",
                "VOC from ref. Station",
                "VOC from refueling station",
                "VOC: Total",
                "VOC: Urban",
            ],
        ),
        (Pollutant::Co, &["CO", "Urban CO", "CO: Total", "CO: Urban"]),
        (
            Pollutant::Nox,
            &["NOx", "Urban NOx", "NOx: Total", "NOx: Urban"],
        ),
        (
            Pollutant::Pm10,
            &["PM10", "Urban PM10", "PM10: Total", "PM10: Urban"],
        ),
        (
            Pollutant::Pm25,
            &["PM2.5", "Urban PM2.5", "PM2.5: Total", "PM2.5: Urban"],
        ),
        (
            Pollutant::Sox,
            &["SOx", "Urban SOx", "SOx: Total", "SOx: Urban"],
        ),
        (
            Pollutant::Bc,
            &["BC", "Urban BC", "BC Total", "BC: Urban", "BC, Total"],
        ),
        (
            Pollutant::Oc,
            &["OC", "Urban OC", "OC Total", "OC: Urban", "OC, Total"],
        ),
        (Pollutant::Ch4, &["CH4", "CH4: combustion"]),
        (Pollutant::N2o, &["N2O"]),
        (Pollutant::Co2, &["CO2", "Misc. CO2"]),
        (Pollutant::Co2WithVocCo, &["CO2 (w/ C in VOC & CO)"]),
        (Pollutant::Ghgs, &["GHGs (grams/ton)", "GHGs"]),
        (Pollutant::OtherGhg, &["Other GHG Emissions"]),
        (Pollutant::BiogenicCh4, &["Biogenic CH4"]),
        (Pollutant::BiogenicCo2, &["Biogenic CO2"]),
    ];

    let mut labels = HashMap::new();
    for (metric, spellings) in headers {
        for spelling in spellings {
            labels.insert(*spelling, Label::Header(metric));
        }
    }
    for (pollutant, spellings) in pollutants {
        for spelling in spellings {
            labels.insert(*spelling, Label::Pollutant(pollutant));
        }
    }
    labels
});

/// Maps a source spelling to its canonical header or pollutant.
///
/// Matching is exact after trimming surrounding whitespace.
#[must_use]
pub fn canonical_label(label: &str) -> Option<Label> {
    LABELS.get(label.trim()).copied()
}

/// Pollutants of the total-emissions group that enter CO2e.
pub const GHG_POLLUTANTS: [Pollutant; 10] = [
    Pollutant::Voc,
    Pollutant::Co,
    Pollutant::Nox,
    Pollutant::Bc,
    Pollutant::Oc,
    Pollutant::Ch4,
    Pollutant::N2o,
    Pollutant::Co2,
    Pollutant::Co2WithVocCo,
    Pollutant::BiogenicCh4,
];

/// Pollutant values of one emission factor key. Missing pollutants are zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollutantProfile {
    values: BTreeMap<Pollutant, f64>,
}

impl PollutantProfile {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, pollutant: Pollutant, value: f64) -> Self {
        self.add(pollutant, value);
        self
    }

    pub fn add(&mut self, pollutant: Pollutant, value: f64) {
        *self.values.entry(pollutant).or_insert(0.0) += value;
    }

    #[must_use]
    pub fn get(&self, pollutant: Pollutant) -> f64 {
        self.values.get(&pollutant).copied().unwrap_or(0.0)
    }

    /// CO2 including the carbon in VOC and CO.
    ///
    /// Recomputed from CO2, VOC and CO only when `recompute` is set and the
    /// direct CO2 term is non-zero; otherwise the tabulated value.
    #[must_use]
    pub fn co2_with_voc_co(&self, ratios: &CarbonRatios, recompute: bool) -> f64 {
        let co2 = self.get(Pollutant::Co2);
        if recompute && co2 != 0.0 {
            co2 + self.get(Pollutant::Voc) * ratios.voc / ratios.co2
                + self.get(Pollutant::Co) * ratios.co / ratios.co2
        } else {
            self.get(Pollutant::Co2WithVocCo)
        }
    }

    /// Combined greenhouse gas burden in CO2e.
    #[must_use]
    pub fn co2e(&self, gwp: &GwpFactors, ratios: &CarbonRatios, recompute: bool) -> f64 {
        self.co2_with_voc_co(ratios, recompute) * gwp.co2_w_voc_co
            + self.get(Pollutant::Ch4) * gwp.ch4
            + self.get(Pollutant::N2o) * gwp.n2o
            + self.get(Pollutant::Voc) * gwp.voc
            + self.get(Pollutant::Co) * gwp.co
            + self.get(Pollutant::Nox) * gwp.nox
            + self.get(Pollutant::Bc) * gwp.bc
            + self.get(Pollutant::Oc) * gwp.oc
            - self.get(Pollutant::BiogenicCh4) * ratios.ch4 / ratios.co2
    }
}

/// Canonical CO2e emission factors, indexed by join key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmissionFactorTable {
    factors: BTreeMap<EmissionKey, Vec<EmissionFactor>>,
}

impl EmissionFactorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from factors that are already canonical.
    pub fn from_factors(factors: impl IntoIterator<Item = EmissionFactor>) -> Self {
        let mut table = Self::new();
        for factor in factors {
            table.insert(factor);
        }
        table
    }

    pub fn insert(&mut self, factor: EmissionFactor) {
        self.factors
            .entry(factor.key.clone())
            .or_default()
            .push(factor);
    }

    /// Factors for a key; empty when the key is unknown.
    #[must_use]
    pub fn get(&self, key: &EmissionKey) -> &[EmissionFactor] {
        self.factors.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmissionFactor> {
        self.factors.values().flatten()
    }

    /// Iterates mutably, e.g. to override a stream's factor.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EmissionFactor> {
        self.factors.values_mut().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factors.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

/// Canonicalizes raw emission factor rows into a CO2e factor table.
pub fn prepare_emission_factors(
    raw: &[RawEmissionFactor],
    converter: &UnitConverter,
    config: &StudyConfig,
    diagnostics: &mut Diagnostics,
) -> EmissionFactorTable {
    let rows = deduplicate(raw);

    let mut unrecognized = BTreeSet::new();
    let mut header: Option<Metric> = None;
    let mut selected: Vec<(&RawEmissionFactor, Pollutant, f64, RatioUnit)> = Vec::new();
    let mut missing_unit = 0;

    for row in rows {
        let label = row.label.trim();
        if label == "Loss factor" {
            continue;
        }
        let pollutant = match canonical_label(label) {
            Some(Label::Header(metric)) => {
                header = Some(metric);
                continue;
            }
            Some(Label::Pollutant(pollutant)) => pollutant,
            None => {
                unrecognized.insert(label.to_string());
                continue;
            }
        };
        if header != Some(Metric::TotalEmissions) || !GHG_POLLUTANTS.contains(&pollutant) {
            continue;
        }
        let Some(value) = row.value else {
            continue;
        };
        let Some(unit) = row.unit.clone() else {
            missing_unit += 1;
            continue;
        };
        selected.push((row, pollutant, value, unit));
    }

    if !unrecognized.is_empty() {
        diagnostics.record(
            Stage::Load,
            None,
            DiagnosticKind::UnrecognizedMetrics {
                labels: unrecognized.into_iter().collect(),
            },
        );
    }
    if missing_unit > 0 {
        diagnostics.record(
            Stage::Load,
            None,
            DiagnosticKind::UnharmonizedUnits {
                rows: missing_unit,
                units: vec!["-".to_string()],
            },
        );
    }

    let values: Vec<UnitValue> = selected
        .iter()
        .map(|(row, _, value, unit)| {
            UnitValue::new(Some(*value), unit.clone()).with_commodity(&row.stream_flow)
        })
        .collect();
    let harmonized = converter.harmonize(&values, &TargetUnit::Standard, UnitPosition::Denominator);
    harmonized.report(Stage::Harmonize, None, diagnostics);

    // (key, unit) -> pollutant -> (sum, count, harmonized)
    let mut grouped: BTreeMap<(EmissionKey, RatioUnit), BTreeMap<Pollutant, (f64, usize, bool)>> =
        BTreeMap::new();
    for ((row, pollutant, _, _), value) in selected.iter().zip(&harmonized.values) {
        let key = EmissionKey {
            context: row.context.clone(),
            stream_flow: row.stream_flow.clone(),
            stream_name: row.stream_name.clone(),
            year: row.year,
        };
        let entry = grouped
            .entry((key, value.unit.clone()))
            .or_default()
            .entry(*pollutant)
            .or_insert((0.0, 0, true));
        entry.0 += value.value.unwrap_or(0.0);
        entry.1 += 1;
        entry.2 &= value.is_harmonized;
    }

    let mut table = EmissionFactorTable::new();
    for ((key, unit), pollutants) in grouped {
        let mut profile = PollutantProfile::new();
        let mut is_harmonized = true;
        for (pollutant, (value, count, harmonized)) in pollutants {
            if count > 1 {
                diagnostics.record(
                    Stage::Load,
                    None,
                    DiagnosticKind::DuplicateEmissionFactor {
                        stream: key.stream_name.clone(),
                        pollutant: pollutant.to_string(),
                        count,
                    },
                );
            }
            profile.add(pollutant, value);
            is_harmonized &= harmonized;
        }
        let value = profile.co2e(
            &config.gwp,
            &config.carbon_ratios,
            config.study.always_calc_co2_w_voc_co,
        );
        table.insert(EmissionFactor {
            key,
            metric: Metric::TotalEmissions,
            pollutant: Pollutant::Co2e,
            value,
            unit,
            is_harmonized,
        });
    }

    info!(
        raw_rows = raw.len(),
        factors = table.len(),
        "Prepared emission factors"
    );
    table
}

/// Identity of a raw row; values compare by bit pattern.
type RowIdentity<'a> = (
    &'a ParameterCategory,
    &'a str,
    &'a str,
    i32,
    &'a str,
    Option<u64>,
    Option<&'a RatioUnit>,
);

fn row_identity(row: &RawEmissionFactor) -> RowIdentity<'_> {
    (
        &row.context,
        row.stream_flow.as_str(),
        row.stream_name.as_str(),
        row.year,
        row.label.as_str(),
        row.value.map(f64::to_bits),
        row.unit.as_ref(),
    )
}

fn deduplicate(raw: &[RawEmissionFactor]) -> Vec<&RawEmissionFactor> {
    let mut seen = BTreeSet::new();
    raw.iter().filter(|row| seen.insert(row_identity(row))).collect()
}
