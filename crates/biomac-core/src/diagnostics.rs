//! Soft failures collected while a study runs.
//!
//! Data problems that only affect some rows (an unknown unit, a missing
//! emission factor, a negative net combustion term) do not abort a study.
//! The affected rows are excluded or flagged, and a [`Diagnostic`] records
//! what happened so the problem can be reviewed after the run.
//!
//! Every recorded diagnostic is also emitted as a `tracing` warning.

use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Stage {
    Load,
    Harmonize,
    Allocate,
    Cost,
    Lca,
    Mac,
    Variability,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Harmonize => "harmonize",
            Self::Allocate => "allocate",
            Self::Cost => "cost",
            Self::Lca => "lca",
            Self::Mac => "mac",
            Self::Variability => "variability",
        };
        write!(f, "{name}")
    }
}

/// What went wrong, with the details needed to find the affected rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DiagnosticKind {
    /// Rows whose unit could not be harmonized to the target unit.
    UnharmonizedUnits { rows: usize, units: Vec<String> },
    /// A row whose units disagree with the units of the value it is
    /// combined with.
    UnitMismatch {
        stream: String,
        expected: String,
        found: String,
    },
    /// Line items with no matching emission factor.
    MissingEmissionFactor { streams: Vec<String> },
    /// Several emission factor rows collapsed to one key and were summed.
    DuplicateEmissionFactor {
        stream: String,
        pollutant: String,
        count: usize,
    },
    /// Metric labels that are neither a known header nor a known pollutant.
    UnrecognizedMetrics { labels: Vec<String> },
    /// More than one primary fuel stream in a pathway; their flows are summed.
    DuplicatePrimaryFuel { streams: Vec<String> },
    /// Fuel-use flows in more than one unit and no primary fuel to choose by.
    AmbiguousFuelGroup { units: Vec<String> },
    /// A pathway with no (primary) fuel-use flow to divide by.
    MissingPrimaryFuel,
    /// The primary fuel flow is zero, so MFSP is undefined.
    UndefinedMfsp { year: i32 },
    /// The primary fuel flow is zero, so carbon intensity is undefined.
    UndefinedCi { year: i32 },
    /// A CCS stream with no fossil combustion emissions to net against.
    CcsWithoutCombustion { year: i32 },
    /// Combustion and CCS terms have different units; netting was skipped.
    CcsUnitMismatch {
        year: i32,
        combustion_unit: String,
        ccs_unit: String,
    },
    /// Net combustion after CCS is below zero.
    NegativeNetCombustion { year: i32, net: f64 },
    /// No displaced fuel is mapped to the pathway's primary fuel.
    MissingDisplacedFuel { stream: String },
    /// No reference CI or price for the displaced fuel.
    MissingReference {
        fuel: String,
        year: i32,
        quantity: String,
    },
    /// A pathway has no MFSP or no CI in a year, so it has no MAC row.
    MissingPathwayResult { quantity: String, year: i32 },
    /// A baseline pathway named in the configuration produced no results.
    MissingBaseline { baseline: String, year: i32 },
    /// The pathway does not lower carbon intensity relative to the displaced
    /// fuel.
    NotEffective { year: i32, ci_reduction: f64 },
    /// A variability parameter that matches no line item or emission factor.
    UnmatchedSweep { parameter: String },
}

impl DiagnosticKind {
    /// Short stable identifier for reports.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnharmonizedUnits { .. } => "unharmonized_units",
            Self::UnitMismatch { .. } => "unit_mismatch",
            Self::MissingEmissionFactor { .. } => "missing_emission_factor",
            Self::DuplicateEmissionFactor { .. } => "duplicate_emission_factor",
            Self::UnrecognizedMetrics { .. } => "unrecognized_metrics",
            Self::DuplicatePrimaryFuel { .. } => "duplicate_primary_fuel",
            Self::AmbiguousFuelGroup { .. } => "ambiguous_fuel_group",
            Self::MissingPrimaryFuel => "missing_primary_fuel",
            Self::UndefinedMfsp { .. } => "undefined_mfsp",
            Self::UndefinedCi { .. } => "undefined_ci",
            Self::CcsWithoutCombustion { .. } => "ccs_without_combustion",
            Self::CcsUnitMismatch { .. } => "ccs_unit_mismatch",
            Self::NegativeNetCombustion { .. } => "negative_net_combustion",
            Self::MissingDisplacedFuel { .. } => "missing_displaced_fuel",
            Self::MissingReference { .. } => "missing_reference",
            Self::MissingPathwayResult { .. } => "missing_pathway_result",
            Self::MissingBaseline { .. } => "missing_baseline",
            Self::NotEffective { .. } => "not_effective",
            Self::UnmatchedSweep { .. } => "unmatched_sweep",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnharmonizedUnits { rows, units } => write!(
                f,
                "{rows} row(s) could not be harmonized and were ignored; units: {}",
                units.join(", ")
            ),
            Self::UnitMismatch {
                stream,
                expected,
                found,
            } => write!(
                f,
                "'{stream}' excluded: expected unit '{expected}', found '{found}'"
            ),
            Self::MissingEmissionFactor { streams } => write!(
                f,
                "no emission factor for {} stream(s): {}",
                streams.len(),
                streams.join(", ")
            ),
            Self::DuplicateEmissionFactor {
                stream,
                pollutant,
                count,
            } => write!(
                f,
                "{count} emission factor rows for '{stream}' / {pollutant} were summed"
            ),
            Self::UnrecognizedMetrics { labels } => {
                write!(f, "unrecognized metric labels: {}", labels.join(", "))
            }
            Self::DuplicatePrimaryFuel { streams } => write!(
                f,
                "multiple primary fuel streams summed: {}",
                streams.join(", ")
            ),
            Self::AmbiguousFuelGroup { units } => write!(
                f,
                "fuel-use flows in several units ({}) with no primary fuel; using '{}'",
                units.join(", "),
                units.first().map(String::as_str).unwrap_or_default()
            ),
            Self::MissingPrimaryFuel => write!(f, "no primary fuel flow to allocate against"),
            Self::UndefinedMfsp { year } => {
                write!(f, "MFSP undefined in {year}: primary fuel flow is zero")
            }
            Self::UndefinedCi { year } => {
                write!(f, "CI undefined in {year}: primary fuel flow is zero")
            }
            Self::CcsWithoutCombustion { year } => write!(
                f,
                "CCS stream in {year} has no fossil combustion emissions to net against"
            ),
            Self::CcsUnitMismatch {
                year,
                combustion_unit,
                ccs_unit,
            } => write!(
                f,
                "CCS netting skipped in {year}: combustion unit '{combustion_unit}' differs from CCS unit '{ccs_unit}'"
            ),
            Self::NegativeNetCombustion { year, net } => write!(
                f,
                "net fossil combustion emissions after CCS are negative in {year} ({net}); review the CCS stream"
            ),
            Self::MissingDisplacedFuel { stream } => {
                write!(f, "no displaced fuel mapped to '{stream}'")
            }
            Self::MissingReference {
                fuel,
                year,
                quantity,
            } => write!(f, "no reference {quantity} for '{fuel}' in {year}"),
            Self::MissingPathwayResult { quantity, year } => {
                write!(f, "no {quantity} in {year}; excluded from the MAC table")
            }
            Self::MissingBaseline { baseline, year } => {
                write!(f, "baseline pathway '{baseline}' has no results in {year}")
            }
            Self::NotEffective { year, ci_reduction } => write!(
                f,
                "not effective in {year}: CI reduction is {ci_reduction}, MAC is not meaningful"
            ),
            Self::UnmatchedSweep { parameter } => {
                write!(f, "variability parameter '{parameter}' matches no rows")
            }
        }
    }
}

/// A recorded soft failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub pathway: Option<String>,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pathway {
            Some(pathway) => write!(f, "[{}] {}: {}", self.stage, pathway, self.kind),
            None => write!(f, "[{}] {}", self.stage, self.kind),
        }
    }
}

/// Ordered collection of diagnostics for one study run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic and logs it.
    pub fn record(&mut self, stage: Stage, pathway: Option<&str>, kind: DiagnosticKind) {
        warn!(
            stage = %stage,
            pathway = pathway.unwrap_or("-"),
            code = kind.code(),
            "{kind}"
        );
        self.entries.push(Diagnostic {
            stage,
            pathway: pathway.map(str::to_string),
            kind,
        });
    }

    /// Appends diagnostics collected elsewhere without logging them again.
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Diagnostics recorded against a pathway.
    pub fn for_pathway<'a>(&'a self, pathway: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.entries
            .iter()
            .filter(move |d| d.pathway.as_deref() == Some(pathway))
    }

    /// Diagnostics recorded by a stage.
    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.stage == stage)
    }

    /// Whether any diagnostic with the given code was recorded.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.entries.iter().any(|d| d.kind.code() == code)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
