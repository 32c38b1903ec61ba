//! Data model for extracted regatta results.
//!
//! Entities reference each other through typed indices into the vectors
//! owned by [`ExtractionOutput`], so every reference produced by an
//! extraction pass points at a record of the same pass.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Index of a [`Sailor`] within one extraction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SailorId(pub usize);

/// Index of a [`RaceCategory`] within one extraction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(pub usize);

/// Index of a [`Race`] within one extraction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RaceId(pub usize);

/// A competitor, identified by normalized name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sailor {
    pub id: SailorId,
    /// Display name as first seen (trimmed, whitespace collapsed)
    pub name: String,
    pub club: Option<String>,
    pub age_category: Option<String>,
}

/// Fleet or class grouping, e.g. "Sunfish"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceCategory {
    pub id: CategoryId,
    pub name: String,
}

/// One results series of a category at an event.
///
/// A dash-delimited results column encodes several races; `race_count`
/// is the number of column-groups observed and each [`RaceOutcome`]
/// carries its index within the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: RaceId,
    pub category: CategoryId,
    pub name: String,
    pub event_name: String,
    pub date: NaiveDateTime,
    /// True when `date` is the processing time rather than a parsed date
    pub date_inferred: bool,
    pub venue: Option<String>,
    /// 1-based position of the source table among all tables on the page
    #[serde(default)]
    pub table_index: usize,
    pub race_count: usize,
}

/// Outcome of a single race within a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceOutcome {
    /// 1-based position of the race in the series
    pub race_index: usize,
    pub points: Option<f64>,
    pub dnf: bool,
    pub dns: bool,
    pub dnc: bool,
    /// Score was dropped from the series total (written in parentheses)
    #[serde(default)]
    pub discarded: bool,
}

impl RaceOutcome {
    pub fn scored(race_index: usize, points: f64) -> Self {
        Self {
            race_index,
            points: Some(points),
            dnf: false,
            dns: false,
            dnc: false,
            discarded: false,
        }
    }

    /// True for DNF/DNS/DNC outcomes
    pub fn is_non_finish(&self) -> bool {
        self.dnf || self.dns || self.dnc
    }
}

/// One boat's row in a results table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub sailor: SailorId,
    pub race: RaceId,
    /// 1-based data row in the source table
    #[serde(default)]
    pub row: usize,
    /// `None` iff one of `dnf`/`dns`/`dnc` is set
    pub position: Option<u32>,
    pub sail_number: Option<String>,
    pub boat_name: Option<String>,
    pub yacht_club: Option<String>,
    pub outcomes: Vec<RaceOutcome>,
    pub total_points: Option<f64>,
    pub dnf: bool,
    pub dns: bool,
    pub dnc: bool,
}

/// Kind of soft failure recorded during extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No table on the page qualified as a results table
    NoResultsFound { url: String },
    /// A candidate table was dropped before row parsing
    TableSkipped { table: usize, reason: String },
    /// A row or a single token failed to parse and was skipped
    RowParseError { table: usize, row: usize, message: String },
    /// A default was substituted for missing context
    ContextInferenceFallback { field: String, value: String },
    /// Two rows disagreed on a non-empty sailor attribute
    MergeConflict { sailor: String, field: String, kept: String, ignored: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NoResultsFound { url } => {
                write!(f, "no results tables found on {}", url)
            }
            Diagnostic::TableSkipped { table, reason } => {
                write!(f, "table {} skipped: {}", table, reason)
            }
            Diagnostic::RowParseError { table, row, message } => {
                write!(f, "table {} row {}: {}", table, row, message)
            }
            Diagnostic::ContextInferenceFallback { field, value } => {
                write!(f, "{} could not be determined, using {:?}", field, value)
            }
            Diagnostic::MergeConflict { sailor, field, kept, ignored } => write!(
                f,
                "conflicting {} for {}: kept {:?}, ignored {:?}",
                field, sailor, kept, ignored
            ),
        }
    }
}

/// Diagnostics bundle returned alongside every extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Number of `<table>` elements on the page
    pub tables_found: usize,
    /// Candidate tables that produced at least one result
    pub tables_parsed: usize,
    /// Rendered messages, one per issue
    pub parse_errors: Vec<String>,
    pub categories: BTreeSet<String>,
    pub issues: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, issue: Diagnostic) {
        self.parse_errors.push(issue.to_string());
        self.issues.push(issue);
    }

    pub fn has_no_results(&self) -> bool {
        self.issues
            .iter()
            .any(|d| matches!(d, Diagnostic::NoResultsFound { .. }))
    }

    /// Count issues matching a predicate
    pub fn count<F>(&self, pred: F) -> usize
    where
        F: Fn(&Diagnostic) -> bool,
    {
        self.issues.iter().filter(|d| pred(d)).count()
    }
}

/// Everything produced by one extraction pass over one page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub url: String,
    pub sailors: Vec<Sailor>,
    pub categories: Vec<RaceCategory>,
    pub races: Vec<Race>,
    pub results: Vec<RaceResult>,
    pub diagnostics: Diagnostics,
}

impl ExtractionOutput {
    pub fn sailor(&self, id: SailorId) -> &Sailor {
        &self.sailors[id.0]
    }

    pub fn category(&self, id: CategoryId) -> &RaceCategory {
        &self.categories[id.0]
    }

    pub fn race(&self, id: RaceId) -> &Race {
        &self.races[id.0]
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Flatten results into denormalized records for exporters
    pub fn records(&self) -> Vec<ResultRecord> {
        self.results
            .iter()
            .map(|r| {
                let race = self.race(r.race);
                let sailor = self.sailor(r.sailor);
                ResultRecord {
                    category: self.category(race.category).name.clone(),
                    event_name: race.event_name.clone(),
                    race_name: race.name.clone(),
                    date: race.date,
                    venue: race.venue.clone(),
                    position: r.position,
                    sail_number: r.sail_number.clone(),
                    boat_name: r.boat_name.clone(),
                    skipper: sailor.name.clone(),
                    yacht_club: r.yacht_club.clone(),
                    age_category: sailor.age_category.clone(),
                    outcomes: r.outcomes.clone(),
                    total_points: r.total_points,
                    dnf: r.dnf,
                    dns: r.dns,
                    dnc: r.dnc,
                }
            })
            .collect()
    }
}

/// Denormalized result row, the unit of CSV/JSON export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub category: String,
    pub event_name: String,
    pub race_name: String,
    pub date: NaiveDateTime,
    pub venue: Option<String>,
    pub position: Option<u32>,
    pub sail_number: Option<String>,
    pub boat_name: Option<String>,
    pub skipper: String,
    pub yacht_club: Option<String>,
    pub age_category: Option<String>,
    pub outcomes: Vec<RaceOutcome>,
    pub total_points: Option<f64>,
    pub dnf: bool,
    pub dns: bool,
    pub dnc: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_push_renders_message() {
        let mut diags = Diagnostics::default();
        diags.push(Diagnostic::RowParseError {
            table: 1,
            row: 3,
            message: "invalid score \"x\"".to_string(),
        });
        diags.push(Diagnostic::NoResultsFound {
            url: "https://example.com".to_string(),
        });

        assert_eq!(diags.issues.len(), 2);
        assert_eq!(diags.parse_errors[0], "table 1 row 3: invalid score \"x\"");
        assert!(diags.has_no_results());
        assert_eq!(
            diags.count(|d| matches!(d, Diagnostic::RowParseError { .. })),
            1
        );
    }

    #[test]
    fn test_outcome_non_finish() {
        let mut outcome = RaceOutcome::scored(1, 4.0);
        assert!(!outcome.is_non_finish());
        outcome.points = None;
        outcome.dns = true;
        assert!(outcome.is_non_finish());
    }
}
