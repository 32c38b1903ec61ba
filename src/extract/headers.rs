//! Header label normalization.
//!
//! Result pages have no fixed schema, so raw header labels are mapped to
//! canonical fields through a priority-ordered alias table. The table is
//! plain data and can be replaced from configuration.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical result-table fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Position,
    SailNumber,
    BoatName,
    Skipper,
    YachtClub,
    Results,
    TotalPoints,
    AgeCategory,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::Position,
        CanonicalField::SailNumber,
        CanonicalField::BoatName,
        CanonicalField::Skipper,
        CanonicalField::YachtClub,
        CanonicalField::Results,
        CanonicalField::TotalPoints,
        CanonicalField::AgeCategory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Position => "position",
            CanonicalField::SailNumber => "sail_number",
            CanonicalField::BoatName => "boat_name",
            CanonicalField::Skipper => "skipper",
            CanonicalField::YachtClub => "yacht_club",
            CanonicalField::Results => "results",
            CanonicalField::TotalPoints => "total_points",
            CanonicalField::AgeCategory => "age_category",
        }
    }

    /// Several columns may feed this field (per-race score columns)
    fn is_multi_column(&self) -> bool {
        matches!(self, CanonicalField::Results)
    }
}

/// One row of the alias table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasRule {
    pub field: CanonicalField,
    /// Case-insensitive substrings
    #[serde(default)]
    pub contains: Vec<String>,
    /// Case-insensitive whole-label matches
    #[serde(default)]
    pub exact: Vec<String>,
}

impl AliasRule {
    fn new(field: CanonicalField, contains: &[&str], exact: &[&str]) -> Self {
        Self {
            field,
            contains: contains.iter().map(|s| s.to_string()).collect(),
            exact: exact.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn matches(&self, label: &str) -> bool {
        self.exact.iter().any(|a| label == a.to_lowercase())
            || self.contains.iter().any(|a| label.contains(&a.to_lowercase()))
    }
}

/// Priority-ordered alias table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderAliases {
    /// Earlier rules win: "Yacht Club" must hit the club rule before
    /// "yacht" reaches boat_name, and "Boat Name" must not reach skipper.
    pub rules: Vec<AliasRule>,
    /// Per-race score columns such as "R1" or "Race 2"
    pub race_column_pattern: String,
}

impl Default for HeaderAliases {
    fn default() -> Self {
        use CanonicalField::*;
        Self {
            rules: vec![
                AliasRule::new(TotalPoints, &["total", "net", "pts", "points"], &[]),
                AliasRule::new(YachtClub, &["yacht club", "club", "affiliation"], &["yc"]),
                AliasRule::new(BoatName, &["boat", "yacht"], &[]),
                AliasRule::new(Position, &["pos", "place", "rank"], &["pl", "#"]),
                AliasRule::new(Skipper, &["skipper", "helm", "sailor", "name", "owner"], &[]),
                AliasRule::new(SailNumber, &["sail", "bow", "hull"], &[]),
                AliasRule::new(Results, &["result", "race", "score", "series"], &[]),
                AliasRule::new(AgeCategory, &["age cat", "age group"], &["age", "age div"]),
            ],
            race_column_pattern: r"^r\s*\d+$".to_string(),
        }
    }
}

/// Normalized key of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Field(CanonicalField),
    /// Unmatched column, kept by index and ignored downstream
    Extra(usize),
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Field(field) => f.write_str(field.as_str()),
            ColumnKey::Extra(i) => write!(f, "extra_{}", i),
        }
    }
}

/// Column index to canonical key mapping for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    columns: Vec<ColumnKey>,
}

impl HeaderMap {
    pub fn key(&self, index: usize) -> Option<ColumnKey> {
        self.columns.get(index).copied()
    }

    #[cfg(test)]
    pub fn keys(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn has(&self, field: CanonicalField) -> bool {
        self.column(field).is_some()
    }

    /// First column mapped to `field`
    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        self.columns
            .iter()
            .position(|k| *k == ColumnKey::Field(field))
    }

    /// All columns mapped to `field`, in column order
    pub fn columns(&self, field: CanonicalField) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == ColumnKey::Field(field))
            .map(|(i, _)| i)
            .collect()
    }

    /// Canonical names, usable as a header row
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|k| k.to_string()).collect()
    }
}

/// Maps raw header labels to canonical fields
pub struct HeaderNormalizer {
    rules: Vec<AliasRule>,
    race_column: Regex,
}

impl HeaderNormalizer {
    pub fn new(aliases: &HeaderAliases) -> Result<Self, regex::Error> {
        Ok(Self {
            rules: aliases.rules.clone(),
            race_column: Regex::new(&aliases.race_column_pattern)?,
        })
    }

    pub fn normalize<S: AsRef<str>>(&self, headers: &[S]) -> HeaderMap {
        let mut columns = Vec::with_capacity(headers.len());

        for (i, raw) in headers.iter().enumerate() {
            let key = match self.classify(raw.as_ref()) {
                Some(field) if field.is_multi_column() => ColumnKey::Field(field),
                Some(field) if !columns.contains(&ColumnKey::Field(field)) => {
                    ColumnKey::Field(field)
                }
                _ => ColumnKey::Extra(i),
            };
            columns.push(key);
        }

        HeaderMap { columns }
    }

    fn classify(&self, raw: &str) -> Option<CanonicalField> {
        let label = normalize_label(raw);
        if label.is_empty() {
            return None;
        }

        // Canonical names map to themselves
        if let Some(field) = CanonicalField::ALL
            .iter()
            .find(|f| f.as_str().replace('_', " ") == label)
        {
            return Some(*field);
        }

        if self.race_column.is_match(&label) {
            return Some(CanonicalField::Results);
        }

        self.rules
            .iter()
            .find(|rule| rule.matches(&label))
            .map(|rule| rule.field)
    }
}

fn normalize_label(raw: &str) -> String {
    raw.to_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
