//! HTML-to-record extraction pipeline for regatta result pages.
//!
//! Provides table detection, header normalization, result-string parsing,
//! category/context resolution and entity deduplication, orchestrated by
//! [`Extractor`].

pub mod context;
pub mod entities;
pub mod headers;
pub mod locator;
pub mod pipeline;
pub mod results;

pub use context::{ContextResolver, PageContext};
pub use entities::EntityRegistry;
pub use headers::{CanonicalField, ColumnKey, HeaderAliases, HeaderMap, HeaderNormalizer};
pub use locator::{CandidateTable, TableLocator};
pub use pipeline::{ExtractionSession, Extractor};

use scraper::ElementRef;
use serde::{Deserialize, Serialize};

/// Heuristic tables driving the extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Header keywords marking a results table (case-insensitive substring)
    #[serde(default = "default_table_keywords")]
    pub table_keywords: Vec<String>,
    #[serde(default)]
    pub header_aliases: HeaderAliases,
    /// Heading tags searched for category names, in priority order
    #[serde(default = "default_heading_levels")]
    pub heading_levels: Vec<String>,
    #[serde(default = "default_unknown_category")]
    pub unknown_category: String,
    #[serde(default = "default_unknown_regatta")]
    pub unknown_regatta: String,
}

fn default_table_keywords() -> Vec<String> {
    ["Pos", "Sail", "Skipper", "Helm", "Name"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_heading_levels() -> Vec<String> {
    ["h2", "h3", "h4", "h5", "h6"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_unknown_category() -> String {
    "Unknown Category".to_string()
}

fn default_unknown_regatta() -> String {
    "Unknown Regatta".to_string()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            table_keywords: default_table_keywords(),
            header_aliases: HeaderAliases::default(),
            heading_levels: default_heading_levels(),
            unknown_category: default_unknown_category(),
            unknown_regatta: default_unknown_regatta(),
        }
    }
}

/// Collapse runs of whitespace (including non-breaking spaces) and trim
pub(crate) fn clean_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Visible text of an element, whitespace-normalized
pub(crate) fn element_text(elem: &ElementRef) -> String {
    clean_text(&elem.text().collect::<Vec<_>>().join(" "))
}
