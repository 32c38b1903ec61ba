//! Single-pass extraction of one results page.

use chrono::{NaiveDateTime, SubsecRound, Utc};
use scraper::Html;
use tracing::{debug, info, warn};

use super::context::{ContextResolver, PageContext};
use super::entities::EntityRegistry;
use super::headers::{CanonicalField, HeaderMap, HeaderNormalizer};
use super::locator::{CandidateTable, TableLocator};
use super::results::{self, NonFinish, PositionCell};
use super::ExtractionConfig;
use crate::error::ExtractionError;
use crate::types::{Diagnostic, Diagnostics, ExtractionOutput, Race, RaceId, RaceOutcome, RaceResult};

/// Immutable extraction components, built once from configuration and
/// shared by any number of sessions
pub struct Extractor {
    locator: TableLocator,
    normalizer: HeaderNormalizer,
    resolver: ContextResolver,
}

impl Extractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            locator: TableLocator::new(&config.table_keywords),
            normalizer: HeaderNormalizer::new(&config.header_aliases)?,
            resolver: ContextResolver::new(config),
        })
    }

    /// Start a session for one page
    pub fn session(&self, url: impl Into<String>) -> ExtractionSession<'_> {
        ExtractionSession {
            extractor: self,
            url: url.into(),
            processed_at: Utc::now().naive_utc().trunc_subsecs(0),
            registry: EntityRegistry::new(),
            diagnostics: Diagnostics::default(),
            races: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Extract one page with a fresh session
    pub fn extract(&self, html: &str, url: &str) -> ExtractionOutput {
        self.session(url).run(html)
    }
}

/// One extraction run over one page.
///
/// Owns its identity maps and diagnostics; never share a session between
/// pages.
pub struct ExtractionSession<'e> {
    extractor: &'e Extractor,
    url: String,
    processed_at: NaiveDateTime,
    registry: EntityRegistry,
    diagnostics: Diagnostics,
    races: Vec<Race>,
    results: Vec<RaceResult>,
}

/// A data row decoded against its table's header map
#[derive(Debug)]
struct ParsedRow {
    skipper: String,
    sail_number: Option<String>,
    boat_name: Option<String>,
    yacht_club: Option<String>,
    age_category: Option<String>,
    position: Option<u32>,
    position_inferred: bool,
    non_finish: Option<NonFinish>,
    outcomes: Vec<RaceOutcome>,
    race_count: usize,
    total_points: Option<f64>,
    /// Soft failures inside the row (bad tokens, bad total)
    issues: Vec<String>,
}

impl<'e> ExtractionSession<'e> {
    /// Override the timestamp used when no date can be read from the page.
    ///
    /// Truncated to whole seconds, the precision dates are stored and
    /// exported with.
    pub fn with_processed_at(mut self, processed_at: NaiveDateTime) -> Self {
        self.processed_at = processed_at.trunc_subsecs(0);
        self
    }

    pub fn run(mut self, html: &str) -> ExtractionOutput {
        let document = Html::parse_document(html);
        self.diagnostics.tables_found = TableLocator::count_tables(&document);

        let extractor = self.extractor;
        match extractor.locator.locate(&document) {
            Ok(tables) => {
                let (page, fallbacks) = extractor.resolver.page_context(&document, self.processed_at);
                for fallback in fallbacks {
                    self.record(fallback);
                }
                for table in &tables {
                    self.process_table(table, &page);
                }
                if self.diagnostics.tables_parsed == 0 {
                    self.record(Diagnostic::NoResultsFound {
                        url: self.url.clone(),
                    });
                }
            }
            Err(ExtractionError::NoResultsFound) => {
                self.record(Diagnostic::NoResultsFound {
                    url: self.url.clone(),
                });
            }
        }

        info!(
            "Extracted {} results in {} categories from {} ({} tables, {} issues)",
            self.results.len(),
            self.diagnostics.categories.len(),
            self.url,
            self.diagnostics.tables_found,
            self.diagnostics.issues.len()
        );
        self.finish()
    }

    fn process_table(&mut self, table: &CandidateTable<'_>, page: &PageContext) {
        let extractor = self.extractor;

        if table.is_empty() {
            self.record(Diagnostic::TableSkipped {
                table: table.index,
                reason: "no data rows".to_string(),
            });
            return;
        }

        let map = extractor.normalizer.normalize(&table.headers);
        debug!("table {} columns: {:?}", table.index, map.names());
        if !map.has(CanonicalField::Skipper) {
            self.record(Diagnostic::TableSkipped {
                table: table.index,
                reason: format!("no skipper column in headers {:?}", table.headers),
            });
            return;
        }

        let (category_name, fallback) = extractor.resolver.resolve_category(table.element);
        if let Some(fallback) = fallback {
            self.record(fallback);
        }
        let has_position = map.has(CanonicalField::Position);
        if !has_position {
            self.record(Diagnostic::ContextInferenceFallback {
                field: format!("table {} position", table.index),
                value: "row order".to_string(),
            });
        }

        let mut rows = Vec::with_capacity(table.rows.len());
        for (i, cells) in table.rows.iter().enumerate() {
            let row_no = i + 1;
            match parse_row(&map, cells, row_no) {
                Ok(row) => {
                    for message in &row.issues {
                        self.record(Diagnostic::RowParseError {
                            table: table.index,
                            row: row_no,
                            message: message.clone(),
                        });
                    }
                    if row.position_inferred && has_position {
                        self.record(Diagnostic::ContextInferenceFallback {
                            field: format!("table {} row {} position", table.index, row_no),
                            value: row_no.to_string(),
                        });
                    }
                    rows.push((row_no, row));
                }
                Err(message) => self.record(Diagnostic::RowParseError {
                    table: table.index,
                    row: row_no,
                    message,
                }),
            }
        }

        if rows.is_empty() {
            self.record(Diagnostic::TableSkipped {
                table: table.index,
                reason: "no parsable rows".to_string(),
            });
            return;
        }

        let category = self.registry.upsert_category(&category_name);
        let category_name = self.registry.category(category).name.clone();
        self.diagnostics.categories.insert(category_name.clone());

        let race = RaceId(self.races.len());
        self.races.push(Race {
            id: race,
            category,
            name: category_name,
            event_name: page.regatta_name.clone(),
            date: page.date,
            date_inferred: page.date_inferred,
            venue: page.venue.clone(),
            table_index: table.index,
            race_count: rows.iter().map(|(_, r)| r.race_count).max().unwrap_or(0),
        });

        let mut merge_issues = Vec::new();
        let parsed = rows.len();
        for (row_no, row) in rows {
            let Some(sailor) = self.registry.upsert_sailor(
                &row.skipper,
                row.yacht_club.as_deref(),
                row.age_category.as_deref(),
                &mut merge_issues,
            ) else {
                continue;
            };
            let (dnf, dns, dnc) = NonFinish::flags(row.non_finish);
            self.results.push(RaceResult {
                sailor,
                race,
                row: row_no,
                position: row.position,
                sail_number: row.sail_number,
                boat_name: row.boat_name,
                yacht_club: row.yacht_club,
                outcomes: row.outcomes,
                total_points: row.total_points,
                dnf,
                dns,
                dnc,
            });
        }
        for issue in merge_issues {
            self.record(issue);
        }

        self.diagnostics.tables_parsed += 1;
        debug!("table {} produced {} results", table.index, parsed);
    }

    fn record(&mut self, issue: Diagnostic) {
        match issue {
            Diagnostic::ContextInferenceFallback { .. } => debug!("{}: {}", self.url, issue),
            _ => warn!("{}: {}", self.url, issue),
        }
        self.diagnostics.push(issue);
    }

    fn finish(self) -> ExtractionOutput {
        let (sailors, categories) = self.registry.into_parts();
        ExtractionOutput {
            url: self.url,
            sailors,
            categories,
            races: self.races,
            results: self.results,
            diagnostics: self.diagnostics,
        }
    }
}

fn cell<'a>(cells: &'a [String], index: Option<usize>) -> &'a str {
    index
        .and_then(|i| cells.get(i))
        .map(|s| s.trim())
        .unwrap_or("")
}

fn optional(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

/// Text of the results field; per-race columns are joined with "-"
fn results_text(map: &HeaderMap, cells: &[String]) -> String {
    let columns = map.columns(CanonicalField::Results);
    match columns.as_slice() {
        [] => String::new(),
        [single] => cell(cells, Some(*single)).to_string(),
        many => many
            .iter()
            .map(|i| cell(cells, Some(*i)).trim_end_matches('-').trim())
            .collect::<Vec<_>>()
            .join("-"),
    }
}

fn parse_row(map: &HeaderMap, cells: &[String], rank: usize) -> Result<ParsedRow, String> {
    let skipper = cell(cells, map.column(CanonicalField::Skipper));
    if skipper.is_empty() {
        return Err("missing skipper name".to_string());
    }

    let mut issues = Vec::new();

    let position_cell = match map.column(CanonicalField::Position) {
        Some(i) => results::parse_position(cell(cells, Some(i)))?,
        None => PositionCell::Blank,
    };
    let (position, non_finish, position_inferred) = match position_cell {
        PositionCell::Placed(p) => (Some(p), None, false),
        PositionCell::NonFinish(code) => (None, Some(code), false),
        PositionCell::Blank => (Some(rank as u32), None, true),
    };

    let parsed = results::parse_results(&results_text(map, cells));
    issues.extend(parsed.errors.iter().cloned());
    let race_count = parsed.race_count();

    let total_points = match results::parse_total_points(cell(cells, map.column(CanonicalField::TotalPoints))) {
        Ok(total) => total,
        Err(message) => {
            issues.push(message);
            None
        }
    };

    Ok(ParsedRow {
        skipper: skipper.to_string(),
        sail_number: optional(cell(cells, map.column(CanonicalField::SailNumber))),
        boat_name: optional(cell(cells, map.column(CanonicalField::BoatName))),
        yacht_club: optional(cell(cells, map.column(CanonicalField::YachtClub))),
        age_category: optional(cell(cells, map.column(CanonicalField::AgeCategory))),
        position,
        position_inferred,
        non_finish,
        outcomes: parsed.outcomes,
        race_count,
        total_points,
        issues,
    })
}
