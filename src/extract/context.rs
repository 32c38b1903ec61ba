//! Category and regatta context resolution.
//!
//! Result pages attribute a table to its fleet by visual proximity: a
//! heading just above the table, either as a sibling or as the label of an
//! enclosing container. Regatta name, date and venue come from the first
//! lines of the page body.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Node, Selector};
use std::ops::Range;
use std::sync::LazyLock;
use tracing::debug;

use super::{clean_text, element_text, ExtractionConfig};
use crate::types::Diagnostic;

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[(\[][^)\]]*[)\]]").expect("valid regex"));
static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));

/// Elements whose text never counts as page body lines
const NON_CONTENT: [&str; 6] = ["script", "style", "noscript", "template", "table", "select"];

/// Elements that start a new body line
const BLOCK_ELEMENTS: [&str; 24] = [
    "address", "article", "aside", "blockquote", "br", "center", "dd", "div", "dl", "dt",
    "footer", "form", "h1", "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section",
    "td", "ul",
];

type DateBuilder = fn(&Captures) -> Option<NaiveDate>;

/// Date parsers, tried in order
static DATE_PARSERS: LazyLock<Vec<(Regex, DateBuilder)>> = LazyLock::new(|| {
    let parsers: [(&str, DateBuilder); 4] = [
        (r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b", iso_date),
        (r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b", us_date),
        (
            r"\b([A-Za-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:\s*[-–]\s*\d{1,2}(?:st|nd|rd|th)?)?,?\s+(\d{4})\b",
            month_day_year,
        ),
        (
            r"\b(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]{3,9})\.?,?\s+(\d{4})\b",
            day_month_year,
        ),
    ];
    parsers
        .into_iter()
        .map(|(pattern, build)| (Regex::new(pattern).expect("valid regex"), build))
        .collect()
});

/// 2023-06-10
fn iso_date(c: &Captures) -> Option<NaiveDate> {
    ymd(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
}

/// 6/10/2023, month first
fn us_date(c: &Captures) -> Option<NaiveDate> {
    ymd(c[3].parse().ok()?, c[1].parse().ok()?, c[2].parse().ok()?)
}

/// June 10, 2023 or Jun 10-12, 2023 (first day of a range)
fn month_day_year(c: &Captures) -> Option<NaiveDate> {
    ymd(c[3].parse().ok()?, month_number(&c[1])?, c[2].parse().ok()?)
}

/// 10 June 2023
fn day_month_year(c: &Captures) -> Option<NaiveDate> {
    ymd(c[3].parse().ok()?, month_number(&c[2])?, c[1].parse().ok()?)
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august",
        "september", "october", "november", "december",
    ];
    let lower = name.to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(lower.as_str()))
        .map(|i| i as u32 + 1)
}

/// Find the first date in `text` and the byte range it occupies
pub fn parse_date(text: &str) -> Option<(NaiveDate, Range<usize>)> {
    DATE_PARSERS.iter().find_map(|(re, build)| {
        re.captures_iter(text)
            .find_map(|caps| build(&caps).map(|d| (d, caps.get(0).map_or(0..0, |m| m.range()))))
    })
}

/// Remove parenthetical annotations such as "(12 boats)"
pub fn strip_annotations(text: &str) -> String {
    clean_text(&PARENTHETICAL.replace_all(text, ""))
}

/// Regatta-level metadata shared by every table on a page
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    pub regatta_name: String,
    pub date: NaiveDateTime,
    pub date_inferred: bool,
    pub venue: Option<String>,
}

/// Resolves category and regatta context for result tables
pub struct ContextResolver {
    heading_levels: Vec<String>,
    unknown_category: String,
    unknown_regatta: String,
}

impl ContextResolver {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            heading_levels: config
                .heading_levels
                .iter()
                .map(|h| h.to_lowercase())
                .collect(),
            unknown_category: config.unknown_category.clone(),
            unknown_regatta: config.unknown_regatta.clone(),
        }
    }

    /// Category name for a table, with the default substituted when no
    /// heading precedes it
    pub fn resolve_category(&self, table: ElementRef<'_>) -> (String, Option<Diagnostic>) {
        match self.nearest_heading(table).map(|h| strip_annotations(&h)) {
            Some(name) if !name.is_empty() => (name, None),
            _ => (
                self.unknown_category.clone(),
                Some(Diagnostic::ContextInferenceFallback {
                    field: "category".to_string(),
                    value: self.unknown_category.clone(),
                }),
            ),
        }
    }

    /// Text of the closest heading above `table`
    pub fn nearest_heading(&self, table: ElementRef<'_>) -> Option<String> {
        if let Some(caption) = table
            .children()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "caption")
        {
            let text = element_text(&caption);
            if !text.is_empty() {
                return Some(text);
            }
        }

        let mut current = *table;
        loop {
            for sibling in current.prev_siblings() {
                if let Some(found) = ElementRef::wrap(sibling).and_then(|e| self.heading_in(e)) {
                    return Some(found);
                }
            }
            current = current.parent()?;
            if let Some(elem) = ElementRef::wrap(current) {
                if elem.value().name() == "body" {
                    return None;
                }
            }
        }
    }

    fn is_heading(&self, name: &str) -> bool {
        self.heading_levels.iter().any(|h| h == name)
    }

    /// The element itself if it is a heading, otherwise its last heading
    /// descendant of the highest-priority level present
    fn heading_in(&self, elem: ElementRef<'_>) -> Option<String> {
        if self.is_heading(elem.value().name()) {
            let text = element_text(&elem);
            return (!text.is_empty()).then_some(text);
        }
        if elem.value().name() == "table" {
            // Earlier results tables carry their own context
            return None;
        }

        self.heading_levels.iter().find_map(|level| {
            elem.descendants()
                .filter_map(ElementRef::wrap)
                .filter(|d| d.value().name() == level.as_str())
                .map(|d| element_text(&d))
                .filter(|t| !t.is_empty())
                .last()
        })
    }

    /// Regatta name, date and venue from the first two body lines
    pub fn page_context(
        &self,
        document: &Html,
        processed_at: NaiveDateTime,
    ) -> (PageContext, Vec<Diagnostic>) {
        let mut fallbacks = Vec::new();
        let lines = self.body_lines(document, 2);
        debug!("context lines: {:?}", lines);

        let regatta_name = match lines.first() {
            Some(line) => line.clone(),
            None => {
                let title = document
                    .select(&TITLE_SELECTOR)
                    .next()
                    .map(|t| element_text(&t))
                    .filter(|t| !t.is_empty());
                match title {
                    Some(t) => t,
                    None => {
                        fallbacks.push(Diagnostic::ContextInferenceFallback {
                            field: "regatta_name".to_string(),
                            value: self.unknown_regatta.clone(),
                        });
                        self.unknown_regatta.clone()
                    }
                }
            }
        };

        let found = lines
            .iter()
            .enumerate()
            .find_map(|(i, line)| parse_date(line).map(|(d, range)| (i, d, range)));

        let (date, date_inferred) = match &found {
            Some((_, d, _)) => (d.and_time(NaiveTime::MIN), false),
            None => {
                fallbacks.push(Diagnostic::ContextInferenceFallback {
                    field: "date".to_string(),
                    value: processed_at.to_string(),
                });
                (processed_at, true)
            }
        };

        let venue = lines.get(1).and_then(|line| {
            let remainder = match &found {
                Some((1, _, range)) => format!("{} {}", &line[..range.start], &line[range.end..]),
                _ => line.clone(),
            };
            let venue = clean_text(
                remainder.trim_matches(|c: char| c.is_whitespace() || "-–|,@:;".contains(c)),
            );
            (!venue.is_empty()).then_some(venue)
        });
        if venue.is_none() {
            fallbacks.push(Diagnostic::ContextInferenceFallback {
                field: "venue".to_string(),
                value: String::new(),
            });
        }

        (
            PageContext {
                regatta_name,
                date,
                date_inferred,
                venue,
            },
            fallbacks,
        )
    }

    /// First `limit` non-empty text lines of the body, skipping table
    /// contents, category headings and script-like elements.
    ///
    /// A line is the visible text between block boundaries, so inline
    /// markup such as `<em>` or `<b>` never splits one.
    fn body_lines(&self, document: &Html, limit: usize) -> Vec<String> {
        let Some(body) = document.select(&BODY_SELECTOR).next() else {
            return Vec::new();
        };

        let mut text = String::new();
        self.collect_text(body, &mut text);
        text.split('\n')
            .map(clean_text)
            .filter(|line| !line.is_empty())
            .take(limit)
            .collect()
    }

    /// Append visible text under `elem`, with `\n` at block boundaries
    fn collect_text(&self, elem: ElementRef<'_>, out: &mut String) {
        for child in elem.children() {
            match child.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(_) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let name = child.value().name();
                    if NON_CONTENT.contains(&name) || self.is_heading(name) {
                        out.push('\n');
                        continue;
                    }
                    let block = BLOCK_ELEMENTS.contains(&name);
                    if block {
                        out.push('\n');
                    }
                    self.collect_text(child, out);
                    if block {
                        out.push('\n');
                    }
                }
                _ => {}
            }
        }
    }
}
