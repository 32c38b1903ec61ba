//! Results table detection.

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

use super::element_text;
use crate::error::ExtractionError;

static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));

/// A table whose header row looks like a results header
#[derive(Debug, Clone)]
pub struct CandidateTable<'a> {
    /// 1-based position among all tables on the page
    pub index: usize,
    pub element: ElementRef<'a>,
    pub headers: Vec<String>,
    /// Data rows (header row excluded), one text per cell
    pub rows: Vec<Vec<String>>,
}

impl CandidateTable<'_> {
    /// Header-only tables carry no results
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Finds result tables by header keywords
pub struct TableLocator {
    keywords: Vec<String>,
}

impl TableLocator {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Number of `<table>` elements in the document
    pub fn count_tables(document: &Html) -> usize {
        document.select(&TABLE_SELECTOR).count()
    }

    /// Return candidate tables in document order.
    ///
    /// Fails with [`ExtractionError::NoResultsFound`] when no table has a
    /// qualifying header row.
    pub fn locate<'a>(&self, document: &'a Html) -> Result<Vec<CandidateTable<'a>>, ExtractionError> {
        let mut candidates = Vec::new();

        for (i, table) in document.select(&TABLE_SELECTOR).enumerate() {
            let rows = own_rows(table);
            let Some(header_row) = rows.first() else {
                debug!("table {} has no rows", i + 1);
                continue;
            };

            let headers = header_cells(*header_row);
            if !self.is_results_header(&headers) {
                debug!("table {} rejected, headers: {:?}", i + 1, headers);
                continue;
            }

            let data_rows = rows[1..]
                .iter()
                .map(|row| row_cells(*row))
                .filter(|cells| cells.iter().any(|c| !c.is_empty()))
                .collect();

            candidates.push(CandidateTable {
                index: i + 1,
                element: table,
                headers,
                rows: data_rows,
            });
        }

        if candidates.is_empty() {
            return Err(ExtractionError::NoResultsFound);
        }

        debug!("located {} candidate tables", candidates.len());
        Ok(candidates)
    }

    fn is_results_header(&self, headers: &[String]) -> bool {
        headers.iter().any(|h| {
            let h = h.to_lowercase();
            self.keywords.iter().any(|k| h.contains(k.as_str()))
        })
    }
}

/// Rows belonging to this table, excluding rows of nested tables
fn own_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    table
        .select(&ROW_SELECTOR)
        .filter(|row| {
            row.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "table")
                .is_some_and(|owner| owner.id() == table.id())
        })
        .collect()
}

fn cells_named<'a>(row: ElementRef<'a>, names: &'a [&'a str]) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(move |e| names.contains(&e.value().name()))
}

/// Header texts: `th` cells, falling back to `td` cells
fn header_cells(row: ElementRef<'_>) -> Vec<String> {
    let th: Vec<String> = cells_named(row, &["th"]).map(|c| element_text(&c)).collect();
    if !th.is_empty() {
        return th;
    }
    cells_named(row, &["td"]).map(|c| element_text(&c)).collect()
}

fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    cells_named(row, &["td", "th"]).map(|c| element_text(&c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator() -> TableLocator {
        let keywords: Vec<String> = ["Pos", "Sail", "Skipper", "Helm", "Name"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        TableLocator::new(&keywords)
    }

    const PAGE: &str = r#"<html><body>
<table><tr><td>Home</td><td>Contact</td></tr></table>
<h3>Sunfish</h3>
<table>
  <tr><th>Pos</th><th>Sail</th><th>Skipper</th></tr>
  <tr><td>1</td><td>123</td><td>A Sailor</td></tr>
  <tr><td>2</td><td>456</td><td>B Sailor</td></tr>
</table>
<table>
  <tr><td>Place</td><td>Helm</td></tr>
  <tr><td>1</td><td>C Sailor</td></tr>
</table>
</body></html>"#;

    #[test]
    fn test_locate_filters_by_header_keywords() {
        let document = Html::parse_document(PAGE);
        let tables = locator().locate(&document).unwrap();

        assert_eq!(TableLocator::count_tables(&document), 3);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].index, 2);
        assert_eq!(tables[0].headers, vec!["Pos", "Sail", "Skipper"]);
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].rows[1], vec!["2", "456", "B Sailor"]);
    }

    #[test]
    fn test_td_header_fallback() {
        let document = Html::parse_document(PAGE);
        let tables = locator().locate(&document).unwrap();

        assert_eq!(tables[1].index, 3);
        assert_eq!(tables[1].headers, vec!["Place", "Helm"]);
        assert_eq!(tables[1].rows, vec![vec!["1", "C Sailor"]]);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let html = "<table><tr><th>SKIPPER NAME</th></tr><tr><td>X</td></tr></table>";
        let document = Html::parse_document(html);
        assert_eq!(locator().locate(&document).unwrap().len(), 1);
    }

    #[test]
    fn test_no_tables_is_no_results() {
        let document = Html::parse_document("<html><body><p>Nothing here</p></body></html>");
        let result = locator().locate(&document);
        assert!(matches!(result, Err(ExtractionError::NoResultsFound)));
    }

    #[test]
    fn test_header_only_table_is_empty_candidate() {
        let html = "<table><tr><th>Pos</th><th>Skipper</th></tr></table>";
        let document = Html::parse_document(html);
        let tables = locator().locate(&document).unwrap();
        assert_eq!(tables.len(), 1);
        assert!(tables[0].is_empty());
    }

    #[test]
    fn test_nested_table_rows_not_attributed_to_outer() {
        let html = r#"<table>
  <tr><th>Pos</th><th>Skipper</th></tr>
  <tr><td>1</td><td>Outer<table><tr><td>inner</td></tr></table></td></tr>
</table>"#;
        let document = Html::parse_document(html);
        let tables = locator().locate(&document).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows.len(), 1);
    }
}
