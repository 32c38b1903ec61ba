//! Full path from a results page to exported CSV and back.

use chrono::NaiveDate;
use regatta_results::export::{read_csv, write_csv};
use regatta_results::storage::{ResultStore, SqliteStore};
use regatta_results::{Diagnostic, ExtractionConfig, Extractor};

const RESULTS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Spring Regatta Results</title></head>
<body>
<div id="header">
  <h1>Spring Invitational Regatta</h1>
  <p>April 20-21, 2024 - Lake Harbor Yacht Club</p>
</div>
<nav><ul><li><a href="/">Home</a></li></ul></nav>

<div class="fleet">
  <h3>Sunfish (4 boats)</h3>
  <table class="results">
    <tr><th>Place</th><th>Sail #</th><th>Boat Name</th><th>Helm</th><th>Yacht Club</th><th>Race Results</th><th>Total Points</th></tr>
    <tr><td>1</td><td>2201</td><td>Blue Moon</td><td>Ann Lee</td><td>LHYC</td><td>1-2-1-(4)-</td><td>4</td></tr>
    <tr><td>2</td><td>1877</td><td></td><td>Bo  Park</td><td>PYC</td><td>2-1-3-2-</td><td>8 T</td></tr>
    <tr><td>3</td><td>3001</td><td>Zephyr</td><td>Cy Young</td><td></td><td>3-3-2/OCS-1-</td><td>9</td></tr>
    <tr><td>DNC</td><td>45</td><td></td><td>Di Ross</td><td>LHYC</td><td>DNC-DNC-DNC-DNC-</td><td></td></tr>
  </table>
</div>

<div class="fleet">
  <h3>Laser Radial</h3>
  <table class="results">
    <tr><th>Pos</th><th>Sail</th><th>Sailor</th><th>Club</th><th>R1</th><th>R2</th><th>Net</th></tr>
    <tr><td>1st</td><td>199</td><td>ann lee</td><td>LHYC</td><td>1</td><td>1</td><td>2</td></tr>
    <tr><td>2nd</td><td>207</td><td>Ed Stone</td><td>PYC</td><td>2</td><td>DNF</td><td>5</td></tr>
  </table>
</div>

<table class="footer"><tr><td>Scored with a results program</td></tr></table>
</body>
</html>"#;

fn extractor() -> Extractor {
    Extractor::new(&ExtractionConfig::default()).unwrap()
}

#[test]
fn extracts_every_fleet_with_context() {
    let output = extractor().extract(RESULTS_PAGE, "https://club.example/spring");

    assert_eq!(output.diagnostics.tables_found, 3);
    assert_eq!(output.diagnostics.tables_parsed, 2);
    assert_eq!(output.results.len(), 6);
    assert_eq!(output.sailors.len(), 5);

    let categories: Vec<_> = output.categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(categories, vec!["Sunfish", "Laser Radial"]);

    let race = &output.races[0];
    assert_eq!(race.event_name, "Spring Invitational Regatta");
    assert_eq!(race.date.date(), NaiveDate::from_ymd_opt(2024, 4, 20).unwrap());
    assert_eq!(race.venue.as_deref(), Some("Lake Harbor Yacht Club"));
    assert_eq!(race.race_count, 4);
    assert_eq!(output.races[1].race_count, 2);

    let records = output.records();
    let park = &records[1];
    assert_eq!(park.skipper, "Bo Park");
    assert_eq!(park.total_points, Some(8.0));
    assert_eq!(park.boat_name, None);

    let young = &records[2];
    assert_eq!(young.outcomes[2].points, Some(2.0));

    let ross = &records[3];
    assert_eq!(ross.position, None);
    assert!(ross.dnc);
    assert_eq!(ross.outcomes.len(), 4);

    let stone = &records[5];
    assert!(stone.outcomes[1].dnf);
    assert_eq!(stone.outcomes[1].points, None);

    // Same sailor in both fleets
    assert_eq!(output.results[0].sailor, output.results[4].sailor);
    assert!(output
        .diagnostics
        .issues
        .iter()
        .all(|d| !matches!(d, Diagnostic::RowParseError { .. })));
}

#[test]
fn csv_round_trip_preserves_results() {
    let records = extractor()
        .extract(RESULTS_PAGE, "https://club.example/spring")
        .records();

    let mut buf = Vec::new();
    write_csv(&records, &mut buf).unwrap();
    let parsed = read_csv(buf.as_slice()).unwrap();

    assert_eq!(parsed.len(), records.len());
    for (before, after) in records.iter().zip(&parsed) {
        assert_eq!(after.position, before.position);
        assert_eq!(after.total_points, before.total_points);
        assert_eq!(
            (after.dnf, after.dns, after.dnc),
            (before.dnf, before.dns, before.dnc)
        );
        assert_eq!(after.outcomes, before.outcomes);
        assert_eq!(after, before);
    }
}

#[test]
fn page_without_tables_is_not_an_error() {
    let output = extractor().extract(
        "<html><body><h1>Results will be posted soon</h1></body></html>",
        "https://club.example/pending",
    );

    assert!(output.is_empty());
    assert!(output.diagnostics.has_no_results());
}

#[test]
fn stores_to_sqlite_file() {
    let dir = std::env::temp_dir().join(format!("regatta-e2e-{}", std::process::id()));
    let db_path = dir.join("results.db");
    let _ = std::fs::remove_dir_all(&dir);

    let output = extractor().extract(RESULTS_PAGE, "https://club.example/spring");
    let mut store = SqliteStore::new(&db_path).unwrap();
    store.store(&output).unwrap();
    store.store(&output).unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.sailors, 5);
    assert_eq!(stats.results, 6);
    assert_eq!(store.sailor_results("Ann Lee").unwrap().len(), 2);

    let _ = std::fs::remove_dir_all(&dir);
}
