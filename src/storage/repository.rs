//! SQLite persistence for extraction output

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

use super::schema::create_tables;
use crate::extract::entities::normalize_name;
use crate::types::{ExtractionOutput, Race, RaceCategory, RaceResult, Sailor};

/// Sink for extraction output
pub trait ResultStore {
    /// Upsert everything in `output`, all or nothing
    fn store(&mut self, output: &ExtractionOutput) -> Result<StoreSummary>;
}

/// Rows written by one `store` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub sailors: usize,
    pub categories: usize,
    pub races: usize,
    pub results: usize,
    pub outcomes: usize,
}

/// Row counts across the whole database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub sailors: i64,
    pub categories: i64,
    pub races: i64,
    pub results: i64,
}

/// A stored result joined with its race context
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub event_name: String,
    pub category: String,
    pub race_date: String,
    pub position: Option<u32>,
    pub total_points: Option<f64>,
}

/// Result store backed by a SQLite file
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the database, creating it and its tables if needed
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(db_path).context("Failed to open database")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        create_tables(&conn)?;

        Ok(Self { conn })
    }

    /// Create an in-memory store (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |table: &str| -> Result<i64> {
            let n = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n)
        };
        Ok(StoreStats {
            sailors: count("sailors")?,
            categories: count("race_categories")?,
            races: count("races")?,
            results: count("race_results")?,
        })
    }

    /// Result count per category, largest first
    pub fn category_counts(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.name, COUNT(r.id) AS n
            FROM race_categories c
            JOIN races ra ON ra.category_id = c.id
            JOIN race_results r ON r.race_id = ra.id
            GROUP BY c.id
            ORDER BY n DESC, c.name
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// All stored results of one sailor, oldest first
    pub fn sailor_results(&self, name: &str) -> Result<Vec<StoredResult>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT ra.event_name, c.name, ra.race_date, r.position, r.total_points
            FROM race_results r
            JOIN sailors s ON s.id = r.sailor_id
            JOIN races ra ON ra.id = r.race_id
            JOIN race_categories c ON c.id = ra.category_id
            WHERE s.name_key = ?1
            ORDER BY ra.race_date, ra.id
            "#,
        )?;
        let rows = stmt
            .query_map([normalize_name(name)], |row| {
                Ok(StoredResult {
                    event_name: row.get(0)?,
                    category: row.get(1)?,
                    race_date: row.get(2)?,
                    position: row.get(3)?,
                    total_points: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl ResultStore for SqliteStore {
    fn store(&mut self, output: &ExtractionOutput) -> Result<StoreSummary> {
        let tx = self.conn.transaction()?;
        let mut summary = StoreSummary::default();

        let sailor_ids = output
            .sailors
            .iter()
            .map(|s| upsert_sailor(&tx, s))
            .collect::<rusqlite::Result<Vec<i64>>>()
            .context("Failed to store sailors")?;
        summary.sailors = sailor_ids.len();

        let category_ids = output
            .categories
            .iter()
            .map(|c| upsert_category(&tx, c))
            .collect::<rusqlite::Result<Vec<i64>>>()
            .context("Failed to store categories")?;
        summary.categories = category_ids.len();

        let race_ids = output
            .races
            .iter()
            .map(|r| upsert_race(&tx, r, category_ids[r.category.0], &output.url))
            .collect::<rusqlite::Result<Vec<i64>>>()
            .context("Failed to store races")?;
        summary.races = race_ids.len();

        for result in &output.results {
            let result_id = upsert_result(&tx, result, race_ids[result.race.0], sailor_ids[result.sailor.0])
                .context("Failed to store result")?;
            summary.results += 1;
            summary.outcomes += replace_outcomes(&tx, result_id, result)?;
        }

        tx.commit()?;
        info!(
            "Stored {} results ({} sailors, {} races) from {}",
            summary.results, summary.sailors, summary.races, output.url
        );
        Ok(summary)
    }
}

/// Insert or fill forward; existing attributes are never overwritten
fn upsert_sailor(conn: &Connection, sailor: &Sailor) -> rusqlite::Result<i64> {
    conn.query_row(
        r#"
        INSERT INTO sailors (name_key, name, club, age_category)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(name_key) DO UPDATE SET
            club = COALESCE(sailors.club, excluded.club),
            age_category = COALESCE(sailors.age_category, excluded.age_category)
        RETURNING id
        "#,
        params![
            normalize_name(&sailor.name),
            sailor.name,
            sailor.club,
            sailor.age_category,
        ],
        |row| row.get(0),
    )
}

fn upsert_category(conn: &Connection, category: &RaceCategory) -> rusqlite::Result<i64> {
    conn.query_row(
        r#"
        INSERT INTO race_categories (name_key, name)
        VALUES (?1, ?2)
        ON CONFLICT(name_key) DO UPDATE SET name = race_categories.name
        RETURNING id
        "#,
        params![normalize_name(&category.name), category.name],
        |row| row.get(0),
    )
}

fn upsert_race(conn: &Connection, race: &Race, category_id: i64, url: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        r#"
        INSERT INTO races
        (category_id, name, event_name, race_date, date_inferred, venue, race_count, source_url, table_index)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(source_url, table_index) DO UPDATE SET
            category_id = excluded.category_id,
            name = excluded.name,
            event_name = excluded.event_name,
            race_date = excluded.race_date,
            date_inferred = excluded.date_inferred,
            venue = excluded.venue,
            race_count = excluded.race_count
        RETURNING id
        "#,
        params![
            category_id,
            race.name,
            race.event_name,
            race.date.format("%Y-%m-%d %H:%M:%S").to_string(),
            race.date_inferred,
            race.venue,
            race.race_count as i64,
            url,
            race.table_index as i64,
        ],
        |row| row.get(0),
    )
}

fn upsert_result(conn: &Connection, result: &RaceResult, race_id: i64, sailor_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        r#"
        INSERT INTO race_results
        (race_id, sailor_id, row_index, position, sail_number, boat_name, yacht_club, total_points, dnf, dns, dnc)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(race_id, row_index) DO UPDATE SET
            sailor_id = excluded.sailor_id,
            position = excluded.position,
            sail_number = excluded.sail_number,
            boat_name = excluded.boat_name,
            yacht_club = excluded.yacht_club,
            total_points = excluded.total_points,
            dnf = excluded.dnf,
            dns = excluded.dns,
            dnc = excluded.dnc
        RETURNING id
        "#,
        params![
            race_id,
            sailor_id,
            result.row as i64,
            result.position,
            result.sail_number,
            result.boat_name,
            result.yacht_club,
            result.total_points,
            result.dnf,
            result.dns,
            result.dnc,
        ],
        |row| row.get(0),
    )
}

fn replace_outcomes(conn: &Connection, result_id: i64, result: &RaceResult) -> Result<usize> {
    conn.execute("DELETE FROM race_outcomes WHERE result_id = ?1", [result_id])?;

    let mut stmt = conn.prepare_cached(
        r#"
        INSERT INTO race_outcomes (result_id, race_index, points, dnf, dns, dnc, discarded)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )?;
    for outcome in &result.outcomes {
        stmt.execute(params![
            result_id,
            outcome.race_index as i64,
            outcome.points,
            outcome.dnf,
            outcome.dns,
            outcome.dnc,
            outcome.discarded,
        ])?;
    }
    Ok(result.outcomes.len())
}
