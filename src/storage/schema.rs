//! SQLite schema for extracted regatta results
//!
//! Tables:
//! - sailors: One row per normalized sailor name
//! - race_categories: One row per normalized category name
//! - races: A results series within a category at one event
//! - race_results: A sailor's standing in a race series
//! - race_outcomes: Per-race scores of a result

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS sailors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name_key TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            club TEXT,
            age_category TEXT,
            created_at TEXT DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS race_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name_key TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS races (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id INTEGER NOT NULL REFERENCES race_categories(id),
            name TEXT NOT NULL,
            event_name TEXT NOT NULL,
            race_date TEXT NOT NULL,
            date_inferred INTEGER NOT NULL DEFAULT 0,
            venue TEXT,
            race_count INTEGER NOT NULL DEFAULT 0,
            source_url TEXT NOT NULL,
            table_index INTEGER NOT NULL,
            UNIQUE(source_url, table_index)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS race_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id INTEGER NOT NULL REFERENCES races(id),
            sailor_id INTEGER NOT NULL REFERENCES sailors(id),
            row_index INTEGER NOT NULL,
            position INTEGER,
            sail_number TEXT,
            boat_name TEXT,
            yacht_club TEXT,
            total_points REAL,
            dnf INTEGER NOT NULL DEFAULT 0,
            dns INTEGER NOT NULL DEFAULT 0,
            dnc INTEGER NOT NULL DEFAULT 0,
            UNIQUE(race_id, row_index)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS race_outcomes (
            result_id INTEGER NOT NULL REFERENCES race_results(id) ON DELETE CASCADE,
            race_index INTEGER NOT NULL,
            points REAL,
            dnf INTEGER NOT NULL DEFAULT 0,
            dns INTEGER NOT NULL DEFAULT 0,
            dnc INTEGER NOT NULL DEFAULT 0,
            discarded INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (result_id, race_index)
        )
        "#,
        [],
    )?;

    // Indexes for common lookups
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_races_category ON races(category_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_sailor ON race_results(sailor_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('sailors', 'race_categories', 'races', 'race_results', 'race_outcomes')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_create_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // Should not fail on second call
        create_tables(&conn).unwrap();
    }
}
