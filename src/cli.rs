//! CLI commands for the regatta results extractor.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::export::{self, ExportFormat};
use crate::extract::results::{format_outcomes, format_points};
use crate::extract::Extractor;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::runner::{BatchBudget, BatchRunner, StopReason};
use crate::storage::{ResultStore, SqliteStore};
use crate::types::{ExtractionOutput, ResultRecord};

#[derive(Parser)]
#[command(name = "regatta")]
#[command(version, about = "Extract sailing regatta results from HTML result pages", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract results from one page
    Extract {
        /// Page URL (also used to label results when reading a file)
        #[arg(value_name = "URL")]
        url: String,

        /// Read HTML from this file instead of fetching the URL
        #[arg(long)]
        html_file: Option<PathBuf>,

        /// Output format (json, csv, table)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save results to the database
        #[arg(long)]
        store: bool,
    },

    /// Extract results from many pages
    Batch {
        /// Page URLs, processed in order
        #[arg(value_name = "URL", required = true)]
        urls: Vec<String>,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<usize>,

        /// Stop after this many seconds
        #[arg(long)]
        max_seconds: Option<u64>,

        /// Directory for per-page export files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Export format (json, csv)
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Save results to the database
        #[arg(long)]
        store: bool,
    },

    /// Show database statistics
    Stats {
        /// Also list stored results for this sailor
        #[arg(short, long)]
        sailor: Option<String>,
    },
}

/// Run the `extract` command.
pub async fn run_extract(
    url: String,
    html_file: Option<PathBuf>,
    format: String,
    output: Option<PathBuf>,
    store: bool,
) -> Result<()> {
    let config = AppConfig::load()?;
    let extractor = Extractor::new(&config.extraction).context("Invalid header alias pattern")?;

    let html = match html_file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => HttpFetcher::new(&config.fetch)?.fetch(&url).await?,
    };

    let result = extractor.extract(&html, &url);
    print_diagnostics(&result);

    if store {
        save(&config, &result)?;
    }

    let records = result.records();
    match output {
        Some(path) => {
            let format = ExportFormat::from_path(&path).unwrap_or_else(|| parse_format(&format));
            export::export_to_file(&records, &path, format)?;
            eprintln!("Wrote {} results to {}", records.len(), path.display());
        }
        None => match format.as_str() {
            "table" => print_results_table(&records),
            "csv" => export::write_csv(&records, std::io::stdout().lock())?,
            "json" => {
                export::write_json(&records, std::io::stdout().lock())?;
                println!();
            }
            _ => {
                eprintln!("Unknown format: {}. Using table.", format);
                print_results_table(&records);
            }
        },
    }

    Ok(())
}

/// Run the `batch` command.
pub async fn run_batch(
    urls: Vec<String>,
    max_pages: Option<usize>,
    max_seconds: Option<u64>,
    output_dir: Option<PathBuf>,
    format: String,
    store: bool,
) -> Result<()> {
    let mut config = AppConfig::load()?;
    if max_pages.is_some() {
        config.batch.max_pages = max_pages;
    }
    if max_seconds.is_some() {
        config.batch.max_seconds = max_seconds;
    }
    let output_dir = output_dir.unwrap_or_else(|| PathBuf::from(&config.export.output_dir));
    let format = parse_format(&format);

    let extractor = Extractor::new(&config.extraction).context("Invalid header alias pattern")?;
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let report = BatchRunner::new(&fetcher, &extractor, BatchBudget::from(&config.batch))
        .run(&urls)
        .await;

    for output in &report.outputs {
        print_diagnostics(output);
        if output.is_empty() {
            continue;
        }
        let path = output_dir.join(format!("{}.{}", file_stem(&output.url), format.extension()));
        export::export_to_file(&output.records(), &path, format)?;
        eprintln!("Wrote {} results to {}", output.results.len(), path.display());
    }

    if store {
        let mut db = open_store(&config)?;
        for output in &report.outputs {
            db.store(output)?;
        }
    }

    for (url, error) in &report.failures {
        eprintln!("Failed: {} ({})", url, error);
    }
    match report.stop {
        StopReason::Completed => {}
        StopReason::PageLimit => eprintln!("Stopped at the page limit; remaining URLs not processed"),
        StopReason::TimeLimit => eprintln!("Stopped at the time limit; remaining URLs not processed"),
    }
    eprintln!(
        "{} pages, {} results, {} failures, {} duplicates skipped",
        report.outputs.len(),
        report.result_count(),
        report.failures.len(),
        report.skipped.len()
    );

    Ok(())
}

/// Run the `stats` command.
pub fn run_stats(sailor: Option<String>) -> Result<()> {
    let config = AppConfig::load()?;
    let db = open_store(&config)?;
    let stats = db.stats()?;

    println!("Database: {}", config.storage.database_path);
    println!("  Sailors:    {:>8}", stats.sailors);
    println!("  Categories: {:>8}", stats.categories);
    println!("  Races:      {:>8}", stats.races);
    println!("  Results:    {:>8}", stats.results);
    println!();

    println!("=== Results by Category ===");
    for (category, count) in db.category_counts()? {
        println!("  {:<30} {:>6}", category, count);
    }

    if let Some(name) = sailor {
        println!();
        println!("=== {} ===", name);
        let results = db.sailor_results(&name)?;
        if results.is_empty() {
            println!("  No results stored");
        }
        for r in results {
            println!(
                "  {:<19} {:<30} {:<20} {:>4} {:>7}",
                r.race_date,
                r.event_name,
                r.category,
                r.position.map_or("-".to_string(), |p| p.to_string()),
                r.total_points.map_or("-".to_string(), format_points),
            );
        }
    }

    Ok(())
}

fn parse_format(format: &str) -> ExportFormat {
    match format {
        "json" => ExportFormat::Json,
        "csv" => ExportFormat::Csv,
        other => {
            eprintln!("Unknown export format: {}. Using CSV.", other);
            ExportFormat::Csv
        }
    }
}

fn open_store(config: &AppConfig) -> Result<SqliteStore> {
    SqliteStore::new(Path::new(&config.storage.database_path))
}

fn save(config: &AppConfig, output: &ExtractionOutput) -> Result<()> {
    let summary = open_store(config)?.store(output)?;
    eprintln!(
        "Stored {} results for {} sailors in {}",
        summary.results, summary.sailors, config.storage.database_path
    );
    Ok(())
}

/// File name for a page's export, derived from its URL
fn file_stem(url: &str) -> String {
    let stem: String = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "results".to_string()
    } else {
        stem
    }
}

fn print_diagnostics(output: &ExtractionOutput) {
    let diagnostics = &output.diagnostics;
    eprintln!(
        "{}: {} tables found, {} parsed, {} results, {} issues",
        output.url,
        diagnostics.tables_found,
        diagnostics.tables_parsed,
        output.results.len(),
        diagnostics.issues.len()
    );
    for message in &diagnostics.parse_errors {
        eprintln!("  - {}", message);
    }
}

fn print_results_table(records: &[ResultRecord]) {
    let mut current: Option<(&str, &str)> = None;

    for record in records {
        let key = (record.event_name.as_str(), record.category.as_str());
        if current != Some(key) {
            if current.is_some() {
                println!();
            }
            println!("=== {} / {} ===", record.event_name, record.category);
            println!(
                "{:>4} {:>8} {:<24} {:<20} {:<24} {:>7}",
                "Pos", "Sail", "Skipper", "Club", "Results", "Total"
            );
            current = Some(key);
        }

        let position = match (record.position, record.dnf, record.dns, record.dnc) {
            (Some(p), ..) => p.to_string(),
            (None, true, ..) => "DNF".to_string(),
            (None, _, true, _) => "DNS".to_string(),
            (None, _, _, true) => "DNC".to_string(),
            _ => "-".to_string(),
        };
        println!(
            "{:>4} {:>8} {:<24} {:<20} {:<24} {:>7}",
            position,
            record.sail_number.as_deref().unwrap_or(""),
            record.skipper,
            record.yacht_club.as_deref().unwrap_or(""),
            format_outcomes(&record.outcomes),
            record.total_points.map_or(String::new(), format_points),
        );
    }

    if records.is_empty() {
        println!("No results found");
    }
}
