//! Regatta results CLI
//!
//! Extracts structured sailing results from HTML result pages.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use regatta_results::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so exported data on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regatta_results=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            url,
            html_file,
            format,
            output,
            store,
        } => cli::run_extract(url, html_file, format, output, store).await,
        Commands::Batch {
            urls,
            max_pages,
            max_seconds,
            output_dir,
            format,
            store,
        } => cli::run_batch(urls, max_pages, max_seconds, output_dir, format, store).await,
        Commands::Stats { sailor } => cli::run_stats(sailor),
    }
}
