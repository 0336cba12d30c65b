//! Weft main entry point
//!
//! This is the command-line interface for the weft extraction engine.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use weft::config::load_config;
use weft::scrape::run_scrape;

/// Weft: a sitemap-driven web extraction engine
///
/// Weft reads a JSON configuration describing seed URLs and a tree of typed
/// selectors, scrapes the matching pages with a bounded worker pool, and
/// exports the extracted records to JSON, XML or CSV.
#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(version = "0.1.0")]
#[command(about = "A sitemap-driven web extraction engine", long_about = None)]
struct Cli {
    /// Path to JSON configuration file
    #[arg(value_name = "CONFIG", default_value = "sitemap.json")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Attach to a running browser over its DevTools websocket instead of
    /// launching one (only used when the config enables javascript)
    #[arg(long, value_name = "WS_URL")]
    devtools_ws_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Loaded before logging is set up because the settings decide whether
    // log output goes to a file.
    let config = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {e}", cli.config.display());
            return Err(e.into());
        }
    };

    setup_logging(cli.verbose, cli.quiet, &config.settings)?;
    tracing::info!("Configuration loaded from: {}", cli.config.display());

    match run_scrape(config, cli.devtools_ws_url.as_deref()).await {
        Ok(()) => {
            tracing::info!("Scrape completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Scrape failed: {}", e);
            Err(e.into())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level.
///
/// With `settings.log` set, output goes to the configured log file without
/// ANSI colors; otherwise it goes to stderr.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    settings: &weft::Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("weft=info,warn"),
            1 => EnvFilter::new("weft=debug,info"),
            2 => EnvFilter::new("weft=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    if settings.log {
        // Validation guarantees log_file is present when log is set.
        let path = settings.log_file.as_deref().unwrap_or("weft.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        builder
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        builder.init();
    }
    Ok(())
}

