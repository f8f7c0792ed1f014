//! Webgrep main entry point
//!
//! This is the command-line interface for the recursive web grep.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use webgrep::config::{load_config_with_hash, validate, Config};
use webgrep::crawler::HttpConnector;
use webgrep::output::print_statistics;
use webgrep::CrawlOrchestrator;

/// Webgrep: a recursive, multi-threaded web grep
///
/// Downloads the page at URL, searches it for PATTERN, and follows the
/// links it finds until the link budget is spent.
#[derive(Parser, Debug)]
#[command(name = "webgrep")]
#[command(version)]
#[command(about = "A recursive, multi-threaded web grep", long_about = None)]
struct Cli {
    /// Seed URL (http or https)
    #[arg(value_name = "URL")]
    url: String,

    /// Regular expression searched in every page
    #[arg(value_name = "PATTERN")]
    pattern: String,

    /// Maximum number of links followed over the whole crawl
    #[arg(short = 'n', long)]
    max_links: Option<usize>,

    /// Number of worker threads
    #[arg(short, long)]
    threads: Option<usize>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print one line per page after the crawl
    #[arg(short, long)]
    list: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load_effective_config(&cli)?;
    let connector = HttpConnector::new(&config.http, tokio::runtime::Handle::current())
        .context("failed to build HTTP client")?;
    let orchestrator = Arc::new(CrawlOrchestrator::new(&config, Arc::new(connector))?);

    if !orchestrator.start(
        &cli.url,
        &cli.pattern,
        config.crawler.max_links,
        config.crawler.threads,
    ) {
        bail!("crawl of {} could not be started", cli.url);
    }

    let waiter = Arc::clone(&orchestrator);
    let idle = tokio::task::spawn_blocking(move || {
        while !waiter.wait_idle(Duration::from_secs(2)) {
            let stats = waiter.statistics();
            tracing::info!(
                "Progress: {} pages, {} pending, {} / {} links",
                stats.total_nodes,
                stats.pending(),
                stats.links_count,
                stats.max_links
            );
        }
    });

    tokio::select! {
        finished = idle => {
            finished?;
            tracing::info!("Crawl completed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping crawl");
            let stopper = Arc::clone(&orchestrator);
            tokio::task::spawn_blocking(move || stopper.stop()).await?;
        }
    }

    if !cli.quiet {
        print_statistics(&orchestrator.statistics());
    }
    if cli.list {
        println!();
        for line in orchestrator.page_listing() {
            println!("{}", line);
        }
    }

    // Joining the pool blocks; keep it off the async workers.
    tokio::task::spawn_blocking(move || drop(orchestrator)).await?;
    Ok(())
}

/// Reads the config file if one was given and applies command-line overrides
fn load_effective_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(max_links) = cli.max_links {
        config.crawler.max_links = max_links;
    }
    if let Some(threads) = cli.threads {
        config.crawler.threads = threads;
    }
    if let Some(timeout) = cli.timeout {
        config.http.timeout_secs = timeout;
    }

    validate(&config)?;
    Ok(config)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("webgrep=info,warn"),
            1 => EnvFilter::new("webgrep=debug,info"),
            2 => EnvFilter::new("webgrep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(verbose > 0)
        .with_file(false)
        .init();
}
