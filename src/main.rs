//! Forum-Harvest main entry point
//!
//! This is the command-line interface for the Forum-Harvest thread harvester.

use anyhow::Context;
use clap::Parser;
use forum_harvest::config::{load_config_with_hash, Config};
use forum_harvest::crawler::build_scheduler;
use forum_harvest::output::{
    print_post_summary, print_statistics, summarize_posts, write_results,
};
use forum_harvest::storage::{Checkpoint, CheckpointStorage, JsonCheckpointStore};
use forum_harvest::url::{load_seeds, SiteUrls};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Forum-Harvest: a budgeted discussion-thread harvester
///
/// Forum-Harvest crawls forum posts and their full comment trees under a
/// global request budget, checkpointing completed posts so an interrupted
/// run can be resumed.
#[derive(Parser, Debug)]
#[command(name = "forum-harvest")]
#[command(version)]
#[command(about = "A budgeted discussion-thread harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Skip posts already in today's checkpoint (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Crawl every seed, ignoring today's checkpoint
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and seeds and show what would be crawled
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show a summary of today's checkpoint and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_harvest=info,warn"),
            1 => EnvFilter::new("forum_harvest=debug,info"),
            2 => EnvFilter::new("forum_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads and normalizes the seed list; any failure is fatal
fn load_seed_urls(config: &Config) -> anyhow::Result<(SiteUrls, Vec<Url>)> {
    let site = SiteUrls::from_config(&config.site)
        .with_context(|| format!("Invalid base URL {}", config.site.base_url))?;
    let seeds = load_seeds(Path::new(&config.output.seeds_path), site.base())?;
    Ok((site, seeds))
}

/// Handles the --dry-run mode: validates config and seeds, shows the plan
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let (site, seeds) = load_seed_urls(config)?;
    let store = JsonCheckpointStore::new(&config.output.checkpoint_dir);
    let known = match store.load() {
        Ok(checkpoint) => checkpoint.known_ids(),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot read today's checkpoint");
            Default::default()
        }
    };

    println!("=== Forum-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max workers: {}", config.crawler.max_workers);
    println!("  Checkpoint interval: {} posts", config.crawler.checkpoint_interval);
    println!("  Request timeout: {}ms", config.crawler.request_timeout);

    println!("\nRate Limit:");
    println!(
        "  {} requests per {}ms, {}ms spacing",
        config.rate_limit.capacity, config.rate_limit.refill_interval, config.rate_limit.request_spacing
    );
    println!(
        "  429 retries: {} (backoff {}-{}ms, cap {}ms)",
        config.retry.max_rate_limit_retries,
        config.retry.backoff_min,
        config.retry.backoff_max,
        config.retry.backoff_cap
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nSite:");
    println!("  Base URL: {}", site.base());
    println!("  Comments path: {}", config.site.comments_path);

    println!("\nOutput:");
    println!("  Seeds: {}", config.output.seeds_path);
    println!("  Checkpoint: {}", store.path().display());
    println!("  Results: {}", config.output.results_dir);

    let pending: Vec<_> = seeds
        .iter()
        .filter(|url| !known.contains(&post_key(&site, url)))
        .collect();

    println!("\nSeeds ({}, {} already checkpointed today):", seeds.len(), seeds.len() - pending.len());
    for url in &pending {
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} posts", pending.len());

    Ok(())
}

/// Handles the --stats mode: summarizes today's checkpoint
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let store = JsonCheckpointStore::new(&config.output.checkpoint_dir);
    println!("Checkpoint: {}\n", store.path().display());

    let checkpoint = store.load().context("Failed to read checkpoint")?;
    print_post_summary(&summarize_posts(checkpoint.posts()));

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> anyhow::Result<()> {
    let (site, seeds) = load_seed_urls(&config)?;
    let store = JsonCheckpointStore::new(&config.output.checkpoint_dir);

    let mut harvested = if fresh {
        tracing::info!("Starting fresh crawl (ignoring today's checkpoint)");
        Checkpoint::new()
    } else {
        match store.load() {
            Ok(checkpoint) => {
                tracing::info!(
                    checkpointed = checkpoint.len(),
                    "Resuming from today's checkpoint"
                );
                checkpoint
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read today's checkpoint, crawling every seed");
                Checkpoint::new()
            }
        }
    };

    let urls: Vec<Url> = seeds
        .into_iter()
        .filter(|url| !harvested.contains(&post_key(&site, url)))
        .collect();
    tracing::info!(posts = urls.len(), "Seeds to crawl");

    let cancel = CancellationToken::new();
    let scheduler = build_scheduler(&config, Box::new(store))
        .context("Failed to set up crawler")?
        .with_cancellation(cancel.clone());

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            interrupt.cancel();
        }
    });

    let report = scheduler.run(urls).finish().await;
    harvested.merge(&report.posts);
    let posts = harvested.into_posts();

    let path = write_results(Path::new(&config.output.results_dir), &posts)
        .context("Failed to write results")?;

    print_statistics(&report.statistics);
    println!();
    print_post_summary(&summarize_posts(&posts));
    println!("\n✓ Results written to: {}", path.display());

    Ok(())
}

/// Key a post URL is checkpointed under
fn post_key(site: &SiteUrls, url: &Url) -> String {
    site.post_id(url).unwrap_or_else(|| url.to_string())
}
