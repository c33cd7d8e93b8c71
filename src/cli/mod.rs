//! Command-line interface for claimfetch.
//!
//! Provides commands for running an acquisition pass over the catalog,
//! repairing the archive index, inspecting the ledger, verifying single
//! files and listing catalog tags.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{DaemonClient, HttpCatalog};
use crate::config::{self, ResolvedConfig, ENV_CATALOG_URL};
use crate::core::{open_archive, Orchestrator, RunOptions};
use crate::library::{verify, write_reports, DedupTracker, ManagedTree};

/// claimfetch - idempotent acquisition of catalog content through a fetch daemon
#[derive(Parser, Debug)]
#[command(name = "claimfetch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: search for .claimfetch/config.yaml)
    #[arg(long, global = true, env = "CLAIMFETCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Acquire new catalog entries into the output tree
    Run {
        /// Maximum number of catalog pages to read
        #[arg(short, long)]
        pages: Option<u32>,

        /// Output directory (managed tree root)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip entries carrying any of these tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        exclude_tags: Vec<String>,

        /// Process every entry, not only new ones
        #[arg(long)]
        all: bool,

        /// Seconds to wait between items
        #[arg(long)]
        delay: Option<u64>,
    },

    /// Repair index locations of files moved inside the output tree
    Reconcile {
        /// Output directory (managed tree root)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show ledger statistics
    Stats {
        /// Output directory (managed tree root)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify a single downloaded file
    Verify {
        /// File to verify
        path: PathBuf,
    },

    /// List tags used in the catalog
    Tags {
        /// Number of catalog pages to scan
        #[arg(short, long, default_value = "5")]
        pages: u32,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let mut config = config::load(self.config.as_deref())?;

        match self.command {
            Commands::Run {
                pages,
                output,
                exclude_tags,
                all,
                delay,
            } => {
                if let Some(output) = output {
                    config.output = output;
                }
                if let Some(pages) = pages {
                    config.catalog.max_pages = pages;
                }
                if let Some(delay) = delay {
                    config.run.item_delay_seconds = delay;
                }
                if all {
                    config.run.check_new_only = false;
                }
                config.run.excluded_tags.extend(
                    exclude_tags
                        .into_iter()
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty()),
                );
                run_acquisition(&config).await
            }
            Commands::Reconcile { output } => {
                if let Some(output) = output {
                    config.output = output;
                }
                reconcile_index(&config).await
            }
            Commands::Stats { output } => {
                if let Some(output) = output {
                    config.output = output;
                }
                show_stats(&config).await
            }
            Commands::Verify { path } => verify_file(path).await,
            Commands::Tags { pages } => list_tags(&config, pages).await,
            Commands::Config => show_config(&config),
        }
    }
}

fn managed_tree(config: &ResolvedConfig) -> ManagedTree {
    ManagedTree::new(&config.output).with_exclude_patterns(&config.run.scan_exclude)
}

fn catalog_client(config: &ResolvedConfig) -> Result<HttpCatalog> {
    if config.catalog.api_base.is_empty() {
        anyhow::bail!(
            "No catalog configured. Set catalog.api_base in .claimfetch/config.yaml or {}",
            ENV_CATALOG_URL
        );
    }

    HttpCatalog::new(
        &config.catalog.api_base,
        config.catalog.detail_base(),
        config.catalog.page_size,
    )
}

/// Run one acquisition pass
async fn run_acquisition(config: &ResolvedConfig) -> Result<()> {
    let catalog = catalog_client(config)?;
    let daemon = DaemonClient::connect(
        &config.daemon.url,
        Duration::from_secs(config.daemon.call_timeout_seconds),
    )
    .await
    .context("The fetch daemon is required; start it and try again")?;

    let tree = managed_tree(config);
    let options = RunOptions::from_config(config);

    println!("{}", "=".repeat(70));
    println!("Catalog:   {}", config.catalog.api_base);
    println!("Output:    {}", tree.root().display());
    println!("Pages:     {}", options.max_pages);
    println!("New only:  {}", options.check_new_only);
    if !options.excluded_tags.is_empty() {
        println!("Excluding: {}", options.excluded_tags.join(", "));
    }
    println!("{}", "=".repeat(70));

    let mut orchestrator = Orchestrator::open(daemon, catalog, tree)
        .await?
        .with_policy(config.acquisition.clone())
        .with_taxonomy(config.taxonomy.clone())
        .with_options(options);

    let ctx = orchestrator.run().await?;

    println!();
    println!("Run {} complete", ctx.run_id);
    println!("  Successful:        {}", ctx.successful);
    println!("  Failed:            {}", ctx.failed);
    if ctx.skipped_by_filter > 0 {
        println!("  Skipped by filter: {}", ctx.skipped_by_filter);
    }
    println!("  Already present:   {}", ctx.already_present);
    println!(
        "  Index:             {}",
        orchestrator.tracker().tree().index_json_path().display()
    );

    Ok(())
}

/// Load the index, reconcile it against the tree and save it back
async fn reconcile_index(config: &ResolvedConfig) -> Result<()> {
    let (tracker, index, report) = open_archive(managed_tree(config)).await?;

    index.save().await.context("Failed to save archive index")?;
    let written = write_reports(tracker.tree(), index.records())
        .await
        .context("Failed to write archive reports")?;

    println!("Index rows:        {}", index.len());
    println!("Current:           {}", report.current);
    println!("Updated (moved):   {}", report.updated);
    println!("Outside the tree:  {}", report.outside);
    println!("Missing:           {}", report.missing);
    println!("Folder READMEs:    {}", written.readmes);
    if report.is_clean() {
        println!("\nAll file paths are current");
    }

    Ok(())
}

/// Show ledger statistics
async fn show_stats(config: &ResolvedConfig) -> Result<()> {
    let tracker = DedupTracker::open(managed_tree(config))
        .await
        .context("Failed to open ledger")?;
    let stats = tracker.stats();

    println!("Ledger: {}", tracker.ledger().path().display());
    println!("  Total:      {}", stats.total);
    println!("  Successful: {}", stats.successful);
    println!("  Verified:   {}", stats.verified);
    println!("  Failed:     {}", stats.failed);

    Ok(())
}

/// Verify one file
async fn verify_file(path: PathBuf) -> Result<()> {
    let shown = path.display().to_string();
    let result = tokio::task::spawn_blocking(move || verify(&path))
        .await
        .context("Verification task failed")?;

    let marker = match (result.ok, result.degraded) {
        (false, _) => "FAILED",
        (true, true) => "DEGRADED",
        (true, false) => "OK",
    };
    println!("{}: {} ({})", marker, result.message, shown);

    if !result.ok {
        anyhow::bail!("Verification failed: {}", result.message);
    }
    Ok(())
}

/// List catalog tags
async fn list_tags(config: &ResolvedConfig, pages: u32) -> Result<()> {
    let catalog = catalog_client(config)?;
    let tags = catalog.list_tags(pages).await?;

    if tags.is_empty() {
        println!("No tags found");
        return Ok(());
    }

    println!("{} tags in the first {} pages:", tags.len(), pages);
    for tag in tags {
        println!("  {}", tag);
    }

    Ok(())
}

/// Show resolved configuration
fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    print!(
        "{}",
        serde_yaml::to_string(config).context("Failed to render configuration")?
    );

    Ok(())
}
