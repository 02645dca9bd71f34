use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orgsync::{Config, SyncEngine, SyncSummary};

#[derive(Parser)]
#[command(name = "orgsync")]
#[command(about = "Clone and update every repository of a GitHub organization")]
#[command(version)]
struct Cli {
    /// Organization to be synced
    #[arg(long)]
    org: Option<String>,

    /// Local path holding the checkouts [default: .]
    #[arg(long)]
    path: Option<String>,

    /// Number of concurrent clone/sync operations [default: 10]
    #[arg(long, visible_alias = "dop")]
    parallelism: Option<usize>,

    /// Maximum number of organization repositories to list [default: 5000]
    #[arg(long)]
    repo_list_limit: Option<usize>,

    /// Show what would be cloned and synced without doing it
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Report sections: error, cloned, synced, other, all (comma separated) [default: error]
    #[arg(long)]
    report: Option<String>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli)?;

    init_logging(cli.verbose, &config);
    info!("Starting orgsync v{}", env!("CARGO_PKG_VERSION"));

    let engine = SyncEngine::from_config(&config, cli.dry_run)?;
    let summary = engine.run(Box::new(std::io::stdout())).await?;

    print_summary(&summary);
    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Command line flags win over the configuration file
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(org) = &cli.org {
        config.organization = Some(org.clone());
    }
    if let Some(path) = &cli.path {
        config.root_path = path.clone();
        config.expand_paths()?;
    }
    if let Some(parallelism) = cli.parallelism {
        config.sync.parallelism = parallelism;
    }
    if let Some(limit) = cli.repo_list_limit {
        config.github.repo_list_limit = limit;
    }
    if let Some(report) = &cli.report {
        config.report.fields = report.clone();
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool, config: &Config) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(config.logging.color),
        )
        .with(filter)
        .init();
}

fn print_summary(summary: &SyncSummary) {
    if summary.is_dry_run() {
        println!(
            "{} to be cloned, {} to be synced and {} other",
            summary.actions.clone.len(),
            summary.actions.sync.len(),
            summary.actions.other.len()
        );
        return;
    }

    println!(
        "{} cloned, {} synced, {} failed. {} repos exist locally but not in {} ({:.2}s)",
        summary.cloned(),
        summary.synced(),
        summary.failed(),
        summary.actions.other.len(),
        summary.organization,
        summary.duration.as_secs_f64()
    );
}
