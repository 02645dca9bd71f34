//! Sync Engine - Reconciles a local checkout tree with an organization
//!
//! The engine lists both sides, classifies every repository name, and then
//! either renders the plan (dry run) or dispatches clone and sync work to the
//! worker pool while the reporter aggregates the outcomes.

use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::classify::{classify, RepoActions};
use crate::config::{Config, ListingSource};
use crate::discovery::{CheckoutScanner, GhCliDiscovery, LocalDiscovery, RemoteDiscovery};
use crate::git::{ActionExecutor, GitClient};
use crate::github::GitHubClient;
use crate::report::{render_dry_run, ReportFieldSelection, ReportStats, Reporter};
use crate::workers::{WorkItem, WorkerPool};

/// Validated settings for one run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub organization: String,
    pub root: PathBuf,
    pub parallelism: usize,
    pub repo_list_limit: usize,
    pub dry_run: bool,
    pub report_fields: ReportFieldSelection,
}

impl SyncOptions {
    /// Build options from a configuration, rejecting invalid settings
    pub fn from_config(config: &Config, dry_run: bool) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            organization: config.organization()?.to_string(),
            root: PathBuf::from(&config.root_path),
            parallelism: config.sync.parallelism,
            repo_list_limit: config.github.repo_list_limit,
            dry_run,
            report_fields: config.report_fields()?,
        })
    }
}

/// Results from a complete sync operation
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub organization: String,
    pub actions: RepoActions,
    /// Aggregated outcomes, absent for a dry run
    pub stats: Option<ReportStats>,
    pub duration: Duration,
}

impl SyncSummary {
    pub fn is_dry_run(&self) -> bool {
        self.stats.is_none()
    }

    pub fn cloned(&self) -> usize {
        self.stats.as_ref().map_or(0, |s| s.clone.succeeded)
    }

    pub fn synced(&self) -> usize {
        self.stats.as_ref().map_or(0, |s| s.sync.succeeded)
    }

    pub fn failed(&self) -> usize {
        self.stats
            .as_ref()
            .map_or(0, |s| s.clone.failed + s.sync.failed)
    }
}

/// The main sync engine that orchestrates repository synchronization
#[derive(Clone)]
pub struct SyncEngine {
    options: SyncOptions,
    local: Arc<dyn LocalDiscovery>,
    remote: Arc<dyn RemoteDiscovery>,
    executor: Arc<dyn ActionExecutor>,
}

impl SyncEngine {
    pub fn new(
        options: SyncOptions,
        local: Arc<dyn LocalDiscovery>,
        remote: Arc<dyn RemoteDiscovery>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            options,
            local,
            remote,
            executor,
        }
    }

    /// Create a sync engine backed by git, gh and the GitHub API
    pub fn from_config(config: &Config, dry_run: bool) -> Result<Self> {
        let options = SyncOptions::from_config(config, dry_run)?;

        let git = GitClient::new(config.github.clone_method, config.github.host.clone())
            .prune(config.sync.prune)
            .fast_forward_only(config.sync.fast_forward_only);

        let remote: Arc<dyn RemoteDiscovery> = match config.github.source {
            ListingSource::Api => Arc::new(GitHubClient::new(&config.github)?),
            ListingSource::GhCli => Arc::new(GhCliDiscovery::new()),
        };

        Ok(Self::new(
            options,
            Arc::new(CheckoutScanner::new(git.clone())),
            remote,
            Arc::new(git),
        ))
    }

    /// Check preconditions, list both sides and classify them
    pub async fn plan(&self) -> Result<RepoActions> {
        let root = &self.options.root;

        if self.local.is_repository_checkout(root).await {
            return Err(anyhow!(
                "should not be run inside a git repository: {}",
                root.display()
            ));
        }

        let local = self
            .local
            .list_local_repositories(root)
            .await
            .context("Failed to list local repositories")?;

        let remote = self
            .remote
            .list_organization_repositories(&self.options.organization, self.options.repo_list_limit)
            .await
            .with_context(|| {
                format!(
                    "Failed to list repositories of {} from {}",
                    self.options.organization,
                    self.remote.provider_name()
                )
            })?;

        let actions = classify(local, remote);
        info!(
            "{} to be cloned, {} to be synced and {} other",
            actions.clone.len(),
            actions.sync.len(),
            actions.other.len()
        );
        if actions.is_empty() {
            info!("nothing to do for {}", self.options.organization);
        }

        Ok(actions)
    }

    /// Run a complete sync operation, writing the report to `out`
    pub async fn run(&self, mut out: Box<dyn Write + Send>) -> Result<SyncSummary> {
        let start_time = Instant::now();
        let actions = self.plan().await?;

        if self.options.dry_run {
            out.write_all(render_dry_run(&actions).as_bytes())
                .context("Failed to write dry run report")?;
            out.flush().context("Failed to write dry run report")?;

            return Ok(SyncSummary {
                organization: self.options.organization.clone(),
                actions,
                stats: None,
                duration: start_time.elapsed(),
            });
        }

        let reporter = Reporter::start(
            actions.clone.len(),
            actions.sync.len(),
            actions.other.clone(),
            self.options.report_fields.clone(),
            out,
        );

        let pool = WorkerPool::start(
            self.options.parallelism,
            Arc::clone(&self.executor),
            reporter.handle(),
        )?;

        let dispatched = self.dispatch(&pool, &actions).await;

        // The pool must drain before the reporter can see its channel close.
        pool.close_and_wait().await?;
        let stats = reporter.finish().await?;
        dispatched?;

        let duration = start_time.elapsed();
        info!(
            "Sync completed in {:.2}s: {} cloned, {} synced, {} failed",
            duration.as_secs_f64(),
            stats.clone.succeeded,
            stats.sync.succeeded,
            stats.clone.failed + stats.sync.failed
        );

        Ok(SyncSummary {
            organization: self.options.organization.clone(),
            actions,
            stats: Some(stats),
            duration,
        })
    }

    /// Enqueue every clone, then every sync
    async fn dispatch(&self, pool: &WorkerPool, actions: &RepoActions) -> Result<()> {
        let root = &self.options.root;
        let org = &self.options.organization;

        for name in &actions.clone {
            pool.enqueue(WorkItem::clone_repo(name.as_str(), root.clone(), org.as_str()))
                .await?;
        }
        for name in &actions.sync {
            pool.enqueue(WorkItem::sync_repo(name.as_str(), root.clone(), org.as_str()))
                .await?;
        }

        debug!(
            "dispatched {} work items",
            actions.clone.len() + actions.sync.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = Config {
            organization: Some("acme".to_string()),
            root_path: "/srv/acme".to_string(),
            ..Default::default()
        };

        let options = SyncOptions::from_config(&config, true).expect("config is valid");

        assert_eq!(options.organization, "acme");
        assert_eq!(options.root, PathBuf::from("/srv/acme"));
        assert_eq!(options.parallelism, 10);
        assert_eq!(options.repo_list_limit, 5000);
        assert!(options.dry_run);
        assert_eq!(options.report_fields, ReportFieldSelection::default());
    }

    #[test]
    fn test_options_reject_invalid_report_fields() {
        let mut config = Config {
            organization: Some("acme".to_string()),
            ..Default::default()
        };
        config.report.fields = "error,error".to_string();

        assert!(SyncOptions::from_config(&config, false).is_err());
    }

    #[test]
    fn test_summary_counts() {
        let mut stats = ReportStats::new(2, 2, vec!["x".to_string()]);
        stats.clone.succeeded = 2;
        stats.sync.succeeded = 1;
        stats.sync.failed = 1;

        let summary = SyncSummary {
            organization: "acme".to_string(),
            actions: RepoActions::default(),
            stats: Some(stats),
            duration: Duration::from_secs(1),
        };

        assert!(!summary.is_dry_run());
        assert_eq!(summary.cloned(), 2);
        assert_eq!(summary.synced(), 1);
        assert_eq!(summary.failed(), 1);
    }
}
