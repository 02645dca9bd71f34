//! Repository discovery abstraction layer
//!
//! This module provides the two name sources the sync engine reconciles: the
//! checkouts already present under the root directory, and the repositories an
//! organization owns on the hosting service.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::git::{CommandRunner, GitClient, ProcessRunner};

/// Lists the repository checkouts present in a local directory
#[async_trait]
pub trait LocalDiscovery: Send + Sync {
    /// Names of the immediate subdirectories of `root` that are checkouts
    async fn list_local_repositories(&self, root: &Path) -> Result<Vec<String>>;

    /// Whether `path` is itself inside a checkout
    async fn is_repository_checkout(&self, path: &Path) -> bool;
}

/// Lists the repositories owned by a remote organization
#[async_trait]
pub trait RemoteDiscovery: Send + Sync {
    /// At most `limit` repository names owned by `org`
    async fn list_organization_repositories(&self, org: &str, limit: usize) -> Result<Vec<String>>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

// =============================================================================
// Local checkout scanning
// =============================================================================

/// Scans a directory for git checkouts using `git rev-parse`
#[derive(Clone)]
pub struct CheckoutScanner {
    git: GitClient,
}

impl CheckoutScanner {
    pub fn new(git: GitClient) -> Self {
        Self { git }
    }
}

#[async_trait]
impl LocalDiscovery for CheckoutScanner {
    async fn list_local_repositories(&self, root: &Path) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(root)
            .await
            .with_context(|| format!("Failed to read directory: {}", root.display()))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to read directory: {}", root.display()))?
        {
            let file_type = entry
                .file_type()
                .await
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
            if !file_type.is_dir() {
                continue;
            }

            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!("Skipping directory with non UTF-8 name: {:?}", raw);
                    continue;
                }
            };

            if !self.git.is_checkout(&entry.path()).await {
                debug!("Not a checkout: {}", entry.path().display());
                continue;
            }

            names.push(name);
        }

        names.sort();
        info!("found {} local repos", names.len());
        Ok(names)
    }

    async fn is_repository_checkout(&self, path: &Path) -> bool {
        self.git.is_checkout(path).await
    }
}

// =============================================================================
// GitHub CLI listing
// =============================================================================

#[derive(Debug, Deserialize)]
struct GhRepoEntry {
    name: String,
}

/// Lists organization repositories through `gh repo list --json name`
#[derive(Clone)]
pub struct GhCliDiscovery {
    runner: Arc<dyn CommandRunner>,
}

impl GhCliDiscovery {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(ProcessRunner))
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn parse_names(json: &str) -> Result<Vec<String>> {
        let entries: Vec<GhRepoEntry> = serde_json::from_str(json)
            .context("Failed to parse JSON response from gh repo list")?;
        Ok(entries.into_iter().map(|entry| entry.name).collect())
    }
}

impl Default for GhCliDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteDiscovery for GhCliDiscovery {
    async fn list_organization_repositories(&self, org: &str, limit: usize) -> Result<Vec<String>> {
        let args: Vec<String> = vec![
            "repo".into(),
            "list".into(),
            org.into(),
            "-L".into(),
            limit.to_string(),
            "--json".into(),
            "name".into(),
        ];

        let output = self
            .runner
            .run("gh", &args)
            .await
            .context("Failed to execute gh repo list")?;

        if !output.success {
            return Err(anyhow!(
                "gh repo list {} failed: {}",
                org,
                output.diagnostic()
            ));
        }

        let names = Self::parse_names(&output.stdout)?;
        info!("found {} remote repos", names.len());
        Ok(names)
    }

    fn provider_name(&self) -> &'static str {
        "GitHub CLI"
    }
}
