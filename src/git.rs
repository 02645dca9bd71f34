use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info};

/// Captured result of one external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Diagnostic text for a failed command: stderr if any, otherwise the exit code
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.code {
            Some(code) => format!("exit status: {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs external programs on behalf of the git client
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// Spawns real processes through tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let output = AsyncCommand::new(program).args(args).output().await?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// How new checkouts are created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloneMethod {
    /// `gh repo clone <org>/<name>`, uses the GitHub CLI credentials
    #[default]
    GhCli,
    /// `git clone https://<host>/<org>/<name>.git`
    Https,
    /// `git clone git@<host>:<org>/<name>.git`
    Ssh,
}

/// Why a single clone or sync attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionFailure {
    #[error("clone failed: {diagnostic}")]
    Clone { diagnostic: String },

    #[error("fetch failed: {diagnostic}")]
    Fetch { diagnostic: String },

    #[error("pull failed: {diagnostic}")]
    Pull { diagnostic: String },
}

/// Per-repository operations performed by the worker pool.
///
/// Both operations are terminal for this run: a failure is reported, never
/// retried.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Create a new checkout of `org/name` at `root/name`
    async fn clone_repo(&self, root: &Path, org: &str, name: &str) -> Result<(), ActionFailure>;

    /// Update the existing checkout at `root/name`
    async fn sync_repo(&self, root: &Path, org: &str, name: &str) -> Result<(), ActionFailure>;
}

/// Git operations handler backed by the `git` and `gh` executables
#[derive(Clone)]
pub struct GitClient {
    runner: Arc<dyn CommandRunner>,
    clone_method: CloneMethod,
    host: String,
    prune: bool,
    fast_forward_only: bool,
}

impl GitClient {
    /// Create a git client that spawns real processes
    pub fn new(clone_method: CloneMethod, host: impl Into<String>) -> Self {
        Self::with_runner(Arc::new(ProcessRunner), clone_method, host)
    }

    pub fn with_runner(
        runner: Arc<dyn CommandRunner>,
        clone_method: CloneMethod,
        host: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            clone_method,
            host: host.into(),
            prune: true,
            fast_forward_only: false,
        }
    }

    /// Pass `-p` to fetch
    pub fn prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    /// Pass `--ff-only` to pull
    pub fn fast_forward_only(mut self, fast_forward_only: bool) -> Self {
        self.fast_forward_only = fast_forward_only;
        self
    }

    /// Whether `path` is inside a git working tree
    pub async fn is_checkout(&self, path: &Path) -> bool {
        let args = vec![
            "-C".to_string(),
            path.to_string_lossy().into_owned(),
            "rev-parse".to_string(),
        ];

        match self.runner.run("git", &args).await {
            Ok(output) => output.success,
            Err(e) => {
                debug!("git rev-parse could not run in {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Clone URL for the configured method
    pub fn clone_url(&self, org: &str, name: &str) -> String {
        match self.clone_method {
            CloneMethod::GhCli => format!("{}/{}", org, name),
            CloneMethod::Https => format!("https://{}/{}/{}.git", self.host, org, name),
            CloneMethod::Ssh => format!("git@{}:{}/{}.git", self.host, org, name),
        }
    }

    fn checkout_path(root: &Path, name: &str) -> PathBuf {
        root.join(name)
    }

    async fn run_step(&self, program: &str, args: Vec<String>) -> Result<CommandOutput, String> {
        debug!("Running: {} {}", program, args.join(" "));
        match self.runner.run(program, &args).await {
            Ok(output) if output.success => Ok(output),
            Ok(output) => Err(output.diagnostic()),
            Err(e) => Err(format!("failed to execute {}: {}", program, e)),
        }
    }

    async fn git_fetch(&self, path: &Path) -> Result<(), ActionFailure> {
        let mut args = vec![
            "-C".to_string(),
            path.to_string_lossy().into_owned(),
            "fetch".to_string(),
        ];
        if self.prune {
            args.push("-p".to_string());
        }

        self.run_step("git", args)
            .await
            .map(|_| ())
            .map_err(|diagnostic| ActionFailure::Fetch { diagnostic })
    }

    async fn git_pull(&self, path: &Path) -> Result<(), ActionFailure> {
        let mut args = vec![
            "-C".to_string(),
            path.to_string_lossy().into_owned(),
            "pull".to_string(),
        ];
        if self.fast_forward_only {
            args.push("--ff-only".to_string());
        }

        self.run_step("git", args)
            .await
            .map(|_| ())
            .map_err(|diagnostic| ActionFailure::Pull { diagnostic })
    }
}

#[async_trait]
impl ActionExecutor for GitClient {
    async fn clone_repo(&self, root: &Path, org: &str, name: &str) -> Result<(), ActionFailure> {
        let target = Self::checkout_path(root, name);
        let target_arg = target.to_string_lossy().into_owned();
        let source = self.clone_url(org, name);

        let (program, args) = match self.clone_method {
            CloneMethod::GhCli => (
                "gh",
                vec!["repo".to_string(), "clone".to_string(), source, target_arg],
            ),
            CloneMethod::Https | CloneMethod::Ssh => {
                ("git", vec!["clone".to_string(), source, target_arg])
            }
        };

        self.run_step(program, args)
            .await
            .map_err(|diagnostic| ActionFailure::Clone { diagnostic })?;

        info!("{} cloned", name);
        Ok(())
    }

    async fn sync_repo(&self, root: &Path, _org: &str, name: &str) -> Result<(), ActionFailure> {
        let path = Self::checkout_path(root, name);

        // A failed fetch leaves the checkout untouched; pull is never attempted.
        self.git_fetch(&path).await?;
        self.git_pull(&path).await?;

        info!("{} synced", name);
        Ok(())
    }
}
