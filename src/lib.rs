//! orgsync - Mirror a GitHub organization into a local directory
//!
//! orgsync compares the checkouts under a root directory with the repositories
//! an organization owns, clones what is missing and updates what already
//! exists, using a bounded pool of concurrent workers.
//!
//! ## Modules
//!
//! - [`classify`]: Splitting local and remote names into clone/sync/other sets
//! - [`config`]: Configuration management and parsing
//! - [`discovery`]: Local checkout scanning and remote listing seams
//! - [`git`]: Clone and fetch/pull operations
//! - [`github`]: GitHub API integration and authentication
//! - [`report`]: Outcome aggregation and rendering
//! - [`sync`]: The orchestrating sync engine
//! - [`workers`]: The bounded worker pool

pub mod classify;
pub mod config;
pub mod discovery;
pub mod git;
pub mod github;
pub mod report;
pub mod sync;
pub mod workers;

pub use classify::{classify, ActionClass, RepoActions};
pub use config::Config;
pub use discovery::{CheckoutScanner, GhCliDiscovery, LocalDiscovery, RemoteDiscovery};
pub use git::{ActionExecutor, ActionFailure, CloneMethod, GitClient};
pub use github::GitHubClient;
pub use report::{ReportField, ReportFieldSelection, ReportStats, Reporter};
pub use sync::{SyncEngine, SyncOptions, SyncSummary};
pub use workers::{ActionKind, WorkItem, WorkerPool};
