/// Common test utilities and helpers for orgsync tests
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use orgsync::{ActionExecutor, ActionFailure, LocalDiscovery, RemoteDiscovery, ReportFieldSelection, SyncOptions};

/// Writer whose contents stay readable after being handed to the engine
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).expect("report is UTF-8")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Local side with a fixed checkout list
pub struct StubLocal {
    pub names: Vec<String>,
    pub root_is_checkout: bool,
    pub listed: Mutex<usize>,
}

impl StubLocal {
    pub fn new(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            names: names.iter().map(|s| s.to_string()).collect(),
            root_is_checkout: false,
            listed: Mutex::new(0),
        })
    }

    pub fn inside_checkout() -> Arc<Self> {
        Arc::new(Self {
            names: Vec::new(),
            root_is_checkout: true,
            listed: Mutex::new(0),
        })
    }
}

#[async_trait]
impl LocalDiscovery for StubLocal {
    async fn list_local_repositories(&self, _root: &Path) -> Result<Vec<String>> {
        *self.listed.lock().unwrap() += 1;
        Ok(self.names.clone())
    }

    async fn is_repository_checkout(&self, _path: &Path) -> bool {
        self.root_is_checkout
    }
}

/// Remote side with a fixed listing or a provider error
pub struct StubRemote {
    pub names: Result<Vec<String>, String>,
    pub requests: Mutex<Vec<(String, usize)>>,
}

impl StubRemote {
    pub fn new(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            names: Ok(names.iter().map(|s| s.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            names: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl RemoteDiscovery for StubRemote {
    async fn list_organization_repositories(&self, org: &str, limit: usize) -> Result<Vec<String>> {
        self.requests.lock().unwrap().push((org.to_string(), limit));
        self.names.clone().map_err(|message| anyhow!(message))
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}

/// Records every clone and sync call; fails the repositories it is told to
#[derive(Default)]
pub struct RecordingExecutor {
    pub clones: Mutex<Vec<(PathBuf, String, String)>>,
    pub syncs: Mutex<Vec<(PathBuf, String, String)>>,
    pub failing: HashSet<String>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
    }

    pub fn call_count(&self) -> usize {
        self.clones.lock().unwrap().len() + self.syncs.lock().unwrap().len()
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn clone_repo(&self, root: &Path, org: &str, name: &str) -> Result<(), ActionFailure> {
        self.clones
            .lock()
            .unwrap()
            .push((root.to_path_buf(), org.to_string(), name.to_string()));
        if self.failing.contains(name) {
            return Err(ActionFailure::Clone {
                diagnostic: format!("repository {} not found", name),
            });
        }
        Ok(())
    }

    async fn sync_repo(&self, root: &Path, org: &str, name: &str) -> Result<(), ActionFailure> {
        self.syncs
            .lock()
            .unwrap()
            .push((root.to_path_buf(), org.to_string(), name.to_string()));
        if self.failing.contains(name) {
            return Err(ActionFailure::Fetch {
                diagnostic: "could not read from remote repository".to_string(),
            });
        }
        Ok(())
    }
}

/// Options for a run against the stub collaborators
pub fn options(parallelism: usize, dry_run: bool, fields: &str) -> SyncOptions {
    SyncOptions {
        organization: "acme".to_string(),
        root: PathBuf::from("/work/acme"),
        parallelism,
        repo_list_limit: 100,
        dry_run,
        report_fields: fields
            .parse::<ReportFieldSelection>()
            .expect("valid report fields"),
    }
}
