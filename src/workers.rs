//! Bounded worker pool
//!
//! A fixed number of tokio tasks share one work channel. Each worker only pulls
//! the next [`WorkItem`] once it is idle, runs it through the
//! [`ActionExecutor`] and forwards the outcome to the reporter.
//!
//! Every item travels with a oneshot acknowledgement. The worker that receives
//! it answers immediately, and [`WorkerPool::enqueue`] returns only after that
//! answer, so the dispatcher never runs ahead of the workers.

use anyhow::{anyhow, Result};
use futures::future::join_all;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::git::ActionExecutor;
use crate::report::{Outcome, ReportEvent, ReporterHandle};

/// Smallest capacity tokio allows; the acknowledgement does the real handoff.
const WORK_CHANNEL_CAPACITY: usize = 1;

/// An item plus the signal its receiving worker fires on pickup
type Handoff = (WorkItem, oneshot::Sender<()>);

/// What to do with one repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Clone,
    Sync,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Clone => write!(f, "clone"),
            ActionKind::Sync => write!(f, "sync"),
        }
    }
}

/// One unit of dispatched work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub kind: ActionKind,
    pub repo: String,
    pub root: PathBuf,
    pub org: String,
}

impl WorkItem {
    pub fn clone_repo(repo: impl Into<String>, root: impl Into<PathBuf>, org: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Clone,
            repo: repo.into(),
            root: root.into(),
            org: org.into(),
        }
    }

    pub fn sync_repo(repo: impl Into<String>, root: impl Into<PathBuf>, org: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Sync,
            repo: repo.into(),
            root: root.into(),
            org: org.into(),
        }
    }
}

/// Fixed-size pool of workers draining a shared queue
pub struct WorkerPool {
    sender: mpsc::Sender<Handoff>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers
    pub fn start(
        worker_count: usize,
        executor: Arc<dyn ActionExecutor>,
        reporter: ReporterHandle,
    ) -> Result<Self> {
        if worker_count == 0 {
            return Err(anyhow!("worker count must be at least 1"));
        }

        let (sender, receiver) = mpsc::channel(WORK_CHANNEL_CAPACITY);
        let queue = Arc::new(Mutex::new(receiver));

        let workers = (0..worker_count)
            .map(|index| {
                tokio::spawn(Self::worker_loop(
                    index,
                    Arc::clone(&queue),
                    Arc::clone(&executor),
                    reporter.clone(),
                ))
            })
            .collect();

        debug!("started {} workers", worker_count);
        Ok(Self { sender, workers })
    }

    /// Hand an item to the pool, waiting until a worker has taken it
    pub async fn enqueue(&self, item: WorkItem) -> Result<()> {
        let repo = item.repo.clone();
        let (ack_tx, ack_rx) = oneshot::channel();

        self.sender
            .send((item, ack_tx))
            .await
            .map_err(|_| anyhow!("worker pool stopped before accepting {}", repo))?;

        ack_rx
            .await
            .map_err(|_| anyhow!("worker pool stopped before picking up {}", repo))
    }

    /// Stop accepting work and wait until every worker has exited
    pub async fn close_and_wait(self) -> Result<()> {
        drop(self.sender);

        let mut panicked = 0;
        for result in join_all(self.workers).await {
            if let Err(e) = result {
                error!("worker task failed: {}", e);
                panicked += 1;
            }
        }

        if panicked > 0 {
            return Err(anyhow!("{} worker(s) terminated abnormally", panicked));
        }
        Ok(())
    }

    async fn worker_loop(
        index: usize,
        queue: Arc<Mutex<mpsc::Receiver<Handoff>>>,
        executor: Arc<dyn ActionExecutor>,
        reporter: ReporterHandle,
    ) {
        Self::send(&reporter, ReportEvent::WorkerStarted { worker: index }).await;

        loop {
            // Only the worker holding the lock waits on the channel.
            let next = { queue.lock().await.recv().await };
            let Some((item, ack)) = next else {
                break;
            };
            if ack.send(()).is_err() {
                debug!("worker {} took {} after the dispatcher stopped waiting", index, item.repo);
            }

            debug!("worker {} picked up {} {}", index, item.kind, item.repo);
            let result = match item.kind {
                ActionKind::Clone => executor.clone_repo(&item.root, &item.org, &item.repo).await,
                ActionKind::Sync => executor.sync_repo(&item.root, &item.org, &item.repo).await,
            };

            let outcome = Outcome {
                kind: item.kind,
                repo: item.repo,
                worker: Some(index),
                result,
            };
            Self::send(&reporter, ReportEvent::Outcome(outcome)).await;
        }

        Self::send(&reporter, ReportEvent::WorkerFinished { worker: index }).await;
    }

    async fn send(reporter: &ReporterHandle, event: ReportEvent) {
        if let Err(e) = reporter.report(event).await {
            error!("{}", e);
        }
    }
}
