//! Outcome aggregation and report rendering
//!
//! A single reporter task owns the [`ReportStats`] accumulator. Workers hand
//! their outcome events to it through a bounded channel, so no lock guards the
//! statistics. When the pool has drained, [`Reporter::finish`] closes the
//! channel, waits for every queued event to be applied and writes the sections
//! selected by the caller.

use anyhow::{Context, Result};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classify::{ActionClass, RepoActions};
use crate::git::ActionFailure;
use crate::workers::ActionKind;

/// Events buffered between the workers and the reporter task
pub const REPORT_CHANNEL_CAPACITY: usize = 1000;

/// Marker printed in place of an empty section
pub const NOTHING_TO_DO: &str = "nothing to do";

/// One selectable section of the final report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportField {
    Error,
    Cloned,
    Synced,
    Other,
    All,
}

impl ReportField {
    /// Concrete sections `all` stands for, in render order
    pub const SECTIONS: [ReportField; 4] = [
        ReportField::Error,
        ReportField::Cloned,
        ReportField::Synced,
        ReportField::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportField::Error => "error",
            ReportField::Cloned => "cloned",
            ReportField::Synced => "synced",
            ReportField::Other => "other",
            ReportField::All => "all",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ReportField::Error => "Errors",
            ReportField::Cloned => "Cloned",
            ReportField::Synced => "Synced",
            ReportField::Other => "Other",
            ReportField::All => "All",
        }
    }
}

impl FromStr for ReportField {
    type Err = ReportFieldError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "error" => Ok(ReportField::Error),
            "cloned" => Ok(ReportField::Cloned),
            "synced" => Ok(ReportField::Synced),
            "other" => Ok(ReportField::Other),
            "all" => Ok(ReportField::All),
            other => Err(ReportFieldError::Unknown(other.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportFieldError {
    #[error("no report fields given")]
    Empty,

    #[error("unknown report field: {0:?} (expected error, cloned, synced, other or all)")]
    Unknown(String),

    #[error("duplicate report field: {0}")]
    Duplicate(String),
}

/// Validated, ordered set of report sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFieldSelection {
    sections: Vec<ReportField>,
}

impl ReportFieldSelection {
    /// Sections to render, in order, with `all` already expanded
    pub fn sections(&self) -> &[ReportField] {
        &self.sections
    }
}

impl Default for ReportFieldSelection {
    fn default() -> Self {
        Self {
            sections: vec![ReportField::Error],
        }
    }
}

impl FromStr for ReportFieldSelection {
    type Err = ReportFieldError;

    /// Parse a comma separated list such as `error,cloned`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let entries: Vec<&str> = s.split(',').map(str::trim).collect();
        if entries.iter().all(|raw| raw.is_empty()) {
            return Err(ReportFieldError::Empty);
        }

        let mut seen: Vec<ReportField> = Vec::new();
        for raw in entries {
            let field: ReportField = raw.parse()?;
            if seen.contains(&field) {
                return Err(ReportFieldError::Duplicate(raw.to_string()));
            }
            seen.push(field);
        }

        let mut sections = Vec::new();
        for field in seen {
            let expanded: &[ReportField] = if field == ReportField::All {
                &ReportField::SECTIONS
            } else {
                std::slice::from_ref(&field)
            };
            for section in expanded {
                if !sections.contains(section) {
                    sections.push(*section);
                }
            }
        }

        Ok(Self { sections })
    }
}

/// Result of one clone or sync attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub kind: ActionKind,
    pub repo: String,
    pub worker: Option<usize>,
    pub result: std::result::Result<(), ActionFailure>,
}

/// Message consumed by the reporter task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Outcome(Outcome),
    WorkerStarted { worker: usize },
    WorkerFinished { worker: usize },
}

/// A failed repository with its attributed reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFailure {
    pub repo: String,
    pub failure: ActionFailure,
}

/// Counters and names for one action kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub names: Vec<String>,
    pub errors: Vec<RepoFailure>,
}

impl ActionStats {
    fn with_total(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Every expected outcome has been recorded
    pub fn is_complete(&self) -> bool {
        self.succeeded + self.failed == self.total
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub started: usize,
    pub finished: usize,
}

/// Aggregated outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub clone: ActionStats,
    pub sync: ActionStats,
    pub other: Vec<String>,
    pub workers: WorkerStats,
}

impl ReportStats {
    pub fn new(clone_total: usize, sync_total: usize, other: Vec<String>) -> Self {
        Self {
            clone: ActionStats::with_total(clone_total),
            sync: ActionStats::with_total(sync_total),
            other,
            workers: WorkerStats::default(),
        }
    }

    fn action_mut(&mut self, kind: ActionKind) -> &mut ActionStats {
        match kind {
            ActionKind::Clone => &mut self.clone,
            ActionKind::Sync => &mut self.sync,
        }
    }

    /// Apply one event to the accumulator
    pub fn record(&mut self, event: ReportEvent) {
        match event {
            ReportEvent::Outcome(outcome) => {
                let stats = self.action_mut(outcome.kind);
                match outcome.result {
                    Ok(()) => {
                        stats.succeeded += 1;
                        stats.names.push(outcome.repo);
                    }
                    Err(failure) => {
                        debug!("{} {} failed: {}", outcome.kind, outcome.repo, failure);
                        stats.failed += 1;
                        stats.errors.push(RepoFailure {
                            repo: outcome.repo,
                            failure,
                        });
                    }
                }
            }
            ReportEvent::WorkerStarted { worker } => {
                self.workers.started += 1;
                debug!("worker {} started", worker);
            }
            ReportEvent::WorkerFinished { worker } => {
                self.workers.finished += 1;
                debug!("worker {} finished", worker);
            }
        }
    }

    /// Render the selected sections
    pub fn render(&self, selection: &ReportFieldSelection) -> String {
        SelectedSections {
            stats: self,
            selection,
        }
        .to_string()
    }

    fn write_errors(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", ReportField::Error.title())?;

        let failures: Vec<&RepoFailure> = self
            .clone
            .errors
            .iter()
            .chain(self.sync.errors.iter())
            .collect();

        if failures.is_empty() {
            return writeln!(f, "{}", NOTHING_TO_DO);
        }

        for (i, failure) in failures.iter().enumerate() {
            writeln!(
                f,
                "{:>5} {}: {}",
                i + 1,
                failure.repo,
                single_line(&failure.failure.to_string())
            )?;
        }
        Ok(())
    }
}

/// The sections of a finished run picked by a [`ReportFieldSelection`]
struct SelectedSections<'a> {
    stats: &'a ReportStats,
    selection: &'a ReportFieldSelection,
}

impl fmt::Display for SelectedSections<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in self.selection.sections() {
            match section {
                ReportField::Error => self.stats.write_errors(f)?,
                ReportField::Cloned => write_section(f, section.title(), &self.stats.clone.names)?,
                ReportField::Synced => write_section(f, section.title(), &self.stats.sync.names)?,
                ReportField::Other => write_section(f, section.title(), &self.stats.other)?,
                ReportField::All => {}
            }
        }
        Ok(())
    }
}

/// Planned actions, rendered without performing any of them
struct DryRunSections<'a>(&'a RepoActions);

impl fmt::Display for DryRunSections<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in [ActionClass::Clone, ActionClass::Sync, ActionClass::Other] {
            write_section(f, &class.to_string(), self.0.names(class))?;
        }
        Ok(())
    }
}

fn write_section(f: &mut fmt::Formatter<'_>, title: &str, values: &[String]) -> fmt::Result {
    writeln!(f, "{}", title)?;
    if values.is_empty() {
        return writeln!(f, "{}", NOTHING_TO_DO);
    }

    for (i, value) in values.iter().enumerate() {
        writeln!(f, "{:>5} {}", i + 1, value)?;
    }
    Ok(())
}

/// Collapse multi-line tool output so each failure stays on its numbered line
fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Render the planned actions without performing any of them
pub fn render_dry_run(actions: &RepoActions) -> String {
    DryRunSections(actions).to_string()
}

/// Cheap cloneable sender workers use to deliver events
#[derive(Clone)]
pub struct ReporterHandle {
    tx: mpsc::Sender<ReportEvent>,
}

impl ReporterHandle {
    /// Queue an event; waits only while the channel is full
    pub async fn report(&self, event: ReportEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("reporter is no longer accepting events"))
    }
}

/// The aggregating task and its inbound channel
pub struct Reporter {
    handle: ReporterHandle,
    task: JoinHandle<Result<ReportStats>>,
}

impl Reporter {
    /// Spawn the reporter task with the expected totals for this run
    pub fn start(
        clone_total: usize,
        sync_total: usize,
        other: Vec<String>,
        selection: ReportFieldSelection,
        sink: Box<dyn Write + Send>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
        let stats = ReportStats::new(clone_total, sync_total, other);
        let task = tokio::spawn(Self::process(rx, stats, selection, sink));

        Self {
            handle: ReporterHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> ReporterHandle {
        self.handle.clone()
    }

    /// Close the inbound channel, wait for the queue to drain and the report
    /// to be written.
    ///
    /// Every other [`ReporterHandle`] must have been dropped first, otherwise
    /// the channel never closes.
    pub async fn finish(self) -> Result<ReportStats> {
        drop(self.handle);
        self.task.await.context("Reporter task panicked")?
    }

    async fn process(
        mut rx: mpsc::Receiver<ReportEvent>,
        mut stats: ReportStats,
        selection: ReportFieldSelection,
        mut sink: Box<dyn Write + Send>,
    ) -> Result<ReportStats> {
        while let Some(event) = rx.recv().await {
            stats.record(event);
        }

        for (kind, action) in [(ActionKind::Clone, &stats.clone), (ActionKind::Sync, &stats.sync)] {
            if !action.is_complete() {
                warn!(
                    "{} outcomes missing: expected {}, got {}",
                    kind,
                    action.total,
                    action.succeeded + action.failed
                );
            }
        }

        info!(
            "stats: workers: started={} finished={}, clone: total={} succeeded={} failed={}, \
             sync: total={} succeeded={} failed={}, other: total={}",
            stats.workers.started,
            stats.workers.finished,
            stats.clone.total,
            stats.clone.succeeded,
            stats.clone.failed,
            stats.sync.total,
            stats.sync.succeeded,
            stats.sync.failed,
            stats.other.len()
        );

        let rendered = stats.render(&selection);
        sink.write_all(rendered.as_bytes())
            .context("Failed to write report")?;
        sink.flush().context("Failed to write report")?;

        Ok(stats)
    }
}
