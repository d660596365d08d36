//! Run orchestration.
//!
//! Selected cases are grouped by build target. Each target runs one sequence:
//! build, execute the binary with a combined filter, evaluate the JSON report.
//! Target sequences run concurrently and report through a channel to a single
//! control loop, which alone updates the [`RunReport`] and the observer.

mod error;
pub mod filter;
mod observer;

pub use error::RunError;
pub use observer::{NullObserver, RunObserver};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{BuildConfig, BUILD_STOPPED_MARKER};
use crate::discovery::{TestCase, TestItem};
use crate::manifest::BuildTarget;
use crate::process::{CommandRunner, CommandSpec, OutputLine, ProcessOutcome};
use crate::results::{evaluate, OutcomeStatus, ResultError, TestOutcome, TestReport};

/// What the user asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRequest {
    /// Every document with discovered tests.
    All,
    /// Selected tree items.
    Items(Vec<TestItem>),
}

/// Selected cases of one document, resolved to its build target.
#[derive(Debug, Clone)]
pub struct RootSelection {
    pub file: PathBuf,
    /// `None` when no target of the manifest compiles the file.
    pub target: Option<BuildTarget>,
    pub cases: Vec<TestCase>,
    /// Every case of the document is selected.
    pub whole_file: bool,
}

impl RootSelection {
    /// Selection handles of the selected cases. A root without cases, such
    /// as a file no target compiles, is addressed by its file handle.
    pub fn items(&self) -> Vec<TestItem> {
        if self.cases.is_empty() {
            return vec![TestItem::File(self.file.clone())];
        }
        self.cases
            .iter()
            .map(|case| TestItem::Case {
                file: self.file.clone(),
                canonical_id: case.canonical_id.clone(),
            })
            .collect()
    }
}

/// Where targets are built and how results are collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub build_folder: PathBuf,
    pub build_tool: PathBuf,
    pub results_dir: PathBuf,
}

impl RunSettings {
    pub fn from_config(config: &BuildConfig, workspace_root: &Path) -> Self {
        Self {
            build_folder: config.build_folder(workspace_root),
            build_tool: PathBuf::from(&config.tool),
            results_dir: config.results_path(workspace_root),
        }
    }
}

/// Final state of a target sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum TargetStatus {
    Completed,
    BuildFailed(String),
    Errored(String),
    Cancelled,
}

/// Final state of a requested case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
    Errored,
}

/// Case counts of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.errored
    }
}

/// Record of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub targets: BTreeMap<String, TargetStatus>,
    pub cases: BTreeMap<TestItem, CaseStatus>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            cancelled: false,
            targets: BTreeMap::new(),
            cases: BTreeMap::new(),
        }
    }

    /// Records a terminal status. Returns false if the case already had one;
    /// terminal statuses are never replaced.
    fn record(&mut self, item: &TestItem, status: CaseStatus) -> bool {
        if self.cases.contains_key(item) {
            return false;
        }
        self.cases.insert(item.clone(), status);
        true
    }

    pub fn status(&self, item: &TestItem) -> Option<CaseStatus> {
        self.cases.get(item).copied()
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for status in self.cases.values() {
            match status {
                CaseStatus::Passed => summary.passed += 1,
                CaseStatus::Failed => summary.failed += 1,
                CaseStatus::Skipped => summary.skipped += 1,
                CaseStatus::Errored => summary.errored += 1,
            }
        }
        summary
    }

    /// True if the run finished and nothing failed or errored.
    pub fn success(&self) -> bool {
        let summary = self.summary();
        !self.cancelled && summary.failed == 0 && summary.errored == 0
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

/// Messages from target sequences to the control loop.
#[derive(Debug)]
enum RunEvent {
    Output {
        target: String,
        line: OutputLine,
    },
    Outcome {
        item: TestItem,
        result: Result<TestOutcome, ResultError>,
    },
    Aborted {
        items: Vec<TestItem>,
        error: RunError,
    },
    Cancelled {
        items: Vec<TestItem>,
    },
    TargetFinished {
        target: String,
        status: TargetStatus,
    },
}

/// Cases of one build target.
#[derive(Debug)]
struct TargetPlan {
    target: BuildTarget,
    selections: Vec<RootSelection>,
}

impl TargetPlan {
    fn filter(&self) -> String {
        let whole_binary = matches!(&self.selections[..], [only] if only.whole_file);
        filter::combine(self.selections.iter().flat_map(|s| &s.cases), whole_binary)
    }

    fn cases(&self) -> (Vec<TestItem>, Vec<TestCase>) {
        let items = self.selections.iter().flat_map(RootSelection::items).collect();
        let cases = self
            .selections
            .iter()
            .flat_map(|s| s.cases.iter().cloned())
            .collect();
        (items, cases)
    }
}

/// Drives build, execution and evaluation of selected cases.
pub struct RunOrchestrator {
    runner: Arc<dyn CommandRunner>,
    settings: RunSettings,
}

impl RunOrchestrator {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: RunSettings) -> Self {
        Self { runner, settings }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run the selections to completion or cancellation.
    ///
    /// Documents without a build target are reported as errored and do not
    /// affect the others. On cancellation, steps not yet started never start,
    /// and cases without a terminal status are reported as skipped.
    pub async fn run(
        &self,
        selections: Vec<RootSelection>,
        observer: &mut dyn RunObserver,
        cancel: CancellationToken,
    ) -> RunReport {
        let mut report = RunReport::new();
        let run_id = report.run_id.clone();
        info!(run_id = %run_id, roots = selections.len(), "starting test run");

        let mut requested = Vec::new();
        let mut plans: BTreeMap<String, TargetPlan> = BTreeMap::new();
        for selection in selections {
            let items = selection.items();
            match selection.target.clone() {
                Some(target) => {
                    for item in &items {
                        observer.started(item);
                    }
                    requested.extend(items);
                    plans
                        .entry(target.name.clone())
                        .or_insert_with(|| TargetPlan {
                            target,
                            selections: Vec::new(),
                        })
                        .selections
                        .push(selection);
                }
                None => {
                    let err = RunError::TargetUnresolved {
                        file: selection.file.clone(),
                    };
                    warn!(file = %selection.file.display(), "document has no build target");
                    let message = err.to_string();
                    for item in &items {
                        if report.record(item, CaseStatus::Errored) {
                            observer.errored(item, &message);
                        }
                    }
                }
            }
        }

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let sequences = join_all(plans.into_values().map(|plan| {
            self.run_target(plan, run_id.clone(), cancel.child_token(), events_tx.clone())
        }));
        drop(events_tx);

        let control = async {
            while let Some(event) = events_rx.recv().await {
                apply_event(event, &mut report, observer);
            }
        };
        tokio::join!(sequences, control);

        report.cancelled = cancel.is_cancelled();
        let fallback = if report.cancelled {
            CaseStatus::Skipped
        } else {
            CaseStatus::Errored
        };
        for item in &requested {
            if report.record(item, fallback) {
                match fallback {
                    CaseStatus::Skipped => observer.skipped(item),
                    _ => observer.errored(item, "no result was produced"),
                }
            }
        }
        report.finished_at = Some(Utc::now());

        let summary = report.summary();
        info!(
            run_id = %report.run_id,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            errored = summary.errored,
            cancelled = report.cancelled,
            "test run finished"
        );
        report
    }

    async fn run_target(
        &self,
        plan: TargetPlan,
        run_id: String,
        cancel: CancellationToken,
        events: mpsc::UnboundedSender<RunEvent>,
    ) {
        let name = plan.target.name.clone();
        let (items, cases) = plan.cases();

        let status = match self
            .build_and_test(&plan, &run_id, &cases, &cancel, &events)
            .await
        {
            Ok(results) => {
                for (item, result) in items.into_iter().zip(results) {
                    let _ = events.send(RunEvent::Outcome { item, result });
                }
                TargetStatus::Completed
            }
            Err(RunError::Cancelled) => {
                info!(target_name = %name, "target cancelled");
                let _ = events.send(RunEvent::Cancelled { items });
                TargetStatus::Cancelled
            }
            Err(err) => {
                error!(target_name = %name, error = %err, "target failed");
                let status = match &err {
                    RunError::BuildFailed { reason, .. } => TargetStatus::BuildFailed(reason.clone()),
                    other => TargetStatus::Errored(other.to_string()),
                };
                let _ = events.send(RunEvent::Aborted { items, error: err });
                status
            }
        };

        let _ = events.send(RunEvent::TargetFinished {
            target: name,
            status,
        });
    }

    async fn build_and_test(
        &self,
        plan: &TargetPlan,
        run_id: &str,
        cases: &[TestCase],
        cancel: &CancellationToken,
        events: &mpsc::UnboundedSender<RunEvent>,
    ) -> Result<Vec<Result<TestOutcome, ResultError>>, RunError> {
        let target = &plan.target;

        let build = CommandSpec::new(&self.settings.build_tool)
            .arg(&target.name)
            .current_dir(&self.settings.build_folder);
        info!(target_name = %target.name, "building target");
        let (outcome, stopped) = self.execute(&build, &target.name, cancel, events).await;
        match outcome {
            ProcessOutcome::Cancelled => return Err(RunError::Cancelled),
            outcome if stopped || !outcome.is_success() => {
                let reason = if stopped {
                    BUILD_STOPPED_MARKER.to_string()
                } else {
                    outcome.to_string()
                };
                return Err(RunError::BuildFailed {
                    target: target.name.clone(),
                    reason,
                });
            }
            _ => {}
        }
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let results_dir = &self.settings.results_dir;
        tokio::fs::create_dir_all(results_dir)
            .await
            .map_err(|source| RunError::Io {
                path: results_dir.clone(),
                source,
            })?;
        let result_path = results_dir.join(result_file_name(&target.name, run_id));
        // A stale file would be read as this run's output.
        let _ = tokio::fs::remove_file(&result_path).await;

        let filter = plan.filter();
        let command = CommandSpec::new(&target.executable_path)
            .arg(format!("--gtest_filter={filter}"))
            .arg(format!("--gtest_output=json:{}", result_path.display()))
            .current_dir(&self.settings.build_folder);
        info!(target_name = %target.name, filter = %filter, "running tests");
        let (outcome, _) = self.execute(&command, &target.name, cancel, events).await;
        match &outcome {
            ProcessOutcome::Cancelled => return Err(RunError::Cancelled),
            ProcessOutcome::SpawnError(_) => {
                return Err(RunError::Execution {
                    target: target.name.clone(),
                    outcome: outcome.clone(),
                })
            }
            ProcessOutcome::Failed { code } => {
                debug!(target_name = %target.name, code, "test binary reported failures")
            }
            _ => {}
        }
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let read = TestReport::read(&result_path).await;
        if let Err(e) = tokio::fs::remove_file(&result_path).await {
            debug!(path = %result_path.display(), error = %e, "result file not removed");
        }
        let report = match read {
            Ok(report) => report,
            Err(err @ ResultError::Unavailable { .. })
                if matches!(outcome, ProcessOutcome::Signaled { .. }) =>
            {
                debug!(error = %err, "no report from crashed test binary");
                return Err(RunError::Execution {
                    target: target.name.clone(),
                    outcome,
                });
            }
            Err(err) => return Err(err.into()),
        };

        Ok(evaluate(&report, cases))
    }

    /// Run a command, forwarding its output to the control loop. The flag is
    /// set if any line carried the build failure marker.
    async fn execute(
        &self,
        command: &CommandSpec,
        target: &str,
        cancel: &CancellationToken,
        events: &mpsc::UnboundedSender<RunEvent>,
    ) -> (ProcessOutcome, bool) {
        let (output_tx, mut output_rx) = mpsc::unbounded_channel::<OutputLine>();
        let forward = async {
            let mut stopped = false;
            while let Some(line) = output_rx.recv().await {
                stopped |= line.text.contains(BUILD_STOPPED_MARKER);
                let _ = events.send(RunEvent::Output {
                    target: target.to_string(),
                    line,
                });
            }
            stopped
        };
        tokio::join!(self.runner.run(command, cancel.clone(), output_tx), forward)
    }
}

fn result_file_name(target: &str, run_id: &str) -> String {
    let target: String = target
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{target}-{run_id}.json")
}

fn apply_event(event: RunEvent, report: &mut RunReport, observer: &mut dyn RunObserver) {
    match event {
        RunEvent::Output { target, line } => {
            debug!(target_name = %target, "{}", line.text);
            observer.output(&target, &line);
        }
        RunEvent::Outcome { item, result } => match result {
            Ok(outcome) => match outcome.status {
                OutcomeStatus::Passed => {
                    if report.record(&item, CaseStatus::Passed) {
                        observer.passed(&item, &outcome);
                    }
                }
                OutcomeStatus::Failed => {
                    if report.record(&item, CaseStatus::Failed) {
                        observer.failed(&item, &outcome);
                    }
                }
                OutcomeStatus::Skipped => {
                    if report.record(&item, CaseStatus::Skipped) {
                        observer.skipped(&item);
                    }
                }
            },
            Err(err) => {
                if report.record(&item, CaseStatus::Errored) {
                    observer.errored(&item, &err.to_string());
                }
            }
        },
        RunEvent::Aborted { items, error } => {
            let message = error.to_string();
            for item in &items {
                if report.record(item, CaseStatus::Errored) {
                    observer.errored(item, &message);
                }
            }
        }
        RunEvent::Cancelled { items } => {
            for item in &items {
                if report.record(item, CaseStatus::Skipped) {
                    observer.skipped(item);
                }
            }
        }
        RunEvent::TargetFinished { target, status } => {
            observer.target_finished(&target, &status);
            report.targets.insert(target, status);
        }
    }
}
