//! Terminal surfaces: a log-only test explorer and a run observer that
//! prints results under an `indicatif` spinner.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use gtest_core::process::{OutputLine, OutputStream};
use gtest_core::run::{RunObserver, RunReport, TargetStatus};
use gtest_core::{DocumentTestTree, TestExplorer, TestItem, TestOutcome};

/// Explorer for a terminal session; trees are read back from the session.
pub struct LogExplorer;

impl TestExplorer for LogExplorer {
    fn publish(&mut self, tree: &DocumentTestTree) {
        debug!(file = %tree.file.display(), cases = tree.len(), "tests discovered");
    }

    fn remove(&mut self, file: &Path) {
        debug!(file = %file.display(), "tests removed");
    }
}

pub struct ConsoleObserver {
    spinner: ProgressBar,
    verbose: bool,
}

impl ConsoleObserver {
    pub fn new(verbose: bool) -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner, verbose }
    }

    pub fn finish(&self, report: &RunReport) {
        self.spinner.finish_and_clear();

        let summary = report.summary();
        let elapsed = report
            .duration()
            .map(|d| format!(" in {:.2}s", d.num_milliseconds() as f64 / 1000.0))
            .unwrap_or_default();
        let state = if report.cancelled { " (cancelled)" } else { "" };
        println!(
            "{} tests: {} passed, {} failed, {} skipped, {} errored{}{}",
            summary.total(),
            summary.passed,
            summary.failed,
            summary.skipped,
            summary.errored,
            elapsed,
            state
        );
    }
}

fn label(item: &TestItem) -> String {
    match item {
        TestItem::Case { canonical_id, .. } => canonical_id.clone(),
        TestItem::Fixture { fixture, .. } => fixture.clone(),
        TestItem::File(file) => file.display().to_string(),
    }
}

impl RunObserver for ConsoleObserver {
    fn started(&mut self, item: &TestItem) {
        self.spinner.set_message(format!("queued {}", label(item)));
    }

    fn passed(&mut self, item: &TestItem, _outcome: &TestOutcome) {
        self.spinner.println(format!("PASS  {}", label(item)));
    }

    fn failed(&mut self, item: &TestItem, outcome: &TestOutcome) {
        let Some(detail) = &outcome.failure else {
            self.spinner.println(format!("FAIL  {}", label(item)));
            return;
        };
        self.spinner.println(format!(
            "FAIL  {} ({}:{})",
            label(item),
            item.file().display(),
            detail.line + 1
        ));
        if let Some(diff) = &detail.diff {
            self.spinner
                .println(format!("      {}: {}", diff.expected_label, diff.expected));
            self.spinner.println(format!("      actual: {}", diff.actual));
        } else {
            for line in detail.message.lines() {
                self.spinner.println(format!("      {line}"));
            }
        }
    }

    fn skipped(&mut self, item: &TestItem) {
        self.spinner.println(format!("SKIP  {}", label(item)));
    }

    fn errored(&mut self, item: &TestItem, message: &str) {
        self.spinner
            .println(format!("ERROR {}: {}", label(item), message));
    }

    fn output(&mut self, target: &str, line: &OutputLine) {
        if self.verbose {
            let stream = match line.stream {
                OutputStream::Stdout => "out",
                OutputStream::Stderr => "err",
            };
            self.spinner
                .println(format!("[{target}:{stream}] {}", line.text));
        }
    }

    fn target_finished(&mut self, target: &str, status: &TargetStatus) {
        let message = match status {
            TargetStatus::Completed => return,
            TargetStatus::BuildFailed(reason) => format!("build of {target} failed: {reason}"),
            TargetStatus::Errored(reason) => format!("{target}: {reason}"),
            TargetStatus::Cancelled => format!("{target}: cancelled"),
        };
        self.spinner.println(message);
    }
}
