//! Callbacks through which a run reports per-test state.

use crate::discovery::TestItem;
use crate::process::OutputLine;
use crate::results::TestOutcome;

use super::TargetStatus;

/// Receives run progress. All callbacks are invoked from the run's control
/// loop, one at a time, in the order the events were produced.
pub trait RunObserver: Send {
    /// The case has been scheduled.
    fn started(&mut self, _item: &TestItem) {}

    fn passed(&mut self, item: &TestItem, outcome: &TestOutcome);

    /// `outcome.failure` carries the classified failure.
    fn failed(&mut self, item: &TestItem, outcome: &TestOutcome);

    fn skipped(&mut self, item: &TestItem);

    /// The case could not be evaluated.
    fn errored(&mut self, item: &TestItem, message: &str);

    /// A line of build or test output.
    fn output(&mut self, _target: &str, _line: &OutputLine) {}

    fn target_finished(&mut self, _target: &str, _status: &TargetStatus) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn passed(&mut self, _item: &TestItem, _outcome: &TestOutcome) {}
    fn failed(&mut self, _item: &TestItem, _outcome: &TestOutcome) {}
    fn skipped(&mut self, _item: &TestItem) {}
    fn errored(&mut self, _item: &TestItem, _message: &str) {}
}
