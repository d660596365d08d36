//! Per-document discovery lifecycle: a small state machine deciding when a
//! document is parsed and which tree changes each event produces.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::discovery::{DocumentTestTree, TestCase};

/// Lifecycle state of a tracked document.
///
/// A document starts unparsed, settles in one of two parsed states and goes
/// back to `Start` on every save:
/// Start → TestsPresent | TestsAbsent → (Saved) → Start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DocumentState {
    /// Waiting for a parse result
    #[default]
    Start,
    /// The last parse found at least one test case
    TestsPresent(DocumentTestTree),
    /// The last parse found no test case
    TestsAbsent,
}

impl DocumentState {
    /// Returns a human-readable name for the state.
    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentState::Start => "Start",
            DocumentState::TestsPresent(_) => "TestsPresent",
            DocumentState::TestsAbsent => "TestsAbsent",
        }
    }
}

/// Input of the lifecycle state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// Discovery finished with these cases.
    Parsed(Vec<TestCase>),
    /// The document was saved and must be parsed again.
    Saved,
}

/// Change to apply to the external test tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEffect {
    /// Insert or replace the subtree of a document.
    Publish(DocumentTestTree),
    /// Remove the subtree of a document.
    Remove(PathBuf),
}

/// Pure transition function of the document lifecycle.
///
/// Events that do not apply to the current state leave it unchanged.
pub fn transition(
    path: &Path,
    state: DocumentState,
    event: DocumentEvent,
) -> (DocumentState, Vec<TreeEffect>) {
    match (state, event) {
        (DocumentState::Start, DocumentEvent::Parsed(cases)) => {
            match DocumentTestTree::build(path, &cases) {
                Some(tree) => (
                    DocumentState::TestsPresent(tree.clone()),
                    vec![TreeEffect::Publish(tree)],
                ),
                None => (
                    DocumentState::TestsAbsent,
                    vec![TreeEffect::Remove(path.to_path_buf())],
                ),
            }
        }
        (DocumentState::TestsPresent(_) | DocumentState::TestsAbsent, DocumentEvent::Saved) => {
            (DocumentState::Start, Vec::new())
        }
        (state, event) => {
            debug!(
                file = %path.display(),
                state = state.display_name(),
                event = event_name(&event),
                "ignoring event"
            );
            (state, Vec::new())
        }
    }
}

fn event_name(event: &DocumentEvent) -> &'static str {
    match event {
        DocumentEvent::Parsed(_) => "Parsed",
        DocumentEvent::Saved => "Saved",
    }
}

/// A tracked document and its lifecycle state.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    state: DocumentState,
}

impl Document {
    /// Creates a document in the `Start` state.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: DocumentState::Start,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    /// The published tree, if the last parse found tests.
    pub fn tree(&self) -> Option<&DocumentTestTree> {
        match &self.state {
            DocumentState::TestsPresent(tree) => Some(tree),
            _ => None,
        }
    }

    /// Returns true if the document waits for a parse result.
    pub fn needs_parse(&self) -> bool {
        self.state == DocumentState::Start
    }

    /// Feeds an event to the state machine and returns the tree effects.
    pub fn handle(&mut self, event: DocumentEvent) -> Vec<TreeEffect> {
        let state = std::mem::take(&mut self.state);
        let (next, effects) = transition(&self.path, state, event);
        self.state = next;
        effects
    }

    /// Tears the document down, removing its subtree.
    pub fn close(self) -> TreeEffect {
        TreeEffect::Remove(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover;

    const FILE: &str = "/src/tests/math_test.cpp";

    #[test]
    fn test_parse_with_tests() {
        let mut doc = Document::new(FILE);
        let effects = doc.handle(DocumentEvent::Parsed(discover("TEST(A, B) {}\n")));
        assert_eq!(doc.state().display_name(), "TestsPresent");
        assert!(matches!(&effects[..], [TreeEffect::Publish(_)]));
        assert_eq!(doc.tree().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_without_tests() {
        let mut doc = Document::new(FILE);
        let effects = doc.handle(DocumentEvent::Parsed(Vec::new()));
        assert_eq!(doc.state(), &DocumentState::TestsAbsent);
        assert_eq!(effects, vec![TreeEffect::Remove(PathBuf::from(FILE))]);
    }

    #[test]
    fn test_save_returns_to_start() {
        let mut doc = Document::new(FILE);
        doc.handle(DocumentEvent::Parsed(discover("TEST(A, B) {}\n")));
        let effects = doc.handle(DocumentEvent::Saved);
        assert!(effects.is_empty());
        assert!(doc.needs_parse());

        doc.handle(DocumentEvent::Parsed(Vec::new()));
        assert_eq!(doc.state(), &DocumentState::TestsAbsent);

        doc.handle(DocumentEvent::Saved);
        assert!(doc.needs_parse());
    }

    #[test]
    fn test_ignored_events() {
        let mut doc = Document::new(FILE);
        assert!(doc.handle(DocumentEvent::Saved).is_empty());
        assert!(doc.needs_parse());

        doc.handle(DocumentEvent::Parsed(Vec::new()));
        assert!(doc.handle(DocumentEvent::Parsed(Vec::new())).is_empty());
        assert_eq!(doc.state(), &DocumentState::TestsAbsent);
    }

    #[test]
    fn test_close_removes_subtree() {
        let doc = Document::new(FILE);
        assert_eq!(doc.close(), TreeEffect::Remove(PathBuf::from(FILE)));
    }
}
