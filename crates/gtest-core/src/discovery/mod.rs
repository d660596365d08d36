//! Test discovery for C++ sources.
//!
//! Discovery is pattern based: macro heads such as `TEST_F(Fixture, Name)` are
//! matched line by line, no C++ is parsed.
//!
//! # Components
//!
//! - [`scanner::scan`] - raw macro occurrences in source order
//! - [`synthesizer::synthesize`] - canonical test cases with ids and filters
//! - [`DocumentTestTree`] - file → fixture → case hierarchy for the explorer

mod patterns;
pub mod scanner;
pub mod synthesizer;
mod tree;

pub use scanner::{scan, MacroKind, MacroOccurrence};
pub use synthesizer::{group_by_fixture, synthesize, FixtureGroup, TestCase};
pub use tree::{DocumentTestTree, TestItem, TreeNode};

/// Scan a document and synthesize its test cases.
pub fn discover(content: &str) -> Vec<TestCase> {
    synthesize(&scan(content))
}
