//! Per-document test tree handed to the test explorer.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::synthesizer::{group_by_fixture, TestCase};

/// Selection handle for a node of a document's test tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TestItem {
    /// Every case of a file.
    File(PathBuf),
    /// Every case of a grouped fixture.
    Fixture { file: PathBuf, fixture: String },
    /// A single case.
    Case { file: PathBuf, canonical_id: String },
}

impl TestItem {
    /// File owning the item.
    pub fn file(&self) -> &Path {
        match self {
            TestItem::File(file) => file,
            TestItem::Fixture { file, .. } => file,
            TestItem::Case { file, .. } => file,
        }
    }
}

/// A child of the file root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// A fixture with two or more cases.
    Fixture {
        name: String,
        source_line: u32,
        cases: Vec<TestCase>,
    },
    /// A case whose fixture has no other case in the file.
    Case(TestCase),
}

/// Discovered tests of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentTestTree {
    pub file: PathBuf,
    pub nodes: Vec<TreeNode>,
}

impl DocumentTestTree {
    /// Build the tree for a document. Returns `None` when there are no cases.
    pub fn build(file: impl Into<PathBuf>, cases: &[TestCase]) -> Option<Self> {
        if cases.is_empty() {
            return None;
        }

        let nodes = group_by_fixture(cases)
            .into_iter()
            .filter_map(|group| {
                if group.is_grouped() {
                    Some(TreeNode::Fixture {
                        name: group.fixture,
                        source_line: group.cases[0].source_line,
                        cases: group.cases,
                    })
                } else {
                    // Lone case: flattened under the file.
                    group.cases.into_iter().next().map(TreeNode::Case)
                }
            })
            .collect();

        Some(Self {
            file: file.into(),
            nodes,
        })
    }

    /// All leaf cases in tree order.
    pub fn cases(&self) -> impl Iterator<Item = &TestCase> {
        self.nodes.iter().flat_map(|node| match node {
            TreeNode::Fixture { cases, .. } => cases.as_slice(),
            TreeNode::Case(case) => std::slice::from_ref(case),
        })
    }

    /// Number of leaf cases.
    pub fn len(&self) -> usize {
        self.cases().count()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Find a case by canonical id.
    pub fn find_case(&self, canonical_id: &str) -> Option<&TestCase> {
        self.cases().find(|c| c.canonical_id == canonical_id)
    }

    /// Expand a selection to its leaf cases. Items of other files select nothing.
    pub fn leaves(&self, item: &TestItem) -> Vec<&TestCase> {
        if item.file() != self.file.as_path() {
            return Vec::new();
        }

        match item {
            TestItem::File(_) => self.cases().collect(),
            TestItem::Fixture { fixture, .. } => {
                self.cases().filter(|c| &c.fixture == fixture).collect()
            }
            TestItem::Case { canonical_id, .. } => {
                self.find_case(canonical_id).into_iter().collect()
            }
        }
    }

    /// Selection handle of the file root.
    pub fn root_item(&self) -> TestItem {
        TestItem::File(self.file.clone())
    }

    /// Selection handle of a case.
    pub fn case_item(&self, case: &TestCase) -> TestItem {
        TestItem::Case {
            file: self.file.clone(),
            canonical_id: case.canonical_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover;

    const FILE: &str = "/src/tests/stack_test.cpp";

    #[test]
    fn test_grouped_fixture() {
        let cases = discover("TEST_F(F, A) {}\nTEST_F(F, B) {}\n");
        let tree = DocumentTestTree::build(FILE, &cases).unwrap();
        assert_eq!(tree.nodes.len(), 1);
        match &tree.nodes[0] {
            TreeNode::Fixture { name, cases, .. } => {
                assert_eq!(name, "F");
                assert_eq!(cases.len(), 2);
            }
            other => panic!("expected fixture node, got {other:?}"),
        }
    }

    #[test]
    fn test_single_case_is_flattened() {
        let cases = discover("TEST(F, A) {}\n");
        let tree = DocumentTestTree::build(FILE, &cases).unwrap();
        assert!(matches!(&tree.nodes[0], TreeNode::Case(c) if c.canonical_id == "F.A"));
    }

    #[test]
    fn test_empty_has_no_tree() {
        assert!(DocumentTestTree::build(FILE, &[]).is_none());
    }

    #[test]
    fn test_leaves() {
        let cases = discover("TEST_F(F, A) {}\nTEST_F(F, B) {}\nTEST(G, C) {}\n");
        let tree = DocumentTestTree::build(FILE, &cases).unwrap();

        assert_eq!(tree.leaves(&tree.root_item()).len(), 3);

        let fixture = TestItem::Fixture {
            file: PathBuf::from(FILE),
            fixture: "F".to_string(),
        };
        assert_eq!(tree.leaves(&fixture).len(), 2);

        let case = TestItem::Case {
            file: PathBuf::from(FILE),
            canonical_id: "G.C".to_string(),
        };
        assert_eq!(tree.leaves(&case)[0].canonical_id, "G.C");

        assert!(tree.leaves(&TestItem::File(PathBuf::from("/other.cpp"))).is_empty());
    }
}
