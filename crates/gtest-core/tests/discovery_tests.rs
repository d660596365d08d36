use gtest_core::discovery::{scan, MacroKind, TreeNode};
use gtest_core::document::{Document, DocumentEvent, TreeEffect};
use gtest_core::{discover, DocumentTestTree, TestItem};

const SOURCE: &str = r#"#include <gtest/gtest.h>
#include "queue.h"

class QueueTest : public ::testing::Test {
 protected:
  Queue<int> q_;
};

TEST_F(QueueTest, IsEmptyInitially) {
  EXPECT_EQ(q_.size(), 0);
}

TEST_F(QueueTest, DequeueWorks) {
  q_.Enqueue(1);
  EXPECT_EQ(q_.Dequeue(), 1);
}

TEST(QueueFree, Sizeof) { EXPECT_GT(sizeof(Queue<int>), 0u); }

template <typename T>
class TypedQueue : public ::testing::Test {};
using Types = ::testing::Types<int, long>;
TYPED_TEST_SUITE(TypedQueue, Types);

TYPED_TEST(TypedQueue, Clears) {}

class Capacity : public ::testing::TestWithParam<int> {};

  TEST_P(Capacity, Holds) {}
  TEST_P(Capacity, Overflows) {}

INSTANTIATE_TEST_SUITE_P(Small, Capacity, ::testing::Values(1, 2));

template <typename T>
class Conformance : public ::testing::Test {};
TYPED_TEST_SUITE_P(Conformance);
TYPED_TEST_P(Conformance, RoundTrips) {}
REGISTER_TYPED_TEST_SUITE_P(Conformance, RoundTrips);
INSTANTIATE_TYPED_TEST_CASE_P(Ints, Conformance, ::testing::Types<int>);

TEST_P(Unregistered, NeverRuns) {}
"#;

const FILE: &str = "/work/tests/queue_test.cpp";

#[test]
fn test_scan_finds_every_macro_in_order() {
    let kinds: Vec<MacroKind> = scan(SOURCE).iter().map(|o| o.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MacroKind::TestFixture,
            MacroKind::TestFixture,
            MacroKind::Test,
            MacroKind::TypedTest,
            MacroKind::TestParam,
            MacroKind::TestParam,
            MacroKind::InstantiateParamSuite,
            MacroKind::TypedTestParam,
            MacroKind::InstantiateTypedParamSuite,
            MacroKind::TestParam,
        ]
    );
}

#[test]
fn test_canonical_ids_and_lines() {
    let cases = discover(SOURCE);
    let ids: Vec<(&str, u32)> = cases
        .iter()
        .map(|c| (c.canonical_id.as_str(), c.source_line))
        .collect();
    assert_eq!(
        ids,
        vec![
            ("QueueTest.IsEmptyInitially", 8),
            ("QueueTest.DequeueWorks", 12),
            ("QueueFree.Sizeof", 17),
            ("TypedQueue/*.Clears", 24),
            ("Small/Capacity.Holds/*", 28),
            ("Small/Capacity.Overflows/*", 29),
            ("Ints/Conformance/*.RoundTrips", 36),
        ]
    );
}

#[test]
fn test_runtime_ids_match_patterns() {
    let cases = discover(SOURCE);
    let find = |id: &str| cases.iter().find(|c| c.canonical_id == id).unwrap();

    assert!(find("TypedQueue/*.Clears").matches("TypedQueue/1.Clears"));
    assert!(find("Small/Capacity.Holds/*").matches("Small/Capacity.Holds/0"));
    assert!(!find("Small/Capacity.Holds/*").matches("Small/Capacity.Holds/x"));
    assert!(find("Ints/Conformance/*.RoundTrips").matches("Ints/Conformance/0.RoundTrips"));
    assert!(!find("QueueTest.DequeueWorks").matches("QueueTest.DequeueWorksToo"));
}

#[test]
fn test_tree_groups_fixtures() {
    let tree = DocumentTestTree::build(FILE, &discover(SOURCE)).unwrap();

    let shape: Vec<String> = tree
        .nodes
        .iter()
        .map(|node| match node {
            TreeNode::Fixture { name, cases, .. } => format!("{name}[{}]", cases.len()),
            TreeNode::Case(case) => case.canonical_id.clone(),
        })
        .collect();
    assert_eq!(
        shape,
        vec![
            "QueueTest[2]",
            "QueueFree.Sizeof",
            "TypedQueue/*.Clears",
            "Capacity[2]",
            "Ints/Conformance/*.RoundTrips",
        ]
    );

    let fixture = TestItem::Fixture {
        file: FILE.into(),
        fixture: "Capacity".to_string(),
    };
    assert_eq!(tree.leaves(&fixture).len(), 2);
    assert_eq!(tree.leaves(&tree.root_item()).len(), 7);
}

#[test]
fn test_tree_serializes_for_explorers() {
    let tree = DocumentTestTree::build(FILE, &discover("TEST(A, B) {}\n")).unwrap();
    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["nodes"][0]["type"], "case");
    assert_eq!(json["nodes"][0]["canonical_id"], "A.B");
}

#[test]
fn test_document_lifecycle_end_to_end() {
    let mut doc = Document::new(FILE);
    let effects = doc.handle(DocumentEvent::Parsed(discover(SOURCE)));
    let [TreeEffect::Publish(tree)] = &effects[..] else {
        panic!("expected a publish, got {effects:?}");
    };
    assert_eq!(tree.len(), 7);

    doc.handle(DocumentEvent::Saved);
    let effects = doc.handle(DocumentEvent::Parsed(discover("// emptied\n")));
    assert_eq!(effects, vec![TreeEffect::Remove(FILE.into())]);
}
