//! Test-case synthesis from raw macro occurrences.
//!
//! Resolves parameterized and typed test linkage and computes, per case, the
//! canonical id the framework reports at runtime plus a regex that matches
//! every runtime instance of it:
//!
//! | macro                  | canonical id  | filter pattern   |
//! |------------------------|---------------|------------------|
//! | `TEST`, `TEST_F`       | `F.N`         | `F\.N`           |
//! | `TEST_P`               | `S/F.N/*`     | `S/F\.N/\d+`     |
//! | `TYPED_TEST`           | `F/*.N`       | `F/\d+\.N`       |
//! | `TYPED_TEST_P`         | `S/F/*.N`     | `S/F/\d+\.N`     |

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use super::scanner::{MacroKind, MacroOccurrence};

/// A runnable test case discovered in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    /// Fixture (test suite) name as written in the macro.
    pub fixture: String,
    /// Name shown to the user.
    pub display_name: String,
    /// Id reported by the framework; `*` stands for a runtime index.
    pub canonical_id: String,
    /// Regex matching every runtime id this case stands for.
    pub filter_pattern: String,
    /// 0-based line of the declaring macro.
    pub source_line: u32,
    pub kind: MacroKind,
}

impl TestCase {
    /// Glob passed to `--gtest_filter` to select this case.
    pub fn gtest_filter(&self) -> &str {
        &self.canonical_id
    }

    /// Whether the case expands to runtime instances with an index suffix.
    pub fn is_parameterized(&self) -> bool {
        matches!(
            self.kind,
            MacroKind::TestParam | MacroKind::TypedTest | MacroKind::TypedTestParam
        )
    }

    /// Compile the anchored filter pattern.
    pub fn matcher(&self) -> Result<Regex, regex::Error> {
        Regex::new(&format!("^(?:{})$", self.filter_pattern))
    }

    /// Whether a runtime-reported id belongs to this case.
    pub fn matches(&self, runtime_id: &str) -> bool {
        self.matcher()
            .map(|re| re.is_match(runtime_id))
            .unwrap_or(false)
    }
}

/// Cases sharing a fixture, in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureGroup {
    pub fixture: String,
    pub cases: Vec<TestCase>,
}

impl FixtureGroup {
    /// Fixtures with more than one case get their own node; a lone case is
    /// attached directly to the file.
    pub fn is_grouped(&self) -> bool {
        self.cases.len() > 1
    }
}

/// Convert raw macro occurrences into canonical test cases.
///
/// `TEST_P` and `TYPED_TEST_P` cases without an instantiation for their
/// fixture never run and are dropped. When a fixture is instantiated more
/// than once the last instantiation wins.
pub fn synthesize(occurrences: &[MacroOccurrence]) -> Vec<TestCase> {
    let mut param_suites: HashMap<&str, &str> = HashMap::new();
    let mut typed_param_suites: HashMap<&str, &str> = HashMap::new();

    for occurrence in occurrences {
        let suites = match occurrence.kind {
            MacroKind::InstantiateParamSuite => &mut param_suites,
            MacroKind::InstantiateTypedParamSuite => &mut typed_param_suites,
            _ => continue,
        };
        suites.insert(
            occurrence.identifier_name.as_str(),
            occurrence.fixture_name.as_str(),
        );
    }

    occurrences
        .iter()
        .filter(|o| o.kind.is_test_case())
        .filter_map(|o| {
            let case = synthesize_case(o, &param_suites, &typed_param_suites);
            if case.is_none() {
                debug!(
                    fixture = %o.fixture_name,
                    name = %o.identifier_name,
                    "parameterized test has no instantiation, skipping"
                );
            }
            case
        })
        .collect()
}

fn synthesize_case(
    occurrence: &MacroOccurrence,
    param_suites: &HashMap<&str, &str>,
    typed_param_suites: &HashMap<&str, &str>,
) -> Option<TestCase> {
    let fixture = occurrence.fixture_name.as_str();
    let name = occurrence.identifier_name.as_str();
    let f = regex::escape(fixture);
    let n = regex::escape(name);

    let (canonical_id, filter_pattern, display_name) = match occurrence.kind {
        MacroKind::Test | MacroKind::TestFixture => (
            format!("{fixture}.{name}"),
            format!(r"{f}\.{n}"),
            name.to_string(),
        ),
        MacroKind::TestParam => {
            let suite = *param_suites.get(fixture)?;
            let s = regex::escape(suite);
            (
                format!("{suite}/{fixture}.{name}/*"),
                format!(r"{s}/{f}\.{n}/\d+"),
                format!("{name} ({suite})"),
            )
        }
        MacroKind::TypedTest => (
            format!("{fixture}/*.{name}"),
            format!(r"{f}/\d+\.{n}"),
            name.to_string(),
        ),
        MacroKind::TypedTestParam => {
            let suite = *typed_param_suites.get(fixture)?;
            let s = regex::escape(suite);
            (
                format!("{suite}/{fixture}/*.{name}"),
                format!(r"{s}/{f}/\d+\.{n}"),
                format!("{name} ({suite})"),
            )
        }
        MacroKind::InstantiateParamSuite | MacroKind::InstantiateTypedParamSuite => return None,
    };

    Some(TestCase {
        fixture: fixture.to_string(),
        display_name,
        canonical_id,
        filter_pattern,
        source_line: occurrence.source_line,
        kind: occurrence.kind,
    })
}

/// Group cases by fixture, keeping the order in which fixtures first appear.
pub fn group_by_fixture(cases: &[TestCase]) -> Vec<FixtureGroup> {
    let mut groups: Vec<FixtureGroup> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for case in cases {
        match positions.get(case.fixture.as_str()) {
            Some(&idx) => groups[idx].cases.push(case.clone()),
            None => {
                positions.insert(case.fixture.as_str(), groups.len());
                groups.push(FixtureGroup {
                    fixture: case.fixture.clone(),
                    cases: vec![case.clone()],
                });
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::scanner::scan;

    fn cases(code: &str) -> Vec<TestCase> {
        synthesize(&scan(code))
    }

    #[test]
    fn test_plain_ids() {
        let found = cases("TEST(Math, Adds) {}\nTEST_F(Stack, Pushes) {}\n");
        assert_eq!(found[0].canonical_id, "Math.Adds");
        assert_eq!(found[1].canonical_id, "Stack.Pushes");
        assert!(found[0].matches("Math.Adds"));
        assert!(!found[0].matches("Math.AddsMore"));
    }

    #[test]
    fn test_param_requires_instantiation() {
        let found = cases("TEST_P(Fixture, Name) {}\n");
        assert!(found.is_empty());
    }

    #[test]
    fn test_param_with_instantiation() {
        let found = cases(
            "TEST_P(Fixture, Name) {}\nINSTANTIATE_TEST_SUITE_P(Suite, Fixture, Values(1, 2));\n",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].canonical_id, "Suite/Fixture.Name/*");
        assert_eq!(found[0].filter_pattern, r"Suite/Fixture\.Name/\d+");
        assert!(found[0].matches("Suite/Fixture.Name/3"));
        assert!(!found[0].matches("Suite/Fixture.Name/x"));
    }

    #[test]
    fn test_param_instantiation_for_other_fixture() {
        let found = cases(
            "TEST_P(Fixture, Name) {}\nINSTANTIATE_TEST_SUITE_P(Suite, Other, Values(1));\n",
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_typed_ids() {
        let found = cases("TYPED_TEST(Fixture, Name) {}\n");
        assert_eq!(found[0].canonical_id, "Fixture/*.Name");
        assert!(found[0].matches("Fixture/0.Name"));
    }

    #[test]
    fn test_typed_param_ids() {
        let found = cases(
            "TYPED_TEST_P(Fixture, Name) {}\nINSTANTIATE_TYPED_TEST_SUITE_P(My, Fixture, Types);\n",
        );
        assert_eq!(found[0].canonical_id, "My/Fixture/*.Name");
        assert!(found[0].matches("My/Fixture/12.Name"));
    }

    #[test]
    fn test_typed_param_ignores_value_instantiation() {
        let found = cases(
            "TYPED_TEST_P(Fixture, Name) {}\nINSTANTIATE_TEST_SUITE_P(My, Fixture, Values(1));\n",
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_last_instantiation_wins() {
        let found = cases(
            "TEST_P(F, N) {}\nINSTANTIATE_TEST_SUITE_P(A, F, Values(1));\nINSTANTIATE_TEST_SUITE_P(B, F, Values(2));\n",
        );
        assert_eq!(found[0].canonical_id, "B/F.N/*");
    }

    #[test]
    fn test_deterministic() {
        let code = "TEST(A, B) {}\nTYPED_TEST(T, U) {}\nTEST_P(P, Q) {}\nINSTANTIATE_TEST_SUITE_P(S, P, Values(1));\n";
        assert_eq!(cases(code), cases(code));
    }

    #[test]
    fn test_grouping() {
        let found = cases("TEST_F(F, A) {}\nTEST(Solo, A) {}\nTEST_F(F, B) {}\n");
        let groups = group_by_fixture(&found);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].fixture, "F");
        assert!(groups[0].is_grouped());
        assert_eq!(groups[0].cases.len(), 2);
        assert!(!groups[1].is_grouped());
    }
}
