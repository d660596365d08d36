//! gtest JSON result parsing and per-case evaluation.
//!
//! A test binary run with `--gtest_output=json:<path>` writes a report of
//! `testsuites[].testsuite[]` records. Each record's runtime id is
//! `classname.name`; records are attributed to requested cases through the
//! case's filter pattern, so one parameterized or typed case can collect many
//! runtime instances.

mod classifier;
mod error;

pub use classifier::{classify, Diff, FailureDetail};
pub use error::{ClassifyError, ResultError};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error};

use crate::discovery::TestCase;

/// Value of `result` for tests skipped with `GTEST_SKIP`.
const SKIPPED_RESULT: &str = "SKIPPED";

/// Top-level gtest JSON report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestReport {
    #[serde(default)]
    pub testsuites: Vec<SuiteRecord>,
}

/// One test suite of the report.
#[derive(Debug, Clone, Deserialize)]
pub struct SuiteRecord {
    pub name: String,
    #[serde(default)]
    pub testsuite: Vec<CaseRecord>,
}

/// One executed test instance.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseRecord {
    pub name: String,
    pub classname: String,
    #[serde(default)]
    pub value_param: Option<String>,
    #[serde(default)]
    pub type_param: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
}

impl CaseRecord {
    /// Id the framework reports for this instance.
    pub fn runtime_id(&self) -> String {
        format!("{}.{}", self.classname, self.name)
    }

    pub fn is_failed(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn is_skipped(&self) -> bool {
        self.result.as_deref() == Some(SKIPPED_RESULT)
    }

    /// Value or type parameter of a parameterized instance.
    pub fn parameter(&self) -> Option<&str> {
        self.value_param
            .as_deref()
            .or(self.type_param.as_deref())
    }
}

/// One failed assertion of a record.
#[derive(Debug, Clone, Deserialize)]
pub struct FailureRecord {
    pub failure: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

impl TestReport {
    /// Parse a report from JSON text.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Read and parse the report written by a test binary.
    pub async fn read(path: &Path) -> Result<Self, ResultError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ResultError::Unavailable {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&content).map_err(|source| ResultError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// All records across suites.
    pub fn records(&self) -> impl Iterator<Item = &CaseRecord> {
        self.testsuites.iter().flat_map(|s| s.testsuite.iter())
    }
}

/// Final status of an evaluated case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Passed,
    Failed,
    Skipped,
}

/// Evaluated result of one requested case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    pub canonical_id: String,
    pub status: OutcomeStatus,
    pub failure: Option<FailureDetail>,
    /// 0-based line of the case declaration.
    pub source_line: u32,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.status == OutcomeStatus::Passed
    }
}

/// Evaluate the requested cases against a report.
///
/// Every case yields exactly one entry. A case fails if any of its records
/// failed; the first failure of the first failing record is surfaced. Errors
/// are local to their case.
pub fn evaluate(report: &TestReport, cases: &[TestCase]) -> Vec<Result<TestOutcome, ResultError>> {
    let matchers: Vec<Option<Regex>> = cases.iter().map(|c| c.matcher().ok()).collect();

    let mut buckets: Vec<Vec<&CaseRecord>> = vec![Vec::new(); cases.len()];
    for record in report.records() {
        let runtime_id = record.runtime_id();
        let owner = matchers
            .iter()
            .position(|m| m.as_ref().is_some_and(|re| re.is_match(&runtime_id)));
        match owner {
            Some(idx) => buckets[idx].push(record),
            None => debug!(id = %runtime_id, "record not requested"),
        }
    }

    cases
        .iter()
        .zip(buckets)
        .map(|(case, records)| evaluate_case(case, &records))
        .collect()
}

fn evaluate_case(case: &TestCase, records: &[&CaseRecord]) -> Result<TestOutcome, ResultError> {
    if records.is_empty() {
        error!(id = %case.canonical_id, "no result recorded for requested test");
        return Err(ResultError::OutcomeMissing {
            id: case.canonical_id.clone(),
        });
    }

    let outcome = |status, failure| TestOutcome {
        canonical_id: case.canonical_id.clone(),
        status,
        failure,
        source_line: case.source_line,
    };

    if let Some(record) = records.iter().find(|r| r.is_failed()) {
        let message = &record.failures[0].failure;
        let detail = classify(message, record.parameter()).map_err(|source| {
            error!(id = %case.canonical_id, error = %source, "cannot classify failure");
            ResultError::Classify {
                id: case.canonical_id.clone(),
                source,
            }
        })?;
        return Ok(outcome(OutcomeStatus::Failed, Some(detail)));
    }

    if records.iter().all(|r| r.is_skipped()) {
        return Ok(outcome(OutcomeStatus::Skipped, None));
    }

    Ok(outcome(OutcomeStatus::Passed, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover;

    const REPORT: &str = r#"{
  "tests": 5,
  "failures": 2,
  "testsuites": [
    {
      "name": "Suite",
      "testsuite": [
        { "name": "A", "status": "RUN", "result": "COMPLETED", "classname": "Suite" },
        { "name": "B", "status": "RUN", "result": "COMPLETED", "classname": "Suite",
          "failures": [ { "failure": "/src/suite_test.cpp:9\nExpected equality of these values:\n  1\n  two()\n    Which is: 2\n", "type": "" } ] },
        { "name": "C", "status": "RUN", "result": "SKIPPED", "classname": "Suite" }
      ]
    },
    {
      "name": "Ints/Param",
      "testsuite": [
        { "name": "Works/0", "value_param": "1", "classname": "Ints/Param", "result": "COMPLETED" },
        { "name": "Works/1", "value_param": "7", "classname": "Ints/Param", "result": "COMPLETED",
          "failures": [ { "failure": "/src/suite_test.cpp:20\nFailed", "type": "" } ] }
      ]
    }
  ]
}"#;

    const SOURCE: &str = r#"
TEST(Suite, A) {}
TEST(Suite, B) {}
TEST(Suite, C) {}
TEST(Suite, D) {}
TEST_P(Param, Works) {}
INSTANTIATE_TEST_SUITE_P(Ints, Param, ::testing::Values(1, 7));
"#;

    fn results() -> Vec<Result<TestOutcome, ResultError>> {
        let report = TestReport::from_json(REPORT).unwrap();
        evaluate(&report, &discover(SOURCE))
    }

    #[test]
    fn test_pass_and_failure_with_diff() {
        let results = results();
        assert!(results[0].as_ref().unwrap().passed());

        let failed = results[1].as_ref().unwrap();
        assert_eq!(failed.status, OutcomeStatus::Failed);
        let detail = failed.failure.as_ref().unwrap();
        assert_eq!(detail.line, 8);
        let diff = detail.diff.as_ref().unwrap();
        assert_eq!(diff.expected, "1");
        assert_eq!(diff.actual, "2");
    }

    #[test]
    fn test_skipped_record() {
        assert_eq!(results()[2].as_ref().unwrap().status, OutcomeStatus::Skipped);
    }

    #[test]
    fn test_missing_outcome() {
        let results = results();
        let err = results[3].as_ref().unwrap_err();
        assert!(matches!(err, ResultError::OutcomeMissing { id } if id == "Suite.D"));
    }

    #[test]
    fn test_parameterized_instances_collapse() {
        let results = results();
        let outcome = results[4].as_ref().unwrap();
        assert_eq!(outcome.canonical_id, "Ints/Param.Works/*");
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(
            outcome.failure.as_ref().unwrap().message,
            "Failed\nFailure parameter: 7"
        );
    }

    #[test]
    fn test_malformed_failure_is_local() {
        let report = TestReport::from_json(
            r#"{"testsuites":[{"name":"S","testsuite":[
                {"name":"X","classname":"S","failures":[{"failure":"unknown file\nC++ exception"}]},
                {"name":"Y","classname":"S"}]}]}"#,
        )
        .unwrap();
        let results = evaluate(&report, &discover("TEST(S, X) {}\nTEST(S, Y) {}\n"));
        assert!(matches!(&results[0], Err(ResultError::Classify { id, .. }) if id == "S.X"));
        assert!(results[1].as_ref().unwrap().passed());
    }

    #[tokio::test]
    async fn test_missing_report_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = TestReport::read(&dir.path().join("none.json")).await.unwrap_err();
        assert!(matches!(err, ResultError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_malformed_report_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = TestReport::read(&path).await.unwrap_err();
        assert!(matches!(err, ResultError::Malformed { .. }));
    }
}
