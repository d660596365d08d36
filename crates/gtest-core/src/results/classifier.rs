//! Failure message classification.
//!
//! gtest failure text starts with a `path:line` line followed by the
//! assertion output. Three assertion shapes are recognized, first match wins:
//!
//! 1. Boolean: `Value of: expr` / `Actual: v` / `Expected: v`
//! 2. Value equality: `Expected equality of these values:` followed by the
//!    indented expected and actual expressions, each optionally elaborated by
//!    a `Which is: v` line
//! 3. Generic: `Expected: lhs, actual: rhs`

use serde::Serialize;

use super::error::ClassifyError;

const BOOLEAN_MARKER: &str = "Value of";
const EQUALITY_MARKER: &str = "Expected equality of these values:";
const GENERIC_MARKER: &str = "Expected:";
const WHICH_IS: &str = "Which is:";

/// Expected/actual pair extracted from a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub expected_label: String,
    pub expected: String,
    pub actual: String,
}

/// A classified failure, ready to be surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    /// Failure text without the location line.
    pub message: String,
    pub diff: Option<Diff>,
    /// 0-based line of the failing assertion.
    pub line: u32,
}

/// Classify a raw failure message.
///
/// `parameter` is the value or type parameter of a parameterized instance;
/// it is appended to the message as a `Failure parameter:` line.
pub fn classify(message: &str, parameter: Option<&str>) -> Result<FailureDetail, ClassifyError> {
    let lines: Vec<&str> = message.lines().collect();
    let line = parse_location(lines.first().copied().unwrap_or_default())?;

    let diff = boolean_shape(&lines)
        .or_else(|| equality_shape(&lines))
        .or_else(|| generic_shape(&lines));

    let mut text = lines.iter().skip(1).copied().collect::<Vec<_>>().join("\n");
    if let Some(parameter) = parameter {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("Failure parameter: ");
        text.push_str(parameter);
    }

    Ok(FailureDetail {
        message: text,
        diff,
        line,
    })
}

/// Parse the 1-based line of a `path:line` prefix and convert it to 0-based.
fn parse_location(first_line: &str) -> Result<u32, ClassifyError> {
    let malformed = || ClassifyError::MalformedLocation(first_line.to_string());

    let (path, number) = first_line.trim_end().rsplit_once(':').ok_or_else(malformed)?;
    if path.is_empty() {
        return Err(malformed());
    }
    match number.trim().parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(malformed()),
    }
}

fn remainder<'a>(line: Option<&&'a str>, prefix: &str) -> Option<&'a str> {
    line.and_then(|l| l.trim().strip_prefix(prefix)).map(str::trim)
}

fn boolean_shape(lines: &[&str]) -> Option<Diff> {
    if !lines.iter().any(|l| l.contains(BOOLEAN_MARKER)) {
        return None;
    }

    let label = lines.get(1)?.trim();
    let label = label
        .strip_prefix("Value of:")
        .map(str::trim)
        .unwrap_or(label);
    let actual = remainder(lines.get(2), "Actual:")?;
    let expected = remainder(lines.get(3), "Expected:")?;

    Some(Diff {
        expected_label: label.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

fn equality_shape(lines: &[&str]) -> Option<Diff> {
    let start = lines.iter().position(|l| l.contains(EQUALITY_MARKER))?;

    // (expression, elaboration)
    let mut values: Vec<(&str, Option<&str>)> = Vec::new();
    for line in &lines[start + 1..] {
        if !line.starts_with(char::is_whitespace) {
            break;
        }
        let trimmed = line.trim();
        if let Some(elaboration) = trimmed.strip_prefix(WHICH_IS) {
            if let Some(last) = values.last_mut() {
                last.1 = Some(elaboration.trim());
            }
        } else if !trimmed.is_empty() {
            values.push((trimmed, None));
        }
    }

    let (expected_expr, expected_value) = *values.first()?;
    let (actual_expr, actual_value) = *values.get(1)?;

    Some(Diff {
        expected_label: expected_expr.to_string(),
        expected: expected_value.unwrap_or(expected_expr).to_string(),
        actual: actual_value.unwrap_or(actual_expr).to_string(),
    })
}

fn generic_shape(lines: &[&str]) -> Option<Diff> {
    if !lines.iter().any(|l| l.contains(GENERIC_MARKER)) {
        return None;
    }

    let line = lines.get(1)?.trim();
    let (expected, actual) = line.split_once("actual:")?;
    let expected = expected.trim();
    let expected = expected
        .strip_prefix(GENERIC_MARKER)
        .unwrap_or(expected)
        .trim()
        .trim_end_matches(',')
        .trim();

    Some(Diff {
        expected_label: "Expected".to_string(),
        expected: expected.to_string(),
        actual: actual.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_shape() {
        let detail = classify("src/foo.cpp:42\nValue of: x\nActual: 1\nExpected: 2", None).unwrap();
        let diff = detail.diff.unwrap();
        assert_eq!(diff.expected, "2");
        assert_eq!(diff.actual, "1");
        assert_eq!(diff.expected_label, "x");
        assert_eq!(detail.line, 41);
    }

    #[test]
    fn test_boolean_shape_indented() {
        let detail = classify(
            "/src/a.cpp:7\nValue of: ready()\n  Actual: false\nExpected: true\n",
            None,
        )
        .unwrap();
        let diff = detail.diff.unwrap();
        assert_eq!(diff.actual, "false");
        assert_eq!(diff.expected, "true");
    }

    #[test]
    fn test_equality_shape_with_elaboration() {
        let message = "/src/a.cpp:10\nExpected equality of these values:\n  expected\n    Which is: 4\n  sum(2, 3)\n    Which is: 5\n";
        let diff = classify(message, None).unwrap().diff.unwrap();
        assert_eq!(diff.expected_label, "expected");
        assert_eq!(diff.expected, "4");
        assert_eq!(diff.actual, "5");
    }

    #[test]
    fn test_equality_shape_literals() {
        let message = "/src/a.cpp:10\nExpected equality of these values:\n  4\n  sum(2, 3)\n    Which is: 5\nWith diff:\n@@ -1 +1 @@\n";
        let diff = classify(message, None).unwrap().diff.unwrap();
        assert_eq!(diff.expected, "4");
        assert_eq!(diff.actual, "5");
    }

    #[test]
    fn test_generic_shape() {
        let message = "/src/a.cpp:3\nExpected: (a) < (b), actual: 5 vs 3";
        let diff = classify(message, None).unwrap().diff.unwrap();
        assert_eq!(diff.expected, "(a) < (b)");
        assert_eq!(diff.actual, "5 vs 3");
    }

    #[test]
    fn test_unclassified_message() {
        let detail = classify("/src/a.cpp:3\nFailed\nsomething broke", None).unwrap();
        assert!(detail.diff.is_none());
        assert_eq!(detail.message, "Failed\nsomething broke");
        assert_eq!(detail.line, 2);
    }

    #[test]
    fn test_parameter_line_appended() {
        let detail = classify("/src/a.cpp:3\nFailed", Some("42")).unwrap();
        assert_eq!(detail.message, "Failed\nFailure parameter: 42");
    }

    #[test]
    fn test_missing_location_is_an_error() {
        let err = classify("unknown file\nC++ exception thrown", None).unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedLocation(ref l) if l == "unknown file"));
        assert!(classify("", None).is_err());
        assert!(classify("file.cpp:0\nx", None).is_err());
    }

    #[test]
    fn test_windows_path_location() {
        let detail = classify("C:\\src\\a.cpp:12\nFailed", None).unwrap();
        assert_eq!(detail.line, 11);
    }
}
