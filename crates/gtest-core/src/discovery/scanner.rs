//! Macro scanner turning raw source text into ordered macro occurrences.

use regex::Regex;
use serde::Serialize;

use super::patterns::MACRO_PATTERN;

/// Kind of test declaration macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MacroKind {
    /// `TEST(Suite, Name)`
    Test,
    /// `TEST_F(Fixture, Name)`
    TestFixture,
    /// `TEST_P(Fixture, Name)`
    TestParam,
    /// `TYPED_TEST(Fixture, Name)`
    TypedTest,
    /// `TYPED_TEST_P(Fixture, Name)`
    TypedTestParam,
    /// `INSTANTIATE_TEST_SUITE_P(Suite, Fixture, ...)`
    InstantiateParamSuite,
    /// `INSTANTIATE_TYPED_TEST_SUITE_P(Suite, Fixture, ...)`
    InstantiateTypedParamSuite,
}

impl MacroKind {
    /// Map a macro name to its kind.
    pub fn from_macro(name: &str) -> Option<Self> {
        match name {
            "TEST" => Some(Self::Test),
            "TEST_F" => Some(Self::TestFixture),
            "TEST_P" => Some(Self::TestParam),
            "TYPED_TEST" => Some(Self::TypedTest),
            "TYPED_TEST_P" => Some(Self::TypedTestParam),
            "INSTANTIATE_TEST_SUITE_P" | "INSTANTIATE_TEST_CASE_P" => {
                Some(Self::InstantiateParamSuite)
            }
            "INSTANTIATE_TYPED_TEST_SUITE_P" | "INSTANTIATE_TYPED_TEST_CASE_P" => {
                Some(Self::InstantiateTypedParamSuite)
            }
            _ => None,
        }
    }

    /// Whether this macro declares a runnable test case.
    pub fn is_test_case(&self) -> bool {
        !self.is_instantiation()
    }

    /// Whether this macro instantiates a parameterized or typed suite.
    pub fn is_instantiation(&self) -> bool {
        matches!(
            self,
            Self::InstantiateParamSuite | Self::InstantiateTypedParamSuite
        )
    }
}

/// One macro invocation found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroOccurrence {
    pub kind: MacroKind,
    /// First macro argument. For instantiations this is the suite prefix.
    pub fixture_name: String,
    /// Second macro argument. For instantiations this is the fixture.
    pub identifier_name: String,
    /// 0-based line of the macro head.
    pub source_line: u32,
}

/// Scan a document for test declaration macros, in source order.
pub fn scan(content: &str) -> Vec<MacroOccurrence> {
    let mut occurrences = Vec::new();

    let re = match Regex::new(MACRO_PATTERN) {
        Ok(r) => r,
        Err(_) => return occurrences,
    };

    let mut line = 0u32;
    let mut consumed = 0usize;

    for cap in re.captures_iter(content) {
        let (Some(whole), Some(name), Some(first), Some(second)) =
            (cap.get(0), cap.get(1), cap.get(2), cap.get(3))
        else {
            continue;
        };
        let Some(kind) = MacroKind::from_macro(name.as_str()) else {
            continue;
        };

        // Matches arrive in order, so count newlines incrementally.
        line += count_newlines(&content[consumed..whole.start()]);
        consumed = whole.start();

        occurrences.push(MacroOccurrence {
            kind,
            fixture_name: first.as_str().to_string(),
            identifier_name: second.as_str().to_string(),
            source_line: line,
        });
    }

    occurrences
}

fn count_newlines(text: &str) -> u32 {
    text.matches('\n').count() as u32
}
