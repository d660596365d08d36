//! `--gtest_filter` construction.

use std::collections::BTreeSet;

use crate::discovery::TestCase;

/// Filter selecting every test of a binary.
pub const MATCH_ALL: &str = "*";

/// Combine the filters of the requested cases of one target.
///
/// `whole_binary` selects everything. Otherwise each case contributes its
/// glob (parameterized and typed cases carry a `*` for the runtime index);
/// patterns are OR'd with `:` without a trailing separator.
pub fn combine<'a>(cases: impl IntoIterator<Item = &'a TestCase>, whole_binary: bool) -> String {
    if whole_binary {
        return MATCH_ALL.to_string();
    }

    let patterns: BTreeSet<&str> = cases.into_iter().map(TestCase::gtest_filter).collect();
    if patterns.is_empty() {
        return MATCH_ALL.to_string();
    }
    patterns.into_iter().collect::<Vec<_>>().join(":")
}
