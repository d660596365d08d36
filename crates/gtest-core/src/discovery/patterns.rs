//! Regex pattern and macro names for test declaration scanning.

/// Macro head of every supported test declaration.
///
/// Anchored at line start; captures 1 = macro name, 2 = first argument,
/// 3 = second argument. Only the head line is read, never the body.
pub const MACRO_PATTERN: &str = r"(?m)^[ \t]*(TEST|TEST_F|TEST_P|TYPED_TEST|TYPED_TEST_P|INSTANTIATE_TEST_SUITE_P|INSTANTIATE_TEST_CASE_P|INSTANTIATE_TYPED_TEST_SUITE_P|INSTANTIATE_TYPED_TEST_CASE_P)[ \t]*\([ \t]*(\w+)[ \t]*,[ \t]*(\w+)";
