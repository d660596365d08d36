//! Regex patterns for ninja manifest extraction.
//!
//! Paths are runs of non-space characters where `$` starts a two character
//! escape (`$ `, `$:`, `$$`), so escaped spaces stay inside the path.

/// Link rule: `build <targetFile>: CXX_EXECUTABLE_LINKER__<name>_<config> ...`.
///
/// Captures: 1 = target file, 2 = target name. The name may contain
/// underscores; the config suffix after the last `_` may be empty.
pub const LINK_RULE_PATTERN: &str =
    r"(?m)^build\s+((?:\$.|[^\s$:])+):\s+\w*EXECUTABLE_LINKER__(\S+)_\S*(?:\s|$)";

/// Compile rule: `build <obj>: CXX_COMPILER__<name>_<config> <sourcePath> ...`.
///
/// Captures: 1 = target name, 2 = source path.
pub const COMPILE_RULE_PATTERN: &str =
    r"(?m)^build\s+(?:\$.|[^\s$:])+:\s+\w*COMPILER__(\S+)_\S*\s+((?:\$.|[^\s$])+)";

/// Suffix CMake appends to compile rule names of targets without C++ module
/// scanning.
pub const UNSCANNED_SUFFIX: &str = "_unscanned";
