//! Build manifest index.
//!
//! Derives the `source file → build target` mapping from a generated
//! `build.ninja`. Two linked passes run over the manifest text:
//!
//! - **Link rules** map each executable target name to its output file.
//! - **Compile rules** map each compiled source to the target it belongs to,
//!   which is then resolved through the link rules.
//!
//! The index is immutable once built. A manifest change produces a brand new
//! index that replaces the old one wholesale; targets can gain and lose
//! sources in both passes at once, so patching in place is never correct.

mod error;
mod patterns;

pub use error::ManifestError;
pub use patterns::{COMPILE_RULE_PATTERN, LINK_RULE_PATTERN, UNSCANNED_SUFFIX};

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// A named test executable produced by the build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BuildTarget {
    /// Target name as known to the build tool.
    pub name: String,
    /// Absolute path of the linked executable.
    pub executable_path: PathBuf,
}

/// Mapping from absolute source path to the target compiling it.
#[derive(Debug, Clone, Default)]
pub struct ManifestIndex {
    build_folder: PathBuf,
    sources: BTreeMap<PathBuf, BuildTarget>,
}

impl ManifestIndex {
    /// An index with no entries. Installed while the manifest is unavailable.
    pub fn empty(build_folder: impl Into<PathBuf>) -> Self {
        Self {
            build_folder: build_folder.into(),
            sources: BTreeMap::new(),
        }
    }

    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path, build_folder: &Path) -> Result<Self, ManifestError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ManifestError::unavailable(path, e))?;
        Self::parse(&content, build_folder)
    }

    /// Parse manifest text, resolving relative paths against `build_folder`.
    pub fn parse(content: &str, build_folder: &Path) -> Result<Self, ManifestError> {
        let link_re = Regex::new(LINK_RULE_PATTERN)?;
        let compile_re = Regex::new(COMPILE_RULE_PATTERN)?;

        let mut target_files: HashMap<&str, &str> = HashMap::new();
        for cap in link_re.captures_iter(content) {
            if let (Some(file), Some(name)) = (cap.get(1), cap.get(2)) {
                target_files.insert(name.as_str(), file.as_str());
            }
        }

        let mut sources = BTreeMap::new();
        for cap in compile_re.captures_iter(content) {
            let (Some(name), Some(source)) = (cap.get(1), cap.get(2)) else {
                continue;
            };
            // CMake 3.28+ names the compile rules of targets without module
            // scanning `<name>_unscanned_<config>`.
            let name = match name.as_str().strip_suffix(UNSCANNED_SUFFIX) {
                Some(stripped) if !target_files.contains_key(name.as_str()) => stripped,
                _ => name.as_str(),
            };

            // Sources of library targets have no executable to run.
            let Some(target_file) = target_files.get(name) else {
                debug!(
                    target_name = name,
                    source = source.as_str(),
                    "source belongs to a non-executable target"
                );
                continue;
            };

            sources.insert(
                resolve(build_folder, unescape(source.as_str())),
                BuildTarget {
                    name: name.to_string(),
                    executable_path: resolve(build_folder, unescape(target_file)),
                },
            );
        }

        info!(
            sources = sources.len(),
            targets = target_files.len(),
            "build manifest indexed"
        );

        Ok(Self {
            build_folder: build_folder.to_path_buf(),
            sources,
        })
    }

    /// Build folder the paths were resolved against.
    pub fn build_folder(&self) -> &Path {
        &self.build_folder
    }

    /// Number of indexed source files.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Target compiling the given source, if the file is part of the build.
    pub fn get(&self, source: &Path) -> Option<&BuildTarget> {
        self.sources.get(source)
    }

    /// Whether the given source is covered by the build.
    pub fn contains(&self, source: &Path) -> bool {
        self.sources.contains_key(source)
    }

    /// Iterate over `(source, target)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &BuildTarget)> {
        self.sources.iter().map(|(path, target)| (path.as_path(), target))
    }

    /// Distinct targets, sorted by name.
    pub fn targets(&self) -> Vec<&BuildTarget> {
        let mut targets: Vec<&BuildTarget> = self.sources.values().collect();
        targets.sort_by(|a, b| a.name.cmp(&b.name));
        targets.dedup_by(|a, b| a.name == b.name);
        targets
    }
}

/// Undo ninja's `$` escaping of spaces, colons and dollars.
fn unescape(path: &str) -> String {
    path.replace("$ ", " ").replace("$:", ":").replace("$$", "$")
}

/// Resolve a manifest path against the build folder.
fn resolve(build_folder: &Path, path: String) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        normalize_path(&path)
    } else {
        normalize_path(&build_folder.join(path))
    }
}

/// Normalize a path by resolving . and .. components.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => result.push(component),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
# CMAKE generated file: DO NOT EDIT!
rule CXX_COMPILER__mytest_Debug
  command = /usr/bin/c++ $DEFINES $INCLUDES $FLAGS -o $out -c $in

build tests/CMakeFiles/mytest.dir/foo.cpp.o: CXX_COMPILER__mytest_Debug /src/project/tests/foo.cpp || cmake_object_order_depends_target_mytest
build tests/CMakeFiles/mytest.dir/bar.cpp.o: CXX_COMPILER__mytest_Debug ../tests/bar.cpp || cmake_object_order_depends_target_mytest
build lib/CMakeFiles/core.dir/core.cpp.o: CXX_COMPILER__core_Debug /src/project/lib/core.cpp
build lib/libcore.a: CXX_STATIC_LIBRARY_LINKER__core_Debug lib/CMakeFiles/core.dir/core.cpp.o
build tests/mytest: CXX_EXECUTABLE_LINKER__mytest_Debug tests/CMakeFiles/mytest.dir/foo.cpp.o tests/CMakeFiles/mytest.dir/bar.cpp.o | lib/libcore.a
build tests/CMakeFiles/my_other_test.dir/baz.cpp.o: CXX_COMPILER__my_other_test_ /src/project/tests/baz.cpp
build tests/my_other_test: CXX_EXECUTABLE_LINKER__my_other_test_ tests/CMakeFiles/my_other_test.dir/baz.cpp.o
"#;

    fn index() -> ManifestIndex {
        ManifestIndex::parse(MANIFEST, Path::new("/src/project/build")).unwrap()
    }

    #[test]
    fn test_absolute_source_resolves_to_target() {
        let index = index();
        let target = index.get(Path::new("/src/project/tests/foo.cpp")).unwrap();
        assert_eq!(target.name, "mytest");
        assert_eq!(
            target.executable_path,
            PathBuf::from("/src/project/build/tests/mytest")
        );
    }

    #[test]
    fn test_relative_source_is_normalized() {
        let index = index();
        assert!(index.contains(Path::new("/src/project/tests/bar.cpp")));
    }

    #[test]
    fn test_library_sources_are_skipped() {
        let index = index();
        assert!(!index.contains(Path::new("/src/project/lib/core.cpp")));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_underscore_target_with_empty_config() {
        let index = index();
        let target = index.get(Path::new("/src/project/tests/baz.cpp")).unwrap();
        assert_eq!(target.name, "my_other_test");
    }

    #[test]
    fn test_distinct_targets() {
        let index = index();
        let names: Vec<&str> = index.targets().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["my_other_test", "mytest"]);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("my$ dir/C$:/x$$y"), "my dir/C:/x$y");
    }
}
