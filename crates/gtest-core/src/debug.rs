//! Launch descriptions for debugging a single test case.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::discovery::TestCase;
use crate::manifest::BuildTarget;

/// Everything an external debugger needs to run one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugLaunch {
    pub name: String,
    pub backend: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl DebugLaunch {
    pub fn for_case(case: &TestCase, target: &BuildTarget, build_folder: &Path, backend: &str) -> Self {
        Self {
            name: format!("Debug {}", case.canonical_id),
            backend: backend.to_string(),
            program: target.executable_path.clone(),
            args: vec![format!("--gtest_filter={}", case.gtest_filter())],
            cwd: build_folder.to_path_buf(),
        }
    }

    /// Command line starting the debugger on the program.
    pub fn command_line(&self) -> Vec<String> {
        let mut line = vec![self.backend.clone()];
        match self.backend.as_str() {
            "gdb" => line.push("--args".to_string()),
            "lldb" => line.push("--".to_string()),
            _ => {}
        }
        line.push(self.program.display().to_string());
        line.extend(self.args.iter().cloned());
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover;

    fn launch(backend: &str) -> DebugLaunch {
        let cases = discover("TEST_P(Param, Works) {}\nINSTANTIATE_TEST_SUITE_P(Ints, Param, Values(1));\n");
        let target = BuildTarget {
            name: "unit_tests".to_string(),
            executable_path: PathBuf::from("/build/bin/unit_tests"),
        };
        DebugLaunch::for_case(&cases[0], &target, Path::new("/build"), backend)
    }

    #[test]
    fn test_filter_selects_case() {
        let launch = launch("gdb");
        assert_eq!(launch.args, vec!["--gtest_filter=Ints/Param.Works/*"]);
        assert_eq!(launch.cwd, PathBuf::from("/build"));
        assert_eq!(launch.name, "Debug Ints/Param.Works/*");
    }

    #[test]
    fn test_command_lines() {
        assert_eq!(
            launch("gdb").command_line(),
            vec!["gdb", "--args", "/build/bin/unit_tests", "--gtest_filter=Ints/Param.Works/*"]
        );
        assert_eq!(launch("lldb").command_line()[1], "--");
        assert_eq!(launch("rr").command_line()[1], "/build/bin/unit_tests");
    }
}
