use std::path::{Path, PathBuf};
use tempfile::TempDir;

use gtest_core::config::{ConfigError, DEFAULT_BUILD_TOOL, DEFAULT_DEBUGGER, DEFAULT_MANIFEST_FILE};
use gtest_core::Config;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.build.tool, DEFAULT_BUILD_TOOL);
    assert_eq!(config.build.manifest, DEFAULT_MANIFEST_FILE);
    assert_eq!(config.debugger.backend, DEFAULT_DEBUGGER);
}

#[test]
fn test_config_to_toml() {
    let toml_str = Config::default_config_string();
    assert!(toml_str.contains("[build]"));
    assert!(toml_str.contains("[log]"));
    assert!(toml_str.contains("[debugger]"));
    assert!(toml_str.contains("${workspaceFolder}/build"));
}

#[test]
fn test_partial_config_keeps_defaults() {
    let toml_str = r#"
[build]
folder = "out/debug"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.build.folder, "out/debug");
    assert_eq!(config.build.tool, DEFAULT_BUILD_TOOL);
    assert_eq!(
        config.build.manifest_path(Path::new("/work")),
        PathBuf::from("/work/out/debug/build.ninja")
    );
}

#[test]
fn test_from_file_rejects_empty_tool() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("gtest.toml");
    std::fs::write(&path, "[build]\ntool = \"  \"\n").unwrap();

    let err = Config::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_from_file_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("gtest.toml");
    std::fs::write(&path, "[build\nfolder = 1").unwrap();

    assert!(matches!(Config::from_file(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_results_path_inside_build_folder() {
    let config = Config::default();
    assert_eq!(
        config.build.results_path(Path::new("/work")),
        PathBuf::from("/work/build/.gtest-results")
    );
}
