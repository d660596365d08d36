//! Configuration management for gtest-explorer.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `gtest.toml` file
//! 3. User config `~/.config/gtest-explorer/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build tree configuration.
    pub build: BuildConfig,

    /// Logging configuration.
    pub log: LogConfig,

    /// Debugger configuration.
    pub debugger: DebuggerConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./gtest.toml` (project local)
    /// 2. `~/.config/gtest-explorer/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new(PROJECT_CONFIG_FILE).exists() {
            return Self::from_file(PROJECT_CONFIG_FILE);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(USER_CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Self::default().finish()
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.finish()
    }

    /// Apply environment overrides, then validate the result.
    fn finish(mut self) -> Result<Self, ConfigError> {
        self.apply_env_overrides();
        self.validate()?;
        Ok(self)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(folder) = std::env::var("GTEST_BUILD_FOLDER") {
            self.build.folder = folder;
        }
        if let Ok(tool) = std::env::var("GTEST_BUILD_TOOL") {
            self.build.tool = tool;
        }
        if let Ok(level) = std::env::var("GTEST_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Ok(backend) = std::env::var("GTEST_DEBUGGER") {
            self.debugger.backend = backend;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.build.folder.trim().is_empty() {
            return Err(ConfigError::Invalid("build.folder must not be empty".to_string()));
        }
        if self.build.tool.trim().is_empty() {
            return Err(ConfigError::Invalid("build.tool must not be empty".to_string()));
        }
        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Build tree configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build folder; may contain `${workspaceFolder}`.
    pub folder: String,

    /// Manifest file name, relative to the build folder.
    pub manifest: String,

    /// Build tool invoked as `<tool> <target...>` inside the build folder.
    pub tool: String,

    /// Directory for JSON result files, relative to the build folder.
    pub results_dir: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            folder: DEFAULT_BUILD_FOLDER.to_string(),
            manifest: DEFAULT_MANIFEST_FILE.to_string(),
            tool: DEFAULT_BUILD_TOOL.to_string(),
            results_dir: DEFAULT_RESULTS_DIR.to_string(),
        }
    }
}

impl BuildConfig {
    /// Resolve the build folder against the workspace root.
    ///
    /// The `${workspaceFolder}` placeholder is substituted first; a path that
    /// is still relative afterwards is joined onto the workspace root.
    pub fn build_folder(&self, workspace_root: &Path) -> PathBuf {
        let root = workspace_root.to_string_lossy();
        let substituted = self.folder.replace(WORKSPACE_FOLDER_PLACEHOLDER, &root);
        let path = PathBuf::from(substituted);
        if path.is_absolute() {
            path
        } else {
            workspace_root.join(path)
        }
    }

    /// Full path to the build manifest.
    pub fn manifest_path(&self, workspace_root: &Path) -> PathBuf {
        self.build_folder(workspace_root).join(&self.manifest)
    }

    /// Full path to the results directory.
    pub fn results_path(&self, workspace_root: &Path) -> PathBuf {
        self.build_folder(workspace_root).join(&self.results_dir)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level directive for the tracing subscriber ("error" .. "trace").
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Debugger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerConfig {
    /// Backend selector handed to the external debugger integration.
    pub backend: String,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_DEBUGGER.to_string(),
        }
    }
}
