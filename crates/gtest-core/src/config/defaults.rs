//! Default values for gtest-explorer configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Build Defaults
// ============================================================================

/// Placeholder substituted with the workspace root in the build folder path.
pub const WORKSPACE_FOLDER_PLACEHOLDER: &str = "${workspaceFolder}";

/// Default build folder, relative to the workspace root.
pub const DEFAULT_BUILD_FOLDER: &str = "${workspaceFolder}/build";

/// Default build manifest file name inside the build folder.
pub const DEFAULT_MANIFEST_FILE: &str = "build.ninja";

/// Default build tool invoked with target names.
pub const DEFAULT_BUILD_TOOL: &str = "ninja";

/// Marker the build tool prints when a build fails.
pub const BUILD_STOPPED_MARKER: &str = "build stopped";

/// Directory (inside the build folder) receiving per-run JSON result files.
pub const DEFAULT_RESULTS_DIR: &str = ".gtest-results";

// ============================================================================
// Log Defaults
// ============================================================================

/// Default log level for the tracing subscriber.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ============================================================================
// Debugger Defaults
// ============================================================================

/// Default debugger backend selector.
pub const DEFAULT_DEBUGGER: &str = "gdb";

// ============================================================================
// Config File Locations
// ============================================================================

/// Project-local config file name.
pub const PROJECT_CONFIG_FILE: &str = "gtest.toml";

/// Subdirectory of the user config dir holding `config.toml`.
pub const USER_CONFIG_DIR: &str = "gtest-explorer";
