pub mod config;
pub mod debug;
pub mod discovery;
pub mod document;
pub mod manifest;
pub mod process;
pub mod results;
pub mod run;
pub mod session;

pub use config::Config;
pub use debug::DebugLaunch;
pub use discovery::{discover, DocumentTestTree, TestCase, TestItem};
pub use document::{Document, DocumentState};
pub use manifest::{BuildTarget, ManifestIndex};
pub use process::{CommandRunner, ProcessRunner};
pub use results::{FailureDetail, TestOutcome};
pub use run::{RunObserver, RunReport, RunRequest};
pub use session::{Session, TestExplorer};
