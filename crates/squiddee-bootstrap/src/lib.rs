//! Proxy instance bootstrap
//!
//! Prepares a working directory, makes sure a CA certificate exists, renders
//! `squid.conf`, runs the one-time cache and certificate database
//! initializations and finally runs the proxy in the foreground.
//!
//! Every one-time step is guarded by a presence check on disk, so running the
//! sequence again resumes from the first step that has not completed yet.

pub mod helper;
pub mod orchestrator;
pub mod workdir;

pub use helper::{default_helper_candidates, resolve_helper_path, DEFAULT_HELPER_CANDIDATES};
pub use orchestrator::{Bootstrap, BootstrapOptions, BootstrapReport, Programs, Stage, StepOutcome};
pub use workdir::WorkingDirectory;

use squiddee_cert::CertError;
use squiddee_config::ConfigError;
use squiddee_process::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

/// Bootstrap errors
///
/// Every variant aborts the sequence; [`BootstrapError::stage`] tells which
/// step failed.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Failed to create {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Certificate(#[from] CertError),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("{stage} failed: {source}")]
    Process {
        stage: Stage,
        #[source]
        source: ProcessError,
    },
}

impl BootstrapError {
    /// The step that failed
    pub fn stage(&self) -> Stage {
        match self {
            BootstrapError::Filesystem { .. } => Stage::EnsureDirectories,
            BootstrapError::Certificate(_) => Stage::EnsureCertificate,
            BootstrapError::Configuration(_) => Stage::RenderConfiguration,
            BootstrapError::Process { stage, .. } => *stage,
        }
    }

    /// Exit status of the external command that failed, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BootstrapError::Certificate(e) => e.exit_code(),
            BootstrapError::Process { source, .. } => source.exit_code(),
            _ => None,
        }
    }
}
