//! Error types for the provisioning pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the provisioning layer.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A fatal step failed and the pipeline was aborted.
    #[error("fatal step '{step}' failed (exit code {exit_code}): {reason}")]
    FatalStep {
        step: String,
        exit_code: i32,
        reason: String,
    },

    /// The package list file does not exist.
    #[error("package list not found: {}", path.display())]
    PackageListMissing { path: PathBuf },

    /// The dependency manifest does not exist.
    #[error("dependency manifest not found: {}", path.display())]
    ManifestMissing { path: PathBuf },

    /// A command exceeded its step timeout and was killed.
    #[error("command `{command}` timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },

    /// A command with no program; carries the rendered command line.
    #[error("command has no program: `{0}`")]
    EmptyCommand(String),

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem error (run log, report, input files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Plan serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProvisionError {
    /// Process exit code for this error.
    ///
    /// A fatal step propagates its command's exit code when it fits in a
    /// process status (1..=255); everything else maps to 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            ProvisionError::FatalStep { exit_code, .. } if (1..=255).contains(exit_code) => {
                *exit_code as u8
            }
            _ => 1,
        }
    }
}

/// Convenience result alias.
pub type ProvisionResult<T> = std::result::Result<T, ProvisionError>;
