//! Provisioning configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, ProvisionResult};

/// Packages installed by the `install_essentials` step unless overridden.
pub const DEFAULT_ESSENTIALS: &[&str] = &[
    "build-essential",
    "python3-dev",
    "python3-pip",
    "git",
    "wget",
    "curl",
];

/// Configuration for a provisioning run.
///
/// Relative paths are resolved against `work_dir`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisionConfig {
    /// Directory holding the input files and receiving the run log and report.
    pub work_dir: PathBuf,

    /// Package list in `dpkg -l` listing format.
    pub package_list: PathBuf,

    /// Dependency manifest passed to `pip install -r`.
    pub manifest: PathBuf,

    /// Run log file name prefix; the start timestamp is appended.
    pub log_prefix: String,

    /// Validation report file name.
    pub report_file: String,

    /// Packages installed before the package list.
    pub essentials: Vec<String>,

    /// Python interpreter used for pip and version probes.
    pub python: String,

    /// Prefix system package manager calls with `sudo`.
    pub use_sudo: bool,

    /// Per-step timeout in seconds (0 = no timeout).
    pub step_timeout_secs: u64,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            package_list: PathBuf::from("packages.txt"),
            manifest: PathBuf::from("requirements.txt"),
            log_prefix: "setup_log".to_string(),
            report_file: "validation_report.txt".to_string(),
            essentials: DEFAULT_ESSENTIALS.iter().map(|s| s.to_string()).collect(),
            python: "python3".to_string(),
            use_sudo: false,
            step_timeout_secs: 0,
        }
    }
}

impl ProvisionConfig {
    /// Reject configurations that cannot produce a runnable plan.
    pub fn validate(&self) -> ProvisionResult<()> {
        if self.essentials.iter().all(|p| p.trim().is_empty()) {
            return Err(ProvisionError::InvalidConfig(
                "essentials list is empty".to_string(),
            ));
        }
        if self.python.trim().is_empty() {
            return Err(ProvisionError::InvalidConfig(
                "python executable is empty".to_string(),
            ));
        }
        if self.log_prefix.trim().is_empty() {
            return Err(ProvisionError::InvalidConfig(
                "log prefix is empty".to_string(),
            ));
        }
        if self.report_file.trim().is_empty() {
            return Err(ProvisionError::InvalidConfig(
                "report file name is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a configured path against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }

    pub fn package_list_path(&self) -> PathBuf {
        self.resolve(&self.package_list)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.resolve(&self.manifest)
    }

    pub fn report_path(&self) -> PathBuf {
        self.work_dir.join(&self.report_file)
    }

    /// Configuration for a dry run: the report goes to `dry_run_<report_file>`
    /// so a real report is left in place.
    pub fn for_dry_run(mut self) -> Self {
        self.report_file = format!("dry_run_{}", self.report_file);
        self
    }
}
