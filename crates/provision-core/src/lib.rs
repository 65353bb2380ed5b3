//! Provision Core - sequential workstation provisioning
//!
//! Provides a fail-fast provisioning pipeline that:
//! - Executes an ordered plan of steps (apt, pip, package lists, manifests)
//! - Mirrors every status line and command output to console and a run log
//! - Writes a validation report only when no fatal step failed

pub mod command;
pub mod config;
pub mod error;
pub mod fakes;
pub mod obs;
pub mod package_list;
pub mod report;
pub mod run_log;
pub mod runner;
pub mod step;
pub mod telemetry;

// Re-export key types
pub use command::{CommandExecutor, CommandOutput, CommandSpec, DryRunExecutor, ProcessExecutor};
pub use config::ProvisionConfig;
pub use error::{ProvisionError, ProvisionResult};
pub use package_list::{PackageEntry, PackageList};
pub use report::{ValidationReport, CUDA_NOT_FOUND};
pub use run_log::{LogLevel, RunLog};
pub use runner::{provision, ProvisionRunner, RunSummary, StepFailure, StepOutcome, StepResult};
pub use step::{Fatality, ProvisionPlan, StepAction, StepConfig};
pub use telemetry::init_tracing;
