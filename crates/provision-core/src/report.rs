//! Validation report written after a successful run.

use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::command::{CommandExecutor, CommandOutput, CommandSpec};
use crate::config::ProvisionConfig;
use crate::error::ProvisionResult;
use crate::run_log::{RunLog, LINE_TIMESTAMP_FORMAT};

/// Sentinel recorded when no GPU driver / CUDA runtime is detected.
pub const CUDA_NOT_FOUND: &str = "not found";

/// Recorded when a tool version probe fails.
pub const VERSION_UNAVAILABLE: &str = "unavailable";

/// Snapshot of tool versions at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub completed_at: String,
    pub python_version: String,
    pub pip_version: String,
    pub cuda_version: String,
}

impl ValidationReport {
    /// Probe the interpreter, pip and the GPU driver. Probe output is mirrored
    /// into the run log.
    pub async fn collect(
        executor: &dyn CommandExecutor,
        config: &ProvisionConfig,
        completed_at: &DateTime<Local>,
        log: &mut RunLog,
    ) -> ProvisionResult<Self> {
        let python = CommandSpec::new(config.python.clone(), ["--version"]);
        let pip = CommandSpec::new(config.python.clone(), ["-m", "pip", "--version"]);
        let smi = CommandSpec::new("nvidia-smi", Vec::<String>::new());

        let python_version = version_line(run_probe(executor, &python, log).await?);
        let pip_version = version_line(run_probe(executor, &pip, log).await?);
        let cuda_version = match run_probe(executor, &smi, log).await? {
            Some(out) if out.success() => {
                parse_cuda_version(&out.stdout).unwrap_or_else(|| CUDA_NOT_FOUND.to_string())
            }
            Some(out) => {
                tracing::debug!(event = "report.cuda_probe_failed", exit_code = out.exit_code);
                CUDA_NOT_FOUND.to_string()
            }
            None => CUDA_NOT_FOUND.to_string(),
        };

        Ok(Self {
            completed_at: completed_at.format(LINE_TIMESTAMP_FORMAT).to_string(),
            python_version,
            pip_version,
            cuda_version,
        })
    }

    /// The four report lines.
    pub fn render(&self) -> String {
        format!(
            "Setup completed at: {}\nPython version: {}\nPip version: {}\nCUDA version: {}\n",
            self.completed_at, self.python_version, self.pip_version, self.cuda_version
        )
    }

    pub fn write(&self, path: &Path) -> ProvisionResult<()> {
        std::fs::write(path, self.render())?;
        Ok(())
    }
}

/// Run a probe and log its output. `Ok(None)` when it could not be spawned.
async fn run_probe(
    executor: &dyn CommandExecutor,
    spec: &CommandSpec,
    log: &mut RunLog,
) -> ProvisionResult<Option<CommandOutput>> {
    let rendered = spec.render();
    match executor.run(spec, 0).await {
        Ok(out) => {
            log.command_output(&rendered, &out)?;
            Ok(Some(out))
        }
        Err(e) => {
            tracing::debug!(event = "report.probe_failed", command = %rendered, error = %e);
            Ok(None)
        }
    }
}

fn version_line(output: Option<CommandOutput>) -> String {
    match output {
        Some(out) if out.success() => out
            .first_line()
            .map(str::to_string)
            .unwrap_or_else(|| VERSION_UNAVAILABLE.to_string()),
        _ => VERSION_UNAVAILABLE.to_string(),
    }
}

/// Extract `X.Y` from the `CUDA Version: X.Y` field of the `nvidia-smi` banner.
pub fn parse_cuda_version(smi_output: &str) -> Option<String> {
    let re = regex::Regex::new(r"CUDA Version:\s*([0-9]+(?:\.[0-9]+)*)").ok()?;
    re.captures(smi_output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
