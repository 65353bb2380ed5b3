//! Sequential provisioning runner.
//!
//! Steps run strictly in plan order. Each step resolves to a [`StepOutcome`];
//! the first `Fatal` outcome aborts the run before the validation report is
//! written.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tracing::Instrument;
use uuid::Uuid;

use crate::command::{CommandExecutor, CommandOutput, CommandSpec};
use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, ProvisionResult};
use crate::obs;
use crate::package_list::PackageList;
use crate::report::ValidationReport;
use crate::run_log::RunLog;
use crate::step::{Fatality, ProvisionPlan, StepAction, StepConfig};

/// Final status line of a clean run.
pub const COMPLETION_MESSAGE: &str = "Setup completed successfully";

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Exit code of the failing command, -1 when it never ran to completion.
    pub exit_code: i32,
    pub reason: String,
}

/// Result classification of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    NonFatal(StepFailure),
    Fatal(StepFailure),
}

impl StepOutcome {
    fn from_failure(fatality: Fatality, failure: StepFailure) -> Self {
        match fatality {
            Fatality::Fatal => StepOutcome::Fatal(failure),
            Fatality::NonFatal => StepOutcome::NonFatal(failure),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Success => "success",
            StepOutcome::NonFatal(_) => "non_fatal",
            StepOutcome::Fatal(_) => "fatal",
        }
    }

    fn exit_code(&self) -> i32 {
        match self {
            StepOutcome::Success => 0,
            StepOutcome::NonFatal(f) | StepOutcome::Fatal(f) => f.exit_code,
        }
    }
}

/// Result of one executed step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step_name: String,

    pub outcome: StepOutcome,

    /// Commands invoked by this step.
    pub commands_run: usize,

    /// Packages whose individual install failed (package list steps only).
    pub failed_packages: Vec<String>,

    pub duration_ms: u64,
}

impl StepResult {
    pub fn passed(&self) -> bool {
        self.outcome == StepOutcome::Success
    }
}

/// Result of a run that reached the end of the plan.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,

    pub plan_digest: String,

    /// Results of executed steps (disabled steps are absent).
    pub steps: Vec<StepResult>,

    pub report: ValidationReport,

    pub report_path: PathBuf,

    pub log_path: PathBuf,

    pub duration_ms: u64,
}

impl RunSummary {
    pub fn passed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.passed()).count()
    }

    /// Non-fatal step failures plus individual package install failures.
    pub fn non_fatal_failures(&self) -> usize {
        count_failures(&self.steps)
    }
}

/// Executes a [`ProvisionPlan`] against a command executor.
pub struct ProvisionRunner {
    executor: Arc<dyn CommandExecutor>,
    config: ProvisionConfig,
}

impl ProvisionRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: ProvisionConfig) -> Self {
        Self { executor, config }
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Run every enabled step, then write the validation report.
    ///
    /// Returns `ProvisionError::FatalStep` for the first fatal failure; by
    /// then the failure is already in the run log and no report exists.
    pub async fn run(&self, plan: &ProvisionPlan, log: &mut RunLog) -> ProvisionResult<RunSummary> {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        self.run_steps(plan, log, run_id).instrument(span).await
    }

    async fn run_steps(
        &self,
        plan: &ProvisionPlan,
        log: &mut RunLog,
        run_id: String,
    ) -> ProvisionResult<RunSummary> {
        let start = Instant::now();
        let plan_digest = plan.digest();

        obs::emit_run_started(&run_id, &plan_digest, plan.steps.len());
        log.info(&format!(
            "Starting provisioning run {} (plan {}, {} steps)",
            run_id,
            &plan_digest[..12],
            plan.steps.len()
        ))?;

        let mut results = Vec::new();

        for step in &plan.steps {
            if !step.enabled {
                log.info(&format!("Skipping disabled step: {}", step.name))?;
                continue;
            }

            let result = self.execute_step(step, log).await?;
            if let StepOutcome::Fatal(failure) = &result.outcome {
                let duration_ms = start.elapsed().as_millis() as u64;
                log.error(&format!(
                    "Aborting: fatal step '{}' failed, see above",
                    step.name
                ))?;
                obs::emit_run_finished(&run_id, duration_ms, false, count_failures(&results));

                return Err(ProvisionError::FatalStep {
                    step: step.name.clone(),
                    exit_code: failure.exit_code,
                    reason: failure.reason.clone(),
                });
            }
            results.push(result);
        }

        let report =
            ValidationReport::collect(self.executor.as_ref(), &self.config, &Local::now(), log).await?;
        let report_path = self.config.report_path();
        report.write(&report_path)?;
        log.info(&format!(
            "Validation report written to {}",
            report_path.display()
        ))?;

        let summary = RunSummary {
            run_id,
            plan_digest,
            steps: results,
            report,
            report_path,
            log_path: log.path().to_path_buf(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        let failures = summary.non_fatal_failures();
        if failures > 0 {
            log.warn(&format!(
                "{} non-fatal failure(s) recorded during this run",
                failures
            ))?;
        }
        log.success(COMPLETION_MESSAGE)?;
        obs::emit_run_finished(&summary.run_id, summary.duration_ms, true, failures);

        Ok(summary)
    }

    /// Execute one step and report its outcome to the log.
    ///
    /// `Err` is reserved for run log IO failures.
    pub async fn execute_step(&self, step: &StepConfig, log: &mut RunLog) -> ProvisionResult<StepResult> {
        let start = Instant::now();
        obs::emit_step_started(&step.name, step.is_fatal());
        log.info(&format!("{}...", step.description))?;

        let mut result = StepResult {
            step_name: step.name.clone(),
            outcome: StepOutcome::Success,
            commands_run: 0,
            failed_packages: Vec::new(),
            duration_ms: 0,
        };

        let failure = match &step.action {
            StepAction::Command { command } => {
                result.commands_run += 1;
                self.run_command(command, step.timeout_secs, log).await?.err()
            }
            StepAction::InstallManifest { path, install } => {
                if path.is_file() {
                    result.commands_run += 1;
                    let command = install.clone().arg(path.to_string_lossy());
                    self.run_command(&command, step.timeout_secs, log).await?.err()
                } else {
                    Some(StepFailure {
                        exit_code: -1,
                        reason: ProvisionError::ManifestMissing { path: path.clone() }.to_string(),
                    })
                }
            }
            StepAction::InstallPackageList { path, install } => match PackageList::load(path) {
                Ok(list) => {
                    self.install_packages(&list, install, step.timeout_secs, log, &mut result)
                        .await?;
                    None
                }
                Err(e) => Some(StepFailure {
                    exit_code: -1,
                    reason: e.to_string(),
                }),
            },
        };

        match failure {
            None => {
                if result.failed_packages.is_empty() {
                    log.success(&step.success_message)?;
                } else {
                    log.success(&format!(
                        "{} ({} package(s) failed: {})",
                        step.success_message,
                        result.failed_packages.len(),
                        result.failed_packages.join(", ")
                    ))?;
                }
            }
            Some(failure) => {
                log.error(&format!("{}: {}", step.failure_message, failure.reason))?;
                if !step.is_fatal() {
                    log.warn(&format!("Continuing after non-fatal failure of '{}'", step.name))?;
                }
                result.outcome = StepOutcome::from_failure(step.fatality, failure);
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_step_finished(
            &step.name,
            result.outcome.label(),
            result.outcome.exit_code(),
            result.duration_ms,
        );
        Ok(result)
    }

    /// One install attempt per listed line; failures are recorded, never fatal.
    async fn install_packages(
        &self,
        list: &PackageList,
        install: &CommandSpec,
        timeout_secs: u64,
        log: &mut RunLog,
        result: &mut StepResult,
    ) -> ProvisionResult<()> {
        log.info(&format!("Found {} package(s) to install", list.attempt_count()))?;

        for (line, name) in list.attempts() {
            let Some(name) = name else {
                let label = format!("line {}", line);
                obs::emit_package_failed(&label, -1);
                log.error(&format!(
                    "Failed to install package from {}: no package name in second column",
                    label
                ))?;
                result.failed_packages.push(label);
                continue;
            };

            log.info(&format!("Installing package: {}", name))?;
            let command = install.clone().arg(name);
            result.commands_run += 1;

            match self.run_command(&command, timeout_secs, log).await? {
                Ok(()) => log.success(&format!("Installed package: {}", name))?,
                Err(failure) => {
                    obs::emit_package_failed(name, failure.exit_code);
                    log.error(&format!(
                        "Failed to install package {}: {}",
                        name, failure.reason
                    ))?;
                    result.failed_packages.push(name.to_string());
                }
            }
        }
        Ok(())
    }

    /// Run a command, mirror its output to the log, and classify the exit.
    ///
    /// Outer `Err`: log IO failure. Inner `Err`: the command failed.
    async fn run_command(
        &self,
        command: &CommandSpec,
        timeout_secs: u64,
        log: &mut RunLog,
    ) -> ProvisionResult<Result<(), StepFailure>> {
        let rendered = command.render();
        tracing::debug!(event = "command.started", command = %rendered);

        match self.executor.run(command, timeout_secs).await {
            Ok(output) => {
                log.command_output(&rendered, &output)?;
                Ok(classify(&rendered, &output))
            }
            Err(e) => Ok(Err(StepFailure {
                exit_code: -1,
                reason: format!("could not run `{}`: {}", rendered, e),
            })),
        }
    }
}

fn count_failures(results: &[StepResult]) -> usize {
    results
        .iter()
        .map(|r| r.failed_packages.len() + usize::from(!r.passed()))
        .sum()
}

fn classify(rendered: &str, output: &CommandOutput) -> Result<(), StepFailure> {
    if output.success() {
        Ok(())
    } else {
        Err(StepFailure {
            exit_code: output.exit_code,
            reason: format!("`{}` exited with code {}", rendered, output.exit_code),
        })
    }
}

/// Create the run log in the working directory and run the standard plan.
pub async fn provision(
    config: ProvisionConfig,
    executor: Arc<dyn CommandExecutor>,
    console: bool,
) -> ProvisionResult<RunSummary> {
    config.validate()?;
    let mut log = RunLog::create(&config.work_dir, &config.log_prefix, &Local::now())?;
    if !console {
        log = log.with_console(None);
    }
    let plan = ProvisionPlan::standard(&config);
    ProvisionRunner::new(executor, config).run(&plan, &mut log).await
}
