//! Provisioning step definitions and the standard plan.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::command::CommandSpec;
use crate::config::ProvisionConfig;
use crate::error::ProvisionResult;

/// Whether a step failure stops the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Fatality {
    Fatal,
    NonFatal,
}

/// What a step does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StepAction {
    /// Run one command.
    Command { command: CommandSpec },

    /// Install every package of a listing, one `install <name>` call each.
    /// Individual install failures never stop the pipeline.
    InstallPackageList { path: PathBuf, install: CommandSpec },

    /// Install a dependency manifest in one batch call (`install <path>`).
    InstallManifest { path: PathBuf, install: CommandSpec },
}

/// Configuration for a provisioning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Machine-friendly step name.
    pub name: String,

    /// Status line emitted before the step runs.
    pub description: String,

    pub action: StepAction,

    /// Emitted when the step succeeds.
    pub success_message: String,

    /// Emitted when the step fails.
    pub failure_message: String,

    pub fatality: Fatality,

    /// Timeout in seconds per command (0 = none).
    pub timeout_secs: u64,

    /// Whether this step is enabled.
    pub enabled: bool,
}

impl StepConfig {
    /// A fatal step with generated messages.
    pub fn fatal(name: impl Into<String>, description: impl Into<String>, action: StepAction) -> Self {
        let description = description.into();
        Self {
            name: name.into(),
            success_message: format!("{description} completed"),
            failure_message: format!("{description} failed"),
            description,
            action,
            fatality: Fatality::Fatal,
            timeout_secs: 0,
            enabled: true,
        }
    }

    /// Single-command fatal step.
    pub fn command(name: impl Into<String>, description: impl Into<String>, command: CommandSpec) -> Self {
        Self::fatal(name, description, StepAction::Command { command })
    }

    pub fn non_fatal(mut self) -> Self {
        self.fatality = Fatality::NonFatal;
        self
    }

    pub fn with_messages(mut self, success: impl Into<String>, failure: impl Into<String>) -> Self {
        self.success_message = success.into();
        self.failure_message = failure.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Disable this step.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.fatality == Fatality::Fatal
    }
}

/// Ordered list of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionPlan {
    pub steps: Vec<StepConfig>,
}

impl ProvisionPlan {
    pub fn new(steps: Vec<StepConfig>) -> Self {
        Self { steps }
    }

    /// The workstation setup sequence: index update, essentials, package list,
    /// pip self-upgrade, requirements, full upgrade.
    pub fn standard(config: &ProvisionConfig) -> Self {
        // sudo scrubs the environment, so the frontend setting rides on its argv.
        let apt = |args: &[&str]| {
            if config.use_sudo {
                CommandSpec::new(
                    "sudo",
                    ["DEBIAN_FRONTEND=noninteractive", "apt-get"]
                        .into_iter()
                        .chain(args.iter().copied()),
                )
            } else {
                CommandSpec::new("apt-get", args.iter().copied())
                    .with_env("DEBIAN_FRONTEND", "noninteractive")
            }
        };
        let pip = |args: &[&str]| {
            CommandSpec::new(
                config.python.clone(),
                ["-m", "pip"].iter().chain(args.iter()).map(|a| a.to_string()),
            )
        };

        let mut essentials = apt(&["install", "-y"]);
        essentials
            .args
            .extend(config.essentials.iter().filter(|p| !p.trim().is_empty()).cloned());

        let steps = vec![
            StepConfig::command("update_index", "Updating package index", apt(&["update"]))
                .with_messages("Package index updated", "Failed to update package index"),
            StepConfig::command("install_essentials", "Installing essential packages", essentials)
                .with_messages("Essential packages installed", "Failed to install essential packages"),
            StepConfig::fatal(
                "install_system_packages",
                "Installing system packages from package list",
                StepAction::InstallPackageList {
                    path: config.package_list_path(),
                    install: apt(&["install", "-y"]),
                },
            )
            .with_messages("System package installation finished", "Failed to read package list"),
            StepConfig::command("upgrade_pip", "Upgrading pip", pip(&["install", "--upgrade", "pip"]))
                .with_messages("pip upgraded", "Failed to upgrade pip"),
            StepConfig::fatal(
                "install_requirements",
                "Installing Python requirements",
                StepAction::InstallManifest {
                    path: config.manifest_path(),
                    install: pip(&["install", "-r"]),
                },
            )
            .with_messages("Python requirements installed", "Failed to install Python requirements"),
            StepConfig::command("system_upgrade", "Performing full system upgrade", apt(&["upgrade", "-y"]))
                .with_messages("System upgraded", "Failed to upgrade system"),
        ];

        Self::new(
            steps
                .into_iter()
                .map(|s| s.with_timeout(config.step_timeout_secs))
                .collect(),
        )
    }

    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    /// Pretty JSON rendering of the plan.
    pub fn to_json(&self) -> ProvisionResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// SHA-256 over the ordered step names; identifies which plan wrote a log.
    pub fn digest(&self) -> String {
        compute_steps_digest(&self.names())
    }
}

/// Compute deterministic digest of ordered step names.
fn compute_steps_digest(steps: &[String]) -> String {
    let mut hasher = Sha256::new();
    for step in steps {
        hasher.update(step.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_plan_order() {
        let plan = ProvisionPlan::standard(&ProvisionConfig::default());
        assert_eq!(
            plan.names(),
            vec![
                "update_index",
                "install_essentials",
                "install_system_packages",
                "upgrade_pip",
                "install_requirements",
                "system_upgrade",
            ]
        );
        assert!(plan.steps.iter().all(|s| s.is_fatal() && s.enabled));
    }

    #[test]
    fn test_standard_plan_apt_commands() {
        let plan = ProvisionPlan::standard(&ProvisionConfig::default());
        match &plan.steps[0].action {
            StepAction::Command { command } => {
                assert_eq!(command.program, "apt-get");
                assert_eq!(command.args, vec!["update"]);
                assert!(command
                    .env
                    .contains(&("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())));
            }
            other => panic!("expected Command, got {:?}", other),
        }
        match &plan.steps[1].action {
            StepAction::Command { command } => {
                assert_eq!(&command.args[..2], &["install", "-y"]);
                assert!(command.args.contains(&"build-essential".to_string()));
            }
            other => panic!("expected Command, got {:?}", other),
        }
    }

    #[test]
    fn test_standard_plan_with_sudo() {
        let config = ProvisionConfig {
            use_sudo: true,
            ..Default::default()
        };
        let plan = ProvisionPlan::standard(&config);
        match &plan.steps[5].action {
            StepAction::Command { command } => {
                assert_eq!(command.program, "sudo");
                assert_eq!(
                    command.args,
                    vec!["DEBIAN_FRONTEND=noninteractive", "apt-get", "upgrade", "-y"]
                );
                assert!(command.env.is_empty());
            }
            other => panic!("expected Command, got {:?}", other),
        }
    }

    #[test]
    fn test_standard_plan_pip_uses_configured_python() {
        let config = ProvisionConfig {
            python: "python3.11".to_string(),
            ..Default::default()
        };
        let plan = ProvisionPlan::standard(&config);
        match &plan.steps[4].action {
            StepAction::InstallManifest { path, install } => {
                assert!(path.ends_with("requirements.txt"));
                assert_eq!(install.program, "python3.11");
                assert_eq!(install.args, vec!["-m", "pip", "install", "-r"]);
            }
            other => panic!("expected InstallManifest, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_applied_to_every_step() {
        let config = ProvisionConfig {
            step_timeout_secs: 900,
            ..Default::default()
        };
        let plan = ProvisionPlan::standard(&config);
        assert!(plan.steps.iter().all(|s| s.timeout_secs == 900));
    }

    #[test]
    fn test_step_builders() {
        let step = StepConfig::command("probe", "Probing", CommandSpec::new("true", Vec::<String>::new()))
            .non_fatal()
            .disabled();
        assert!(!step.is_fatal());
        assert!(!step.enabled);
        assert_eq!(step.success_message, "Probing completed");
        assert_eq!(step.failure_message, "Probing failed");
    }

    #[test]
    fn test_digest_deterministic_and_order_sensitive() {
        let a = compute_steps_digest(&["fmt".to_string(), "check".to_string()]);
        let b = compute_steps_digest(&["fmt".to_string(), "check".to_string()]);
        let c = compute_steps_digest(&["check".to_string(), "fmt".to_string()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_plan_serializes_to_json() {
        let plan = ProvisionPlan::standard(&ProvisionConfig::default());
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["steps"][0]["fatality"], "fatal");
        assert_eq!(json["steps"][2]["action"]["kind"], "install_package_list");
        assert!(plan.to_json().unwrap().contains("\"update_index\""));
    }
}
