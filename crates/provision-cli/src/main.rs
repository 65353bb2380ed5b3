//! Workstation provisioner CLI
//!
//! `provision` runs the standard setup plan in the current directory:
//! apt index update, essential packages, the packages in `packages.txt`,
//! a pip self-upgrade, `requirements.txt`, and a full system upgrade.
//! Every option has a default, so the bare command is the normal invocation.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use provision_core::{
    init_tracing, provision, CommandExecutor, DryRunExecutor, ProcessExecutor, ProvisionConfig,
    ProvisionError, ProvisionPlan,
};

#[derive(Parser, Debug)]
#[command(name = "provision")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Provision an ML workstation (apt, pip, CUDA checks)", long_about = None)]
struct Cli {
    /// Enable verbose diagnostics
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted diagnostic lines
    #[arg(long)]
    json: bool,

    /// Log commands instead of running them (report goes to dry_run_<report file>)
    #[arg(long, env = "PROVISION_DRY_RUN")]
    dry_run: bool,

    /// Print the step plan as JSON and exit
    #[arg(long)]
    print_plan: bool,

    /// Working directory for inputs, run log and report
    #[arg(long, env = "PROVISION_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Package list in `dpkg -l` format
    #[arg(long, env = "PROVISION_PACKAGE_LIST", default_value = "packages.txt")]
    package_list: PathBuf,

    /// Python dependency manifest
    #[arg(long, env = "PROVISION_MANIFEST", default_value = "requirements.txt")]
    manifest: PathBuf,

    /// Run log file name prefix
    #[arg(long, env = "PROVISION_LOG_PREFIX", default_value = "setup_log")]
    log_prefix: String,

    /// Validation report file name
    #[arg(long, env = "PROVISION_REPORT_FILE", default_value = "validation_report.txt")]
    report_file: String,

    /// Essential packages, comma separated (default: build tools, python3 dev, git, wget, curl)
    #[arg(long, env = "PROVISION_ESSENTIALS", value_delimiter = ',')]
    essentials: Vec<String>,

    /// Python interpreter for pip and version checks
    #[arg(long, env = "PROVISION_PYTHON", default_value = "python3")]
    python: String,

    /// Prefix apt-get calls with sudo
    #[arg(long, env = "PROVISION_SUDO")]
    sudo: bool,

    /// Per-command timeout in seconds (0 = none)
    #[arg(long, env = "PROVISION_STEP_TIMEOUT", default_value_t = 0)]
    step_timeout: u64,
}

impl Cli {
    fn to_config(&self) -> ProvisionConfig {
        let defaults = ProvisionConfig::default();
        let config = ProvisionConfig {
            work_dir: self.work_dir.clone(),
            package_list: self.package_list.clone(),
            manifest: self.manifest.clone(),
            log_prefix: self.log_prefix.clone(),
            report_file: self.report_file.clone(),
            essentials: if self.essentials.is_empty() {
                defaults.essentials
            } else {
                self.essentials.clone()
            },
            python: self.python.clone(),
            use_sudo: self.sudo,
            step_timeout_secs: self.step_timeout,
        };
        if self.dry_run {
            config.for_dry_run()
        } else {
            config
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<ProvisionError>())
                .map(ProvisionError::exit_code)
                .unwrap_or(1);
            eprintln!("Error: {:#}", e);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.to_config();
    config.validate().context("Invalid provisioning configuration")?;

    if cli.print_plan {
        let plan = ProvisionPlan::standard(&config);
        println!("{}", plan.to_json()?);
        return Ok(());
    }

    let executor: Arc<dyn CommandExecutor> = if cli.dry_run {
        tracing::info!("dry run: no commands will be executed");
        Arc::new(DryRunExecutor)
    } else {
        Arc::new(ProcessExecutor)
    };

    let summary = provision(config, executor, true).await?;

    tracing::info!(
        run_id = %summary.run_id,
        steps_passed = summary.passed_count(),
        non_fatal_failures = summary.non_fatal_failures(),
        duration_ms = summary.duration_ms,
        log = %summary.log_path.display(),
        report = %summary.report_path.display(),
        "provisioning finished"
    );

    Ok(())
}
