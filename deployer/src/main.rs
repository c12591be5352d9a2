//! apmdeploy - Entry Point
//!
//! Installs the Flask APM demo behind nginx under systemd, with firewalld,
//! logrotate and a health probe, and ships the day-to-day task shortcuts.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::error;

use apm_deployer::app::run::{
    cmd_deploy, cmd_install_deps, cmd_probe, cmd_render, cmd_smoke, cmd_task,
};
use apm_deployer::app::tasks::Task;
use apm_deployer::deploy::run::DeployOptions;
use apm_deployer::deploy::runner::SystemRunner;
use apm_deployer::errors::DeployError;
use apm_deployer::health::probe::PROBE_TIMEOUT_SECS;
use apm_deployer::logs::{init_logging, LogLevel, LogOptions};
use apm_deployer::storage::settings::Settings;
use apm_deployer::utils::version_info;

#[derive(Parser)]
#[command(name = "apmdeploy")]
#[command(version, about = "Deploy the Flask APM demo behind nginx and systemd")]
struct Cli {
    /// JSON settings file; built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the settings log level
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install system packages (run as root)
    InstallDeps {
        #[arg(long)]
        dry_run: bool,
    },
    /// Provision, configure and start the app (run as root)
    Deploy {
        /// App source tree to install
        #[arg(long, default_value = ".")]
        source: PathBuf,

        /// Print each step without executing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Write the generated config files under a directory
    Render {
        #[arg(long)]
        out: PathBuf,
    },
    /// Check the app's health endpoint; exit 0 on OK, 1 on CRITICAL
    Probe {
        #[arg(long)]
        url: Option<String>,

        #[arg(long, default_value_t = PROBE_TIMEOUT_SECS)]
        timeout: u64,
    },
    /// Exercise every demo endpoint and inspect the app log
    Smoke {
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Run a named task shortcut
    Task {
        #[arg(value_enum)]
        name: Task,

        /// App source tree
        #[arg(long, default_value = ".")]
        source: PathBuf,

        #[arg(long)]
        dry_run: bool,
    },
    /// Print version and build information as JSON
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{}", e),
        }
        return;
    }

    let settings = match Settings::load(cli.config.as_deref()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            std::process::exit(1);
        }
    };

    // Only a real deploy keeps a run log next to the app logs
    let log_dir = match &cli.command {
        Commands::Deploy { dry_run: false, .. } => Some(settings.log_dir.clone()),
        _ => None,
    };
    let log_options = LogOptions {
        log_level: cli.log_level.unwrap_or(settings.log_level),
        json_format: cli.json_logs,
        log_dir,
        ..Default::default()
    };
    let guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let code = match run(cli.command, &settings).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("\n[ERROR] {}", e);
            e.exit_code()
        }
    };

    drop(guard);
    std::process::exit(code);
}

async fn run(command: Commands, settings: &Settings) -> Result<i32, DeployError> {
    let runner = SystemRunner;

    match command {
        Commands::InstallDeps { dry_run } => cmd_install_deps(settings, &runner, dry_run).await,
        Commands::Deploy { source, dry_run } => {
            let options = DeployOptions {
                source_dir: source,
                dry_run,
                ..Default::default()
            };
            cmd_deploy(settings, &options, &runner).await
        }
        Commands::Render { out } => cmd_render(settings, &out).await,
        Commands::Probe { url, timeout } => {
            cmd_probe(settings, url, Duration::from_secs(timeout)).await
        }
        Commands::Smoke { base_url } => cmd_smoke(settings, base_url).await,
        Commands::Task {
            name,
            source,
            dry_run,
        } => cmd_task(name, settings, &source, &runner, dry_run).await,
        Commands::Version => Ok(0),
    }
}
