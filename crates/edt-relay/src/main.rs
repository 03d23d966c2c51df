//! EDT Relay - scheduled batch file relay

use clap::{Parser, Subcommand};
use edt_common::exit_code;
use edt_common::logging::{init_logging, LogConfig, LogGuard, LogLevel};
use edt_relay::config::RelayConfig;
use edt_relay::relay::Relay;
use edt_relay::scheduler::{shutdown_signal, Scheduler};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Relay completed batch archives from FTP to the processing gateway
#[derive(Parser, Debug)]
#[command(name = "edt-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run on the configured schedule until interrupted (default)
    Serve,
    /// Execute a single run and exit with its status
    Once,
}

fn init(verbose: bool) -> anyhow::Result<LogGuard> {
    let level = if verbose { LogLevel::Debug } else { LogLevel::Info };
    let log_config = LogConfig::builder()
        .level(level)
        .log_file_prefix("edt-relay")
        .filter_directives("suppaftp=info,reqwest=info")
        .build()
        // environment variables take precedence
        .merge_env()?;

    init_logging(&log_config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let _guard = match init(cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("edt-relay: cannot initialise logging: {:#}", e);
            return ExitCode::from(exit_code::CONFIGURATION);
        }
    };

    let config = match RelayConfig::load() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!(error = %e, "unable to read configuration");
            return ExitCode::from(exit_code::CONFIGURATION);
        }
    };
    let relay = Relay::new(Arc::clone(&config));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!(
                schedule = %config.schedule,
                source = %config.transfer.source_path,
                host = %config.remote.address(),
                "relay service started"
            );
            Scheduler::new(relay, config.schedule.clone(), config.heartbeat_file.clone())
                .run_until(shutdown_signal())
                .await;
            info!("relay service stopped");
            ExitCode::from(exit_code::OK)
        }
        Command::Once => match tokio::task::spawn_blocking(move || relay.run_once()).await {
            Ok(outcome) => ExitCode::from(outcome.exit_code()),
            Err(e) => {
                error!(error = %e, "run terminated abnormally");
                ExitCode::from(exit_code::CONNECTION)
            }
        },
    }
}
