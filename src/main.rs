//! # Scan Rig
//!
//! Command-line control for a rotating 3D-scanning rig.
//!
//! Launches a scan or hardware test under the worker supervisor, polls the
//! update channel on a fixed cadence, prints each status event as a JSON
//! line, and cancels the worker on Ctrl+C. Capture management subcommands
//! list, export and delete stored captures.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::{interval, Duration};
use tracing::{info, warn};

mod config;
mod error;
mod cloud;
mod worker;
mod storage;

use cloud::CloudFormat;
use config::Config;
use storage::CaptureStore;
use worker::event::WorkerStatus;
use worker::request::{OperationRequest, ScanParams};
use worker::supervisor::WorkerSupervisor;

/// Poll cadence for draining status events
const POLL_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Debug, Parser)]
#[command(name = "scan-rig", version, about = "Control a rotating 3D-scanning rig")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "scan-rig.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Perform a scan
    Scan {
        /// Head rotation speed in Hz (1-3)
        #[arg(long, default_value_t = 1)]
        motor_speed: u32,

        /// Samples per second (500, 750 or 1000)
        #[arg(long, default_value_t = 500)]
        sample_rate: u32,

        /// Base rotation in degrees (15, 45, 90 or 180)
        #[arg(long, default_value_t = 180)]
        angular_range: u32,

        /// Capture name; defaults to a timestamped name
        #[arg(long)]
        output: Option<String>,
    },

    /// Run a named hardware test
    Test {
        /// Test name: limit_switch, base_motor, head or release_motors
        name: String,
    },

    /// List stored captures, most recent first
    List,

    /// Export a stored capture to another format
    Export {
        /// Capture name
        file: String,

        /// Output format: ply, ply_binary or xyz
        #[arg(long, default_value = "ply")]
        format: String,

        /// Output path; defaults to the capture name with the format's extension
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Delete a stored capture
    Delete {
        /// Capture name
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::load(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    } else {
        Config::default()
    };

    // Keep the appender guard alive for the whole run
    let _log_guard = init_tracing(&config);

    info!("Scan Rig v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        CliCommand::Scan {
            motor_speed,
            sample_rate,
            angular_range,
            output,
        } => {
            let params = ScanParams {
                motor_speed,
                sample_rate,
                angular_range,
                file_name: output.unwrap_or_else(CaptureStore::default_capture_name),
            };
            run_operation(&config, OperationRequest::Scan(params)).await
        }
        CliCommand::Test { name } => {
            run_operation(&config, OperationRequest::Test { name }).await
        }
        CliCommand::List => {
            let store = CaptureStore::new(&config.storage.capture_dir)?;
            for name in store.list()? {
                println!("{name}");
            }
            Ok(())
        }
        CliCommand::Export { file, format, out } => {
            let format = CloudFormat::from_name(&format)
                .ok_or_else(|| anyhow!("unknown format {format:?} (expected ply, ply_binary or xyz)"))?;
            let store = CaptureStore::new(&config.storage.capture_dir)?;
            let bytes = store
                .export(&file, format)
                .with_context(|| format!("nothing to export from {file:?}"))?;

            let out = out.unwrap_or_else(|| {
                PathBuf::from(&file).with_extension(format.extension())
            });
            std::fs::write(&out, bytes)?;
            info!("exported {} as {}", file, out.display());
            println!("{}", out.display());
            Ok(())
        }
        CliCommand::Delete { file } => {
            let store = CaptureStore::new(&config.storage.capture_dir)?;
            store.delete(&file)?;
            Ok(())
        }
    }
}

/// Launch an operation and stream its status events to stdout until a
/// terminal event arrives.
///
/// Ctrl+C cancels the worker; the cancellation's own `failed` event still
/// arrives through the normal polling path and ends the loop.
async fn run_operation(config: &Config, request: OperationRequest) -> Result<()> {
    let supervisor = WorkerSupervisor::new(config.worker.clone());
    supervisor.launch(&request)?;

    let mut poll_interval = interval(POLL_INTERVAL);
    let mut outcome = None;

    while outcome.is_none() {
        tokio::select! {
            _ = poll_interval.tick() => {
                for event in supervisor.poll_updates() {
                    println!("{}", serde_json::to_string(&event)?);
                    if event.status.is_terminal() {
                        outcome = Some(event);
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                warn!("received Ctrl+C, cancelling worker");
                supervisor.cancel("Scan cancelled by user.");
            }
        }
    }

    match outcome {
        Some(event) if event.status == WorkerStatus::Complete => {
            info!("operation complete: {}", event.message);
            Ok(())
        }
        Some(event) => bail!("operation failed: {}", event.message),
        None => unreachable!("poll loop exits only on a terminal event"),
    }
}

fn init_tracing(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    if config.logging.log_to_file {
        let appender = tracing_appender::rolling::daily(&config.logging.log_dir, "scan-rig.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval() {
        assert_eq!(POLL_INTERVAL, Duration::from_millis(300));
    }

    #[test]
    fn test_cli_parses_scan_defaults() {
        let cli = Cli::parse_from(["scan-rig", "scan"]);
        match cli.command {
            CliCommand::Scan {
                motor_speed,
                sample_rate,
                angular_range,
                output,
            } => {
                assert_eq!(motor_speed, 1);
                assert_eq!(sample_rate, 500);
                assert_eq!(angular_range, 180);
                assert!(output.is_none());
            }
            other => panic!("expected scan command, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_test_name() {
        let cli = Cli::parse_from(["scan-rig", "test", "limit_switch"]);
        match cli.command {
            CliCommand::Test { name } => assert_eq!(name, "limit_switch"),
            other => panic!("expected test command, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_export_format() {
        let cli = Cli::parse_from(["scan-rig", "export", "scan.csv", "--format", "ply_binary"]);
        match cli.command {
            CliCommand::Export { file, format, out } => {
                assert_eq!(file, "scan.csv");
                assert_eq!(format, "ply_binary");
                assert!(out.is_none());
            }
            other => panic!("expected export command, got {other:?}"),
        }
    }
}
