//! pidwatch - inspect and drive PID-file based worker supervision

mod status;
mod wait;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tabled::Table;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pidwatch_core::application::constants::{DEFAULT_RUNTIME_DIR, MAX_PID_FILE_SIZE_BYTES};
use pidwatch_core::application::ProcessSupervisor;
use pidwatch_core::config::SupervisorConfig;
use pidwatch_core::domain::{PidFileSnapshot, WorkerId};
use pidwatch_core::port::id_provider::UuidProvider;
use pidwatch_core::port::time_provider::SystemTimeProvider;
use pidwatch_core::port::{IdProvider, ProcessTableReader};
use pidwatch_infra_system::{
    FsPidFileRepository, NativeProcessTableReader, PlatformCapabilityProbe,
    ShellProcessTableReader,
};

use crate::status::{status_row, StatusTableRow};
use crate::wait::{wait_for_exit, WaitOutcome};

const DEFAULT_LOG_FILTER: &str = "pidwatch=info,pidwatch_core=info,pidwatch_infra_system=info";

#[derive(Parser)]
#[command(name = "pidwatch")]
#[command(about = "Supervise independently spawned workers through PID files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding one <worker-id>.pid file per worker
    #[arg(long, global = true, env = "PIDWATCH_RUNTIME_DIR", default_value = DEFAULT_RUNTIME_DIR)]
    runtime_dir: String,

    /// PID files at or above this size are treated as corrupt
    #[arg(long, global = true, env = "PIDWATCH_MAX_PID_FILE_BYTES", default_value_t = MAX_PID_FILE_SIZE_BYTES)]
    max_pid_file_bytes: u64,

    /// Report the platform as unsupported (dispatchers run work synchronously)
    #[arg(long, global = true, env = "PIDWATCH_FORCE_SYNC")]
    force_sync: bool,

    /// Comma separated primitives to treat as disabled (shell_exec, getpid)
    #[arg(long, global = true, env = "PIDWATCH_DISABLED_PRIMITIVES", default_value = "")]
    disabled_primitives: String,

    /// Enumerate processes natively instead of through `ps`/`awk`
    #[arg(long, global = true, env = "PIDWATCH_NATIVE_PROCESS_TABLE")]
    native_process_table: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether process table inspection works on this host, and why not
    Probe,

    /// List running process ids as the supervisor sees them
    Ps {
        /// Print unfiltered `ps x` lines instead
        #[arg(long)]
        raw: bool,
    },

    /// Create an empty PID file and print the worker id
    Create {
        /// Worker id (a UUID is generated when omitted)
        id: Option<String>,
    },

    /// Record a worker's pid (the worker-side start, for non-Rust workers)
    Record {
        /// Worker id
        id: String,

        /// Process id of the worker
        #[arg(long)]
        pid: u32,
    },

    /// Show every tracked worker without modifying anything
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Mark a worker finished and remove its PID file
    Finish {
        /// Worker id
        id: String,
    },

    /// Poll a worker until it finishes
    Wait {
        /// Worker id
        id: String,

        /// Give up after this many seconds (waits forever when omitted)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Polling interval
        #[arg(long, default_value = "500")]
        interval_ms: u64,
    },
}

impl Cli {
    fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            runtime_dir: shellexpand::tilde(&self.runtime_dir).into_owned().into(),
            max_pid_file_bytes: self.max_pid_file_bytes,
            force_sync_mode: self.force_sync,
            disabled_primitives: SupervisorConfig::parse_disabled_primitives(
                &self.disabled_primitives,
            ),
            ..Default::default()
        }
    }
}

/// Wired adapters for one invocation
struct App {
    supervisor: ProcessSupervisor,
    probe: Arc<PlatformCapabilityProbe>,
    shell_reader: Arc<ShellProcessTableReader>,
}

impl App {
    fn new(config: &SupervisorConfig, native_process_table: bool) -> Self {
        let shell_reader = Arc::new(ShellProcessTableReader::from_config(config));
        let process_table: Arc<dyn ProcessTableReader> = if native_process_table {
            Arc::new(NativeProcessTableReader::new())
        } else {
            shell_reader.clone() as Arc<dyn ProcessTableReader>
        };
        let probe = Arc::new(PlatformCapabilityProbe::new(
            config.clone(),
            process_table.clone(),
        ));

        let supervisor = ProcessSupervisor::new(
            Arc::new(FsPidFileRepository::new(&config.runtime_dir)),
            process_table,
            probe.clone(),
            Arc::new(SystemTimeProvider),
        )
        .with_max_pid_file_bytes(config.max_pid_file_bytes);

        Self {
            supervisor,
            probe,
            shell_reader,
        }
    }
}

fn init_logging() {
    let log_format = std::env::var("PIDWATCH_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // stdout carries command output, logs go to stderr
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn parse_id(raw: &str) -> Result<WorkerId> {
    WorkerId::parse(raw).with_context(|| format!("Invalid worker id {:?}", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = cli.supervisor_config();
    config.validate().context("Invalid configuration")?;
    info!(
        version = %pidwatch_core::VERSION,
        runtime_dir = %config.runtime_dir.display(),
        "pidwatch starting"
    );

    let app = App::new(&config, cli.native_process_table);

    match cli.command {
        Commands::Probe => {
            let report = app.probe.report();

            println!("{}", "Platform capability".cyan().bold());
            println!();
            for outcome in &report.outcomes {
                let mark = if outcome.passed {
                    "✓".green()
                } else {
                    "✗".red()
                };
                match &outcome.detail {
                    Some(detail) if !detail.is_empty() => {
                        println!("  {} {} ({})", mark, outcome.check, detail)
                    }
                    _ => println!("  {} {}", mark, outcome.check),
                }
            }
            println!();

            if report.is_supported() {
                println!("  {} {}", "Supported:".bold(), "yes".green());
            } else {
                println!("  {} {}", "Supported:".bold(), "no".red());
                println!("  Liveness checks report every existing worker as running.");
            }
        }

        Commands::Ps { raw } => {
            if raw {
                for line in app.shell_reader.list_raw_lines() {
                    println!("{}", line);
                }
            } else {
                match app.supervisor.running_process_ids() {
                    Some(pids) => {
                        for pid in pids {
                            println!("{}", pid);
                        }
                    }
                    None => {
                        warn!("Process table unsupported on this host or unreadable");
                        eprintln!("{}", "Process table unsupported on this host or unreadable".yellow());
                    }
                }
            }
        }

        Commands::Create { id } => {
            let id = match id {
                Some(raw) => parse_id(&raw)?,
                None => UuidProvider.generate_id(),
            };
            let handle = app
                .supervisor
                .handle_for(id)
                .context("Failed to create PID file")?;

            info!(pid_file = %handle.pid_file_location(), "Worker registered");
            println!("{}", handle.id());
        }

        Commands::Record { id, pid } => {
            let handle = app
                .supervisor
                .handle_for(parse_id(&id)?)
                .context("Failed to open PID file")?;
            handle
                .start_with_pid(pid)
                .with_context(|| format!("Failed to record pid {} for {}", pid, id))?;

            println!("{}", format!("✓ {} started (pid {})", id, pid).green().bold());
        }

        Commands::Status { json } => {
            let running = app.supervisor.running_process_ids();
            let mut rows = Vec::new();
            for id in app
                .supervisor
                .tracked_workers()
                .context("Failed to list runtime directory")?
            {
                let snapshot = app.supervisor.inspect(&id)?;
                if snapshot == PidFileSnapshot::Absent {
                    continue;
                }
                rows.push(status_row(&id, &snapshot, running.as_ref()));
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("{}", "No tracked workers".yellow());
            } else {
                let table_rows: Vec<StatusTableRow> = rows.iter().map(StatusTableRow::from).collect();
                println!("{}", Table::new(table_rows));
                if running.is_none() {
                    println!();
                    println!("{}", "Process table unsupported or unreadable: running states are unverified".yellow());
                }
            }
        }

        Commands::Finish { id } => {
            let handle = app
                .supervisor
                .handle_for(parse_id(&id)?)
                .context("Failed to open PID file")?;
            handle.finish();

            println!("{}", format!("✓ {} finished", id).green().bold());
        }

        Commands::Wait {
            id,
            timeout_secs,
            interval_ms,
        } => {
            let id = parse_id(&id)?;

            // Opening a handle creates the file, so a finished worker must be caught first
            if app.supervisor.inspect(&id)? == PidFileSnapshot::Absent {
                println!("{}", format!("✓ {} already finished", id).green().bold());
                return Ok(());
            }
            if !app.supervisor.is_supported() {
                warn!(worker_id = %id, "Unsupported platform, waiting for the worker to remove its own PID file");
            }

            let handle = app.supervisor.handle_for(id.clone())?;
            let outcome = wait_for_exit(
                &handle,
                Duration::from_millis(interval_ms.max(1)),
                timeout_secs.map(Duration::from_secs),
            )
            .await;

            match outcome {
                WaitOutcome::Finished(state) => {
                    println!("{}", format!("✓ {} {}", id, state).green().bold());
                }
                WaitOutcome::TimedOut { last } => {
                    anyhow::bail!(
                        "Timed out after {}s waiting for {} (last state {})",
                        timeout_secs.unwrap_or_default(),
                        id,
                        last
                    );
                }
            }
        }
    }

    Ok(())
}
