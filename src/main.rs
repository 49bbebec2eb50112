//! Agent Medic
//!
//! Watches a set of agents and their blockchain RPC dependency, diagnoses
//! failures, applies bounded automated recovery and verifies the result.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────── escalation scheduler (one loop) ────────────────────────────┐
//!   │                                                                                          │
//!   │  Tier0 tick ──alert──▶ Tier1 advisory ──escalate──▶ Tier2 full cycle (single-flight)     │
//!   │  (host, stall,          (fails safe                  │                                   │
//!   │   quarantine)            to escalate)                ▼                                   │
//!   │                                  Observer ─▶ Diagnoser ─▶ Recoverer ─▶ Verifier          │
//!   │                                     │                        │             │             │
//!   │                                  probes               breakers,        re-checks         │
//!   │                                (process, HTTP,       restart ledger                      │
//!   │                                 chain RPC)                                               │
//!   └──────────────────────────────────────────────────────────────────────────────────────────┘
//!        │ snapshot (ArcSwap)            │ EventSink → metrics          │ AlertRouter → humans
//!        ▼                               ▼                              ▼
//!     admin API                    Prometheus (extension)        log / webhook
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use agent_medic::admin;
use agent_medic::extensions::ExtensionRegistry;
use agent_medic::lifecycle::signals::spawn_signal_handler;
use agent_medic::lifecycle::{load_or_default, Medic, Shutdown, StartupError};
use agent_medic::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "agent-medic")]
#[command(about = "Autonomous health monitor and recovery controller", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "MEDIC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Run the escalation loop until SIGINT/SIGTERM
    Run,
    /// Run exactly one full cycle and print the report
    Once,
    /// Print a status-only snapshot (no recovery)
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, source) = match load_or_default(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("agent-medic: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.observability) {
        eprintln!("agent-medic: logging already initialized: {}", e);
    }
    source.log();

    match run(cli.command.unwrap_or(Command::Run), config, cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Command,
    config: agent_medic::MonitorConfig,
    config_path: Option<PathBuf>,
) -> Result<(), StartupError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "agent-medic starting");
    let medic = Medic::build(config, config_path)?;

    match command {
        Command::Status => {
            let status = medic.cycle.status_only().await;
            print_json(&status);
        }
        Command::Once => match medic.cycle.run_cycle("manual").await {
            Ok(report) => print_json(&report),
            Err(e) => tracing::error!(error = %e, "Cycle did not run"),
        },
        Command::Run => run_forever(medic).await?,
    }
    Ok(())
}

async fn run_forever(medic: Medic) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let extension_names = medic.config.load().extensions.clone();
    let mut extensions = ExtensionRegistry::with_builtins()
        .start(&extension_names, &medic.extension_context())
        .await?;

    let scheduler = medic.scheduler()?;
    let snapshot = scheduler.snapshot_handle();

    let admin_task = if medic.config.load().admin.enabled {
        let state = medic.admin_state(snapshot);
        let rx = shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = admin::serve(state, rx).await {
                tracing::error!(error = %e, "Admin API stopped");
            }
        }))
    } else {
        None
    };

    scheduler.run(shutdown.subscribe()).await;

    if let Some(task) = admin_task {
        let _ = task.await;
    }
    extensions.shutdown().await;
    if let Err(e) = medic.quarantine.save() {
        tracing::error!(error = %e, "Failed to save quarantine store on shutdown");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => tracing::error!(error = %e, "Failed to render output"),
    }
}
