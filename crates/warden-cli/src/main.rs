//! Warden CLI — the only user-facing control surface for the agent
//! execution core (spec.md §6).
//!
//! Two subcommands, deliberately thin: `run <identity>` launches a single
//! orchestrator in the foreground; `supervisor <identity>...` launches the
//! multi-identity process supervisor. Neither daemonizes or exposes
//! remote control — process control is local-socket only (spec.md §1
//! Non-goals).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use warden_core::dirs::WardenRoot;
use warden_core::validate_identity_name;

/// Exit code for a malformed or invalid configuration (spec.md §6).
const EXIT_CONFIG_ERROR: i32 = 1;
/// Exit code for any other startup or runtime failure (spec.md §6).
const EXIT_RUNTIME_CRASH: i32 = 2;

/// Warden — multi-identity autonomous agent execution core.
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Launch a single orchestrator in the foreground and block until
    /// termination.
    Run {
        /// The identity to run, matching `^[a-z][a-z0-9_]*$`.
        identity: String,
    },
    /// Launch the supervisor, spawning one child process per identity and
    /// starting the authenticated IPC server.
    Supervisor {
        /// Identities to supervise, each matching `^[a-z][a-z0-9_]*$`.
        #[arg(required = true)]
        identities: Vec<String>,
    },
}

/// Install a process-wide stderr subscriber filtered by `WARDEN_LOG`
/// (falling back to `info`), used before a per-identity log directory is
/// known (argument parsing, identity validation) or for the supervisor
/// itself, which has no single identity to scope a log file to.
fn init_stderr_logging() {
    let filter = EnvFilter::try_from_env("WARDEN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let root = WardenRoot::resolve_default();

    let exit_code = match cli.command {
        Command::Run { identity } => run_identity(root, &identity).await,
        Command::Supervisor { identities } => run_supervisor(root, identities).await,
    };

    std::process::exit(exit_code);
}

async fn run_identity(root: WardenRoot, identity: &str) -> i32 {
    if let Err(error) = validate_identity_name(identity) {
        init_stderr_logging();
        tracing::error!(%error, identity, "invalid identity name");
        return EXIT_CONFIG_ERROR;
    }

    // The per-identity log directory depends only on the (now validated)
    // identity name, not on its YAML document, so we can set up file
    // logging before `Orchestrator::setup` attempts to load it.
    let log_dir = match root.log_dir(identity) {
        Ok(dir) => dir,
        Err(error) => {
            init_stderr_logging();
            tracing::error!(%error, identity, "could not resolve log directory");
            return EXIT_CONFIG_ERROR;
        },
    };

    let _guard = match warden_runtime::logging::init(&log_dir, identity) {
        Ok(guard) => guard,
        Err(error) => {
            init_stderr_logging();
            tracing::error!(%error, identity, "could not initialize logging");
            return EXIT_RUNTIME_CRASH;
        },
    };

    match warden_runtime::Orchestrator::run(root, identity).await {
        Ok(()) => 0,
        Err(error @ warden_runtime::RuntimeError::Config(_)) => {
            tracing::error!(%error, identity, "configuration error");
            EXIT_CONFIG_ERROR
        },
        Err(error) => {
            tracing::error!(%error, identity, "orchestrator crashed");
            EXIT_RUNTIME_CRASH
        },
    }
}

async fn run_supervisor(root: WardenRoot, identities: Vec<String>) -> i32 {
    init_stderr_logging();

    for identity in &identities {
        if let Err(error) = validate_identity_name(identity) {
            tracing::error!(%error, identity, "invalid identity name");
            return EXIT_CONFIG_ERROR;
        }
    }

    let mut supervisor = match warden_supervisor::Supervisor::new(root, &identities) {
        Ok(supervisor) => supervisor,
        Err(error @ (warden_supervisor::SupervisorError::Config(_) | warden_supervisor::SupervisorError::NoIdentities)) => {
            tracing::error!(%error, "configuration error");
            return EXIT_CONFIG_ERROR;
        },
        Err(error) => {
            tracing::error!(%error, "supervisor failed to start");
            return EXIT_RUNTIME_CRASH;
        },
    };

    if let Err(error) = supervisor.start() {
        tracing::error!(%error, "supervisor failed to start");
        return EXIT_RUNTIME_CRASH;
    }

    match supervisor.run().await {
        Ok(()) => 0,
        Err(error) => {
            tracing::error!(%error, "supervisor crashed");
            EXIT_RUNTIME_CRASH
        },
    }
}
