//! Per-identity log file setup (spec.md §6 `{root}/logs/{identity}/`).
//!
//! Grounded on the donor's `astralis-telemetry::logging`, narrowed from
//! its format/target matrix to the one shape an orchestrator needs: a
//! daily-rotating JSON file under the identity's log directory, filtered
//! by `WARDEN_LOG` (falling back to `info`).

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install a process-wide subscriber writing JSON lines to
/// `{log_dir}/{identity}.log`, rotated daily. Returns the
/// [`WorkerGuard`] the caller must hold for the process lifetime —
/// dropping it stops the background flush thread.
///
/// Idempotent-friendly: a second call in the same process (e.g. in
/// tests) silently no-ops if a global subscriber is already set, since
/// `warden-runtime` is expected to run one orchestrator per process.
pub fn init(log_dir: &Path, identity: &str) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, format!("{identity}.log"));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env("WARDEN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer().json().with_writer(writer).with_ansi(false);

    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();

    Ok(guard)
}
