//! Tracing setup for the CLI.
//!
//! Logs go to a daily rolling file under `~/.dispatch/logs/` so that command
//! output on stdout stays clean. When the directory can't be created we log
//! to stderr instead.

use dispatch_core::StorageConfig;
use fs_err as fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "DISPATCH_LOG";
pub const DEBUG_LOG_ENV: &str = "DISPATCH_DEBUG_LOG";

const LOG_FILE_PREFIX: &str = "dispatch.log";
const DEFAULT_DIRECTIVE: &str = "info";

/// Installs the global subscriber. Keep the returned guard alive until exit
/// or buffered lines are lost.
pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    let directive = filter_directive(
        std::env::var(LOG_ENV).ok().as_deref(),
        std::env::var(DEBUG_LOG_ENV).ok().as_deref(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let logs_dir = storage.logs_dir();
    if let Err(err) = fs::create_dir_all(&logs_dir) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        tracing::warn!(error = %err, "Log directory unavailable; logging to stderr");
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

fn debug_enabled(value: Option<&str>) -> bool {
    value
        .map(|value| matches!(value, "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

/// `DISPATCH_DEBUG_LOG` forces debug; otherwise `DISPATCH_LOG`, else info.
fn filter_directive(log: Option<&str>, debug: Option<&str>) -> String {
    if debug_enabled(debug) {
        return "debug".to_string();
    }
    match log.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => DEFAULT_DIRECTIVE.to_string(),
    }
}
