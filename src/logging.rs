//! Logging configuration for sqlform.
//!
//! Logs go to stderr by default. With `--log-file` they are written to a file in
//! the platform state directory instead, which keeps a long-running server's
//! terminal quiet.

use std::fs::{self, File};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Initializes logging to the log file.
///
/// Location: `~/.local/state/sqlform/sqlform.log` on Linux (XDG state directory),
/// or the platform-appropriate state/config directory on other systems. Falls back
/// to stderr if the file cannot be created.
pub fn init_file_logging() {
    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_stderr_logging();
            return;
        }
    }

    // Truncated on each run to avoid unbounded growth
    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {e}");
            init_stderr_logging();
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false)
        .init();
}

/// Returns the path for the log file.
pub fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("sqlform").join("sqlform.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("sqlform").join("sqlform.log");
    }

    std::env::temp_dir().join("sqlform.log")
}
