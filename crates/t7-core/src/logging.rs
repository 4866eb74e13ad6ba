//! Logging initialization using the `tracing` ecosystem.
//!
//! Console output is colored and human-readable; the optional file sink
//! writes JSON lines with daily rotation via `tracing-appender`, so the
//! reconciliation audit trail stays machine-parseable. The level comes
//! from `RUST_LOG` when set, otherwise from the explicit parameter.

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// Call once at program start, before any pipeline is assembled.
///
/// # Parameters
///
/// - `log_level`: default level if `RUST_LOG` env var is not set (e.g. `"info"`)
/// - `log_dir`: optional directory for daily-rotating JSON log files
/// - `module_name`: used as the log file prefix (e.g. `"t7-runner"`)
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_ansi(true);

    if let Some(dir) = log_dir {
        let file_appender = tracing_appender::rolling::daily(dir, module_name);
        let file_layer = fmt::layer()
            .json()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();
        info!("[logging] level {log_level}, json file sink {dir}/{module_name}.*");
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        info!("[logging] level {log_level}, console only");
    }
}
