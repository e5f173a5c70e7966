// Logging configuration for the draw wheel

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::config::LoggingSettings;

// Keep the guards alive for the lifetime of the program
static LOG_GUARD: OnceLock<Vec<WorkerGuard>> = OnceLock::new();

/// Build the filter: RUST_LOG if set, else the configured default, else
/// "info"
fn build_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging with optional console and file outputs.
///
/// `log_file_path` is the already resolved path (see
/// `Config::log_file_path`). Calling this twice is harmless: the second
/// global subscriber is rejected and a warning is logged through the first.
pub fn init_logging(settings: &LoggingSettings, log_file_path: Option<std::path::PathBuf>) {
    let mut guards = Vec::new();

    let filter = build_filter(&settings.filter);

    // Create file layer if path is provided
    let file_layer = log_file_path.and_then(|path| {
        let parent = path.parent()?;
        let file_name = path.file_name()?.to_str()?;

        let file_appender = tracing_appender::rolling::never(parent, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false),
        )
    });

    // Create console layer if enabled
    let console_layer = if settings.console {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(guard);

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(false),
        )
    } else {
        None
    };

    // Build and set the subscriber
    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
    {
        tracing::warn!(error = %e, "[config] Logging already initialized");
        return;
    }

    // Store guards to keep logging alive
    let _ = LOG_GUARD.set(guards);
}
