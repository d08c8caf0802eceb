// Logging module
//
// The geodata passes report progress and content warnings through the
// `tracing` ecosystem:
// - Structured logging
// - Multiple subscribers (file, stdout)
// - Log levels (ERROR, WARN, INFO, DEBUG, TRACE)
// - Filtering

use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the logging system.
///
/// Console output always goes to stdout; when `log_dir` is given, a
/// non-blocking daily-rolling file appender is added as well.
pub fn initialize_logging(log_dir: Option<&str>, log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if let Some(dir) = log_dir {
        let path = Path::new(dir);
        if !path.exists() {
            let _ = std::fs::create_dir_all(path);
        }

        let file_appender = tracing_appender::rolling::daily(dir, "geobuild.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // Keep the guard alive by leaking it (it lives for the program duration)
        std::mem::forget(guard);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .with(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .init();
    }
}

/// Map a numeric verbosity (CLI `-l` flag) to an env-filter directive.
pub fn map_log_level(level: i32) -> &'static str {
    match level {
        i32::MIN..=0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}
