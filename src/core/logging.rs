//! Process-wide logging: stdout plus a daily-rolling file in the
//! application log directory.

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::config::AppPaths;

/// Rolling-file prefix; the appender adds the date suffix.
const LOG_FILE_PREFIX: &str = "docchat.log";

/// Fallback directives when `RUST_LOG` is unset: quiet dependencies,
/// debug for the pipeline itself.
const DEFAULT_DIRECTIVES: &str = "info,docchat_backend=debug";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

pub fn init(paths: &AppPaths) {
    let _ = std::fs::create_dir_all(&paths.log_dir);

    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(filter())
        .with(stdout_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse_and_enable_crate_debug() {
        let filter = EnvFilter::try_new(DEFAULT_DIRECTIVES).unwrap();
        assert!(filter.to_string().contains("docchat_backend=debug"));
    }

    #[test]
    fn log_files_carry_the_application_name() {
        assert!(LOG_FILE_PREFIX.starts_with("docchat"));
    }
}
