use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::config::AppPaths;

const LOG_FILE_PREFIX: &str = "server.log";

/// sqlx logs every statement at info; ingestion would drown the request log.
const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn,tower_http=info";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter(from_env: Option<String>) -> EnvFilter {
    from_env
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Daily-rolling `server.log.<date>` files under `log_dir`.
fn file_appender(log_dir: &Path) -> RollingFileAppender {
    tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX)
}

/// Installs stdout and daily-rolling file logging. Returns the log directory.
pub fn init(paths: &AppPaths) -> PathBuf {
    let log_dir = paths.log_dir.clone();
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Could not create log dir {}: {}", log_dir.display(), err);
    }

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender(&log_dir));
    let _ = LOG_GUARD.set(guard);

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking);

    // keeps the first subscriber if one is already installed
    let _ = tracing_subscriber::registry()
        .with(env_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    log_dir
}
