//! Logging setup: tracing subscribers for stdout and rolling log files.

use crate::config::{FileLoggingConfig, LogFormat, LogRotation, LoggingConfig};
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const RETENTION_SWEEP_SECS: u64 = 3600;

/// Keeps the non-blocking file writer alive; dropping it flushes and
/// closes the log file.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber. Stdout always gets a layer in the
/// configured format; a JSON file layer is added on top when file
/// logging is configured. The returned guard must live as long as the
/// process.
pub fn init_logging(config: &LoggingConfig) -> LogGuard {
    if !config.log_requests {
        return LogGuard { _file_guard: None };
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = config.format == LogFormat::Json;

    let (file_layer, file_guard) = match &config.file {
        Some(file_config) => {
            let (writer, guard) = rolling_writer(file_config);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| fmt::layer().with_writer(io::stdout)))
        .with(json.then(|| fmt::layer().json().with_writer(io::stdout)))
        .with(file_layer)
        .init();

    LogGuard {
        _file_guard: file_guard,
    }
}

fn rolling_writer(config: &FileLoggingConfig) -> (NonBlocking, WorkerGuard) {
    fs::create_dir_all(&config.log_dir).ok();
    let rotation = match config.rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Never => Rotation::NEVER,
    };
    tracing_appender::non_blocking(RollingFileAppender::new(
        rotation,
        &config.log_dir,
        &config.file_prefix,
    ))
}

/// Spawn the retention sweep for rotated log files. Sweeps once at
/// startup and then hourly; does nothing unless file logging with a
/// retention age is configured.
pub fn spawn_retention_task(config: &LoggingConfig) {
    let Some(file_config) = &config.file else {
        return;
    };
    if file_config.max_age_days == 0 {
        return;
    }
    let log_dir = file_config.log_dir.clone();
    let prefix = file_config.file_prefix.clone();
    let max_age = Duration::from_secs(file_config.max_age_days * 86_400);

    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(RETENTION_SWEEP_SECS));
        loop {
            tick.tick().await;
            let removed = sweep_expired_logs(Path::new(&log_dir), &prefix, max_age);
            if removed > 0 {
                info!(removed, dir = %log_dir, "removed expired log files");
            }
        }
    });
}

/// Delete rotated files older than `max_age`, returning how many were
/// removed.
fn sweep_expired_logs(dir: &Path, prefix: &str, max_age: Duration) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "log retention sweep failed");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !is_rotated_log(&path, prefix) {
            continue;
        }
        if file_age(&path).map_or(false, |age| age > max_age) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not remove expired log file");
                }
            }
        }
    }
    removed
}

/// Rotated files are named `<prefix>.<date>`; the bare prefix is the
/// file currently being written and is never touched.
fn is_rotated_log(path: &Path, prefix: &str) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |name| name.starts_with(prefix) && name != prefix)
}

fn file_age(path: &Path) -> Option<Duration> {
    let modified = path.metadata().ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}
