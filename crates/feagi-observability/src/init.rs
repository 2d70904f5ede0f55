// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console logging is always available. With the `file-logging` feature, each run
//! also gets its own timestamped folder of JSON log files, and old run folders are
//! pruned by age and count.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDateTime, TimeZone, Utc};
use tracing_subscriber::EnvFilter;

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingConfig};

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

fn env_filter(debug_flags: &CrateDebugFlags, level: &str) -> Result<EnvFilter> {
    let directives = debug_flags.to_filter_string(level);
    EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter '{}'", directives))
}

/// Install a global console subscriber.
///
/// Fails if the level is not a valid filter or a global subscriber is already set.
pub fn init_console_logging(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(debug_flags, &config.level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}

/// Logging initialization result; dropping it flushes and closes the log files
#[cfg(feature = "file-logging")]
pub struct LoggingGuard {
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: PathBuf,
}

#[cfg(feature = "file-logging")]
impl LoggingGuard {
    /// Get the run folder path
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Initialize console output plus per-run log files
///
/// Creates a timestamped folder structure:
/// ```text
/// <log_dir>/
///   └── run_20250101_120000/
///       ├── feagi-vision-engine.log
///       ├── feagi-vision-core.log
///       └── feagi-vision.log (combined)
/// ```
#[cfg(feature = "file-logging")]
pub fn init_file_logging(
    debug_flags: &CrateDebugFlags,
    config: &LoggingConfig,
) -> Result<LoggingGuard> {
    use tracing_appender::rolling;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{Layer, Registry};

    let base_log_dir = config
        .log_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("./logs"));
    let run_folder = base_log_dir.join(format!(
        "{}{}",
        RUN_PREFIX,
        Utc::now().format(RUN_TIMESTAMP)
    ));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;
    cleanup_old_logs(&base_log_dir, config.retention_days, config.retention_runs)?;

    let env_filter = env_filter(debug_flags, &config.level)?;
    let mut layers = Vec::new();
    let mut file_guards = Vec::new();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(env_filter.clone());
    layers.push(console_layer.boxed());

    for crate_name in crate::KNOWN_CRATES {
        let file_appender = rolling::daily(&run_folder, format!("{}.log", crate_name));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_guards.push(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(EnvFilter::try_new(format!(
                "{}=debug,off",
                crate::crate_target(crate_name)
            ))?)
            .boxed();
        layers.push(file_layer);
    }

    let combined_appender = rolling::daily(&run_folder, "feagi-vision.log");
    let (combined_non_blocking, combined_guard) = tracing_appender::non_blocking(combined_appender);
    file_guards.push(combined_guard);
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(combined_non_blocking)
            .json()
            .with_filter(env_filter)
            .boxed(),
    );

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(LoggingGuard {
        _file_guards: file_guards,
        log_dir: run_folder,
    })
}

/// Remove run folders older than `retention_days`, then all but the newest
/// `retention_runs`. Returns the number of folders removed.
pub fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }
    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, chrono::DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let Some(stamp) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(RUN_PREFIX))
        else {
            continue;
        };
        if let Ok(naive) = NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP) {
            runs.push((path, Utc.from_utc_datetime(&naive)));
        }
    }
    // newest first
    runs.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (i, (path, stamp)) in runs.iter().enumerate() {
        if *stamp < cutoff || i >= retention_runs {
            match std::fs::remove_dir_all(path) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!(
                    "Warning: Failed to remove old log directory {}: {}",
                    path.display(),
                    e
                ),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_dir(base: &Path, stamp: chrono::DateTime<Utc>) -> PathBuf {
        let dir = base.join(format!("{}{}", RUN_PREFIX, stamp.format(RUN_TIMESTAMP)));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_cleanup_by_age_and_count() {
        let base = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let ancient = run_dir(base.path(), now - chrono::Duration::days(90));
        let recent: Vec<PathBuf> = (0..4)
            .map(|i| run_dir(base.path(), now - chrono::Duration::hours(i)))
            .collect();
        let unrelated = base.path().join("notes");
        std::fs::create_dir_all(&unrelated).unwrap();

        let removed = cleanup_old_logs(base.path(), 30, 3).unwrap();
        assert_eq!(removed, 2);
        assert!(!ancient.exists());
        assert!(recent[0].exists() && recent[1].exists() && recent[2].exists());
        assert!(!recent[3].exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let base = tempfile::tempdir().unwrap();
        assert_eq!(
            cleanup_old_logs(&base.path().join("absent"), 30, 10).unwrap(),
            0
        );
    }

    #[test]
    fn test_invalid_level_rejected() {
        let config = LoggingConfig {
            level: "feagi=verbose".to_string(),
            ..Default::default()
        };
        assert!(env_filter(&CrateDebugFlags::default(), &config.level).is_err());
    }
}
