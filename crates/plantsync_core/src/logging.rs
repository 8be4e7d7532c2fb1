//! Rolling file logs driven by [`CoreConfig`].
//!
//! # Responsibility
//! - Start one `flexi_logger` backend per process below `<home>/log`, at
//!   the configured level and rotation policy.
//! - Route panics through `log` before the default hook runs.
//!
//! # Invariants
//! - A second init with the same level and directory is a no-op; any other
//!   combination is rejected and the running logger is kept.
//! - Event lines are `event=... module=... status=...` metadata and never
//!   carry property values.

use crate::config::CoreConfig;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "plantsync";
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

/// Level threshold for the file backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `debug` for debug builds, `info` for release builds.
    pub fn for_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Info
        }
    }

    /// Case-insensitive; `warning` is accepted for `warn`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::for_build()
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size-based rotation: a new file every `max_file_bytes`, `max_files`
/// rotated files kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotation {
    pub max_file_bytes: u64,
    pub max_files: usize,
}

impl Default for LogRotation {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}

struct LoggingState {
    level: LogLevel,
    log_dir: PathBuf,
    _logger: LoggerHandle,
}

/// Starts file logging for `config`.
///
/// # Contract
/// - Logs go to `config.log_dir()`; a relative application home is
///   resolved against the working directory first.
/// - Level and rotation come from `config.log_level` / `config.log_rotation`.
/// - Never panics.
///
/// # Errors
/// - The log directory cannot be resolved or created.
/// - Logging already runs with another level or directory.
/// - The backend fails to start.
pub fn init_logging(config: &CoreConfig) -> Result<(), String> {
    let log_dir = absolute_log_dir(config)?;
    let level = config.log_level;

    let state =
        LOGGING_STATE.get_or_try_init(|| start_logger(level, &log_dir, config.log_rotation))?;
    if state.log_dir != log_dir {
        return Err(format!(
            "logging already initialized at `{}`; refusing to switch to `{}`",
            state.log_dir.display(),
            log_dir.display()
        ));
    }
    if state.level != level {
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, level
        ));
    }
    Ok(())
}

/// Active `(level, log_dir)`, or `None` before [`init_logging`] succeeded.
pub fn logging_status() -> Option<(LogLevel, PathBuf)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.log_dir.clone()))
}

fn start_logger(
    level: LogLevel,
    log_dir: &Path,
    rotation: LogRotation,
) -> Result<LoggingState, String> {
    std::fs::create_dir_all(log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            log_dir.display()
        )
    })?;

    let logger = Logger::try_with_str(level.as_str())
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(rotation.max_file_bytes),
            Naming::Numbers,
            Cleanup::KeepLogFiles(rotation.max_files),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook_once();
    info!(
        "event=core_init module=core status=ok version={} level={} log_dir={} max_file_bytes={} max_files={}",
        env!("CARGO_PKG_VERSION"),
        level,
        log_dir.display(),
        rotation.max_file_bytes,
        rotation.max_files
    );

    Ok(LoggingState {
        level,
        log_dir: log_dir.to_path_buf(),
        _logger: logger,
    })
}

fn absolute_log_dir(config: &CoreConfig) -> Result<PathBuf, String> {
    let log_dir = config.log_dir();
    if log_dir.is_absolute() {
        return Ok(log_dir);
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&log_dir))
        .map_err(|err| {
            format!(
                "cannot resolve log directory `{}`: {err}",
                log_dir.display()
            )
        })
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic_captured module=core status=error location={} payload={}",
            location,
            single_line(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous_hook(panic_info);
    }));
}

// Panic payloads may quote model content.
fn single_line(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut truncated: String = flattened.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, single_line, LogLevel, LogRotation};
    use crate::config::CoreConfig;

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!(LogLevel::parse(" INFO "), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn single_line_flattens_and_truncates() {
        assert_eq!(single_line("a\nb", 10), "a b");
        let capped = single_line("line1\nline2\rline3", 8);
        assert_eq!(capped, "line1 li...");
    }

    #[test]
    fn init_is_idempotent_per_config_and_rejects_conflicts() {
        let home = tempfile::tempdir().unwrap();
        let mut config = CoreConfig::with_home(home.path());
        config.log_level = LogLevel::Info;
        config.log_rotation = LogRotation {
            max_file_bytes: 4096,
            max_files: 2,
        };

        init_logging(&config).unwrap();
        init_logging(&config).unwrap();

        let mut louder = config.clone();
        louder.log_level = LogLevel::Debug;
        assert!(init_logging(&louder).unwrap_err().contains("refusing to switch"));

        let other_home = tempfile::tempdir().unwrap();
        let mut moved = config.clone();
        moved.application_home = other_home.path().to_path_buf();
        assert!(init_logging(&moved).unwrap_err().contains("refusing to switch"));

        let (level, log_dir) = logging_status().unwrap();
        assert_eq!(level, LogLevel::Info);
        assert_eq!(log_dir, config.log_dir());
        assert!(log_dir.is_dir());
    }
}
