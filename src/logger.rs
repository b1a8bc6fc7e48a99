//! Logging setup for drvpack
//!
//! `DRVPACK_LOG_LEVEL` (or `--log-level`) selects the level. A `json` or
//! `json:<level>` value switches to one JSON object per line, written to
//! `DRVPACK_LOG_PATH` when set and stderr otherwise.

use chrono::{Local, Utc};
use log::{LevelFilter, Log, Metadata, Record};
use serde_json::json;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;

/// Parsed `--log-level` / `DRVPACK_LOG_LEVEL` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSpec {
    pub json: bool,
    pub filter: LevelFilter,
}

impl LogSpec {
    /// Unknown levels fall back to `info`
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let (json, level) = match value.strip_prefix("json") {
            Some("") => (true, "info"),
            Some(rest) => match rest.strip_prefix(':') {
                Some(level) => (true, level),
                None => (false, value),
            },
            None => (false, value),
        };
        Self {
            json,
            filter: level.parse().unwrap_or(LevelFilter::Info),
        }
    }
}

/// Line-delimited JSON logger
#[derive(Debug)]
pub struct JsonLogger {
    filter: LevelFilter,
    /// `None` writes to stderr
    target_file: Mutex<Option<File>>,
}

impl JsonLogger {
    pub fn new(filter: LevelFilter, log_path: Option<&str>) -> Self {
        let target_file = log_path.and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| eprintln!("drvpack: cannot open log file {path}: {e}"))
                .ok()
        });

        JsonLogger {
            filter,
            target_file: Mutex::new(target_file),
        }
    }

    /// Install the global logger for `level_str`; `source` names where the
    /// value came from. Returns the effective spec.
    pub fn init_with_level(level_str: &str, source: &str) -> LogSpec {
        let spec = LogSpec::parse(level_str);

        if spec.json {
            let log_path = env::var("DRVPACK_LOG_PATH").ok();
            let logger = Box::new(JsonLogger::new(spec.filter, log_path.as_deref()));
            match log::set_boxed_logger(logger) {
                Ok(()) => log::set_max_level(spec.filter),
                Err(e) => eprintln!("drvpack: JSON logger not installed ({source}): {e}"),
            }
            return spec;
        }

        // try_init: embedding services may already own the global logger
        let _ = env_logger::Builder::new()
            .filter_level(spec.filter)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "🖨️ [{} {} {}] {}",
                    Local::now().format("%Y-%m-%dT%H:%M:%S%z"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .try_init();
        spec
    }

    /// Install the global logger from `DRVPACK_LOG_LEVEL` (default: info)
    pub fn init() -> LogSpec {
        let level = env::var("DRVPACK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        Self::init_with_level(&level, "DRVPACK_LOG_LEVEL")
    }

    fn render(record: &Record<'_>) -> String {
        let entry = json!({
            "@timestamp": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            "@level": record.level().as_str().to_lowercase(),
            "@message": record.args().to_string(),
            "@module": record.target(),
            "@pid": std::process::id(),
            "@file": record.file().unwrap_or("unknown"),
            "@line": record.line().unwrap_or(0),
        });
        let mut line = entry.to_string();
        line.push('\n');
        line
    }

    fn write_line(&self, line: &str) {
        let mut guard = self.target_file.lock().unwrap_or_else(|p| p.into_inner());
        // Nowhere left to report a failed log write
        let _ = match guard.as_mut() {
            Some(file) => file.write_all(line.as_bytes()).and_then(|()| file.flush()),
            None => {
                let mut stderr = io::stderr().lock();
                stderr.write_all(line.as_bytes()).and_then(|()| stderr.flush())
            }
        };
    }
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.write_line(&Self::render(record));
        }
    }

    fn flush(&self) {
        if let Some(file) = self.target_file.lock().unwrap_or_else(|p| p.into_inner()).as_mut() {
            let _ = file.flush();
        }
        let _ = io::stderr().flush();
    }
}
