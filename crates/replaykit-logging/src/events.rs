use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for building a replay reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    BundleLoaded {
        replay_id: String,
        attachments: usize,
        errors: usize,
    },
    /// One or more inputs are absent; the caller is still loading.
    InputNotReady {
        missing: Vec<String>,
    },
    TimestampsCorrected {
        replay_id: String,
        started_at_delta_ms: i64,
        finished_at_delta_ms: i64,
    },
    LegacyDivergence {
        replay_id: String,
        started_at_delta_ms: i64,
        finished_at_delta_ms: i64,
        legacy_started_at_delta_ms: i64,
        legacy_finished_at_delta_ms: i64,
    },
    HydrationFailed {
        replay_id: String,
        error: String,
    },
    ReaderBuilt {
        replay_id: String,
        recording_frames: usize,
        breadcrumbs: usize,
        spans: usize,
        errors: usize,
        duration_ms: i64,
        fallback: bool,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for replaykit events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Log an event
    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::BundleLoaded {
                replay_id,
                attachments,
                errors,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} {} {} ({} attachments, {} errors)",
                    "▶".bright_cyan(),
                    "Replay".bright_cyan().bold(),
                    replay_id,
                    attachments,
                    errors
                );
            }
            LogEvent::InputNotReady { missing } => {
                let _ = writeln!(
                    stderr,
                    "{} Waiting on input: {}",
                    "…".bright_yellow(),
                    missing.join(", ").dimmed()
                );
            }
            LogEvent::TimestampsCorrected {
                started_at_delta_ms,
                finished_at_delta_ms,
                ..
            } => {
                if *started_at_delta_ms == 0 && *finished_at_delta_ms == 0 {
                    return;
                }
                let _ = writeln!(
                    stderr,
                    "    {} Window corrected: start {}, end {}",
                    "⟲".bright_blue(),
                    format_delta(*started_at_delta_ms),
                    format_delta(*finished_at_delta_ms)
                );
            }
            LogEvent::LegacyDivergence {
                started_at_delta_ms,
                finished_at_delta_ms,
                legacy_started_at_delta_ms,
                legacy_finished_at_delta_ms,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} Legacy window disagrees: current ({}, {}) legacy ({}, {})",
                    "⚠".bright_yellow(),
                    format_delta(*started_at_delta_ms),
                    format_delta(*finished_at_delta_ms),
                    format_delta(*legacy_started_at_delta_ms),
                    format_delta(*legacy_finished_at_delta_ms)
                );
            }
            LogEvent::HydrationFailed { replay_id, error } => {
                let _ = writeln!(
                    stderr,
                    "{} Could not hydrate replay {}: {}",
                    "✗".bright_red(),
                    replay_id,
                    error.bright_red()
                );
            }
            LogEvent::ReaderBuilt {
                recording_frames,
                breadcrumbs,
                spans,
                errors,
                fallback,
                ..
            } => {
                if *fallback {
                    let _ = writeln!(
                        stderr,
                        "    {} {}",
                        "✗".bright_red(),
                        "Showing session metadata only".dimmed()
                    );
                } else {
                    let _ = writeln!(
                        stderr,
                        "    {} {} recording, {} breadcrumbs, {} spans, {} errors",
                        "✓".bright_green(),
                        recording_frames,
                        breadcrumbs,
                        spans,
                        errors
                    );
                }
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::BundleLoaded {
                replay_id,
                attachments,
                errors,
            } => format!(
                "[{}] bundle:{} attachments={} errors={}",
                timestamp, replay_id, attachments, errors
            ),
            LogEvent::InputNotReady { missing } => {
                format!("[{}] input:pending {}", timestamp, missing.join(","))
            }
            LogEvent::TimestampsCorrected {
                started_at_delta_ms,
                finished_at_delta_ms,
                ..
            } => format!(
                "[{}] window:delta {} {}",
                timestamp, started_at_delta_ms, finished_at_delta_ms
            ),
            LogEvent::LegacyDivergence {
                legacy_started_at_delta_ms,
                legacy_finished_at_delta_ms,
                ..
            } => format!(
                "[{}] window:legacy {} {}",
                timestamp, legacy_started_at_delta_ms, legacy_finished_at_delta_ms
            ),
            LogEvent::HydrationFailed { error, .. } => {
                format!("[{}] hydrate:error {}", timestamp, error)
            }
            LogEvent::ReaderBuilt {
                duration_ms,
                fallback,
                ..
            } => format!(
                "[{}] reader:done {}ms{}",
                timestamp,
                duration_ms,
                if *fallback { " fallback" } else { "" }
            ),
        };
        let _ = writeln!(stderr, "{}", msg);
    }
}

fn format_delta(delta_ms: i64) -> String {
    if delta_ms > 0 {
        format!("+{}ms", delta_ms)
    } else {
        format!("{}ms", delta_ms)
    }
}
