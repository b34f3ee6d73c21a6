//! Loads one session bundle from a directory.
//!
//! A bundle holds `replay.json`, `attachments.json` (an array) or
//! `attachments.jsonl` (one record per line), and `errors.json`. A missing
//! file is reported as not-ready rather than as an error.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use replaykit_core::SessionRecord;

pub const REPLAY_FILE: &str = "replay.json";
pub const ATTACHMENTS_FILE: &str = "attachments.json";
pub const ATTACHMENTS_LINES_FILE: &str = "attachments.jsonl";
pub const ERRORS_FILE: &str = "errors.json";

/// The three inputs of a replay, each absent until its file exists.
#[derive(Debug, Default)]
pub struct Bundle {
    pub record: Option<SessionRecord>,
    pub attachments: Option<Vec<Value>>,
    pub errors: Option<Vec<Value>>,
}

impl Bundle {
    pub fn load(dir: &Path) -> Result<Self> {
        let replay_path = dir.join(REPLAY_FILE);
        let record = if replay_path.exists() {
            let content = std::fs::read_to_string(&replay_path)
                .with_context(|| format!("Failed to read {}", replay_path.display()))?;
            let raw: Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", replay_path.display()))?;
            let record = SessionRecord::from_raw(&raw)
                .with_context(|| format!("Invalid session record in {}", replay_path.display()))?;
            Some(record)
        } else {
            None
        };

        let json_path = dir.join(ATTACHMENTS_FILE);
        let lines_path = dir.join(ATTACHMENTS_LINES_FILE);
        let attachments = if json_path.exists() {
            Some(read_json_array(&json_path)?)
        } else if lines_path.exists() {
            Some(read_json_lines(&lines_path)?)
        } else {
            None
        };

        let errors_path = dir.join(ERRORS_FILE);
        let errors = if errors_path.exists() {
            Some(read_json_array(&errors_path)?)
        } else {
            None
        };

        Ok(Self {
            record,
            attachments,
            errors,
        })
    }

    /// Names of the inputs that are still absent.
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.record.is_none() {
            missing.push(REPLAY_FILE.to_string());
        }
        if self.attachments.is_none() {
            missing.push(ATTACHMENTS_FILE.to_string());
        }
        if self.errors.is_none() {
            missing.push(ERRORS_FILE.to_string());
        }
        missing
    }
}

fn read_json_array(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Expected a JSON array in {}", path.display()))
}

/// Records are kept as untyped values; shape problems are the hydrators' call.
fn read_json_lines(path: &Path) -> Result<Vec<Value>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line from {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(&line).with_context(|| {
            format!(
                "Failed to parse line {} of {}: {}",
                number + 1,
                path.display(),
                line.chars().take(100).collect::<String>()
            )
        })?;
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const REPLAY: &str = r#"{"id":"7f3c2a","started_at":"2026-01-20T10:00:00Z","finished_at":"2026-01-20T10:00:30Z","duration":30,"urls":["https://shop.example.com/"]}"#;

    /// Helper: a bundle directory with every input present.
    fn create_bundle_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(REPLAY_FILE), REPLAY).unwrap();
        fs::write(
            dir.path().join(ATTACHMENTS_LINES_FILE),
            r#"{"type":4,"timestamp":1768903200000,"data":{"href":"https://shop.example.com/"}}

{"type":5,"timestamp":1768903201000,"data":{"tag":"breadcrumb","payload":{"category":"ui.click","timestamp":1768903201.0}}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join(ERRORS_FILE),
            r#"[{"id":"e1","timestamp":"2026-01-20T10:00:05Z","title":"TypeError"}]"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_load_complete_bundle() {
        let dir = create_bundle_dir();

        let bundle = Bundle::load(dir.path()).unwrap();

        let record = bundle.record.as_ref().unwrap();
        assert_eq!(record.id, "7f3c2a");
        assert_eq!(record.duration_ms, 30_000);
        assert_eq!(bundle.attachments.as_ref().unwrap().len(), 2);
        assert_eq!(bundle.errors.as_ref().unwrap().len(), 1);
        assert!(bundle.missing().is_empty());
    }

    #[test]
    fn test_json_array_preferred_over_lines() {
        let dir = create_bundle_dir();
        fs::write(dir.path().join(ATTACHMENTS_FILE), "[]").unwrap();

        let bundle = Bundle::load(dir.path()).unwrap();

        assert_eq!(bundle.attachments, Some(Vec::new()));
    }

    #[test]
    fn test_missing_files_are_not_ready() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(REPLAY_FILE), REPLAY).unwrap();

        let bundle = Bundle::load(dir.path()).unwrap();

        assert!(bundle.record.is_some());
        assert_eq!(
            bundle.missing(),
            vec![ATTACHMENTS_FILE.to_string(), ERRORS_FILE.to_string()]
        );
    }

    #[test]
    fn test_unparsable_line_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(ATTACHMENTS_LINES_FILE), "{\"type\":2}\nnot json\n").unwrap();

        let err = Bundle::load(dir.path()).unwrap_err();

        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_malformed_session_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(REPLAY_FILE), r#"{"id":"x"}"#).unwrap();

        assert!(Bundle::load(dir.path()).is_err());
    }
}
