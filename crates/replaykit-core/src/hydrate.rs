//! Per-category hydrators: raw records in, typed frames out.
//!
//! Each hydrator is a pure function over one bucket produced by
//! [`crate::classify`]. Timestamps are normalized to integer milliseconds;
//! `offset_ms` is left at zero until the session window is reconciled.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{FrameKind, HydrationError};
use crate::types::{
    BreadcrumbCategory, BreadcrumbFrame, ErrorFrame, RecordingEventKind, RecordingFrame,
    SdkOptions, SessionRecord, SpanFrame, SESSION_END_TAG, SESSION_START_TAG,
};

#[derive(Deserialize)]
struct RawRecordingEvent {
    #[serde(rename = "type")]
    event_type: u64,
    timestamp: f64,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct RawBreadcrumb {
    category: String,
    timestamp: f64,
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    level: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpan {
    op: String,
    #[serde(default)]
    description: String,
    start_timestamp: f64,
    end_timestamp: f64,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Seconds(f64),
    Rfc3339(DateTime<Utc>),
}

#[derive(Deserialize)]
struct RawError {
    id: String,
    timestamp: RawTimestamp,
    title: String,
    level: Option<String>,
    issue: Option<String>,
    #[serde(rename = "issue.id")]
    issue_id: Option<u64>,
    #[serde(rename = "project.name")]
    project_name: Option<String>,
}

fn parse<T: DeserializeOwned>(kind: FrameKind, index: usize, raw: &Value) -> Result<T, HydrationError> {
    T::deserialize(raw).map_err(|source| HydrationError::MalformedRecord { kind, index, source })
}

/// Round a millisecond value onto the shared timeline, rejecting anything
/// that can't become a `DateTime<Utc>`.
fn to_timeline_ms(kind: FrameKind, index: usize, ms: f64) -> Result<i64, HydrationError> {
    if !ms.is_finite() {
        return Err(HydrationError::InvalidTimestamp {
            kind,
            index,
            reason: format!("{} is not finite", ms),
        });
    }
    let rounded = ms.round() as i64;
    if DateTime::from_timestamp_millis(rounded).is_none() {
        return Err(HydrationError::InvalidTimestamp {
            kind,
            index,
            reason: format!("{} is out of range", ms),
        });
    }
    Ok(rounded)
}

fn seconds_to_ms(kind: FrameKind, index: usize, secs: f64) -> Result<i64, HydrationError> {
    to_timeline_ms(kind, index, secs * 1000.0)
}

pub fn hydrate_recording(raw: &[Value]) -> Result<Vec<RecordingFrame>, HydrationError> {
    raw.iter()
        .enumerate()
        .map(|(index, value)| {
            let event: RawRecordingEvent = parse(FrameKind::Recording, index, value)?;
            let kind = u8::try_from(event.event_type)
                .ok()
                .and_then(|t| RecordingEventKind::try_from(t).ok())
                .ok_or(HydrationError::UnknownEventType {
                    index,
                    event_type: event.event_type,
                })?;
            Ok(RecordingFrame {
                kind,
                timestamp_ms: to_timeline_ms(FrameKind::Recording, index, event.timestamp)?,
                offset_ms: 0,
                data: event.data,
            })
        })
        .collect()
}

pub fn hydrate_breadcrumbs(raw: &[Value]) -> Result<Vec<BreadcrumbFrame>, HydrationError> {
    raw.iter()
        .enumerate()
        .map(|(index, value)| {
            let crumb: RawBreadcrumb = parse(FrameKind::Breadcrumb, index, value)?;
            Ok(BreadcrumbFrame {
                category: BreadcrumbCategory::from(crumb.category),
                kind: crumb.kind,
                message: crumb.message,
                level: crumb.level,
                timestamp_ms: seconds_to_ms(FrameKind::Breadcrumb, index, crumb.timestamp)?,
                offset_ms: 0,
                data: crumb.data,
            })
        })
        .collect()
}

pub fn hydrate_spans(raw: &[Value]) -> Result<Vec<SpanFrame>, HydrationError> {
    raw.iter()
        .enumerate()
        .map(|(index, value)| {
            let span: RawSpan = parse(FrameKind::Span, index, value)?;
            Ok(SpanFrame {
                op: span.op,
                description: span.description,
                timestamp_ms: seconds_to_ms(FrameKind::Span, index, span.start_timestamp)?,
                end_timestamp_ms: seconds_to_ms(FrameKind::Span, index, span.end_timestamp)?,
                offset_ms: 0,
                data: span.data,
            })
        })
        .collect()
}

pub fn hydrate_errors(raw: &[Value]) -> Result<Vec<ErrorFrame>, HydrationError> {
    raw.iter()
        .enumerate()
        .map(|(index, value)| {
            let error: RawError = parse(FrameKind::Error, index, value)?;
            let timestamp_ms = match error.timestamp {
                RawTimestamp::Seconds(secs) => seconds_to_ms(FrameKind::Error, index, secs)?,
                RawTimestamp::Rfc3339(at) => at.timestamp_millis(),
            };
            Ok(ErrorFrame {
                event_id: error.id,
                title: error.title,
                level: error.level,
                group_id: error.issue_id,
                group_short_id: error.issue,
                project_slug: error.project_name,
                timestamp_ms,
                offset_ms: 0,
            })
        })
        .collect()
}

pub fn hydrate_options(raw: Option<&Value>) -> Result<Option<SdkOptions>, HydrationError> {
    raw.map(|value| parse(FrameKind::Options, 0, value)).transpose()
}

fn boundary_frame(tag: &str, timestamp_ms: i64) -> RecordingFrame {
    RecordingFrame {
        kind: RecordingEventKind::Custom,
        timestamp_ms,
        offset_ms: 0,
        data: json!({ "tag": tag, "payload": {} }),
    }
}

/// Synthetic marker placed first in the recording stream.
pub fn session_start_frame(record: &SessionRecord) -> RecordingFrame {
    boundary_frame(SESSION_START_TAG, record.start_ms())
}

/// Synthetic marker placed last in the recording stream.
pub fn session_end_frame(record: &SessionRecord) -> RecordingFrame {
    boundary_frame(SESSION_END_TAG, record.end_ms())
}

/// Synthetic breadcrumb marking the start of the recording at the first URL.
pub fn session_init_breadcrumb(record: &SessionRecord) -> BreadcrumbFrame {
    let url = record.urls.first().cloned();
    BreadcrumbFrame {
        category: BreadcrumbCategory::ReplayInit,
        kind: Some("init".to_string()),
        message: url.clone(),
        level: None,
        timestamp_ms: record.start_ms(),
        offset_ms: 0,
        data: json!({ "label": "Start recording", "url": url }),
    }
}
