use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FrameKind, HydrationError};
use crate::reconcile::Window;

/// Identity and summary metadata of one replay session.
///
/// Mutable only while the reader is being constructed; `duration_ms` always
/// equals `finished_at - started_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    #[serde(default)]
    pub urls: Vec<String>,
    /// Everything else the session carries, kept opaque.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Wire shape of the session record: the duration is in seconds and is
/// recomputed from the window rather than trusted.
#[derive(Deserialize)]
struct RawSessionRecord {
    id: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    #[serde(default)]
    #[allow(dead_code)]
    duration: Option<f64>,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
            urls: Vec::new(),
            attributes: Map::new(),
        }
    }

    /// Parse the session record as delivered by the fetch layer.
    pub fn from_raw(raw: &Value) -> Result<Self, HydrationError> {
        let raw: RawSessionRecord = serde_json::from_value(raw.clone()).map_err(|source| {
            HydrationError::MalformedRecord {
                kind: FrameKind::SessionRecord,
                index: 0,
                source,
            }
        })?;

        if raw.finished_at < raw.started_at {
            return Err(HydrationError::MalformedSessionRecord(format!(
                "finished_at {} is before started_at {}",
                raw.finished_at, raw.started_at
            )));
        }

        let mut record = Self::new(raw.id, raw.started_at, raw.finished_at);
        record.urls = raw.urls;
        record.attributes = raw.attributes;
        Ok(record)
    }

    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    pub fn start_ms(&self) -> i64 {
        self.started_at.timestamp_millis()
    }

    pub fn end_ms(&self) -> i64 {
        self.finished_at.timestamp_millis()
    }

    pub fn window(&self) -> Window {
        Window {
            start_ms: self.start_ms(),
            end_ms: self.end_ms(),
        }
    }

    /// Overwrite start, end and duration together.
    pub(crate) fn apply_window(&mut self, window: Window) {
        if let (Some(start), Some(end)) = (
            DateTime::from_timestamp_millis(window.start_ms),
            DateTime::from_timestamp_millis(window.end_ms),
        ) {
            self.started_at = start;
            self.finished_at = end;
            self.duration_ms = window.end_ms - window.start_ms;
        }
    }
}

/// The recording event types a player understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RecordingEventKind {
    DomContentLoaded,
    Load,
    FullSnapshot,
    IncrementalSnapshot,
    Meta,
    Custom,
    Plugin,
}

impl From<RecordingEventKind> for u8 {
    fn from(kind: RecordingEventKind) -> Self {
        match kind {
            RecordingEventKind::DomContentLoaded => 0,
            RecordingEventKind::Load => 1,
            RecordingEventKind::FullSnapshot => 2,
            RecordingEventKind::IncrementalSnapshot => 3,
            RecordingEventKind::Meta => 4,
            RecordingEventKind::Custom => 5,
            RecordingEventKind::Plugin => 6,
        }
    }
}

impl TryFrom<u8> for RecordingEventKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::DomContentLoaded),
            1 => Ok(Self::Load),
            2 => Ok(Self::FullSnapshot),
            3 => Ok(Self::IncrementalSnapshot),
            4 => Ok(Self::Meta),
            5 => Ok(Self::Custom),
            6 => Ok(Self::Plugin),
            other => Err(format!("unknown recording event type {}", other)),
        }
    }
}

/// Custom event tags of the two boundary frames.
pub const SESSION_START_TAG: &str = "replay.start";
pub const SESSION_END_TAG: &str = "replay.end";

/// One DOM mutation or interaction event from the recording stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingFrame {
    #[serde(rename = "type")]
    pub kind: RecordingEventKind,
    pub timestamp_ms: i64,
    pub offset_ms: i64,
    pub data: Value,
}

impl RecordingFrame {
    fn custom_tag(&self) -> Option<&str> {
        if self.kind != RecordingEventKind::Custom {
            return None;
        }
        self.data.get("tag").and_then(Value::as_str)
    }

    pub fn is_session_start(&self) -> bool {
        self.custom_tag() == Some(SESSION_START_TAG)
    }

    pub fn is_session_end(&self) -> bool {
        self.custom_tag() == Some(SESSION_END_TAG)
    }
}

/// Breadcrumb categories the SDK emits. Anything else is a custom category
/// and counts as noteworthy for chapters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BreadcrumbCategory {
    Console,
    Fetch,
    Xhr,
    Navigation,
    ReplayInit,
    ReplayMutations,
    UiBlur,
    UiClick,
    UiFocus,
    UiInput,
    UiKeyDown,
    UiMultiClick,
    UiSlowClickDetected,
    Custom(String),
}

impl BreadcrumbCategory {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Console => "console",
            Self::Fetch => "fetch",
            Self::Xhr => "xhr",
            Self::Navigation => "navigation",
            Self::ReplayInit => "replay.init",
            Self::ReplayMutations => "replay.mutations",
            Self::UiBlur => "ui.blur",
            Self::UiClick => "ui.click",
            Self::UiFocus => "ui.focus",
            Self::UiInput => "ui.input",
            Self::UiKeyDown => "ui.keyDown",
            Self::UiMultiClick => "ui.multiClick",
            Self::UiSlowClickDetected => "ui.slowClickDetected",
            Self::Custom(category) => category,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl From<&str> for BreadcrumbCategory {
    fn from(s: &str) -> Self {
        match s {
            "console" => Self::Console,
            "fetch" => Self::Fetch,
            "xhr" => Self::Xhr,
            "navigation" => Self::Navigation,
            "replay.init" => Self::ReplayInit,
            "replay.mutations" => Self::ReplayMutations,
            "ui.blur" => Self::UiBlur,
            "ui.click" => Self::UiClick,
            "ui.focus" => Self::UiFocus,
            "ui.input" => Self::UiInput,
            "ui.keyDown" => Self::UiKeyDown,
            "ui.multiClick" => Self::UiMultiClick,
            "ui.slowClickDetected" => Self::UiSlowClickDetected,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for BreadcrumbCategory {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<BreadcrumbCategory> for String {
    fn from(category: BreadcrumbCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for BreadcrumbCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized point-in-time event: click, console message, navigation...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadcrumbFrame {
    pub category: BreadcrumbCategory,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
    pub level: Option<String>,
    pub timestamp_ms: i64,
    pub offset_ms: i64,
    pub data: Value,
}

impl BreadcrumbFrame {
    /// Whether the payload points at a node in the recorded DOM.
    pub fn has_node_id(&self) -> bool {
        self.data.get("nodeId").is_some_and(|id| !id.is_null())
    }
}

/// An interval event: network request, memory sample, paint metric...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanFrame {
    pub op: String,
    pub description: String,
    /// Start of the span; this is the instant the span is ordered by.
    pub timestamp_ms: i64,
    pub end_timestamp_ms: i64,
    pub offset_ms: i64,
    pub data: Value,
}

impl SpanFrame {
    pub fn duration_ms(&self) -> i64 {
        (self.end_timestamp_ms - self.timestamp_ms).max(0)
    }

    pub fn is_network(&self) -> bool {
        self.op.starts_with("navigation.") || self.op.starts_with("resource.")
    }

    /// Whether the span recorded any request or response header.
    pub fn has_header_data(&self) -> bool {
        ["request", "response"].iter().any(|side| {
            self.data
                .get(side)
                .and_then(|body| body.get("headers"))
                .and_then(Value::as_object)
                .is_some_and(|headers| !headers.is_empty())
        })
    }
}

/// An error event correlated to the session by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub event_id: String,
    pub title: String,
    pub level: Option<String>,
    pub group_id: Option<u64>,
    pub group_short_id: Option<String>,
    pub project_slug: Option<String>,
    pub timestamp_ms: i64,
    pub offset_ms: i64,
}

/// Capture configuration of the SDK that recorded the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkOptions {
    #[serde(default)]
    pub network_detail_has_urls: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A frame from any stream, as listed by the chapter and timeline views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ReplayFrame {
    Breadcrumb(BreadcrumbFrame),
    Span(SpanFrame),
    Error(ErrorFrame),
}

impl ReplayFrame {
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            Self::Breadcrumb(frame) => frame.timestamp_ms,
            Self::Span(frame) => frame.timestamp_ms,
            Self::Error(frame) => frame.timestamp_ms,
        }
    }

    pub fn offset_ms(&self) -> i64 {
        match self {
            Self::Breadcrumb(frame) => frame.offset_ms,
            Self::Span(frame) => frame.offset_ms,
            Self::Error(frame) => frame.offset_ms,
        }
    }

    /// Short label for list views.
    pub fn label(&self) -> String {
        match self {
            Self::Breadcrumb(frame) => frame.category.to_string(),
            Self::Span(frame) => frame.op.clone(),
            Self::Error(frame) => format!("error: {}", frame.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_session_record_from_raw_recomputes_duration() {
        let raw = json!({
            "id": "a1b2",
            "started_at": "2026-01-20T10:00:00Z",
            "finished_at": "2026-01-20T10:00:30Z",
            "duration": 12.0,
            "urls": ["https://example.com/"],
            "count_errors": 3
        });

        let record = SessionRecord::from_raw(&raw).unwrap();

        assert_eq!(record.id, "a1b2");
        assert_eq!(record.duration_ms, 30_000);
        assert_eq!(record.urls, vec!["https://example.com/".to_string()]);
        assert_eq!(record.attributes.get("count_errors"), Some(&json!(3)));
        assert!(!record.attributes.contains_key("duration"));
    }

    #[test]
    fn test_session_record_from_raw_rejects_inverted_window() {
        let raw = json!({
            "id": "a1b2",
            "started_at": "2026-01-20T10:00:30Z",
            "finished_at": "2026-01-20T10:00:00Z"
        });

        let err = SessionRecord::from_raw(&raw).unwrap_err();
        assert!(matches!(err, HydrationError::MalformedSessionRecord(_)));
    }

    #[test]
    fn test_apply_window_keeps_duration_consistent() {
        let start = Utc.timestamp_millis_opt(1_000).unwrap();
        let end = Utc.timestamp_millis_opt(2_000).unwrap();
        let mut record = SessionRecord::new("r", start, end);

        record.apply_window(Window {
            start_ms: 500,
            end_ms: 2_500,
        });

        assert_eq!(record.start_ms(), 500);
        assert_eq!(record.end_ms(), 2_500);
        assert_eq!(record.duration_ms, record.end_ms() - record.start_ms());
    }

    #[test]
    fn test_breadcrumb_category_unknown_is_custom() {
        let category = BreadcrumbCategory::from("checkout.completed");
        assert_eq!(
            category,
            BreadcrumbCategory::Custom("checkout.completed".to_string())
        );
        assert!(!category.is_known());
        assert!(BreadcrumbCategory::from("ui.click").is_known());
        assert_eq!(BreadcrumbCategory::UiSlowClickDetected.to_string(), "ui.slowClickDetected");
    }

    #[test]
    fn test_span_header_detection() {
        let mut span = SpanFrame {
            op: "resource.fetch".to_string(),
            description: "https://api.example.com".to_string(),
            timestamp_ms: 0,
            end_timestamp_ms: 10,
            offset_ms: 0,
            data: json!({"request": {"headers": {}}, "response": {"size": 10}}),
        };
        assert!(!span.has_header_data());

        span.data = json!({"response": {"headers": {"content-type": "application/json"}}});
        assert!(span.has_header_data());
        assert!(span.is_network());
    }
}
