use std::fmt;

use thiserror::Error;

/// Which hydrator a record was handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Recording,
    Breadcrumb,
    Span,
    Error,
    Options,
    SessionRecord,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recording => write!(f, "recording"),
            Self::Breadcrumb => write!(f, "breadcrumb"),
            Self::Span => write!(f, "span"),
            Self::Error => write!(f, "error"),
            Self::Options => write!(f, "options"),
            Self::SessionRecord => write!(f, "session record"),
        }
    }
}

#[derive(Error, Debug)]
pub enum HydrationError {
    #[error("malformed {kind} record at index {index}: {source}")]
    MalformedRecord {
        kind: FrameKind,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} record at index {index} has an invalid timestamp: {reason}")]
    InvalidTimestamp {
        kind: FrameKind,
        index: usize,
        reason: String,
    },

    #[error("recording record at index {index} has unknown event type {event_type}")]
    UnknownEventType { index: usize, event_type: u64 },

    #[error("malformed session record: {0}")]
    MalformedSessionRecord(String),
}

/// A failure caught by the construction guard.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("hydration failed: {0}")]
    Hydration(#[from] HydrationError),

    #[error("hydrator panicked: {0}")]
    Panicked(String),
}
