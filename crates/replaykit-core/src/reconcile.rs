//! Session window reconciliation.
//!
//! The session record, the recording and the breadcrumb/span streams are
//! produced independently and disagree about when the session started and
//! ended. A frame outside the declared window means the declared window is
//! wrong, so the inferred window is never narrower than the declared one.

use serde::{Deserialize, Serialize};

use crate::types::{BreadcrumbFrame, RecordingFrame, SpanFrame};

/// A `[start, end]` pair of instants on the millisecond timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl Window {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub fn contains(&self, instant_ms: i64) -> bool {
        self.start_ms <= instant_ms && instant_ms <= self.end_ms
    }

    fn widen(self, instant_ms: i64) -> Self {
        Self {
            start_ms: self.start_ms.min(instant_ms),
            end_ms: self.end_ms.max(instant_ms),
        }
    }
}

/// Signed correction `inferred - declared` for both session boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampDeltas {
    pub started_at_delta_ms: i64,
    pub finished_at_delta_ms: i64,
}

impl TimestampDeltas {
    pub fn is_zero(&self) -> bool {
        self.started_at_delta_ms == 0 && self.finished_at_delta_ms == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub declared: Window,
    pub inferred: Window,
    pub deltas: TimestampDeltas,
}

impl Reconciliation {
    fn new(declared: Window, inferred: Window) -> Self {
        Self {
            declared,
            inferred,
            deltas: TimestampDeltas {
                started_at_delta_ms: inferred.start_ms.saturating_sub(declared.start_ms),
                finished_at_delta_ms: inferred.end_ms.saturating_sub(declared.end_ms),
            },
        }
    }

    pub fn is_corrected(&self) -> bool {
        !self.deltas.is_zero()
    }
}

/// Widen `declared` until it contains every instant.
pub fn infer_window(declared: Window, instants: impl IntoIterator<Item = i64>) -> Window {
    instants.into_iter().fold(declared, Window::widen)
}

/// Compute the session window implied by the hydrated streams.
///
/// Spans contribute their start instant only. Errors are correlated to the
/// session by time and never move its boundaries.
pub fn reconcile(
    declared: Window,
    recording: &[RecordingFrame],
    breadcrumbs: &[BreadcrumbFrame],
    spans: &[SpanFrame],
) -> Reconciliation {
    let instants = recording
        .iter()
        .map(|frame| frame.timestamp_ms)
        .chain(breadcrumbs.iter().map(|frame| frame.timestamp_ms))
        .chain(spans.iter().map(|frame| frame.timestamp_ms));

    Reconciliation::new(declared, infer_window(declared, instants))
}

/// The window computation older readers performed over unhydrated records.
///
/// Only invoked when [`crate::ReaderConfig::legacy_compat`] is set, so the two
/// results can be compared while consumers migrate.
pub mod legacy {
    use chrono::DateTime;
    use serde_json::Value;

    use super::{infer_window, Reconciliation, Window};
    use crate::classify::ClassifiedAttachments;

    /// Seconds were truncated, not rounded, and span end instants counted too.
    fn secs_to_ms(secs: f64) -> Option<i64> {
        on_timeline(secs * 1000.0)
    }

    /// Instants a `DateTime<Utc>` can't hold are skipped.
    fn on_timeline(ms: f64) -> Option<i64> {
        let ms = ms as i64;
        DateTime::from_timestamp_millis(ms).map(|_| ms)
    }

    fn number_at(value: &Value, key: &str) -> Option<f64> {
        value.get(key).and_then(Value::as_f64).filter(|n| n.is_finite())
    }

    pub fn reconcile(declared: Window, raw: &ClassifiedAttachments) -> Reconciliation {
        let recording = raw
            .recording
            .iter()
            .filter_map(|event| number_at(event, "timestamp"))
            .filter_map(on_timeline);
        let breadcrumbs = raw
            .breadcrumbs
            .iter()
            .filter_map(|crumb| number_at(crumb, "timestamp"))
            .filter_map(secs_to_ms);
        let spans = raw.spans.iter().flat_map(|span| {
            [
                number_at(span, "startTimestamp"),
                number_at(span, "endTimestamp"),
            ]
            .into_iter()
            .flatten()
            .filter_map(secs_to_ms)
        });

        Reconciliation::new(
            declared,
            infer_window(declared, recording.chain(breadcrumbs).chain(spans)),
        )
    }
}
