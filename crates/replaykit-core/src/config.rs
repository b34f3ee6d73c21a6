use serde::{Deserialize, Serialize};

use crate::reconcile::Window;

/// Restricts the queryable part of a session, e.g. a preview around one error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClipWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl ClipWindow {
    /// Intersect the clip with the session window. `None` when they don't overlap.
    pub fn clamp_to(&self, session: Window) -> Option<Window> {
        let start_ms = self.start_ms.max(session.start_ms);
        let end_ms = self.end_ms.min(session.end_ms);
        (start_ms < end_ms).then_some(Window { start_ms, end_ms })
    }
}

/// Options for building a [`crate::ReplayReader`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Widen the session window to cover every frame. When off, the declared
    /// window is kept and the deltas are diagnostic only.
    pub timestamp_correction: bool,
    /// Also run the legacy window computation and compare it with the current one.
    pub legacy_compat: bool,
    pub clip_window: Option<ClipWindow>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            timestamp_correction: true,
            legacy_compat: false,
            clip_window: None,
        }
    }
}

impl ReaderConfig {
    pub fn without_timestamp_correction(mut self) -> Self {
        self.timestamp_correction = false;
        self
    }

    pub fn with_legacy_compat(mut self) -> Self {
        self.legacy_compat = true;
        self
    }

    pub fn with_clip_window(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.clip_window = Some(ClipWindow { start_ms, end_ms });
        self
    }
}
