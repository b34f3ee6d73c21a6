use std::sync::OnceLock;

use serde_json::Value;

use crate::classify::classify;
use crate::config::ReaderConfig;
use crate::error::HydrationError;
use crate::hydrate::{
    hydrate_breadcrumbs, hydrate_errors, hydrate_options, hydrate_recording, hydrate_spans,
    session_end_frame, session_init_breadcrumb, session_start_frame,
};
use crate::reconcile::{legacy, reconcile, TimestampDeltas, Window};
use crate::types::{
    BreadcrumbCategory, BreadcrumbFrame, ErrorFrame, RecordingEventKind, RecordingFrame,
    ReplayFrame, SdkOptions, SessionRecord, SpanFrame,
};

const CHAPTER_SPAN_OPS: [&str; 3] = [
    "navigation.navigate",
    "navigation.reload",
    "largest-contentful-paint",
];
const TIMELINE_SPAN_OPS: [&str; 2] = ["navigation.navigate", "navigation.reload"];
const NAVIGATE_SPAN_OPS: [&str; 3] = [
    "navigation.navigate",
    "navigation.reload",
    "navigation.back_forward",
];

/// Hydrated streams before the session window is known.
#[derive(Default)]
struct Streams {
    recording: Vec<RecordingFrame>,
    breadcrumbs: Vec<BreadcrumbFrame>,
    spans: Vec<SpanFrame>,
    errors: Vec<ErrorFrame>,
    sdk_options: Option<SdkOptions>,
}

/// Derived views, each computed on first access and kept for the reader's lifetime.
#[derive(Default)]
struct Views {
    console: OnceLock<Vec<BreadcrumbFrame>>,
    dom: OnceLock<Vec<BreadcrumbFrame>>,
    network: OnceLock<Vec<SpanFrame>>,
    memory: OnceLock<Vec<SpanFrame>>,
    navigate: OnceLock<Vec<ReplayFrame>>,
    chapters: OnceLock<Vec<ReplayFrame>>,
    timeline: OnceLock<Vec<ReplayFrame>>,
    network_detail: OnceLock<bool>,
    full_snapshot: OnceLock<bool>,
}

/// The reconciled, time-ordered model of one replay session.
///
/// Immutable once constructed. Every accessor is a pure function of that
/// state, so views are memoized without any invalidation.
pub struct ReplayReader {
    record: SessionRecord,
    recording: Vec<RecordingFrame>,
    breadcrumbs: Vec<BreadcrumbFrame>,
    spans: Vec<SpanFrame>,
    errors: Vec<ErrorFrame>,
    sdk_options: Option<SdkOptions>,
    deltas: TimestampDeltas,
    legacy_deltas: Option<TimestampDeltas>,
    clip: Option<Window>,
    fallback: bool,
    views: Views,
}

impl std::fmt::Debug for ReplayReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayReader")
            .field("replay_id", &self.record.id)
            .field("recording", &self.recording.len())
            .field("breadcrumbs", &self.breadcrumbs.len())
            .field("spans", &self.spans.len())
            .field("errors", &self.errors.len())
            .field("deltas", &self.deltas)
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl ReplayReader {
    /// Hydrate every input and reconcile the session window.
    ///
    /// Fails on the first record a hydrator can't interpret; use
    /// [`crate::build`] for the variant that degrades instead.
    pub fn new(
        attachments: &[Value],
        errors: &[Value],
        record: SessionRecord,
        config: &ReaderConfig,
    ) -> Result<Self, HydrationError> {
        let classified = classify(attachments);
        let streams = Streams {
            recording: hydrate_recording(&classified.recording)?,
            breadcrumbs: hydrate_breadcrumbs(&classified.breadcrumbs)?,
            spans: hydrate_spans(&classified.spans)?,
            errors: hydrate_errors(errors)?,
            sdk_options: hydrate_options(classified.options.as_ref())?,
        };

        let declared = record.window();
        let mut reader = Self::assemble(record, streams, config, false);

        if config.legacy_compat {
            let legacy = legacy::reconcile(declared, &classified);
            if legacy.deltas != reader.deltas {
                tracing::warn!(
                    replay_id = %reader.record.id,
                    started_at_delta_ms = reader.deltas.started_at_delta_ms,
                    finished_at_delta_ms = reader.deltas.finished_at_delta_ms,
                    legacy_started_at_delta_ms = legacy.deltas.started_at_delta_ms,
                    legacy_finished_at_delta_ms = legacy.deltas.finished_at_delta_ms,
                    "legacy window computation disagrees"
                );
            }
            reader.legacy_deltas = Some(legacy.deltas);
        }

        Ok(reader)
    }

    /// A reader holding only the session metadata and the synthetic frames.
    pub(crate) fn fallback(record: SessionRecord, config: &ReaderConfig) -> Self {
        Self::assemble(record, Streams::default(), config, true)
    }

    fn assemble(
        mut record: SessionRecord,
        mut streams: Streams,
        config: &ReaderConfig,
        fallback: bool,
    ) -> Self {
        let reconciliation = reconcile(
            record.window(),
            &streams.recording,
            &streams.breadcrumbs,
            &streams.spans,
        );
        if config.timestamp_correction && reconciliation.is_corrected() {
            tracing::info!(
                replay_id = %record.id,
                started_at_delta_ms = reconciliation.deltas.started_at_delta_ms,
                finished_at_delta_ms = reconciliation.deltas.finished_at_delta_ms,
                "corrected session window"
            );
            record.apply_window(reconciliation.inferred);
        }

        // Stable sorts: frames sharing an instant keep their input order.
        streams.recording.sort_by_key(|frame| frame.timestamp_ms);
        let mut start_marker = session_start_frame(&record);
        let mut end_marker = session_end_frame(&record);
        // Uncorrected windows can exclude recorded frames; the markers still bound them.
        if let (Some(first), Some(last)) = (streams.recording.first(), streams.recording.last()) {
            start_marker.timestamp_ms = start_marker.timestamp_ms.min(first.timestamp_ms);
            end_marker.timestamp_ms = end_marker.timestamp_ms.max(last.timestamp_ms);
        }
        streams.recording.insert(0, start_marker);
        streams.recording.push(end_marker);

        streams.breadcrumbs.insert(0, session_init_breadcrumb(&record));
        streams.breadcrumbs.sort_by_key(|frame| frame.timestamp_ms);
        streams.spans.sort_by_key(|frame| frame.timestamp_ms);
        streams.errors.sort_by_key(|frame| frame.timestamp_ms);

        let start_ms = record.start_ms();
        for frame in &mut streams.recording {
            frame.offset_ms = frame.timestamp_ms - start_ms;
        }
        for frame in &mut streams.breadcrumbs {
            frame.offset_ms = frame.timestamp_ms - start_ms;
        }
        for frame in &mut streams.spans {
            frame.offset_ms = frame.timestamp_ms - start_ms;
        }
        for frame in &mut streams.errors {
            frame.offset_ms = frame.timestamp_ms - start_ms;
        }

        let clip = config.clip_window.and_then(|clip| {
            let clamped = clip.clamp_to(record.window());
            if clamped.is_none() {
                tracing::debug!(
                    replay_id = %record.id,
                    clip_start_ms = clip.start_ms,
                    clip_end_ms = clip.end_ms,
                    "clip window does not overlap the session, ignoring it"
                );
            }
            clamped
        });
        if let Some(window) = clip {
            streams.breadcrumbs.retain(|frame| window.contains(frame.timestamp_ms));
            streams.spans.retain(|frame| window.contains(frame.timestamp_ms));
            streams.errors.retain(|frame| window.contains(frame.timestamp_ms));
        }

        Self {
            record,
            recording: streams.recording,
            breadcrumbs: streams.breadcrumbs,
            spans: streams.spans,
            errors: streams.errors,
            sdk_options: streams.sdk_options,
            deltas: reconciliation.deltas,
            legacy_deltas: None,
            clip,
            fallback,
            views: Views::default(),
        }
    }

    pub fn replay_record(&self) -> &SessionRecord {
        &self.record
    }

    /// Length of the queryable window: the clip if one is set, else the session.
    pub fn duration_ms(&self) -> i64 {
        match self.clip {
            Some(window) => window.duration_ms(),
            None => self.record.duration_ms,
        }
    }

    pub fn start_timestamp_ms(&self) -> i64 {
        self.record.start_ms()
    }

    /// Distance from the session start to the start of the queryable window.
    pub fn start_offset_ms(&self) -> i64 {
        self.clip
            .map(|window| window.start_ms - self.record.start_ms())
            .unwrap_or(0)
    }

    pub fn clip_window(&self) -> Option<Window> {
        self.clip
    }

    /// Correction applied (or, with correction off, found) by reconciliation.
    pub fn timestamp_deltas(&self) -> TimestampDeltas {
        self.deltas
    }

    /// Result of the legacy computation, present only in legacy-compat mode.
    pub fn legacy_deltas(&self) -> Option<TimestampDeltas> {
        self.legacy_deltas
    }

    /// Whether this reader came from the construction guard's fallback path.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// The full recording stream, bounded by the synthetic start/end frames.
    pub fn recording_frames(&self) -> &[RecordingFrame] {
        &self.recording
    }

    pub fn breadcrumb_frames(&self) -> &[BreadcrumbFrame] {
        &self.breadcrumbs
    }

    pub fn span_frames(&self) -> &[SpanFrame] {
        &self.spans
    }

    pub fn error_frames(&self) -> &[ErrorFrame] {
        &self.errors
    }

    pub fn sdk_options(&self) -> Option<&SdkOptions> {
        self.sdk_options.as_ref()
    }

    pub fn console_frames(&self) -> &[BreadcrumbFrame] {
        self.views.console.get_or_init(|| {
            self.breadcrumbs
                .iter()
                .filter(|frame| frame.category == BreadcrumbCategory::Console)
                .cloned()
                .collect()
        })
    }

    /// Breadcrumbs that reference a node in the recorded DOM.
    pub fn dom_frames(&self) -> &[BreadcrumbFrame] {
        self.views.dom.get_or_init(|| {
            self.breadcrumbs
                .iter()
                .filter(|frame| frame.has_node_id())
                .cloned()
                .collect()
        })
    }

    pub fn network_frames(&self) -> &[SpanFrame] {
        self.views.network.get_or_init(|| {
            self.spans
                .iter()
                .filter(|frame| frame.is_network())
                .cloned()
                .collect()
        })
    }

    pub fn memory_frames(&self) -> &[SpanFrame] {
        self.views.memory.get_or_init(|| {
            self.spans
                .iter()
                .filter(|frame| frame.op == "memory")
                .cloned()
                .collect()
        })
    }

    /// Page navigations, from both spans and navigation breadcrumbs.
    pub fn navigate_frames(&self) -> &[ReplayFrame] {
        self.views.navigate.get_or_init(|| {
            self.merge(
                |crumb| crumb.category == BreadcrumbCategory::Navigation,
                |span| NAVIGATE_SPAN_OPS.contains(&span.op.as_str()),
                false,
            )
        })
    }

    /// The noteworthy events of the session, in time order.
    ///
    /// Custom breadcrumb categories count as noteworthy: the SDK only emits
    /// known categories, so anything else was recorded on purpose.
    pub fn chapter_frames(&self) -> &[ReplayFrame] {
        self.views.chapters.get_or_init(|| {
            self.merge(
                |crumb| {
                    matches!(
                        crumb.category,
                        BreadcrumbCategory::ReplayInit
                            | BreadcrumbCategory::UiClick
                            | BreadcrumbCategory::ReplayMutations
                            | BreadcrumbCategory::UiSlowClickDetected
                    ) || !crumb.category.is_known()
                },
                |span| CHAPTER_SPAN_OPS.contains(&span.op.as_str()),
                true,
            )
        })
    }

    /// Compact subset of [`Self::chapter_frames`] for the timeline strip.
    pub fn timeline_frames(&self) -> &[ReplayFrame] {
        self.views.timeline.get_or_init(|| {
            self.merge(
                |crumb| {
                    matches!(
                        crumb.category,
                        BreadcrumbCategory::ReplayInit | BreadcrumbCategory::UiClick
                    )
                },
                |span| TIMELINE_SPAN_OPS.contains(&span.op.as_str()),
                true,
            )
        })
    }

    /// Whether request/response details were captured for this session.
    ///
    /// Sessions recorded before the SDK reported its options carry no flag.
    /// For those, any header on a network span means the recording SDK was
    /// new enough to capture details. This is a version heuristic, not
    /// something the span data states.
    pub fn is_network_detail_enabled(&self) -> bool {
        *self.views.network_detail.get_or_init(|| match &self.sdk_options {
            Some(options) => options.network_detail_has_urls,
            None => self.network_frames().iter().any(SpanFrame::has_header_data),
        })
    }

    /// A player can't render anything without at least one full snapshot.
    pub fn has_full_snapshot(&self) -> bool {
        *self.views.full_snapshot.get_or_init(|| {
            self.recording
                .iter()
                .any(|frame| frame.kind == RecordingEventKind::FullSnapshot)
        })
    }

    fn merge(
        &self,
        keep_crumb: impl Fn(&BreadcrumbFrame) -> bool,
        keep_span: impl Fn(&SpanFrame) -> bool,
        with_errors: bool,
    ) -> Vec<ReplayFrame> {
        let errors: &[ErrorFrame] = if with_errors { &self.errors } else { &[] };
        let mut frames: Vec<ReplayFrame> = self
            .breadcrumbs
            .iter()
            .filter(|crumb| keep_crumb(crumb))
            .cloned()
            .map(ReplayFrame::Breadcrumb)
            .chain(
                self.spans
                    .iter()
                    .filter(|span| keep_span(span))
                    .cloned()
                    .map(ReplayFrame::Span),
            )
            .chain(errors.iter().cloned().map(ReplayFrame::Error))
            .collect();
        frames.sort_by_key(ReplayFrame::timestamp_ms);
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;

    fn record(start_ms: i64, end_ms: i64) -> SessionRecord {
        SessionRecord::new(
            "replay-1",
            DateTime::from_timestamp_millis(start_ms).unwrap(),
            DateTime::from_timestamp_millis(end_ms).unwrap(),
        )
    }

    fn crumb(category: &str, secs: f64, data: Value) -> Value {
        json!({"type": 5, "timestamp": secs * 1000.0, "data": {"tag": "breadcrumb", "payload": {"category": category, "timestamp": secs, "data": data}}})
    }

    fn span(op: &str, secs: f64, data: Value) -> Value {
        json!({"type": 5, "timestamp": secs * 1000.0, "data": {"tag": "performanceSpan", "payload": {"op": op, "description": op, "startTimestamp": secs, "endTimestamp": secs + 0.1, "data": data}}})
    }

    fn sample_attachments() -> Vec<Value> {
        vec![
            json!({"type": 4, "timestamp": 1000, "data": {"href": "https://example.com"}}),
            json!({"type": 2, "timestamp": 1000, "data": {"node": {}}}),
            crumb("console", 1.2, json!({"logger": "console"})),
            crumb("ui.click", 1.3, json!({"nodeId": 12})),
            crumb("ui.input", 1.35, json!({"nodeId": 13})),
            crumb("replay.mutations", 1.4, json!({"count": 900})),
            crumb("checkout.completed", 1.5, json!({})),
            span("navigation.navigate", 1.0, json!({})),
            span("resource.fetch", 1.6, json!({"response": {"headers": {}}})),
            span("memory", 1.7, json!({"memory": {"usedJSHeapSize": 1}})),
            span("largest-contentful-paint", 1.8, json!({})),
        ]
    }

    fn sample_errors() -> Vec<Value> {
        vec![json!({"id": "e1", "timestamp": 1.9, "title": "TypeError: x is undefined"})]
    }

    fn sample_reader(config: &ReaderConfig) -> ReplayReader {
        ReplayReader::new(&sample_attachments(), &sample_errors(), record(1_000, 2_000), config)
            .unwrap()
    }

    #[test]
    fn test_filtered_views() {
        let reader = sample_reader(&ReaderConfig::default());

        assert_eq!(reader.console_frames().len(), 1);
        assert_eq!(reader.dom_frames().len(), 2);
        assert_eq!(reader.network_frames().len(), 2);
        assert_eq!(reader.memory_frames().len(), 1);
        assert_eq!(reader.navigate_frames().len(), 1);
        assert_eq!(reader.error_frames().len(), 1);
        assert!(reader.has_full_snapshot());
    }

    #[test]
    fn test_chapters_include_custom_categories() {
        let reader = sample_reader(&ReaderConfig::default());

        let labels: Vec<String> = reader.chapter_frames().iter().map(ReplayFrame::label).collect();

        assert_eq!(
            labels,
            vec![
                "replay.init",
                "navigation.navigate",
                "ui.click",
                "replay.mutations",
                "checkout.completed",
                "largest-contentful-paint",
                "error: TypeError: x is undefined",
            ]
        );
    }

    #[test]
    fn test_timeline_is_narrower_than_chapters() {
        let reader = sample_reader(&ReaderConfig::default());

        let labels: Vec<String> = reader.timeline_frames().iter().map(ReplayFrame::label).collect();

        assert_eq!(
            labels,
            vec![
                "replay.init",
                "navigation.navigate",
                "ui.click",
                "error: TypeError: x is undefined",
            ]
        );
        for frame in reader.timeline_frames() {
            assert!(reader.chapter_frames().contains(frame));
        }
    }

    #[test]
    fn test_views_are_memoized() {
        let reader = sample_reader(&ReaderConfig::default());

        let first = reader.chapter_frames();
        let second = reader.chapter_frames();

        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(reader.console_frames(), reader.console_frames()));
    }

    #[test]
    fn test_views_under_concurrent_access() {
        let reader = sample_reader(&ReaderConfig::default());

        let pointers: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| reader.chapter_frames().as_ptr() as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(pointers.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn test_offsets_are_relative_to_corrected_start() {
        let mut attachments = sample_attachments();
        attachments.push(crumb("ui.click", 0.5, json!({})));

        let reader =
            ReplayReader::new(&attachments, &[], record(1_000, 2_000), &ReaderConfig::default())
                .unwrap();

        assert_eq!(reader.start_timestamp_ms(), 500);
        assert_eq!(reader.breadcrumb_frames()[0].offset_ms, 0);
        assert_eq!(reader.recording_frames()[0].offset_ms, 0);
        assert_eq!(reader.console_frames()[0].offset_ms, 700);
    }

    #[test]
    fn test_correction_disabled_keeps_declared_window() {
        let attachments = vec![crumb("ui.click", 0.5, json!({}))];
        let config = ReaderConfig::default().without_timestamp_correction();

        let reader = ReplayReader::new(&attachments, &[], record(1_000, 2_000), &config).unwrap();

        assert_eq!(reader.start_timestamp_ms(), 1_000);
        assert_eq!(reader.duration_ms(), 1_000);
        assert_eq!(reader.timestamp_deltas().started_at_delta_ms, -500);
        assert!(reader.recording_frames()[0].is_session_start());
        assert_eq!(reader.recording_frames()[0].timestamp_ms, 1_000);
    }

    #[test]
    fn test_correction_disabled_markers_still_bound_recording() {
        let attachments = vec![
            json!({"type": 2, "timestamp": 500, "data": {"node": {}}}),
            json!({"type": 3, "timestamp": 2500, "data": {}}),
        ];
        let config = ReaderConfig::default().without_timestamp_correction();

        let reader = ReplayReader::new(&attachments, &[], record(1_000, 2_000), &config).unwrap();

        let timestamps: Vec<i64> = reader
            .recording_frames()
            .iter()
            .map(|frame| frame.timestamp_ms)
            .collect();
        assert_eq!(timestamps, vec![500, 500, 2_500, 2_500]);
        assert!(reader.recording_frames()[0].is_session_start());
        assert!(reader.recording_frames()[3].is_session_end());
        assert_eq!(reader.start_timestamp_ms(), 1_000);
        assert_eq!(reader.recording_frames()[0].offset_ms, -500);
    }

    #[test]
    fn test_clip_window_restricts_views() {
        let config = ReaderConfig::default().with_clip_window(1_250, 1_750);

        let reader = sample_reader(&config);

        assert_eq!(reader.duration_ms(), 500);
        assert_eq!(reader.start_offset_ms(), 250);
        assert!(reader
            .breadcrumb_frames()
            .iter()
            .all(|frame| (1_250..=1_750).contains(&frame.timestamp_ms)));
        assert!(reader.error_frames().is_empty());
        assert_eq!(reader.recording_frames().len(), 4);
    }

    #[test]
    fn test_legacy_compat_records_both_deltas() {
        let attachments = vec![span("resource.fetch", 1.5, json!({}))]
            .into_iter()
            .map(|mut value| {
                value["data"]["payload"]["endTimestamp"] = json!(2.5);
                value
            })
            .collect::<Vec<_>>();
        let config = ReaderConfig::default().with_legacy_compat();

        let reader = ReplayReader::new(&attachments, &[], record(1_000, 2_000), &config).unwrap();

        assert!(reader.timestamp_deltas().is_zero());
        let legacy = reader.legacy_deltas().unwrap();
        assert_eq!(legacy.finished_at_delta_ms, 500);
        assert_eq!(reader.replay_record().end_ms(), 2_000);
    }

    #[test]
    fn test_legacy_deltas_absent_by_default() {
        let reader = sample_reader(&ReaderConfig::default());
        assert_eq!(reader.legacy_deltas(), None);
    }

    #[test]
    fn test_network_detail_prefers_sdk_options() {
        let mut attachments = vec![span(
            "resource.xhr",
            1.5,
            json!({"request": {"headers": {"accept": "*/*"}}}),
        )];
        attachments.push(json!({"type": 5, "timestamp": 1000, "data": {"tag": "options", "payload": {"networkDetailHasUrls": false}}}));

        let reader =
            ReplayReader::new(&attachments, &[], record(1_000, 2_000), &ReaderConfig::default())
                .unwrap();

        assert!(!reader.is_network_detail_enabled());
    }

    #[test]
    fn test_network_detail_without_headers() {
        let reader = sample_reader(&ReaderConfig::default());
        assert!(reader.sdk_options().is_none());
        assert!(!reader.is_network_detail_enabled());
    }

    #[test]
    fn test_reader_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReplayReader>();
    }
}
