use serde_json::Value;

const BREADCRUMB_TAG: &str = "breadcrumb";
const SPAN_TAG: &str = "performanceSpan";
const OPTIONS_TAG: &str = "options";

/// The raw attachment array split into per-hydrator buckets.
///
/// Breadcrumb, span and options records arrive wrapped in custom recording
/// events; the buckets hold the unwrapped payloads. Everything else stays a
/// recording event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedAttachments {
    pub recording: Vec<Value>,
    pub breadcrumbs: Vec<Value>,
    pub spans: Vec<Value>,
    pub options: Option<Value>,
}

impl ClassifiedAttachments {
    pub fn is_empty(&self) -> bool {
        self.recording.is_empty()
            && self.breadcrumbs.is_empty()
            && self.spans.is_empty()
            && self.options.is_none()
    }
}

/// Split a mixed attachment array by the `data.tag` of each record.
pub fn classify(attachments: &[Value]) -> ClassifiedAttachments {
    let mut classified = ClassifiedAttachments::default();

    for attachment in attachments {
        let tag = attachment.pointer("/data/tag").and_then(Value::as_str);
        let payload = || {
            attachment
                .pointer("/data/payload")
                .cloned()
                .unwrap_or(Value::Null)
        };

        match tag {
            Some(BREADCRUMB_TAG) => classified.breadcrumbs.push(payload()),
            Some(SPAN_TAG) => classified.spans.push(payload()),
            Some(OPTIONS_TAG) => {
                if classified.options.is_some() {
                    tracing::debug!("replay carries more than one options record, keeping the last");
                }
                classified.options = Some(payload());
            }
            _ => classified.recording.push(attachment.clone()),
        }
    }

    tracing::debug!(
        recording = classified.recording.len(),
        breadcrumbs = classified.breadcrumbs.len(),
        spans = classified.spans.len(),
        options = classified.options.is_some(),
        "classified attachments"
    );

    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_mixed_attachments() {
        let attachments = vec![
            json!({"type": 4, "timestamp": 1000, "data": {"href": "https://example.com"}}),
            json!({"type": 5, "timestamp": 1100, "data": {"tag": "breadcrumb", "payload": {"category": "ui.click", "timestamp": 1.1}}}),
            json!({"type": 2, "timestamp": 1000, "data": {"node": {}}}),
            json!({"type": 5, "timestamp": 1200, "data": {"tag": "performanceSpan", "payload": {"op": "memory"}}}),
            json!({"type": 5, "timestamp": 1000, "data": {"tag": "options", "payload": {"networkDetailHasUrls": true}}}),
        ];

        let classified = classify(&attachments);

        assert_eq!(classified.recording.len(), 2);
        assert_eq!(classified.breadcrumbs, vec![json!({"category": "ui.click", "timestamp": 1.1})]);
        assert_eq!(classified.spans, vec![json!({"op": "memory"})]);
        assert_eq!(classified.options, Some(json!({"networkDetailHasUrls": true})));
    }

    #[test]
    fn test_classify_keeps_unknown_tags_as_recording() {
        let attachments = vec![
            json!({"type": 5, "timestamp": 1000, "data": {"tag": "replay.custom"}}),
            json!("not an object"),
        ];

        let classified = classify(&attachments);

        assert_eq!(classified.recording.len(), 2);
        assert!(classified.breadcrumbs.is_empty());
    }

    #[test]
    fn test_classify_missing_payload_becomes_null() {
        let attachments = vec![json!({"type": 5, "data": {"tag": "breadcrumb"}})];

        let classified = classify(&attachments);

        assert_eq!(classified.breadcrumbs, vec![Value::Null]);
    }

    #[test]
    fn test_classify_empty() {
        assert!(classify(&[]).is_empty());
    }
}
