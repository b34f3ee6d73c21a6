use std::panic::{self, AssertUnwindSafe};

use replaykit_logging::{LogEvent, Logger};
use serde_json::Value;

use crate::config::ReaderConfig;
use crate::error::BuildError;
use crate::reader::ReplayReader;
use crate::types::SessionRecord;

/// Receives failures the construction guard recovered from.
pub trait ErrorSink {
    fn report(&self, error: &BuildError, record: &SessionRecord);
}

/// Reports through `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, error: &BuildError, record: &SessionRecord) {
        tracing::error!(replay_id = %record.id, error = %error, "failed to hydrate replay");
    }
}

impl ErrorSink for Logger {
    fn report(&self, error: &BuildError, record: &SessionRecord) {
        self.log(&LogEvent::HydrationFailed {
            replay_id: record.id.clone(),
            error: error.to_string(),
        });
    }
}

/// Build a reader from the three inputs, never failing past this boundary.
///
/// Returns `None` while any input is absent: that is a loading state, not a
/// failure. When hydration fails the error goes to `sink` and the caller gets
/// a fallback reader built from the unmodified session record and no frames,
/// so the session header still renders.
pub fn build(
    attachments: Option<&[Value]>,
    errors: Option<&[Value]>,
    record: Option<SessionRecord>,
    config: &ReaderConfig,
    sink: &dyn ErrorSink,
) -> Option<ReplayReader> {
    let (Some(attachments), Some(errors), Some(record)) = (attachments, errors, record) else {
        tracing::debug!("replay inputs not ready");
        return None;
    };

    let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
        ReplayReader::new(attachments, errors, record.clone(), config)
    }));

    let error = match attempt {
        Ok(Ok(reader)) => return Some(reader),
        Ok(Err(err)) => BuildError::from(err),
        Err(payload) => BuildError::Panicked(panic_message(payload.as_ref())),
    };

    sink.report(&error, &record);
    Some(ReplayReader::fallback(record, config))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
