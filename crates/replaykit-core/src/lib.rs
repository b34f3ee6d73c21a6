//! # replaykit-core
//!
//! Turns the three loosely synchronized inputs of a replay session (recording
//! attachments, error records and the session record) into one time-ordered
//! [`ReplayReader`].
//!
//! The pipeline runs leaves first:
//!
//! 1. [`classify`] splits the raw attachment array into typed buckets.
//! 2. The [`hydrate`] functions turn each bucket into typed frames.
//! 3. [`reconcile`] widens the session window to cover every frame.
//! 4. [`ReplayReader`] owns the result and serves memoized views.
//! 5. [`build`] wraps all of the above and degrades to a metadata-only
//!    reader when hydration fails.

pub mod build;
pub mod classify;
pub mod config;
pub mod error;
pub mod hydrate;
pub mod reader;
pub mod reconcile;
pub mod types;

pub use build::{build, ErrorSink, TracingSink};
pub use classify::{classify, ClassifiedAttachments};
pub use config::{ClipWindow, ReaderConfig};
pub use error::{BuildError, FrameKind, HydrationError};
pub use reader::ReplayReader;
pub use reconcile::{reconcile, Reconciliation, TimestampDeltas, Window};
pub use types::{
    BreadcrumbCategory, BreadcrumbFrame, ErrorFrame, RecordingEventKind, RecordingFrame,
    ReplayFrame, SdkOptions, SessionRecord, SpanFrame,
};
