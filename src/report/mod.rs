//! Streaming AI reports for alerts.

use anyhow::Result;

pub mod client;
pub mod frame;
pub mod sink;
pub mod stream;
pub mod view;

pub use client::ReportClient;
pub use frame::{Frame, SseDecoder, DONE_MARKER};
pub use sink::stream_to_writer;
pub use stream::{ReportCallbacks, ReportHandle, ReportStream, StreamControl, StreamState};
pub use view::{ReportStatus, ReportText, ReportView};

/// Something that can start a report stream for an alert.
pub trait ReportOpener {
    fn open(&self, alert_id: u64, callbacks: ReportCallbacks) -> Result<ReportHandle>;
}
