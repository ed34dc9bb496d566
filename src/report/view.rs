use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::stream::{ReportCallbacks, ReportHandle, StreamState};
use super::ReportOpener;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    Streaming,
    Complete,
    Failed(String),
    Cancelled,
}

/// Text accumulated for one alert's report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportText {
    pub text: String,
    pub status: ReportStatus,
}

impl ReportText {
    fn streaming() -> Self {
        Self {
            text: String::new(),
            status: ReportStatus::Streaming,
        }
    }
}

type Shared = Arc<Mutex<ReportText>>;

fn with_text(slot: &Shared, f: impl FnOnce(&mut ReportText)) {
    let mut guard = match slot.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard);
}

/// Report streams owned by one consumer. At most one stream per alert id is
/// open here; separate views do not coordinate with each other.
pub struct ReportView<O> {
    opener: O,
    streams: HashMap<u64, ReportHandle>,
    reports: HashMap<u64, Shared>,
}

impl<O: ReportOpener> ReportView<O> {
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            streams: HashMap::new(),
            reports: HashMap::new(),
        }
    }

    /// Start (or restart) the report for `alert_id`. An earlier stream for
    /// the same alert is closed first; its text is discarded once the new
    /// stream opens, and kept as `Cancelled` if opening fails.
    pub fn request(&mut self, alert_id: u64) -> Result<()> {
        self.close(alert_id);

        let slot: Shared = Arc::new(Mutex::new(ReportText::streaming()));
        let (on_token, on_done, on_error) = (slot.clone(), slot.clone(), slot.clone());
        let callbacks = ReportCallbacks::new(
            move |token| with_text(&on_token, |r| r.text.push_str(&token)),
            move || with_text(&on_done, |r| r.status = ReportStatus::Complete),
            move |err| with_text(&on_error, |r| r.status = ReportStatus::Failed(err.to_string())),
        );

        let handle = self.opener.open(alert_id, callbacks)?;
        self.reports.insert(alert_id, slot);
        self.streams.insert(alert_id, handle);
        Ok(())
    }

    pub fn report(&self, alert_id: u64) -> Option<ReportText> {
        self.reports.get(&alert_id).map(|slot| {
            let mut out = ReportText::streaming();
            with_text(slot, |r| out = r.clone());
            out
        })
    }

    pub fn is_streaming(&self, alert_id: u64) -> bool {
        self.streams
            .get(&alert_id)
            .map(|h| h.is_open())
            .unwrap_or(false)
    }

    pub fn open_count(&self) -> usize {
        self.streams.values().filter(|h| h.is_open()).count()
    }

    /// Cancel one alert's stream. Text received so far is kept.
    pub fn close(&mut self, alert_id: u64) {
        if let Some(handle) = self.streams.remove(&alert_id) {
            let was_open = handle.is_open();
            handle.close();
            if was_open && handle.state() == StreamState::Closed {
                if let Some(slot) = self.reports.get(&alert_id) {
                    with_text(slot, |r| r.status = ReportStatus::Cancelled);
                }
            }
        }
    }

    pub fn close_all(&mut self) {
        let ids: Vec<u64> = self.streams.keys().copied().collect();
        for id in ids {
            self.close(id);
        }
    }

    /// Wait until the alert's stream ends on its own and return its report.
    pub async fn finish(&mut self, alert_id: u64) -> Option<ReportText> {
        if let Some(handle) = self.streams.remove(&alert_id) {
            handle.join().await;
        }
        self.report(alert_id)
    }
}

impl<O> Drop for ReportView<O> {
    fn drop(&mut self) {
        for (_, handle) in self.streams.drain() {
            handle.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use futures_util::stream;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a canned SSE body per alert id; alert 404 fails to open, and
    /// every open past `fail_after` fails.
    struct CannedOpener {
        opened: AtomicUsize,
        pending: bool,
        fail_after: Option<usize>,
    }

    impl CannedOpener {
        fn new(pending: bool) -> Self {
            Self {
                opened: AtomicUsize::new(0),
                pending,
                fail_after: None,
            }
        }
    }

    impl ReportOpener for CannedOpener {
        fn open(&self, alert_id: u64, callbacks: ReportCallbacks) -> Result<ReportHandle> {
            if alert_id == 404 {
                bail!("no such alert");
            }
            if let Some(limit) = self.fail_after {
                if self.opened.load(Ordering::SeqCst) >= limit {
                    bail!("backend unavailable");
                }
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            if self.pending {
                let body = stream::pending::<Result<Vec<u8>, io::Error>>();
                return Ok(ReportHandle::from_body(alert_id, callbacks, body));
            }
            let body = format!(
                "data: {{\"token\":\"Alert {}\"}}\n\ndata: {{\"token\":\": risk rising\"}}\n\ndata: [DONE]\n\n",
                alert_id
            );
            let chunks: Vec<Result<Vec<u8>, io::Error>> = vec![Ok(body.into_bytes())];
            Ok(ReportHandle::from_body(alert_id, callbacks, stream::iter(chunks)))
        }
    }

    #[tokio::test]
    async fn test_report_accumulates_to_completion() {
        let mut view = ReportView::new(CannedOpener::new(false));
        view.request(7).unwrap();
        let report = view.finish(7).await.unwrap();
        assert_eq!(report.text, "Alert 7: risk rising");
        assert_eq!(report.status, ReportStatus::Complete);
    }

    #[tokio::test]
    async fn test_rerequest_replaces_previous_stream() {
        let mut view = ReportView::new(CannedOpener::new(true));
        view.request(3).unwrap();
        view.request(3).unwrap();
        view.request(4).unwrap();

        assert_eq!(view.opener.opened.load(Ordering::SeqCst), 3);
        assert_eq!(view.open_count(), 2);
        assert!(view.is_streaming(3));

        view.close(3);
        assert!(!view.is_streaming(3));
        assert_eq!(view.report(3).unwrap().status, ReportStatus::Cancelled);

        view.close_all();
        assert_eq!(view.open_count(), 0);
    }

    #[tokio::test]
    async fn test_open_failure_leaves_no_entry() {
        let mut view = ReportView::new(CannedOpener::new(false));
        assert!(view.request(404).is_err());
        assert!(view.report(404).is_none());
        assert!(!view.is_streaming(404));
    }

    #[tokio::test]
    async fn test_failed_reopen_cancels_previous_report() {
        let mut view = ReportView::new(CannedOpener {
            fail_after: Some(1),
            ..CannedOpener::new(true)
        });
        view.request(5).unwrap();
        assert!(view.is_streaming(5));

        assert!(view.request(5).is_err());
        assert!(!view.is_streaming(5));
        assert_eq!(view.open_count(), 0);
        assert_eq!(view.report(5).unwrap().status, ReportStatus::Cancelled);
    }
}
