use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use super::stream::{ReportCallbacks, StreamControl, StreamState};
use super::ReportOpener;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Keeps the first failure only.
fn record(slot: &Mutex<Option<anyhow::Error>>, err: anyhow::Error) {
    let mut slot = lock(slot);
    if slot.is_none() {
        *slot = Some(err);
    }
}

/// Stream one alert's report into `out` token by token, with a newline once
/// it completes. A failed write cancels the stream and becomes the error.
pub async fn stream_to_writer<O, W>(opener: &O, alert_id: u64, out: W) -> Result<()>
where
    O: ReportOpener,
    W: Write + Send + 'static,
{
    let out = Arc::new(Mutex::new(out));
    let failure: Arc<Mutex<Option<anyhow::Error>>> = Arc::new(Mutex::new(None));
    let control: Arc<Mutex<Option<StreamControl>>> = Arc::new(Mutex::new(None));

    let (token_out, token_failure, token_control) = (out.clone(), failure.clone(), control.clone());
    let (done_out, done_failure) = (out, failure.clone());
    let error_failure = failure.clone();

    let callbacks = ReportCallbacks::new(
        move |token| {
            let written = {
                let mut w = lock(&token_out);
                w.write_all(token.as_bytes()).and_then(|_| w.flush())
            };
            if let Err(err) = written {
                record(&token_failure, anyhow::Error::new(err).context("writing report"));
                if let Some(c) = lock(&token_control).as_ref() {
                    c.close();
                }
            }
        },
        move || {
            let mut w = lock(&done_out);
            if let Err(err) = writeln!(w).and_then(|_| w.flush()) {
                record(&done_failure, anyhow::Error::new(err).context("writing report"));
            }
        },
        move |err| record(&error_failure, err),
    );

    let handle = opener.open(alert_id, callbacks)?;
    *lock(&control) = Some(handle.control());
    // a write may have failed before the control was in place
    if lock(&failure).is_some() {
        handle.close();
    }

    let state = handle.join().await;
    if let Some(err) = lock(&failure).take() {
        return Err(err);
    }
    if state == StreamState::Errored {
        return Err(anyhow!("report stream failed"));
    }
    Ok(())
}
