//! One report stream: a small state machine driven by the response body.
//!
//! ```text
//! OPEN --token--> OPEN
//! OPEN --[DONE]--> DONE       (on_done, once)
//! OPEN --failure--> ERRORED   (on_error, once)
//! OPEN --close()--> CLOSED    (no terminal callback)
//! ```
//!
//! Callbacks run under a per-stream lock. `close()` flips the state, aborts
//! the task and then takes the same lock, so once it returns no callback is
//! running and none will start. A callback that closes its own stream skips
//! the wait.

use std::cell::Cell;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use futures_util::{pin_mut, Stream, StreamExt};
use serde_json::json;
use tokio::task::{AbortHandle, JoinHandle};

use super::frame::{Frame, SseDecoder};
use crate::logging::{log, log_stream_state, obj, v_str, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Done,
    Errored,
    Closed,
}

impl StreamState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => StreamState::Open,
            1 => StreamState::Done,
            2 => StreamState::Errored,
            _ => StreamState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamState::Open => "open",
            StreamState::Done => "done",
            StreamState::Errored => "errored",
            StreamState::Closed => "closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamState::Open)
    }
}

type TokenFn = Box<dyn FnMut(String) + Send>;
type DoneFn = Box<dyn FnOnce() + Send>;
type ErrorFn = Box<dyn FnOnce(anyhow::Error) + Send>;

/// The three caller hooks of a report stream.
pub struct ReportCallbacks {
    on_token: TokenFn,
    on_done: DoneFn,
    on_error: ErrorFn,
}

impl ReportCallbacks {
    pub fn new<T, D, E>(on_token: T, on_done: D, on_error: E) -> Self
    where
        T: FnMut(String) + Send + 'static,
        D: FnOnce() + Send + 'static,
        E: FnOnce(anyhow::Error) + Send + 'static,
    {
        Self {
            on_token: Box::new(on_token),
            on_done: Box::new(on_done),
            on_error: Box::new(on_error),
        }
    }
}

thread_local! {
    static IN_CALLBACK: Cell<bool> = const { Cell::new(false) };
}

struct CallbackScope;

impl CallbackScope {
    fn enter() -> Self {
        IN_CALLBACK.with(|c| c.set(true));
        CallbackScope
    }
}

impl Drop for CallbackScope {
    fn drop(&mut self) {
        IN_CALLBACK.with(|c| c.set(false));
    }
}

struct Shared {
    alert_id: u64,
    state: AtomicU8,
    callbacks: Mutex<Option<ReportCallbacks>>,
}

impl Shared {
    fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Leave OPEN for `to`; false if the stream already left OPEN.
    fn leave_open(&self, to: StreamState) -> bool {
        self.state
            .compare_exchange(
                StreamState::Open as u8,
                to as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ReportCallbacks>> {
        match self.callbacks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Cancellation side of a stream, shared with its dispatcher.
#[derive(Clone)]
pub struct StreamControl {
    shared: Arc<Shared>,
}

impl StreamControl {
    pub fn alert_id(&self) -> u64 {
        self.shared.alert_id
    }

    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    /// Cancel without a terminal callback. Idempotent; a no-op once the
    /// stream has finished on its own.
    pub fn close(&self) {
        if !self.shared.leave_open(StreamState::Closed) {
            return;
        }
        if !IN_CALLBACK.with(|c| c.get()) {
            // waits out a callback in flight, then drops the rest
            self.shared.lock().take();
        }
        log_stream_state(self.shared.alert_id, StreamState::Closed.as_str(), 0);
    }
}

/// Dispatcher for one report stream. Owns the frame decoder; the callbacks
/// live in the state shared with [`StreamControl`].
pub struct ReportStream {
    shared: Arc<Shared>,
    decoder: SseDecoder,
    tokens: u64,
}

impl ReportStream {
    pub fn new(alert_id: u64, callbacks: ReportCallbacks) -> (Self, StreamControl) {
        let shared = Arc::new(Shared {
            alert_id,
            state: AtomicU8::new(StreamState::Open as u8),
            callbacks: Mutex::new(Some(callbacks)),
        });
        let stream = Self {
            shared: shared.clone(),
            decoder: SseDecoder::new(),
            tokens: 0,
        };
        (stream, StreamControl { shared })
    }

    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// Feed one body chunk. Returns false once the stream has left OPEN.
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        for payload in self.decoder.push(chunk) {
            if !self.dispatch(&payload) {
                return false;
            }
        }
        self.state() == StreamState::Open
    }

    fn dispatch(&mut self, payload: &str) -> bool {
        match Frame::parse(payload) {
            Some(Frame::Token(token)) => self.emit_token(token),
            Some(Frame::Done) => {
                self.finish_done();
                false
            }
            None => {
                log(
                    Level::Trace,
                    Domain::Stream,
                    "frame_ignored",
                    obj(&[
                        ("alert_id", json!(self.shared.alert_id)),
                        ("bytes", json!(payload.len())),
                    ]),
                );
                self.state() == StreamState::Open
            }
        }
    }

    fn emit_token(&mut self, token: String) -> bool {
        let mut guard = self.shared.lock();
        if self.shared.state() != StreamState::Open {
            return false;
        }
        if let Some(cb) = guard.as_mut() {
            self.tokens += 1;
            let _scope = CallbackScope::enter();
            (cb.on_token)(token);
        }
        true
    }

    fn finish_done(&mut self) {
        let mut guard = self.shared.lock();
        if !self.shared.leave_open(StreamState::Done) {
            return;
        }
        let callbacks = guard.take();
        log_stream_state(self.shared.alert_id, StreamState::Done.as_str(), self.tokens);
        if let Some(cb) = callbacks {
            let _scope = CallbackScope::enter();
            (cb.on_done)();
        }
    }

    /// Transport failure: `on_error` once, unless the stream already ended.
    pub fn fail(&mut self, cause: anyhow::Error) {
        let mut guard = self.shared.lock();
        if !self.shared.leave_open(StreamState::Errored) {
            return;
        }
        let callbacks = guard.take();
        log(
            Level::Warn,
            Domain::Stream,
            "state",
            obj(&[
                ("alert_id", json!(self.shared.alert_id)),
                ("state", v_str(StreamState::Errored.as_str())),
                ("tokens", json!(self.tokens)),
                ("msg", v_str(&cause.to_string())),
            ]),
        );
        if let Some(cb) = callbacks {
            let _scope = CallbackScope::enter();
            (cb.on_error)(cause);
        }
    }

    /// Drive the stream from a body until a terminal frame, a read error or
    /// the end of the body. Ending without `[DONE]` counts as a failure.
    pub async fn run<S, B, E>(mut self, body: S)
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<anyhow::Error>,
    {
        pin_mut!(body);
        while let Some(item) = body.next().await {
            match item {
                Ok(chunk) => {
                    if !self.feed(chunk.as_ref()) {
                        return;
                    }
                }
                Err(err) => {
                    self.fail(err.into());
                    return;
                }
            }
        }
        self.fail(anyhow!("report stream ended before completion"));
    }
}

/// Caller's handle on a running stream. Dropping it closes the stream.
pub struct ReportHandle {
    control: StreamControl,
    abort: AbortHandle,
    task: Option<JoinHandle<()>>,
}

impl ReportHandle {
    /// Spawn `driver` on the current tokio runtime as the stream's task.
    pub fn spawn<F>(control: StreamControl, driver: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        log_stream_state(control.alert_id(), StreamState::Open.as_str(), 0);
        let task = tokio::spawn(driver);
        Self {
            control,
            abort: task.abort_handle(),
            task: Some(task),
        }
    }

    /// Run a stream over an already-open body.
    pub fn from_body<S, B, E>(alert_id: u64, callbacks: ReportCallbacks, body: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let (stream, control) = ReportStream::new(alert_id, callbacks);
        Self::spawn(control, stream.run(body))
    }

    pub fn alert_id(&self) -> u64 {
        self.control.alert_id()
    }

    /// Cancellation side only; usable from inside the stream's own callbacks.
    pub fn control(&self) -> StreamControl {
        self.control.clone()
    }

    pub fn state(&self) -> StreamState {
        self.control.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == StreamState::Open
    }

    /// Cancel the stream and release its connection. Safe to call any
    /// number of times, including after the stream finished.
    pub fn close(&self) {
        self.control.close();
        self.abort.abort();
    }

    /// Wait for the stream's task to finish on its own.
    pub async fn join(mut self) -> StreamState {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if err.is_panic() {
                    log(
                        Level::Error,
                        Domain::Stream,
                        "task_panicked",
                        obj(&[("alert_id", json!(self.alert_id()))]),
                    );
                }
            }
        }
        self.state()
    }
}

impl Drop for ReportHandle {
    fn drop(&mut self) {
        self.close();
    }
}
