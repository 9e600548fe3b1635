#![forbid(unsafe_code)]

//! Fetch effect observability and deadline enforcement.
//!
//! This module provides:
//!
//! - **Tracing spans**: every data source call runs inside an `effect.fetch`
//!   span with `kind`, `path`, `ticket`, `duration_us` and `result` fields.
//! - **Counters**: monotonic totals for fetches started, failed, timed out
//!   and cancelled.
//! - **Timeouts**: [`call_with_timeout`] bounds a blocking call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;

use jtree_core::{CancellationToken, FetchTicket, Jurisdiction, NodePath, SourceError};
use web_time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Monotonic counters
// ---------------------------------------------------------------------------

static FETCHES_STARTED: AtomicU64 = AtomicU64::new(0);
static FETCHES_FAILED: AtomicU64 = AtomicU64::new(0);
static FETCHES_TIMED_OUT: AtomicU64 = AtomicU64::new(0);
static FETCHES_CANCELLED: AtomicU64 = AtomicU64::new(0);

/// Total data source calls started.
#[must_use]
pub fn fetches_started_total() -> u64 {
    FETCHES_STARTED.load(Ordering::Relaxed)
}

/// Total calls that returned an error (timeouts included).
#[must_use]
pub fn fetches_failed_total() -> u64 {
    FETCHES_FAILED.load(Ordering::Relaxed)
}

#[must_use]
pub fn fetches_timed_out_total() -> u64 {
    FETCHES_TIMED_OUT.load(Ordering::Relaxed)
}

/// Total fetches cancelled by a collapse.
#[must_use]
pub fn fetches_cancelled_total() -> u64 {
    FETCHES_CANCELLED.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Fetch instrumentation
// ---------------------------------------------------------------------------

/// Which data source call a fetch makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Roots,
    Children,
}

impl FetchKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Roots => "roots",
            Self::Children => "children",
        }
    }
}

fn result_label(result: &Result<Vec<Jurisdiction>, SourceError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(SourceError::Cancelled) => "cancelled",
        Err(SourceError::Timeout { .. }) => "timeout",
        Err(_) => "error",
    }
}

/// Run a data source call inside an `effect.fetch` span.
///
/// `path` and `ticket` are empty for root fetches.
pub fn trace_fetch<F>(
    kind: FetchKind,
    path: Option<&NodePath>,
    ticket: Option<u64>,
    f: F,
) -> Result<Vec<Jurisdiction>, SourceError>
where
    F: FnOnce() -> Result<Vec<Jurisdiction>, SourceError>,
{
    FETCHES_STARTED.fetch_add(1, Ordering::Relaxed);

    let path_label = path.map(ToString::to_string).unwrap_or_default();
    let start = Instant::now();
    let span = tracing::debug_span!(
        "effect.fetch",
        kind = kind.as_str(),
        path = %path_label,
        ticket = ticket.unwrap_or(0),
        duration_us = tracing::field::Empty,
        result = tracing::field::Empty,
    );
    let _guard = span.enter();

    tracing::debug!(
        target: "jtree.effect",
        kind = kind.as_str(),
        path = %path_label,
        "fetch started"
    );

    let result = f();
    let duration_us = start.elapsed().as_micros() as u64;
    let label = result_label(&result);
    span.record("duration_us", duration_us);
    span.record("result", label);

    match &result {
        Ok(children) => tracing::debug!(
            target: "jtree.effect",
            kind = kind.as_str(),
            path = %path_label,
            duration_us,
            count = children.len() as u64,
            "fetch completed"
        ),
        Err(error) => {
            FETCHES_FAILED.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                target: "jtree.effect",
                kind = kind.as_str(),
                path = %path_label,
                duration_us,
                error = %error,
                "fetch failed"
            );
        }
    }

    result
}

/// Record that an in-flight fetch is no longer wanted.
pub fn record_fetch_cancelled(ticket: &FetchTicket) {
    FETCHES_CANCELLED.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(
        target: "jtree.effect",
        path = %ticket.path(),
        ticket = ticket.seq(),
        "fetch cancelled"
    );
}

/// Record a fetch that exceeded its deadline.
pub fn warn_fetch_timeout(timeout_ms: u64) {
    FETCHES_TIMED_OUT.fetch_add(1, Ordering::Relaxed);
    tracing::warn!(
        target: "jtree.effect",
        timeout_ms,
        "fetch exceeded deadline"
    );
}

// ---------------------------------------------------------------------------
// Deadline enforcement
// ---------------------------------------------------------------------------

/// Run `f` with an upper bound on how long the caller waits.
///
/// With `timeout == None` the call runs inline with `cancel`. Otherwise it
/// runs on a helper thread with a child of `cancel`; if it has not answered
/// in time that child is cancelled, the caller gets [`SourceError::Timeout`]
/// and the late answer is dropped.
pub fn call_with_timeout<T, F>(
    timeout: Option<Duration>,
    cancel: &CancellationToken,
    f: F,
) -> Result<T, SourceError>
where
    T: Send + 'static,
    F: FnOnce(&CancellationToken) -> Result<T, SourceError> + Send + 'static,
{
    let Some(timeout) = timeout else {
        return f(cancel);
    };
    let timeout_ms = timeout.as_millis() as u64;
    let call = cancel.child();
    let token = call.token();
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name("jtree-fetch".into())
        .spawn(move || {
            let _ = tx.send(f(&token));
        })
        .map_err(|err| SourceError::unavailable(format!("cannot start fetch thread: {err}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            call.cancel();
            warn_fetch_timeout(timeout_ms);
            Err(SourceError::Timeout { timeout_ms })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(SourceError::unavailable(
            "fetch thread ended without answering",
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================
