#![forbid(unsafe_code)]

//! Cooperative cancellation for in-flight jurisdiction fetches.
//!
//! Every child fetch is handed a [`CancellationToken`]. When the node being
//! fetched is force-collapsed, the runtime calls
//! [`CancellationSource::cancel`]; a source that honours the token can stop
//! early and report [`SourceError::Cancelled`], and the late completion is
//! discarded by the [`ExpansionController`](crate::ExpansionController)
//! either way.
//!
//! # Example
//!
//! ```
//! use jtree_core::cancellation::CancellationSource;
//! use std::time::Duration;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//!
//! let worker = std::thread::spawn(move || {
//!     // Simulated network latency that stops as soon as we are cancelled.
//!     token.wait_timeout(Duration::from_secs(30))
//! });
//!
//! source.cancel();
//! assert!(worker.join().unwrap());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use web_time::Duration;

use crate::source::SourceError;

/// A thread-safe, cloneable view of a fetch's cancellation state.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationInner>,
}

/// The control side that cancels a fetch.
///
/// Dropping the source does **not** cancel its tokens.
pub struct CancellationSource {
    inner: Arc<CancellationInner>,
}

struct CancellationInner {
    cancelled: AtomicBool,
    notify: (Mutex<()>, Condvar),
    children: Mutex<Vec<Weak<CancellationInner>>>,
}

impl CancellationInner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            notify: (Mutex::new(()), Condvar::new()),
            children: Mutex::new(Vec::new()),
        })
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        {
            let (lock, cvar) = &self.notify;
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            cvar.notify_all();
        }
        let children = {
            let mut guard = self.children.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

impl CancellationSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: CancellationInner::new(),
        }
    }

    /// A token observing this source.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Cancel. Idempotent; wakes every pending [`CancellationToken::wait_timeout`].
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    /// A token nobody can cancel, for one-shot calls outside the runtime.
    #[must_use]
    pub fn never() -> Self {
        Self {
            inner: CancellationInner::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// A new source that is cancelled together with this token, and can
    /// also be cancelled on its own without affecting this token.
    #[must_use]
    pub fn child(&self) -> CancellationSource {
        let child = CancellationSource::new();
        {
            let mut children = self
                .inner
                .children
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }
        if self.is_cancelled() {
            child.cancel();
        }
        child
    }

    /// `Err(SourceError::Cancelled)` once cancelled, for use with `?` inside
    /// data source implementations.
    pub fn ensure_active(&self) -> Result<(), SourceError> {
        if self.is_cancelled() {
            Err(SourceError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Block until cancelled or `duration` elapses.
    ///
    /// Returns `true` if cancelled, `false` on timeout.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let (lock, cvar) = &self.inner.notify;
        let mut guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let start = web_time::Instant::now();
        let mut remaining = duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let (next, result) = cvar
                .wait_timeout(guard, remaining)
                .unwrap_or_else(|e| e.into_inner());
            guard = next;
            if self.is_cancelled() {
                return true;
            }
            let elapsed = start.elapsed();
            if result.timed_out() || elapsed >= duration {
                return false;
            }
            remaining = duration - elapsed;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
