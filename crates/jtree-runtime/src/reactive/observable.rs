#![forbid(unsafe_code)]

//! Shared value with change notification and version tracking.
//!
//! [`Observable<T>`] keeps a value in `Rc<RefCell<..>>` storage. Setting a
//! value that differs (by `PartialEq`) bumps the version and calls every live
//! subscriber in registration order. The selector publishes its
//! [`SelectorSnapshot`](crate::selector::SelectorSnapshot)s through one of
//! these so presentation code can re-render on change.
//!
//! # Failure Modes
//!
//! - **Re-entrant set**: a subscriber may call `set()`; the nested change is
//!   delivered immediately, before the outer round of callbacks finishes.
//! - **Leaked guards**: subscriptions live as long as their [`Subscription`]
//!   guard. Dead entries are pruned on the next notification.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::debug_span;
use web_time::Instant;

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct ObservableInner<T> {
    value: T,
    version: u64,
    subscribers: Vec<CallbackWeak<T>>,
}

/// A shared, version-tracked value.
///
/// Cloning an `Observable` yields another handle to the same value and
/// subscriber list.
///
/// # Invariants
///
/// 1. `version` grows by exactly 1 per value-changing mutation.
/// 2. Setting an equal value changes nothing and notifies nobody.
/// 3. Subscribers run in registration order.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Replace the value, notifying subscribers if it changed.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    /// Register `callback`; it runs on every change until the returned
    /// guard is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Registered subscribers, including dropped ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    fn notify(&self) {
        let (callbacks, value, version) = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let callbacks: Vec<CallbackRc<T>> =
                inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            (callbacks, inner.value.clone(), inner.version)
        };
        if callbacks.is_empty() {
            return;
        }

        let start = Instant::now();
        let span = debug_span!(
            "observable.notify",
            version,
            subscribers = callbacks.len() as u64,
            duration_us = tracing::field::Empty
        );
        let _guard = span.enter();
        for cb in &callbacks {
            cb(&value);
        }
        span.record("duration_us", start.elapsed().as_micros() as u64);
    }
}

/// Keeps a subscriber callback alive. Drop to unsubscribe.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn set_bumps_version_only_on_change() {
        let obs = Observable::new(42);
        obs.set(42);
        assert_eq!(obs.version(), 0);
        obs.set(7);
        assert_eq!(obs.get(), 7);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn subscribers_run_in_order_until_dropped() {
        let obs = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = {
            let log = Rc::clone(&log);
            obs.subscribe(move |v| log.borrow_mut().push(("first", *v)))
        };
        let _second = {
            let log = Rc::clone(&log);
            obs.subscribe(move |v| log.borrow_mut().push(("second", *v)))
        };
        obs.set(1);
        drop(first);
        obs.set(2);
        assert_eq!(
            *log.borrow(),
            vec![("first", 1), ("second", 1), ("second", 2)]
        );
        assert_eq!(obs.subscriber_count(), 1);
    }

    #[test]
    fn clones_share_state() {
        let obs = Observable::new(String::from("a"));
        let other = obs.clone();
        let hits = Rc::new(Cell::new(0));
        let _sub = {
            let hits = Rc::clone(&hits);
            other.subscribe(move |_| hits.set(hits.get() + 1))
        };
        obs.set("b".into());
        assert_eq!(other.with(|s| s.clone()), "b");
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn reentrant_set_is_delivered() {
        let obs = Observable::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _sub = {
            let obs2 = obs.clone();
            let seen = Rc::clone(&seen);
            obs.subscribe(move |v| {
                seen.borrow_mut().push(*v);
                if *v == 1 {
                    obs2.set(2);
                }
            })
        };
        obs.set(1);
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(obs.version(), 2);
    }
}
