#![forbid(unsafe_code)]

//! In-memory `tracing` capture for assertions on spans and events.
//!
//! ```
//! use jtree_harness::TraceCapture;
//!
//! let capture = TraceCapture::new();
//! capture.run(|| tracing::info!(target: "jtree.demo", answer = 42, "hello"));
//! let events = capture.events_with_target("jtree.demo");
//! assert_eq!(events[0].message, "hello");
//! assert_eq!(events[0].fields["answer"], "42");
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

/// A span as first created, with later `record` calls merged in.
#[derive(Debug, Clone)]
pub struct CapturedSpan {
    pub name: String,
    pub target: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Captured {
    spans: Vec<CapturedSpan>,
    span_index: HashMap<u64, usize>,
    events: Vec<CapturedEvent>,
}

/// A `tracing-subscriber` layer that records everything it sees.
///
/// Clones share the same storage, so keep one handle for assertions and
/// hand another to the subscriber.
#[derive(Debug, Clone, Default)]
pub struct TraceCapture {
    inner: Arc<Mutex<Captured>>,
}

struct FieldVisitor(Vec<(String, String)>);

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl TraceCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with this capture as the thread's default subscriber.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::with_default(subscriber, f)
    }

    /// Install as the thread's default subscriber until the guard drops.
    #[must_use]
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    pub fn spans(&self) -> Vec<CapturedSpan> {
        self.lock().spans.clone()
    }

    pub fn spans_named(&self, name: &str) -> Vec<CapturedSpan> {
        self.lock()
            .spans
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.lock().events.clone()
    }

    pub fn events_with_target(&self, target: &str) -> Vec<CapturedEvent> {
        self.lock()
            .events
            .iter()
            .filter(|e| e.target == target)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        let mut captured = self.lock();
        captured.spans.clear();
        captured.span_index.clear();
        captured.events.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Captured> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<S> Layer<S> for TraceCapture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        let mut captured = self.lock();
        let index = captured.spans.len();
        captured.span_index.insert(id.into_u64(), index);
        captured.spans.push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            target: attrs.metadata().target().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        values.record(&mut visitor);
        let mut captured = self.lock();
        if let Some(index) = captured.span_index.get(&id.into_u64()).copied() {
            captured.spans[index].fields.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let mut fields: HashMap<String, String> = visitor.0.into_iter().collect();
        let message = fields.remove("message").unwrap_or_default();
        self.lock().events.push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message,
            fields,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_span_fields_set_later() {
        let capture = TraceCapture::new();
        capture.run(|| {
            let span = tracing::info_span!("work", result = tracing::field::Empty);
            span.record("result", "ok");
        });
        let spans = capture.spans_named("work");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].fields["result"], "ok");
    }

    #[test]
    fn clear_forgets_everything() {
        let capture = TraceCapture::new();
        capture.run(|| tracing::warn!("x"));
        assert_eq!(capture.events().len(), 1);
        assert_eq!(capture.events()[0].level, Level::WARN);
        capture.clear();
        assert!(capture.events().is_empty());
    }
}
