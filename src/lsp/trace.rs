//! Bridge from the process-wide logging facility to `$/logTrace`.
//!
//! A [`TraceMirrorLayer`] is installed into the subscriber stack at startup;
//! the server context registers a sink while it is alive. Events produced
//! while a sink itself is sending are dropped, since the sink writes under
//! the transport output mutex and that mutex is not re-entrant.

use std::cell::Cell;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context as LayerContext, Layer};

/// Receives rendered log events: `(severity, message)`.
pub type TraceSink = Arc<dyn Fn(Level, &str) + Send + Sync>;

static SINK: OnceLock<Mutex<Option<TraceSink>>> = OnceLock::new();

thread_local! {
    static FORWARDING: Cell<bool> = const { Cell::new(false) };
}

fn sink_slot() -> &'static Mutex<Option<TraceSink>> {
    SINK.get_or_init(|| Mutex::new(None))
}

/// The sink slot is process-global; tests that install or clear it take
/// this lock so they cannot observe each other's sinks.
#[cfg(test)]
pub(crate) static SINK_TEST_LOCK: Mutex<()> = Mutex::new(());

pub fn set_trace_sink(sink: TraceSink) {
    *sink_slot().lock().unwrap() = Some(sink);
}

pub fn clear_trace_sink() {
    *sink_slot().lock().unwrap() = None;
}

/// Collects an event's `message` field plus any extra fields into one line.
#[derive(Default)]
struct LineVisitor {
    message: String,
    extras: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            if !self.extras.is_empty() {
                self.extras.push(' ');
            }
            self.extras.push_str(&format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            if !self.extras.is_empty() {
                self.extras.push(' ');
            }
            self.extras.push_str(&format!("{}={value}", field.name()));
        }
    }
}

/// A subscriber layer that mirrors every event to the registered sink.
pub struct TraceMirrorLayer;

impl TraceMirrorLayer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TraceMirrorLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Subscriber> Layer<S> for TraceMirrorLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        if FORWARDING.with(Cell::get) {
            return;
        }

        let Some(sink) = sink_slot().lock().unwrap().clone() else {
            return;
        };

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let mut line = format!("{} {}: {}", metadata.level(), metadata.target(), visitor.message);
        if !visitor.extras.is_empty() {
            line.push(' ');
            line.push_str(&visitor.extras);
        }

        FORWARDING.with(|flag| flag.set(true));
        sink(*metadata.level(), &line);
        FORWARDING.with(|flag| flag.set(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_layer_forwards_to_sink_and_guards_reentry() {
        let _guard = SINK_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let seen = Arc::new(Mutex::new(Vec::<(Level, String)>::new()));
        let reentries = Arc::new(AtomicUsize::new(0));

        {
            let seen = seen.clone();
            let reentries = reentries.clone();
            set_trace_sink(Arc::new(move |level, line| {
                // A log emitted while forwarding must not recurse.
                tracing::info!("from inside the sink");
                reentries.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().push((level, line.to_string()));
            }));
        }

        let subscriber = tracing_subscriber::registry().with(TraceMirrorLayer::new());
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("something happened");
        });

        clear_trace_sink();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, Level::WARN);
        assert!(seen[0].1.contains("something happened"));
        assert_eq!(reentries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_sink_is_a_noop() {
        let _guard = SINK_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_trace_sink();
        let subscriber = tracing_subscriber::registry().with(TraceMirrorLayer::new());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("nobody listening");
        });
    }
}
