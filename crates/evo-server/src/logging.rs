//! Log bridge: mirrors engine tracing events onto the event bus.
//!
//! A [`tracing_subscriber::Layer`] converts matching log events into
//! [`EvolutionEvent::Log`] records. Run attribution comes from a
//! `run_id` field recorded on an enclosing span, so attribution begins
//! and ends exactly with the span scope on every exit path.

use std::fmt::Write as _;

use tokio::sync::broadcast;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use evo_core::EvolutionEvent;

/// `run_id` captured from a span's fields, stored in span extensions.
struct RunIdTag(String);

/// Tracing layer that republishes engine logs to WebSocket clients.
///
/// Publishing is non-blocking; a bus with no receivers silently drops
/// the record, so logging never fails the host. Only events whose
/// target starts with one of the configured prefixes are mirrored,
/// which keeps the server's own logging (including the dispatcher's)
/// out of the bus.
pub struct WsLogLayer {
    bus: broadcast::Sender<EvolutionEvent>,
    target_prefixes: Vec<String>,
    min_level: Level,
}

impl WsLogLayer {
    /// Mirror events from `evo_engine` at `INFO` and above.
    pub fn new(bus: broadcast::Sender<EvolutionEvent>) -> Self {
        Self::with_filter(bus, vec!["evo_engine".to_owned()], Level::INFO)
    }

    /// Mirror events from the given target prefixes at `min_level`+.
    pub fn with_filter(
        bus: broadcast::Sender<EvolutionEvent>,
        target_prefixes: Vec<String>,
        min_level: Level,
    ) -> Self {
        Self {
            bus,
            target_prefixes,
            min_level,
        }
    }

    fn matches(&self, event: &Event<'_>) -> bool {
        if *event.metadata().level() > self.min_level {
            return false;
        }
        let target = event.metadata().target();
        self.target_prefixes.iter().any(|p| target.starts_with(p))
    }
}

impl<S> Layer<S> for WsLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: Context<'_, S>,
    ) {
        let mut visitor = RunIdVisitor(None);
        attrs.record(&mut visitor);
        if let Some(run_id) = visitor.0 {
            if let Some(span) = ctx.span(id) {
                span.extensions_mut().insert(RunIdTag(run_id));
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if !self.matches(event) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let run_id = ctx.event_scope(event).and_then(|scope| {
            scope
                .from_root()
                .filter_map(|span| span.extensions().get::<RunIdTag>().map(|t| t.0.clone()))
                .last()
        });

        let now = chrono::Utc::now();
        let timestamp = now.timestamp_millis() as f64 / 1000.0;

        let _ = self.bus.send(EvolutionEvent::Log {
            level: event.metadata().level().to_string().to_lowercase(),
            message: visitor.message,
            source: event.metadata().target().to_owned(),
            timestamp,
            run_id,
        });
    }
}

/// Extracts a `run_id` field value.
struct RunIdVisitor(Option<String>);

impl Visit for RunIdVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "run_id" {
            self.0 = Some(value.to_owned());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "run_id" && self.0.is_none() {
            self.0 = Some(format!("{value:?}").trim_matches('"').to_owned());
        }
    }
}

/// Renders the event's `message` field, appending the remaining fields
/// as `key=value` pairs the way the fmt layer does.
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            let _ = write!(self.message, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.message, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, info_span};
    use tracing_subscriber::layer::SubscriberExt;

    fn capture() -> (
        impl Subscriber + Send + Sync,
        broadcast::Receiver<EvolutionEvent>,
    ) {
        let (bus, rx) = broadcast::channel(64);
        let layer = WsLogLayer::with_filter(bus, vec!["evo_server".to_owned()], Level::INFO);
        (tracing_subscriber::registry().with(layer), rx)
    }

    #[tokio::test]
    async fn event_inside_run_span_is_attributed() {
        let (subscriber, mut rx) = capture();
        tracing::subscriber::with_default(subscriber, || {
            let span = info_span!("run_task", run_id = "r42");
            let _guard = span.enter();
            info!("iteration done");
        });

        let EvolutionEvent::Log { run_id, message, level, .. } = rx.try_recv().unwrap() else {
            panic!("expected log event");
        };
        assert_eq!(run_id.as_deref(), Some("r42"));
        assert_eq!(level, "info");
        assert!(message.contains("iteration done"));
    }

    #[tokio::test]
    async fn event_outside_span_is_unbound() {
        let (subscriber, mut rx) = capture();
        tracing::subscriber::with_default(subscriber, || {
            info!("server-level message");
        });

        let EvolutionEvent::Log { run_id, .. } = rx.try_recv().unwrap() else {
            panic!("expected log event");
        };
        assert!(run_id.is_none());
    }

    #[tokio::test]
    async fn attribution_ends_with_span_scope() {
        let (subscriber, mut rx) = capture();
        tracing::subscriber::with_default(subscriber, || {
            {
                let span = info_span!("run_task", run_id = "r1");
                let _guard = span.enter();
                info!("inside");
            }
            info!("outside");
        });

        let EvolutionEvent::Log { run_id, .. } = rx.try_recv().unwrap() else {
            panic!("expected log event");
        };
        assert_eq!(run_id.as_deref(), Some("r1"));

        let EvolutionEvent::Log { run_id, .. } = rx.try_recv().unwrap() else {
            panic!("expected log event");
        };
        assert!(run_id.is_none());
    }

    #[tokio::test]
    async fn below_min_level_is_not_mirrored() {
        let (subscriber, mut rx) = capture();
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("too quiet");
        });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn foreign_target_is_not_mirrored() {
        let (bus, mut rx) = broadcast::channel(64);
        let layer = WsLogLayer::with_filter(bus, vec!["evo_engine".to_owned()], Level::INFO);
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            info!("this test's target is evo_server, not evo_engine");
        });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn no_receivers_is_silent() {
        let (bus, rx) = broadcast::channel(64);
        drop(rx);
        let layer = WsLogLayer::with_filter(bus, vec!["evo_server".to_owned()], Level::INFO);
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            info!("nobody listening");
        });
    }
}
