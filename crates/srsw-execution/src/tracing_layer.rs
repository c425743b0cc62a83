//! Tracing layer that streams specialist loop events to a UI.
//!
//! Events whose target starts with `srsw_execution` are copied into a
//! [`SpecialistEvent`] and sent over an unbounded channel. Everything else is
//! ignored, so the layer can sit next to the regular fmt layer.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const DEFAULT_TARGET_PREFIX: &str = "srsw_execution";

/// Event data sent to the frontend
#[derive(Debug, Clone, serde::Serialize)]
pub struct SpecialistEvent {
    /// Event target (e.g., "srsw_execution::specialist_loop")
    pub target: String,
    /// Log level (INFO, DEBUG, WARN, ERROR)
    pub level: String,
    pub message: String,
    /// Structured fields such as `specialist_id` or `iteration`
    pub fields: HashMap<String, Value>,
    pub timestamp: String,
}

/// Forwards matching events to a channel.
pub struct SpecialistEventLayer {
    sender: mpsc::UnboundedSender<SpecialistEvent>,
    target_prefix: String,
}

impl SpecialistEventLayer {
    pub fn new(sender: mpsc::UnboundedSender<SpecialistEvent>) -> Self {
        Self {
            sender,
            target_prefix: DEFAULT_TARGET_PREFIX.to_string(),
        }
    }

    /// Creates the layer together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SpecialistEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    pub fn with_target_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.target_prefix = prefix.into();
        self
    }
}

impl<S> Layer<S> for SpecialistEventLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if !target.starts_with(&self.target_prefix) {
            return;
        }

        let mut fields = HashMap::new();
        event.record(&mut EventFields {
            values: &mut fields,
        });
        let message = fields
            .remove("message")
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();

        let specialist_event = SpecialistEvent {
            target: target.to_string(),
            level: event.metadata().level().to_string(),
            message,
            fields,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        // A dropped receiver only means nobody is listening anymore
        let _ = self.sender.send(specialist_event);
    }
}

/// Collects an event's fields as JSON values, keeping numbers and booleans typed.
struct EventFields<'a> {
    values: &'a mut HashMap<String, Value>,
}

impl EventFields<'_> {
    fn put(&mut self, field: &Field, value: Value) {
        self.values.insert(field.name().to_string(), value);
    }
}

impl Visit for EventFields<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{:?}", value)));
    }
}
