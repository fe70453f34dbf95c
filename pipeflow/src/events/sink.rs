//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn, Level};

/// Receives pipeline lifecycle events.
///
/// `data` is a JSON object; most events carry `run_id` and `stage`.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Emits an event from synchronous code. Must not panic.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event. The engine's default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Writes events to `tracing`.
///
/// Routine events are logged at the configured level. Events that report a
/// failed, contained or aborted outcome are always logged at `WARN`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging routine events at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a sink that logs routine events at `DEBUG`.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event_type: &str, data: Option<&Value>) {
        let stage = data
            .and_then(|d| d.get("stage"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        if is_adverse(event_type) {
            warn!(event_type = %event_type, stage = %stage, event_data = ?data, "Event: {}", event_type);
        } else if self.level == Level::DEBUG {
            debug!(event_type = %event_type, stage = %stage, event_data = ?data, "Event: {}", event_type);
        } else {
            info!(event_type = %event_type, stage = %stage, event_data = ?data, "Event: {}", event_type);
        }
    }
}

fn is_adverse(event_type: &str) -> bool {
    [".failed", ".contained", ".aborted"]
        .iter()
        .any(|suffix| event_type.ends_with(suffix))
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// Records every event in arrival order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<(String, Option<Value>)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.lock().clone()
    }

    /// Returns the recorded event names in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Returns events whose name starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<Value>)> {
        self.events
            .lock()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Returns the names of events that concern `stage`, in order.
    #[must_use]
    pub fn stage_event_types(&self, stage: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(_, data)| {
                data.as_ref()
                    .and_then(|d| d.get("stage"))
                    .and_then(Value::as_str)
                    == Some(stage)
            })
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Forgets every recorded event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.events.lock().push((event_type.to_string(), data));
    }
}
