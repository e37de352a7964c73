use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::context;
use crate::host::{HostLogger, TRACING_TARGET};
use crate::level::Level;
use crate::map::{PropertyMap, DATA_PREFIX, NESTED_PREFIX};
use crate::record::LogEvent;
use crate::value::Value;

/// `tracing_subscriber` layer that turns `tracing` events into
/// [`LogEvent`]s for a [`HostLogger`], so that plain `tracing::info!` calls
/// get the same flat, collision-safe maps as calls through
/// [`StructuredLogger`](crate::logger::StructuredLogger).
///
/// The event target becomes the logger name and the `message` field the
/// message; every other field becomes a property. Events emitted by this
/// crate itself are ignored.
pub struct EventMapLayer {
    host: Arc<dyn HostLogger>,
}

impl EventMapLayer {
    pub fn new(host: Arc<dyn HostLogger>) -> Self {
        Self { host }
    }
}

impl<S> Layer<S> for EventMapLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target() == TRACING_TARGET || meta.target().starts_with("tracing_log_extended") {
            return;
        }

        let level = from_tracing(*meta.level());
        if !self.host.is_enabled(level) {
            return;
        }

        let mut properties = PropertyMap::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            properties: &mut properties,
            message: &mut message,
        };
        event.record(&mut visitor);

        let mut record = LogEvent::new(level, meta.target(), message.unwrap_or_default());
        if let (Some(module), Some(line)) = (meta.module_path(), meta.line()) {
            record = record.with_call_site(format!("{module}:{line}"));
        }
        record.properties = properties;
        if let Some(scope) = context::current() {
            record
                .properties
                .extend_from(&scope.context_properties(), NESTED_PREFIX);
        }

        self.host.log(record);
    }
}

fn from_tracing(level: tracing::Level) -> Level {
    match level {
        tracing::Level::TRACE => Level::Trace,
        tracing::Level::DEBUG => Level::Debug,
        tracing::Level::INFO => Level::Info,
        tracing::Level::WARN => Level::Warn,
        _ => Level::Error,
    }
}

struct FieldVisitor<'a> {
    properties: &'a mut PropertyMap,
    message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn record(&mut self, field: &Field, value: Value) {
        self.properties.insert(field.name(), value, DATA_PREFIX);
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.record(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{value:?}"));
        } else {
            self.record(field, Value::Str(format!("{value:?}")));
        }
    }
}
