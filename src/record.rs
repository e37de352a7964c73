use std::panic::Location;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::exception::Exception;
use crate::level::Level;
use crate::map::PropertyMap;
use crate::template::format_template;
use crate::value::Value;

/// A single logging call, as handed to a [`HostLogger`](crate::host::HostLogger).
///
/// Built fresh per call and never mutated after being logged.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger_name: String,
    /// Raw message template.
    pub message: String,
    /// Message with parameters substituted; equals `message` when the
    /// template has no holes.
    pub formatted_message: String,
    pub call_site: Option<String>,
    pub parameters: Vec<Value>,
    /// The single exception this event reports.
    pub exception: Option<Arc<Exception>>,
    pub properties: PropertyMap,
}

impl LogEvent {
    pub fn new(level: Level, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            timestamp: Utc::now(),
            level,
            logger_name: logger_name.into(),
            formatted_message: message.clone(),
            message,
            call_site: None,
            parameters: Vec::new(),
            exception: None,
            properties: PropertyMap::new(),
        }
    }

    /// Set positional parameters and re-render the formatted message.
    pub fn with_parameters<I, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self.formatted_message = format_template(&self.message, &self.parameters);
        self
    }

    pub fn with_exception(mut self, exception: Arc<Exception>) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_call_site(mut self, call_site: impl Into<String>) -> Self {
        self.call_site = Some(call_site.into());
        self
    }

    /// Record `file:line` of the caller as the call site.
    #[track_caller]
    pub fn with_caller_location(self) -> Self {
        let location = Location::caller();
        self.with_call_site(format!("{}:{}", location.file(), location.line()))
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Add a property; collisions are aliased with the `data_` prefix.
    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key, value, crate::map::DATA_PREFIX);
        self
    }

    /// Whether substitution changed the message.
    pub fn has_template_substitution(&self) -> bool {
        self.formatted_message != self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_message_tracks_parameters() {
        let plain = LogEvent::new(Level::Info, "app", "hello");
        assert!(!plain.has_template_substitution());

        let templated = LogEvent::new(Level::Info, "app", "hello {0}").with_parameters(["world"]);
        assert_eq!(templated.formatted_message, "hello world");
        assert!(templated.has_template_substitution());
    }

    #[test]
    fn caller_location_points_here() {
        let event = LogEvent::new(Level::Info, "app", "x").with_caller_location();
        let call_site = event.call_site.unwrap();
        assert!(call_site.starts_with(file!()), "{call_site}");
    }
}
