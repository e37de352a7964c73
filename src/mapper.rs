use crate::fingerprint::fingerprint;
use crate::map::{PropertyMap, ATTRIBUTES_PREFIX, DATA_PREFIX, EXCEPTION_DATA_PREFIX};
use crate::record::LogEvent;
use crate::value::{format_timestamp, format_value, Value};

/// Turns a [`LogEvent`] into the flat map an encoder serializes.
///
/// Standard fields are written first, then attributes declared on the
/// mapper, then the event's properties (`data_` on collision), then the
/// exception's annotations (`ex_` on collision).
#[derive(Debug, Clone, Default)]
pub struct EventMapper {
    attributes: Vec<(String, Value)>,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Static attribute added to every event, e.g. the application name.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn build(&self, event: &LogEvent) -> PropertyMap {
        let mut map = PropertyMap::new();

        map.insert(
            "TimeStamp",
            format_timestamp(&event.timestamp.fixed_offset()),
            ATTRIBUTES_PREFIX,
        );
        map.insert("Level", event.level.as_str(), ATTRIBUTES_PREFIX);
        map.insert("LoggerName", event.logger_name.as_str(), ATTRIBUTES_PREFIX);

        if event.has_template_substitution() {
            map.insert("Message", event.formatted_message.as_str(), ATTRIBUTES_PREFIX);
            map.insert("MessageTemplate", event.message.as_str(), ATTRIBUTES_PREFIX);
        } else {
            map.insert("Message", event.message.as_str(), ATTRIBUTES_PREFIX);
        }

        if let Some(exception) = event.exception.as_deref() {
            map.insert("Exception", exception.to_string(), ATTRIBUTES_PREFIX);
            map.insert("ExceptionType", exception.short_type_name(), ATTRIBUTES_PREFIX);
            map.insert("ExceptionMessage", exception.message(), ATTRIBUTES_PREFIX);
            if let Some(trace) = exception.stack_trace().filter(|t| !t.is_empty()) {
                map.insert("ExceptionStackTrace", trace.to_string(), ATTRIBUTES_PREFIX);
            }
            map.insert(
                "ExceptionFingerprint",
                fingerprint(Some(exception)),
                ATTRIBUTES_PREFIX,
            );
        }

        if !event.has_template_substitution() && !event.parameters.is_empty() {
            let rendered: Vec<String> = event.parameters.iter().map(format_value).collect();
            map.insert("Parameters", rendered.join(","), ATTRIBUTES_PREFIX);
        }

        if let Some(call_site) = event.call_site.as_deref() {
            map.insert("CallSite", call_site, ATTRIBUTES_PREFIX);
        }

        for (key, value) in &self.attributes {
            map.insert(key, value.clone(), ATTRIBUTES_PREFIX);
        }

        map.extend_from(&event.properties, DATA_PREFIX);

        if let Some(exception) = event.exception.as_deref() {
            for (key, value) in exception.data() {
                map.insert(key, value.clone(), EXCEPTION_DATA_PREFIX);
            }
        }

        map
    }
}

/// Build the flat map for `event` with a default [`EventMapper`].
pub fn build_event_map(event: &LogEvent) -> PropertyMap {
    EventMapper::default().build(event)
}
