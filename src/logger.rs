use std::panic::Location;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::context;
use crate::error::ScopeError;
use crate::exception::{flatten_exceptions, Exception};
use crate::flatten::{flatten, FlatProperties};
use crate::level::Level;
use crate::map::{PropertyMap, DATA_PREFIX, NESTED_PREFIX};
use crate::record::LogEvent;
use crate::scope::{Scope, ScopeConfiguration};
use crate::host::HostLogger;
use crate::value::Value;

/// Named logger that builds structured events and hands them to a
/// [`HostLogger`].
///
/// Cheap to clone; clones share the host.
#[derive(Clone)]
pub struct StructuredLogger {
    name: Arc<str>,
    host: Arc<dyn HostLogger>,
}

impl StructuredLogger {
    pub fn new(name: impl Into<String>, host: Arc<dyn HostLogger>) -> Self {
        Self {
            name: Arc::from(name.into()),
            host,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        self.host.is_enabled(level)
    }

    /// Log `message` with flattened `properties` and an optional exception.
    ///
    /// An exception with nested causes is logged as one event per exception
    /// in the flattened graph, each tagged with `ExceptionIndex` (1-based),
    /// `ExceptionCount` and a shared `ExceptionTag`. A lone exception gets
    /// index and count 1 and no tag. Every event carries the same
    /// properties.
    #[track_caller]
    pub fn log_extended<T>(
        &self,
        level: Level,
        message: &str,
        properties: Option<&T>,
        exception: Option<Arc<Exception>>,
    ) where
        T: Serialize + ?Sized + 'static,
    {
        let mut event = LogEvent::new(level, self.name(), message);
        event.exception = exception;
        self.log_event(event, properties);
    }

    /// Log a pre-built event (e.g. one with message parameters) with
    /// flattened `properties`. The event's exception is fanned out as in
    /// [`StructuredLogger::log_extended`].
    #[track_caller]
    pub fn log_event<T>(&self, mut event: LogEvent, properties: Option<&T>)
    where
        T: Serialize + ?Sized + 'static,
    {
        if !self.is_enabled(event.level) {
            return;
        }
        if event.call_site.is_none() {
            let location = Location::caller();
            event.call_site = Some(format!("{}:{}", location.file(), location.line()));
        }

        let extra = flatten(properties);
        let scope = context::current();
        let scope_properties = scope.as_deref().map(|s| s.context_properties());

        // Exception tags claim their keys before the event's own properties.
        let prepare = |mut event: LogEvent, tags: &[(&str, Value)]| {
            let mut properties = PropertyMap::new();
            for (key, value) in tags {
                properties.insert(key, value.clone(), DATA_PREFIX);
            }
            properties.extend_from(&event.properties, DATA_PREFIX);
            event.properties = properties;
            harvest(&mut event, &extra);
            if let Some(scope_properties) = &scope_properties {
                event.properties.extend_from(scope_properties, NESTED_PREFIX);
            }
            event
        };

        let Some(exception) = event.exception.take() else {
            self.dispatch(prepare(event, &[]));
            return;
        };

        let nodes = flatten_exceptions(Some(&exception));
        let count = nodes.len();
        let tag = (count > 1).then(Uuid::new_v4);

        for (position, node) in nodes.into_iter().enumerate() {
            let mut tags: Vec<(&str, Value)> = vec![
                ("ExceptionIndex", (position + 1).into()),
                ("ExceptionCount", count.into()),
            ];
            if let Some(tag) = tag {
                tags.push(("ExceptionTag", tag.into()));
            }
            let sibling = event.clone().with_exception(node);
            self.dispatch(prepare(sibling, &tags));
        }
    }

    /// Enter a scope under the scope active on this logical call chain.
    ///
    /// Fails only when `name` is empty or whitespace.
    #[track_caller]
    pub fn begin_scope<T>(
        &self,
        name: &str,
        properties: Option<&T>,
        configuration: Option<ScopeConfiguration>,
    ) -> Result<Scope, ScopeError>
    where
        T: Serialize + ?Sized + 'static,
    {
        let location = Location::caller();
        Scope::enter(
            self,
            name,
            flatten(properties),
            configuration,
            context::current(),
            format!("{}:{}", location.file(), location.line()),
        )
    }

    /// Enter a scope under an explicitly given parent, regardless of the
    /// ambient context. A disposed parent yields a root scope.
    #[track_caller]
    pub fn begin_child_scope<T>(
        &self,
        parent: &Scope,
        name: &str,
        properties: Option<&T>,
        configuration: Option<ScopeConfiguration>,
    ) -> Result<Scope, ScopeError>
    where
        T: Serialize + ?Sized + 'static,
    {
        let location = Location::caller();
        Scope::enter(
            self,
            name,
            flatten(properties),
            configuration,
            parent.frame().cloned(),
            format!("{}:{}", location.file(), location.line()),
        )
    }

    #[track_caller]
    pub fn trace(&self, message: &str) {
        self.log_extended::<()>(Level::Trace, message, None, None);
    }

    #[track_caller]
    pub fn debug(&self, message: &str) {
        self.log_extended::<()>(Level::Debug, message, None, None);
    }

    #[track_caller]
    pub fn info(&self, message: &str) {
        self.log_extended::<()>(Level::Info, message, None, None);
    }

    #[track_caller]
    pub fn warn(&self, message: &str) {
        self.log_extended::<()>(Level::Warn, message, None, None);
    }

    #[track_caller]
    pub fn error(&self, message: &str, exception: Option<Arc<Exception>>) {
        self.log_extended::<()>(Level::Error, message, None, exception);
    }

    #[track_caller]
    pub fn fatal(&self, message: &str, exception: Option<Arc<Exception>>) {
        self.log_extended::<()>(Level::Fatal, message, None, exception);
    }

    pub(crate) fn dispatch(&self, event: LogEvent) {
        self.host.log(event);
    }
}

impl std::fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn harvest(event: &mut LogEvent, extra: &FlatProperties) {
    for (key, value) in extra {
        event.properties.insert(key, value.clone(), DATA_PREFIX);
    }
}

/// Free-function form of [`StructuredLogger::log_extended`].
#[track_caller]
pub fn log_extended<T>(
    logger: &StructuredLogger,
    level: Level,
    message: &str,
    properties: Option<&T>,
    exception: Option<Arc<Exception>>,
) where
    T: Serialize + ?Sized + 'static,
{
    logger.log_extended(level, message, properties, exception);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    #[derive(Serialize)]
    struct Extra {
        order_id: u32,
    }

    fn logger() -> (StructuredLogger, Arc<MemoryHost>) {
        let host = Arc::new(MemoryHost::new());
        (StructuredLogger::new("orders", host.clone()), host)
    }

    #[test]
    fn plain_message_is_one_event() {
        let (logger, host) = logger();
        logger.log_extended(Level::Info, "placed", Some(&Extra { order_id: 9 }), None);

        let events = host.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].get("order_id"), Some(&Value::Int(9)));
        assert!(!events[0].contains_key("ExceptionIndex"));
    }

    #[test]
    fn lone_exception_has_no_tag() {
        let (logger, host) = logger();
        logger.error("failed", Some(Arc::new(Exception::new("E", "boom"))));

        let events = host.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].get("ExceptionIndex"), Some(&Value::UInt(1)));
        assert_eq!(events[0].get("ExceptionCount"), Some(&Value::UInt(1)));
        assert!(!events[0].contains_key("ExceptionTag"));
    }

    #[test]
    fn call_site_is_the_caller() {
        let (logger, host) = logger();
        logger.info("here");
        match host.events()[0].get("CallSite") {
            Some(Value::Str(site)) => assert!(site.starts_with(file!()), "{site}"),
            other => panic!("unexpected call site {other:?}"),
        }
    }

    #[test]
    fn disabled_levels_emit_nothing() {
        let host = Arc::new(MemoryHost::with_min_level(Level::Warn));
        let logger = StructuredLogger::new("orders", host.clone());
        logger.info("skipped");
        logger.warn("kept");
        assert_eq!(host.events().len(), 1);
    }

    #[test]
    fn properties_colliding_with_exception_tags_are_aliased() {
        let mut extra = std::collections::BTreeMap::new();
        extra.insert("ExceptionIndex", "mine");
        let (logger, host) = logger();
        logger.log_extended(
            Level::Error,
            "failed",
            Some(&extra),
            Some(Arc::new(Exception::new("E", "boom"))),
        );
        let event = &host.events()[0];
        assert_eq!(event.get("ExceptionIndex"), Some(&Value::UInt(1)));
        assert_eq!(event.get("data_ExceptionIndex"), Some(&Value::from("mine")));
    }

    #[test]
    fn event_properties_yield_to_exception_tags() {
        let (logger, host) = logger();
        let event = LogEvent::new(Level::Error, "orders", "failed")
            .with_property("ExceptionIndex", "mine")
            .with_property("attempt", 3)
            .with_exception(Arc::new(Exception::new("E", "boom")));
        logger.log_event(event, None::<&()>);

        let event = &host.events()[0];
        assert_eq!(event.get("ExceptionIndex"), Some(&Value::UInt(1)));
        assert_eq!(event.get("data_ExceptionIndex"), Some(&Value::from("mine")));
        assert_eq!(event.get("attempt"), Some(&Value::Int(3)));
    }
}
