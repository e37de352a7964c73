use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::context;
use crate::env::{
    global_config_source, ConfigSource, SCOPE_INCLUDE_ID_TRACE_ENV, SCOPE_INCLUDE_NAME_TRACE_ENV,
    SCOPE_INCLUDE_PROPERTIES_ENV, SCOPE_INHERIT_CONFIGURATION_ENV,
};
use crate::error::ScopeError;
use crate::flatten::FlatProperties;
use crate::level::Level;
use crate::logger::StructuredLogger;
use crate::map::{PropertyMap, DATA_PREFIX, NESTED_PREFIX};
use crate::record::LogEvent;

/// Message of the event emitted when a scope is entered.
pub const START_SCOPE_MESSAGE: &str = "Start logical scope";
/// Message of the event emitted when a scope is left.
pub const FINISH_SCOPE_MESSAGE: &str = "Finish logical scope";

const TRACE_SEPARATOR: &str = " -> ";

/// What scope information is attached to events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeConfiguration {
    pub include_properties: bool,
    pub include_name_trace: bool,
    pub include_id_trace: bool,
    /// Copy the parent scope's configuration instead of using this one.
    pub inherit_configuration: bool,
}

impl Default for ScopeConfiguration {
    fn default() -> Self {
        Self {
            include_properties: false,
            include_name_trace: true,
            include_id_trace: true,
            inherit_configuration: false,
        }
    }
}

impl ScopeConfiguration {
    /// Defaults read from the global configuration source.
    pub fn defaults() -> Self {
        Self::from_source(global_config_source().as_ref())
    }

    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let fallback = Self::default();
        Self {
            include_properties: source
                .get_bool(SCOPE_INCLUDE_PROPERTIES_ENV, fallback.include_properties),
            include_name_trace: source
                .get_bool(SCOPE_INCLUDE_NAME_TRACE_ENV, fallback.include_name_trace),
            include_id_trace: source.get_bool(SCOPE_INCLUDE_ID_TRACE_ENV, fallback.include_id_trace),
            inherit_configuration: source
                .get_bool(SCOPE_INHERIT_CONFIGURATION_ENV, fallback.inherit_configuration),
        }
    }

    fn resolve(requested: Option<Self>, parent: Option<&ScopeFrame>) -> Self {
        let requested = requested.unwrap_or_else(Self::defaults);
        match parent {
            Some(parent) if requested.inherit_configuration => parent.configuration,
            _ => requested,
        }
    }
}

/// Immutable state of an entered scope, shared with the logical context
/// and with child scopes created under it.
#[derive(Debug)]
pub struct ScopeFrame {
    id: Uuid,
    name: String,
    properties: PropertyMap,
    id_trace: String,
    name_trace: String,
    configuration: ScopeConfiguration,
    parent: Option<Arc<ScopeFrame>>,
    disposed: AtomicBool,
}

impl ScopeFrame {
    fn new(
        name: &str,
        own: FlatProperties,
        configuration: Option<ScopeConfiguration>,
        parent: Option<Arc<ScopeFrame>>,
    ) -> Self {
        let id = Uuid::new_v4();

        let mut properties = PropertyMap::new();
        for (key, value) in own {
            properties.insert(&key, value, DATA_PREFIX);
        }
        if let Some(parent) = parent.as_deref() {
            properties.extend_from(&parent.properties, NESTED_PREFIX);
        }

        let (id_trace, name_trace) = match parent.as_deref() {
            Some(parent) => (
                format!("{}{TRACE_SEPARATOR}{id}", parent.id_trace),
                format!("{}{TRACE_SEPARATOR}{name}", parent.name_trace),
            ),
            None => (id.to_string(), name.to_string()),
        };

        Self {
            id,
            name: name.to_string(),
            properties,
            id_trace,
            name_trace,
            configuration: ScopeConfiguration::resolve(configuration, parent.as_deref()),
            parent,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Own properties merged with the inherited ones.
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Ids from the root scope down to this one, joined with ` -> `.
    pub fn id_trace(&self) -> &str {
        &self.id_trace
    }

    /// Names from the root scope down to this one, joined with ` -> `.
    pub fn name_trace(&self) -> &str {
        &self.name_trace
    }

    pub fn configuration(&self) -> ScopeConfiguration {
        self.configuration
    }

    pub fn parent(&self) -> Option<&Arc<ScopeFrame>> {
        self.parent.as_ref()
    }

    /// Whether the scope owning this frame has been left.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Scope fields attached to events logged inside this scope.
    pub fn context_properties(&self) -> PropertyMap {
        let mut map = PropertyMap::new();
        map.insert("Scope", self.name.as_str(), NESTED_PREFIX);
        map.insert("ScopeId", self.id, NESTED_PREFIX);
        if self.configuration.include_name_trace {
            map.insert("ScopeNameTrace", self.name_trace.as_str(), NESTED_PREFIX);
        }
        if self.configuration.include_id_trace {
            map.insert("ScopeIdTrace", self.id_trace.as_str(), NESTED_PREFIX);
        }
        if self.configuration.include_properties {
            map.extend_from(&self.properties, NESTED_PREFIX);
        }
        map
    }
}

/// A named logical scope. Entering pushes it onto the logical context and
/// logs a start event; dropping (or [`Scope::dispose`]) logs a finish event
/// and pops it again.
///
/// Hold it for the extent of the block it describes:
///
/// ```no_run
/// # use std::sync::Arc;
/// # use tracing_log_extended::{logger::StructuredLogger, host::MemoryHost};
/// let logger = StructuredLogger::new("orders", Arc::new(MemoryHost::new()));
/// {
///     let _scope = logger.begin_scope("checkout", None::<&()>, None)?;
///     logger.info("charging card");
/// }
/// # Ok::<(), tracing_log_extended::error::ScopeError>(())
/// ```
#[must_use = "a scope is left as soon as it is dropped"]
pub struct Scope {
    id: Uuid,
    name: String,
    frame: Option<Arc<ScopeFrame>>,
    previous: Option<Arc<ScopeFrame>>,
    /// Pushed onto a logical context; `false` inside a Tokio task that
    /// never entered one.
    attached: bool,
    logger: StructuredLogger,
    call_site: String,
}

impl Scope {
    pub(crate) fn enter(
        logger: &StructuredLogger,
        name: &str,
        properties: FlatProperties,
        configuration: Option<ScopeConfiguration>,
        parent: Option<Arc<ScopeFrame>>,
        call_site: String,
    ) -> Result<Self, ScopeError> {
        if name.trim().is_empty() {
            return Err(ScopeError::EmptyName);
        }

        let frame = Arc::new(ScopeFrame::new(name, properties, configuration, parent));
        let (previous, attached) = match context::replace(Some(Arc::clone(&frame))) {
            Some(previous) => (previous, true),
            None => {
                tracing::warn!(
                    scope = %frame.name,
                    "no logical context on this task; scope is not ambient (start the task with context::spawn)"
                );
                (None, false)
            }
        };

        let scope = Self {
            id: frame.id,
            name: frame.name.clone(),
            frame: Some(frame),
            previous,
            attached,
            logger: logger.clone(),
            call_site,
        };
        scope.emit(START_SCOPE_MESSAGE);
        Ok(scope)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Merged properties; `None` once disposed.
    pub fn properties(&self) -> Option<&PropertyMap> {
        self.frame.as_deref().map(ScopeFrame::properties)
    }

    /// Shared frame; `None` once disposed.
    pub fn frame(&self) -> Option<&Arc<ScopeFrame>> {
        self.frame.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.frame.is_none()
    }

    /// Log the finish event and leave the scope. Further calls do nothing.
    pub fn dispose(&mut self) {
        if self.frame.is_none() {
            return;
        }
        self.emit(FINISH_SCOPE_MESSAGE);

        let Some(frame) = self.frame.take() else {
            return;
        };
        frame.disposed.store(true, Ordering::Release);
        if !self.attached {
            return;
        }

        let top = context::current();
        if top.as_ref().is_some_and(|top| Arc::ptr_eq(top, &frame)) {
            context::replace(live_ancestor(self.previous.take()));
        } else {
            tracing::warn!(
                scope = %self.name,
                scope_id = %self.id,
                "scope left out of order; logical context left unchanged"
            );
        }
    }

    fn emit(&self, message: &str) {
        let Some(frame) = self.frame.as_deref() else {
            return;
        };
        if !self.logger.is_enabled(Level::Trace) {
            return;
        }
        let mut event = LogEvent::new(Level::Trace, self.logger.name(), message)
            .with_call_site(self.call_site.as_str());
        event
            .properties
            .extend_from(&frame.context_properties(), DATA_PREFIX);
        self.logger.dispatch(event);
    }
}

/// First frame in `frame`'s parent chain, itself included, that is still
/// live. Scopes left out of order are skipped.
fn live_ancestor(mut frame: Option<Arc<ScopeFrame>>) -> Option<Arc<ScopeFrame>> {
    while let Some(candidate) = frame.as_ref().filter(|f| f.is_disposed()) {
        frame = candidate.parent.clone();
    }
    frame
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
