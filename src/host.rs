use parking_lot::Mutex;

use crate::flatten::render_failure;
use crate::level::Level;
use crate::map::PropertyMap;
use crate::mapper::EventMapper;
use crate::record::LogEvent;

/// `tracing` target used by [`TracingHost`]. Events with this target are
/// never fed back into the pipeline by [`EventMapLayer`](crate::layer::EventMapLayer).
pub const TRACING_TARGET: &str = "log_extended";

/// The host logging framework's "log this event" capability.
///
/// `log` is called synchronously on the logging thread and must not block
/// on I/O; hosts that ship events elsewhere should hand them off (see
/// [`ChannelHost`](crate::sink::ChannelHost)).
pub trait HostLogger: Send + Sync {
    fn is_enabled(&self, _level: Level) -> bool {
        true
    }

    fn log(&self, event: LogEvent);
}

/// Keeps every event map in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    mapper: EventMapper,
    min_level: Option<Level>,
    events: Mutex<Vec<PropertyMap>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_level(level: Level) -> Self {
        Self {
            min_level: Some(level),
            ..Self::default()
        }
    }

    pub fn with_mapper(mapper: EventMapper) -> Self {
        Self {
            mapper,
            ..Self::default()
        }
    }

    /// Snapshot of the events logged so far, oldest first.
    pub fn events(&self) -> Vec<PropertyMap> {
        self.events.lock().clone()
    }

    /// Drain the events logged so far.
    pub fn take(&self) -> Vec<PropertyMap> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl HostLogger for MemoryHost {
    fn is_enabled(&self, level: Level) -> bool {
        self.min_level.map_or(true, |min| level >= min)
    }

    fn log(&self, event: LogEvent) {
        let map = self.mapper.build(&event);
        self.events.lock().push(map);
    }
}

/// Emits each event map as JSON through `tracing`, at the closest
/// `tracing` level and with target [`TRACING_TARGET`].
#[derive(Debug, Clone, Default)]
pub struct TracingHost {
    mapper: EventMapper,
}

impl TracingHost {
    pub fn new(mapper: EventMapper) -> Self {
        Self { mapper }
    }
}

impl HostLogger for TracingHost {
    fn log(&self, event: LogEvent) {
        let json = self
            .mapper
            .build(&event)
            .to_json()
            .unwrap_or_else(|e| render_failure("Serialize", &e.to_string()));
        let logger = event.logger_name.as_str();

        // `tracing` callsites need a constant level.
        match event.level.to_tracing() {
            tracing::Level::TRACE => tracing::trace!(target: TRACING_TARGET, logger, event = %json),
            tracing::Level::DEBUG => tracing::debug!(target: TRACING_TARGET, logger, event = %json),
            tracing::Level::INFO => tracing::info!(target: TRACING_TARGET, logger, event = %json),
            tracing::Level::WARN => tracing::warn!(target: TRACING_TARGET, logger, event = %json),
            _ => {
                tracing::error!(target: TRACING_TARGET, logger, level = event.level.as_str(), event = %json)
            }
        }
    }
}
