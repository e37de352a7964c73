use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::host::HostLogger;
use crate::level::Level;
use crate::map::PropertyMap;
use crate::mapper::EventMapper;
use crate::record::LogEvent;

/// Asynchronous destination for finished event maps.
///
/// Called from the background task owned by [`ChannelHost`], never from
/// the logging thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver one event map.
    ///
    /// Errors are reported through `tracing` and the event is dropped;
    /// there is no retry.
    async fn send(&self, event: &PropertyMap) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush buffered events, if the sink buffers. Called once when the
    /// channel closes.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Configuration of a [`ChannelHost`].
///
/// - `channel_buffer`: maximum number of queued events before new events
///   are dropped.
/// - `min_level`: events below this level are not built at all.
#[derive(Clone, Debug)]
pub struct ChannelHostConfig {
    pub channel_buffer: usize,
    pub min_level: Level,
}

impl Default for ChannelHostConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            min_level: Level::Trace,
        }
    }
}

/// [`HostLogger`] that builds each event map on the logging thread and
/// hands it to a [`LogSink`] through a bounded channel.
///
/// Logging never waits on the sink: when the channel is full the event is
/// dropped and counted.
pub struct ChannelHost {
    sender: mpsc::Sender<PropertyMap>,
    mapper: EventMapper,
    min_level: Level,
    /// Events handed to this host at an enabled level.
    pub total_events: Arc<AtomicU64>,
    /// Events delivered to the sink without error.
    pub delivered_events: Arc<AtomicU64>,
    /// Events dropped because the channel was full or closed.
    pub dropped_events: Arc<AtomicU64>,
}

impl ChannelHost {
    /// Create the host and spawn the delivery task on the current Tokio
    /// runtime. The task ends once every clone of the host is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        sink: Arc<dyn LogSink>,
        mapper: EventMapper,
        config: ChannelHostConfig,
    ) -> (Self, JoinHandle<()>) {
        let buffer = config.channel_buffer.max(1);
        let (tx, mut rx) = mpsc::channel::<PropertyMap>(buffer);

        let delivered_events = Arc::new(AtomicU64::new(0));
        let delivered_events_bg = Arc::clone(&delivered_events);

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match sink.send(&event).await {
                    Ok(()) => {
                        delivered_events_bg.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => tracing::warn!(error = %e, "log sink rejected event"),
                }
            }
            if let Err(e) = sink.flush().await {
                tracing::warn!(error = %e, "log sink flush failed");
            }
        });

        let host = Self {
            sender: tx,
            mapper,
            min_level: config.min_level,
            total_events: Arc::new(AtomicU64::new(0)),
            delivered_events,
            dropped_events: Arc::new(AtomicU64::new(0)),
        };
        (host, handle)
    }
}

impl HostLogger for ChannelHost {
    fn is_enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    fn log(&self, event: LogEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let map = self.mapper.build(&event);
        if self.sender.try_send(map).is_err() {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("log channel full, dropping event");
        }
    }
}
