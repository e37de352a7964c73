use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use tracing_log_extended::host::HostLogger;
use tracing_log_extended::init::{init_tracing_with_config, TracingConfig};
use tracing_log_extended::map::PropertyMap;
use tracing_log_extended::mapper::EventMapper;
use tracing_log_extended::sink::{ChannelHost, ChannelHostConfig, LogSink};
use tracing_log_extended::{Exception, Level, StructuredLogger};

/// Prints each event map as one JSON line. A real sink would batch these
/// into a database or a message queue.
struct StdoutJsonSink;

#[async_trait]
impl LogSink for StdoutJsonSink {
    async fn send(&self, event: &PropertyMap) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        println!("{}", event.to_json()?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mapper = EventMapper::new().with_attribute("Application", "channel_sink");
    let (host, delivery) = ChannelHost::new(
        Arc::new(StdoutJsonSink),
        mapper,
        ChannelHostConfig {
            min_level: Level::Debug,
            ..ChannelHostConfig::default()
        },
    );
    let host = Arc::new(host);
    let dropped = Arc::clone(&host.dropped_events);
    let delivered = Arc::clone(&host.delivered_events);

    // Plain `tracing` events go through the same host.
    init_tracing_with_config(TracingConfig {
        filter: "debug".to_string(),
        enable_stdout: false,
        host: Some(host.clone() as Arc<dyn HostLogger>),
        ..TracingConfig::default()
    })?;

    let logger = StructuredLogger::new("billing", host);
    info!(customer = "c-17", "channel sink example started");

    let failure = Exception::new("billing::GatewayError", "card declined")
        .with_data("gateway", "acme-pay")
        .with_inner(Exception::new("std::io::Error", "connection reset"));
    logger.error("charge failed", Some(Arc::new(failure)));
    warn!(retry_in_ms = 500u64, "charge will be retried");

    // The global subscriber keeps the host alive, so the channel never
    // closes here; give the delivery task time to drain instead.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    drop(delivery);

    println!(
        "channel_sink: delivered {} events, dropped {}",
        delivered.load(Ordering::Relaxed),
        dropped.load(Ordering::Relaxed)
    );
    Ok(())
}
