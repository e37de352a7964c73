use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::error::InitError;
use crate::host::HostLogger;
use crate::layer::EventMapLayer;

/// Configuration of the global `tracing` subscriber.
///
/// **Fields**
/// - `filter`: `EnvFilter` directives used when `RUST_LOG` is not set.
/// - `json`: print console output as JSON lines instead of text.
/// - `enable_stdout`: add a `fmt` layer printing to stdout. Needed to see
///   the output of [`TracingHost`](crate::host::TracingHost).
/// - `host`: when set, plain `tracing` events are also mapped and handed
///   to this host through an [`EventMapLayer`].
#[derive(Clone)]
pub struct TracingConfig {
    pub filter: String,
    pub json: bool,
    pub enable_stdout: bool,
    pub host: Option<Arc<dyn HostLogger>>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            enable_stdout: true,
            host: None,
        }
    }
}

/// Install the global `tracing` subscriber described by `config`.
///
/// Fails if the filter does not parse or a global subscriber is already
/// installed.
pub fn init_tracing_with_config(config: TracingConfig) -> Result<(), InitError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)?,
    };

    let mapped = config.host.map(EventMapLayer::new);
    let (text, json) = match (config.enable_stdout, config.json) {
        (false, _) => (None, None),
        (true, false) => (Some(tracing_subscriber::fmt::layer()), None),
        (true, true) => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    Registry::default()
        .with(filter)
        .with(mapped)
        .with(text)
        .with(json)
        .try_init()?;
    Ok(())
}

/// Install the global `tracing` subscriber with [`TracingConfig::default`].
pub fn init_tracing() -> Result<(), InitError> {
    init_tracing_with_config(TracingConfig::default())
}
