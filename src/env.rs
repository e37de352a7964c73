//! Global configuration keys and the sources they are read from.
//!
//! The core never reads the environment directly; it asks the installed
//! [`ConfigSource`], which is the process environment unless replaced with
//! [`set_global_config_source`].

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Whether scope events carry the scope's properties.
pub const SCOPE_INCLUDE_PROPERTIES_ENV: &str = "LOG_EXTENDED_SCOPE_INCLUDE_PROPERTIES";

/// Whether scope events carry the `ScopeNameTrace` string.
pub const SCOPE_INCLUDE_NAME_TRACE_ENV: &str = "LOG_EXTENDED_SCOPE_INCLUDE_NAME_TRACE";

/// Whether scope events carry the `ScopeIdTrace` string.
pub const SCOPE_INCLUDE_ID_TRACE_ENV: &str = "LOG_EXTENDED_SCOPE_INCLUDE_ID_TRACE";

/// Whether child scopes copy their parent's configuration.
pub const SCOPE_INHERIT_CONFIGURATION_ENV: &str = "LOG_EXTENDED_SCOPE_INHERIT_CONFIGURATION";

/// Read access to global key/value configuration.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Read a boolean, falling back to `default` when missing or unparseable.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|raw| parse_bool(&raw))
            .unwrap_or(default)
    }
}

/// Reads configuration from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfig;

impl ConfigSource for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory configuration, for tests and embedding hosts.
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    values: HashMap<String, String>,
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

static GLOBAL_SOURCE: Lazy<RwLock<Arc<dyn ConfigSource>>> =
    Lazy::new(|| RwLock::new(Arc::new(EnvConfig)));

/// Replace the process-wide configuration source.
pub fn set_global_config_source(source: Arc<dyn ConfigSource>) {
    *GLOBAL_SOURCE.write() = source;
}

/// The process-wide configuration source.
pub fn global_config_source() -> Arc<dyn ConfigSource> {
    Arc::clone(&GLOBAL_SOURCE.read())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_parse_leniently() {
        let config = MapConfig::new()
            .set("a", "TRUE")
            .set("b", " no ")
            .set("c", "maybe");
        assert!(config.get_bool("a", false));
        assert!(!config.get_bool("b", true));
        assert!(config.get_bool("c", true));
        assert!(!config.get_bool("missing", false));
    }
}
