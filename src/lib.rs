//! Structured log events with flat, collision-safe property maps.
//!
//! - [`logger::StructuredLogger`] flattens user properties, fans exception
//!   graphs out into one correlated event per exception, and tracks
//!   [`scope::Scope`]s on the logical call chain.
//! - [`mapper::EventMapper`] turns each [`record::LogEvent`] into the
//!   [`map::PropertyMap`] an encoder serializes.
//! - [`host::HostLogger`] is the hand-off to the surrounding logging
//!   framework.

pub mod value;
pub mod level;
pub mod map;
pub mod flatten;
pub mod stack;
pub mod exception;
pub mod fingerprint;
pub mod template;
pub mod record;
pub mod mapper;
pub mod context;
pub mod scope;
pub mod logger;
pub mod host;
pub mod sink;
pub mod layer;
pub mod env;
pub mod error;
pub mod init;

pub use exception::{flatten_exceptions, Exception};
pub use fingerprint::fingerprint;
pub use level::Level;
pub use logger::StructuredLogger;
pub use map::PropertyMap;
pub use mapper::build_event_map;
pub use record::LogEvent;
pub use scope::{Scope, ScopeConfiguration};
pub use value::Value;
