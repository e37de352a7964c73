/// Error returned when a scope cannot be constructed.
///
/// Scope construction errors are caller defects and are the only errors
/// this crate surfaces from its logging entry points.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ScopeError {
    #[error("scope name must not be empty or whitespace")]
    EmptyName,
}

/// Error returned when installing the global `tracing` subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to install global subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}
