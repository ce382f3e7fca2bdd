//! Error types of the orchestration service.

/// Failures of the service infrastructure.
///
/// Orchestration decisions themselves never fail with an error; they are
/// reported through log lines and boolean results. These variants cover the
/// plumbing around them.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The request channel or a reply channel was closed
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Invalid service configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
