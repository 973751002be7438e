//! Error types for the state container.

use thiserror::Error;

/// Main error type for container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The container was disposed; the request was not enqueued.
    #[error("Container is disposed")]
    Disposed,

    /// The actor loop terminated after an uncaught callback failure
    /// (fail-fast policy). No further requests will be processed.
    #[error("Actor loop terminated by a failed callback")]
    ActorPoisoned,

    /// The subscription's channel was disconnected (container disposed
    /// or subscriber detached).
    #[error("Subscription disconnected")]
    SubscriptionDisconnected,
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
