//! Error types for the navmesh

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// The collision oracle could not answer, e.g. the scene is not loaded.
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// A background task panicked or was cancelled by the runtime.
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}
