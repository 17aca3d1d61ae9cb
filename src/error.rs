//! Error types for berth

use thiserror::Error;

/// Result type for berth operations
pub type Result<T> = std::result::Result<T, BerthError>;

/// Berth error types
#[derive(Error, Debug)]
pub enum BerthError {
    #[error("Stack error: {0}")]
    Stack(String),

    #[error("Stack file parse error: {0}")]
    StackParse(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Instance error: {0}")]
    Instance(String),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance already exists: {0}")]
    InstanceExists(String),

    #[error("Instance already running: {0}")]
    InstanceAlreadyRunning(String),

    #[error("Instance not running: {0}")]
    InstanceNotRunning(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Network not found: {0}")]
    NetworkNotFound(String),

    #[error("Volume error: {0}")]
    Volume(String),

    #[error("Volume not found: {0}")]
    VolumeNotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Service at {addr} not ready: {message}")]
    NotReady { addr: String, message: String },

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
