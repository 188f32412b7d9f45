use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Index encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SessionError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the camera hardware collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera {id} could not be opened")]
    Unavailable { id: i32 },

    #[error("No camera with id {id}")]
    NoSuchCamera { id: i32 },

    #[error("Camera {operation} failed: {details}")]
    Hardware { operation: String, details: String },

    #[error("Camera reports no usable preview size")]
    NoSupportedSize,

    #[error("No camera session is open")]
    SessionClosed,
}

impl CameraError {
    pub fn hardware<S: Into<String>>(operation: S, details: S) -> Self {
        Self::Hardware {
            operation: operation.into(),
            details: details.into(),
        }
    }

    /// Whether retrying the operation on a fresh session could succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CameraError::Unavailable { .. } | CameraError::Hardware { .. })
    }
}

/// Errors raised by the media storage collaborator
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Media index error: {details}")]
    Index { details: String },

    #[error("Unknown media record {0}")]
    UnknownRecord(String),
}

/// Failure outcome delivered to a picture callback
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No camera session was open when the capture ran")]
    SessionClosed,

    #[error("Capture failed: {0}")]
    Hardware(#[from] CameraError),

    #[error("Failed to persist picture: {0}")]
    Write(StorageError),

    #[error("Picture saved to {path} but could not be indexed: {source}")]
    Index { path: PathBuf, source: StorageError },

    #[error("Storage unavailable: {0}")]
    Storage(StorageError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
