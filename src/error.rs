//! Error types
//!
//! `MixerError` is the control-plane taxonomy. It is converted into a
//! response envelope at the command boundary and never reaches the host.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MixerError {
    /// Missing or malformed request field
    #[error("{0}")]
    Validation(String),
    /// Unknown channel id (or the id belongs to the other channel kind)
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    /// Frame source could not be opened or decoded
    #[error("{0}")]
    Io(String),
    #[error("failed to start audio engine: {0}")]
    EngineStart(String),
    #[error("failed to activate audio session: {0}")]
    SessionActivation(String),
    /// Control call made in the wrong session state
    #[error("{0}")]
    Precondition(String),
}

pub type MixerResult<T> = Result<T, MixerError>;

/// Failures reported by an audio backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no audio device available: {0}")]
    DeviceUnavailable(String),
    #[error("session activation failed: {0}")]
    Activation(String),
    #[error("stream failed to start: {0}")]
    Stream(String),
    #[error("backend thread did not report back in time")]
    Timeout,
}

/// Failures reported by a frame source
#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("cannot decode {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("unsupported sample format: {0}")]
    Unsupported(String),
}

/// Structural graph mutation failures
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node #{0} not found")]
    NodeNotFound(u32),
    #[error("node '{0}' has no port {1}")]
    InvalidPort(String, usize),
    #[error("connection #{0} -> #{1} already exists")]
    DuplicateEdge(u32, u32),
    #[error("node '{0}' feeds more than one node")]
    Fanout(String),
    #[error("node '{0}' has no path to the output bus")]
    Unrouted(String),
    #[error("cycle detected")]
    Cycle,
}

impl From<FrameSourceError> for MixerError {
    fn from(err: FrameSourceError) -> Self {
        match err {
            FrameSourceError::NotFound(_) => MixerError::Io("filePath not found".to_string()),
            other => MixerError::Io(other.to_string()),
        }
    }
}

impl From<GraphError> for MixerError {
    fn from(err: GraphError) -> Self {
        MixerError::EngineStart(err.to_string())
    }
}

impl From<BackendError> for MixerError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Activation(reason) => MixerError::SessionActivation(reason),
            other => MixerError::EngineStart(other.to_string()),
        }
    }
}
