use std::path::PathBuf;

use agent_abi::AgentStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("agent handle is null")]
    NullHandle,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed backup metadata `{path}`: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("backup not found at `{0}`")]
    NotFound(PathBuf),

    #[error("backup at `{path}` does not match its metadata: expected {expected}, found {actual}")]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("failed to encrypt payload")]
    Encrypt,

    #[error("cannot decrypt backup at `{0}`: wrong key or corrupted payload")]
    Decrypt(PathBuf),

    #[error("backup at `{0}` is encrypted but no encryption key is configured")]
    KeyRequired(PathBuf),
}

impl AgentError {
    /// Status code reported across the FFI boundary.
    pub fn status(&self) -> AgentStatus {
        match self {
            AgentError::NullHandle => AgentStatus::NullHandle,
            AgentError::InvalidArgument(_) => AgentStatus::InvalidArgument,
            AgentError::PayloadTooLarge { .. } => AgentStatus::PayloadTooLarge,
            AgentError::Io { .. } | AgentError::Metadata { .. } => AgentStatus::Io,
            AgentError::NotFound(_) => AgentStatus::NotFound,
            AgentError::IntegrityMismatch { .. } => AgentStatus::IntegrityMismatch,
            AgentError::InvalidKey(_)
            | AgentError::Encrypt
            | AgentError::Decrypt(_)
            | AgentError::KeyRequired(_) => AgentStatus::Crypto,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AgentError::Io {
            path: path.into(),
            source,
        }
    }
}
