use std::path::PathBuf;

use agent_abi::AgentStatus;
use thiserror::Error;

/// Errors raised while loading or driving a native agent library.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("failed to load agent library `{path}`: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("agent library does not export required symbol `{name}`: {source}")]
    Symbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("agent library does not export `{0}`")]
    SymbolNotExported(&'static str),

    #[error("create_agent returned a null handle")]
    NullHandle,

    #[error("{op} failed: {}", AgentStatus::describe(*.status))]
    Status { op: &'static str, status: i32 },

    #[error("path `{0}` is not valid UTF-8")]
    InvalidPath(PathBuf),
}

impl AgentError {
    /// Raw status code, for errors reported by the agent itself.
    pub fn status(&self) -> Option<i32> {
        match self {
            AgentError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised while building the metrics pipeline.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("failed to build OTLP metric exporter: {0}")]
    Exporter(String),

    #[error("telemetry is already initialized")]
    AlreadyInitialized,
}
