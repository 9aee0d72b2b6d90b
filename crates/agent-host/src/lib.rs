//! Host side of the native agent ABI: telemetry bootstrap, library loading and
//! the backup/restore sessions driven through it.

pub mod agent;
pub mod config;
pub mod error;
pub mod library;
pub mod session;
pub mod telemetry;

pub use agent::Agent;
pub use error::AgentError;
pub use error::TelemetryError;
pub use library::AgentApi;
pub use library::AgentPtr;
pub use library::NativeLibrary;
pub use session::run_backup;
pub use session::run_restore;
pub use session::BackupRequest;
pub use session::RestoreRequest;
pub use telemetry::AgentMetrics;
pub use telemetry::Telemetry;
pub use telemetry::TelemetryConfig;
