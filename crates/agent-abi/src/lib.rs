//! Shared agent ABI definitions
//!
//! This crate describes the C ABI between the agent host and a native agent
//! library: the exported symbol names, their signatures, the status codes they
//! return, and the metadata record written next to every backup.

use std::ffi::c_void;
use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// `create_agent() -> *mut c_void`
pub const CREATE_AGENT: &str = "create_agent";
/// `backup_agent(agent, data, data_len, path, path_len) -> i32`
pub const BACKUP_AGENT: &str = "backup_agent";
/// `restore_agent(agent, path, path_len, dest, dest_len) -> i32`, optional
pub const RESTORE_AGENT: &str = "restore_agent";
/// `destroy_agent(agent)`, optional
pub const DESTROY_AGENT: &str = "destroy_agent";

pub type CreateAgentFn = unsafe extern "C" fn() -> *mut c_void;
pub type BackupAgentFn =
    unsafe extern "C" fn(*mut c_void, *const u8, usize, *const u8, usize) -> i32;
pub type RestoreAgentFn =
    unsafe extern "C" fn(*mut c_void, *const u8, usize, *const u8, usize) -> i32;
pub type DestroyAgentFn = unsafe extern "C" fn(*mut c_void);

/// Status returned by every fallible agent entry point.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentStatus {
    Ok = 0,
    NullHandle = 1,
    InvalidArgument = 2,
    PayloadTooLarge = 3,
    Io = 4,
    NotFound = 5,
    IntegrityMismatch = 6,
    Crypto = 7,
    Panicked = -1,
}

impl AgentStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let status = match code {
            0 => AgentStatus::Ok,
            1 => AgentStatus::NullHandle,
            2 => AgentStatus::InvalidArgument,
            3 => AgentStatus::PayloadTooLarge,
            4 => AgentStatus::Io,
            5 => AgentStatus::NotFound,
            6 => AgentStatus::IntegrityMismatch,
            7 => AgentStatus::Crypto,
            -1 => AgentStatus::Panicked,
            _ => return None,
        };
        Some(status)
    }

    /// Human readable description of a raw status code, including unknown ones.
    pub fn describe(code: i32) -> String {
        match Self::from_code(code) {
            Some(status) => format!("{status} (status {code})"),
            None => format!("unknown status {code}"),
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            AgentStatus::Ok => "ok",
            AgentStatus::NullHandle => "null agent handle",
            AgentStatus::InvalidArgument => "invalid argument",
            AgentStatus::PayloadTooLarge => "payload exceeds limit",
            AgentStatus::Io => "i/o failure",
            AgentStatus::NotFound => "backup not found",
            AgentStatus::IntegrityMismatch => "integrity check failed",
            AgentStatus::Crypto => "encryption failure",
            AgentStatus::Panicked => "agent panicked",
        };
        f.write_str(text)
    }
}

/// Suffix appended to a backup path to locate its metadata sidecar.
pub const METADATA_SUFFIX: &str = ".meta.json";

/// Metadata written alongside a backup payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// CIDv1 (raw codec, sha2-256) of the plaintext payload
    pub cid: String,
    /// Plaintext payload size in bytes
    pub size: u64,
    /// Whether the payload was encrypted before storage
    pub encrypted: bool,
    /// Compression level, absent when the payload is stored as is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Path of the metadata sidecar for the backup stored at `path`.
pub fn metadata_path(path: &Path) -> PathBuf {
    let mut sidecar = OsString::from(path.as_os_str());
    sidecar.push(METADATA_SUFFIX);
    PathBuf::from(sidecar)
}
