//! Reference native agent.
//!
//! Built as `libagent.so`, this library exports the agent C ABI described in
//! `agent_abi`: an opaque agent handle backed by a content-addressed store that
//! writes each backup to disk next to a metadata sidecar.

use std::ffi::c_void;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::ptr;

use agent_abi::AgentStatus;
use ctor::ctor;
use utils::logging;

mod cache;
mod config;
mod crypto;
mod error;
mod store;

pub use config::AgentConfig;
pub use crypto::EncryptionKey;
pub use error::AgentError;
pub use store::content_id;
pub use store::Agent;

#[ctor]
unsafe fn entry_point() {
    logging::init();
}

/// Allocates a new agent configured from the environment.
///
/// Returns null if the agent could not be created, for example when
/// `AGENT_ENCRYPTION_KEY` is not 64 hex characters. The handle must be released
/// with [`destroy_agent`].
#[no_mangle]
pub extern "C" fn create_agent() -> *mut c_void {
    let created = catch_unwind(|| {
        let config = AgentConfig::from_env()?;
        tracing::info!(
            max_payload_bytes = config.max_payload_bytes,
            block_cache_bytes = config.block_cache_bytes,
            encrypted = config.encryption_key.is_some(),
            "creating agent"
        );
        Ok::<_, AgentError>(Box::into_raw(Box::new(Agent::new(config))))
    });
    match created {
        Ok(Ok(agent)) => agent.cast(),
        Ok(Err(err)) => {
            tracing::error!("create_agent failed: {err}");
            ptr::null_mut()
        }
        Err(_) => {
            tracing::error!("create_agent panicked");
            ptr::null_mut()
        }
    }
}

/// Stores `data` at `path`.
///
/// # Safety
///
/// `agent` must be null or a live handle returned by [`create_agent`]. `data`
/// and `path` must be valid for reads of `data_len` and `path_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn backup_agent(
    agent: *mut c_void,
    data: *const u8,
    data_len: usize,
    path: *const u8,
    path_len: usize,
) -> i32 {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let agent = unsafe { agent_ref(agent) }?;
        let data = unsafe { byte_slice(data, data_len, "data") }?;
        let path = unsafe { path_arg(path, path_len, "path") }?;
        agent.backup(data, path).map(|_| ())
    }));
    into_status("backup_agent", result)
}

/// Restores the backup stored at `path` into `dest`.
///
/// # Safety
///
/// Same contract as [`backup_agent`], with `dest` valid for reads of `dest_len`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn restore_agent(
    agent: *mut c_void,
    path: *const u8,
    path_len: usize,
    dest: *const u8,
    dest_len: usize,
) -> i32 {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let agent = unsafe { agent_ref(agent) }?;
        let path = unsafe { path_arg(path, path_len, "path") }?;
        let dest = unsafe { path_arg(dest, dest_len, "dest") }?;
        agent.restore(path, dest).map(|_| ())
    }));
    into_status("restore_agent", result)
}

/// Releases an agent. Null is ignored.
///
/// # Safety
///
/// `agent` must be null or a handle returned by [`create_agent`] that has not
/// been released yet.
#[no_mangle]
pub unsafe extern "C" fn destroy_agent(agent: *mut c_void) {
    if agent.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(agent.cast::<Agent>()) });
    tracing::debug!("agent destroyed");
}

unsafe fn agent_ref<'a>(agent: *mut c_void) -> Result<&'a Agent, AgentError> {
    unsafe { agent.cast::<Agent>().as_ref() }.ok_or(AgentError::NullHandle)
}

unsafe fn byte_slice<'a>(
    data: *const u8,
    len: usize,
    name: &'static str,
) -> Result<&'a [u8], AgentError> {
    if len == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        return Err(AgentError::InvalidArgument(name));
    }
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

unsafe fn path_arg<'a>(
    path: *const u8,
    len: usize,
    name: &'static str,
) -> Result<&'a Path, AgentError> {
    let bytes = unsafe { byte_slice(path, len, name) }?;
    match std::str::from_utf8(bytes) {
        Ok(path) if !path.is_empty() => Ok(Path::new(path)),
        _ => Err(AgentError::InvalidArgument(name)),
    }
}

fn into_status(op: &str, result: std::thread::Result<Result<(), AgentError>>) -> i32 {
    match result {
        Ok(Ok(())) => AgentStatus::Ok.code(),
        Ok(Err(err)) => {
            tracing::error!("{op} failed: {err}");
            err.status().code()
        }
        Err(_) => {
            tracing::error!("{op} panicked");
            AgentStatus::Panicked.code()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use agent_abi::metadata_path;
    use tempfile::TempDir;

    use super::*;

    fn call_backup(agent: *mut c_void, data: &[u8], path: &str) -> i32 {
        unsafe { backup_agent(agent, data.as_ptr(), data.len(), path.as_ptr(), path.len()) }
    }

    fn call_restore(agent: *mut c_void, path: &str, dest: &str) -> i32 {
        unsafe { restore_agent(agent, path.as_ptr(), path.len(), dest.as_ptr(), dest.len()) }
    }

    #[test_log::test]
    fn backup_and_restore_through_c_abi() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup").display().to_string();
        let dest = dir.path().join("dest").display().to_string();

        let agent = create_agent();
        assert!(!agent.is_null());

        assert_eq!(call_backup(agent, b"some data", &path), 0);
        assert!(metadata_path(Path::new(&path)).exists());
        assert_eq!(call_restore(agent, &path, &dest), 0);
        assert_eq!(fs::read(&dest).unwrap(), b"some data");

        unsafe { destroy_agent(agent) };
    }

    #[test]
    fn null_handle_is_rejected() {
        let status = call_backup(ptr::null_mut(), b"some data", "/path/to/backup");
        assert_eq!(status, AgentStatus::NullHandle.code());
    }

    #[test]
    fn null_data_pointer_with_length_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup").display().to_string();
        let agent = create_agent();

        let status = unsafe { backup_agent(agent, ptr::null(), 9, path.as_ptr(), path.len()) };

        assert_eq!(status, AgentStatus::InvalidArgument.code());
        assert!(!Path::new(&path).exists());
        unsafe { destroy_agent(agent) };
    }

    #[test]
    fn empty_or_non_utf8_path_is_rejected() {
        let agent = create_agent();

        assert_eq!(
            call_backup(agent, b"some data", ""),
            AgentStatus::InvalidArgument.code()
        );

        let invalid = [0xff_u8, 0xfe];
        let status = unsafe {
            backup_agent(agent, b"x".as_ptr(), 1, invalid.as_ptr(), invalid.len())
        };
        assert_eq!(status, AgentStatus::InvalidArgument.code());

        unsafe { destroy_agent(agent) };
    }

    #[test]
    fn empty_payload_is_stored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty").display().to_string();
        let agent = create_agent();

        let status = unsafe { backup_agent(agent, ptr::null(), 0, path.as_ptr(), path.len()) };

        assert_eq!(status, 0);
        assert_eq!(fs::read(&path).unwrap(), Vec::<u8>::new());
        unsafe { destroy_agent(agent) };
    }

    #[test]
    fn restore_of_missing_backup_reports_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").display().to_string();
        let dest = dir.path().join("dest").display().to_string();
        let agent = create_agent();

        assert_eq!(
            call_restore(agent, &path, &dest),
            AgentStatus::NotFound.code()
        );
        unsafe { destroy_agent(agent) };
    }

    #[test]
    fn destroy_ignores_null() {
        unsafe { destroy_agent(ptr::null_mut()) };
    }
}
