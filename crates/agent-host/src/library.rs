//! Native agent library loading.
//!
//! [`AgentApi`] is the seam between the host and the agent C ABI. The
//! production implementation is [`NativeLibrary`], which resolves the ABI
//! symbols from a shared object with `libloading`.

use std::ffi::c_void;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::ptr::NonNull;

use agent_abi::BackupAgentFn;
use agent_abi::CreateAgentFn;
use agent_abi::DestroyAgentFn;
use agent_abi::RestoreAgentFn;
use libloading::Library;

use crate::error::AgentError;

/// Default location of the agent library, relative to the working directory.
pub const DEFAULT_LIBRARY_PATH: &str = "./libagent.so";

/// Non-null opaque agent handle owned by the native library.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AgentPtr(NonNull<c_void>);

impl AgentPtr {
    pub fn new(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

impl fmt::Debug for AgentPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentPtr({:p})", self.0)
    }
}

/// The agent C ABI as seen from the host.
///
/// Methods that take an [`AgentPtr`] are unsafe: the handle must have been
/// returned by `create_agent` of the same implementation and must not have been
/// passed to `destroy_agent` yet. [`crate::agent::Agent`] upholds this.
pub trait AgentApi {
    fn create_agent(&self) -> *mut c_void;

    /// # Safety
    ///
    /// See the trait documentation.
    unsafe fn backup_agent(&self, agent: AgentPtr, data: &[u8], path: &[u8]) -> i32;

    /// Returns `None` when the library does not export `restore_agent`.
    ///
    /// # Safety
    ///
    /// See the trait documentation.
    unsafe fn restore_agent(&self, agent: AgentPtr, path: &[u8], dest: &[u8]) -> Option<i32>;

    /// Returns `false` when the library does not export `destroy_agent`.
    ///
    /// # Safety
    ///
    /// See the trait documentation. The handle is invalid afterwards.
    unsafe fn destroy_agent(&self, agent: AgentPtr) -> bool;
}

/// Agent library opened from disk.
pub struct NativeLibrary {
    path: PathBuf,
    create: CreateAgentFn,
    backup: BackupAgentFn,
    restore: Option<RestoreAgentFn>,
    destroy: Option<DestroyAgentFn>,
    // declared last so the function pointers above never outlive the mapping
    _lib: Library,
}

impl NativeLibrary {
    /// Opens the shared object at `path` and resolves the agent symbols.
    ///
    /// `create_agent` and `backup_agent` are required; `restore_agent` and
    /// `destroy_agent` are optional.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        tracing::info!("loading agent library from {}", path.display());

        // SAFETY: loading runs the library's initializers; the agent library is trusted.
        let lib = unsafe { Library::new(path) }.map_err(|source| AgentError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        // SAFETY: the symbol types are the ABI declared in `agent_abi`.
        let (create, backup, restore, destroy) = unsafe {
            (
                required::<CreateAgentFn>(&lib, agent_abi::CREATE_AGENT)?,
                required::<BackupAgentFn>(&lib, agent_abi::BACKUP_AGENT)?,
                optional::<RestoreAgentFn>(&lib, agent_abi::RESTORE_AGENT),
                optional::<DestroyAgentFn>(&lib, agent_abi::DESTROY_AGENT),
            )
        };

        if destroy.is_none() {
            tracing::warn!(
                "{} does not export {}, agents will not be released",
                path.display(),
                agent_abi::DESTROY_AGENT
            );
        }
        tracing::debug!(
            restore = restore.is_some(),
            destroy = destroy.is_some(),
            "resolved agent symbols"
        );

        Ok(Self {
            path: path.to_path_buf(),
            create,
            backup,
            restore,
            destroy,
            _lib: lib,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn supports_restore(&self) -> bool {
        self.restore.is_some()
    }
}

unsafe fn required<T: Copy>(lib: &Library, name: &'static str) -> Result<T, AgentError> {
    unsafe { lib.get::<T>(name.as_bytes()) }
        .map(|symbol| *symbol)
        .map_err(|source| AgentError::Symbol { name, source })
}

unsafe fn optional<T: Copy>(lib: &Library, name: &'static str) -> Option<T> {
    match unsafe { lib.get::<T>(name.as_bytes()) } {
        Ok(symbol) => Some(*symbol),
        Err(e) => {
            tracing::debug!("optional symbol {name} not found: {e}");
            None
        }
    }
}

impl AgentApi for NativeLibrary {
    fn create_agent(&self) -> *mut c_void {
        // SAFETY: `create_agent` takes no arguments.
        unsafe { (self.create)() }
    }

    unsafe fn backup_agent(&self, agent: AgentPtr, data: &[u8], path: &[u8]) -> i32 {
        unsafe {
            (self.backup)(
                agent.as_ptr(),
                data.as_ptr(),
                data.len(),
                path.as_ptr(),
                path.len(),
            )
        }
    }

    unsafe fn restore_agent(&self, agent: AgentPtr, path: &[u8], dest: &[u8]) -> Option<i32> {
        let restore = self.restore?;
        Some(unsafe {
            restore(
                agent.as_ptr(),
                path.as_ptr(),
                path.len(),
                dest.as_ptr(),
                dest.len(),
            )
        })
    }

    unsafe fn destroy_agent(&self, agent: AgentPtr) -> bool {
        match self.destroy {
            Some(destroy) => {
                unsafe { destroy(agent.as_ptr()) };
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .field("restore", &self.restore.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}
