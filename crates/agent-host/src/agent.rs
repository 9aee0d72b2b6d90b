use std::path::Path;

use crate::error::AgentError;
use crate::library::AgentApi;
use crate::library::AgentPtr;

/// A live agent created by an [`AgentApi`], released when dropped.
pub struct Agent<'lib, A: AgentApi + ?Sized> {
    api: &'lib A,
    ptr: AgentPtr,
}

impl<'lib, A: AgentApi + ?Sized> Agent<'lib, A> {
    /// Calls `create_agent` once and takes ownership of the returned handle.
    pub fn create(api: &'lib A) -> Result<Self, AgentError> {
        let ptr = AgentPtr::new(api.create_agent()).ok_or(AgentError::NullHandle)?;
        tracing::debug!(agent = ?ptr, "agent created");
        Ok(Self { api, ptr })
    }

    pub fn handle(&self) -> AgentPtr {
        self.ptr
    }

    pub fn backup(&self, data: &[u8], path: &Path) -> Result<(), AgentError> {
        let path = path_bytes(path)?;
        // SAFETY: `ptr` came from `api.create_agent` and is released only on drop.
        let status = unsafe { self.api.backup_agent(self.ptr, data, path) };
        check_status(agent_abi::BACKUP_AGENT, status)
    }

    pub fn restore(&self, path: &Path, dest: &Path) -> Result<(), AgentError> {
        let path = path_bytes(path)?;
        let dest = path_bytes(dest)?;
        // SAFETY: as in `backup`.
        let status = unsafe { self.api.restore_agent(self.ptr, path, dest) }
            .ok_or(AgentError::SymbolNotExported(agent_abi::RESTORE_AGENT))?;
        check_status(agent_abi::RESTORE_AGENT, status)
    }
}

impl<A: AgentApi + ?Sized> Drop for Agent<'_, A> {
    fn drop(&mut self) {
        // SAFETY: the handle is live and this is its only release.
        if unsafe { self.api.destroy_agent(self.ptr) } {
            tracing::debug!(agent = ?self.ptr, "agent released");
        } else {
            tracing::warn!(agent = ?self.ptr, "agent library cannot release agents, leaking handle");
        }
    }
}

fn path_bytes(path: &Path) -> Result<&[u8], AgentError> {
    path.to_str()
        .map(str::as_bytes)
        .ok_or_else(|| AgentError::InvalidPath(path.to_path_buf()))
}

fn check_status(op: &'static str, status: i32) -> Result<(), AgentError> {
    if status == 0 {
        Ok(())
    } else {
        Err(AgentError::Status { op, status })
    }
}
