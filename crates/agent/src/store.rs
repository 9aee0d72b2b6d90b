use std::fs;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use agent_abi::metadata_path;
use agent_abi::BackupMetadata;
use chrono::Utc;
use cid::Cid;
use multihash_codetable::Code;
use multihash_codetable::MultihashDigest;
use tempfile::NamedTempFile;
use tempfile::TempPath;

use crate::cache::BlockCache;
use crate::config::AgentConfig;
use crate::error::AgentError;

/// Multicodec code for raw binary content.
const RAW: u64 = 0x55;

/// Content identifier of a payload: CIDv1, raw codec, sha2-256 multihash.
pub fn content_id(data: &[u8]) -> Cid {
    Cid::new_v1(RAW, Code::Sha2_256.digest(data))
}

/// Agent state behind the opaque handle handed out by `create_agent`.
pub struct Agent {
    config: AgentConfig,
    blocks: Mutex<BlockCache>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            blocks: Mutex::new(BlockCache::new(config.block_cache_bytes)),
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns the stored form of the payload with content id `cid`, if it is
    /// still cached by this agent.
    pub fn block(&self, cid: &Cid) -> Option<Vec<u8>> {
        self.blocks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(cid)
            .map(<[u8]>::to_vec)
    }

    /// Writes `data` to `path` together with its metadata sidecar.
    ///
    /// On failure any backup previously stored at `path` is left in place.
    pub fn backup(&self, data: &[u8], path: &Path) -> Result<BackupMetadata, AgentError> {
        if data.len() > self.config.max_payload_bytes {
            return Err(AgentError::PayloadTooLarge {
                size: data.len(),
                limit: self.config.max_payload_bytes,
            });
        }

        let cid = content_id(data);
        let stored = match &self.config.encryption_key {
            Some(key) => key.seal(data)?,
            None => data.to_vec(),
        };

        let metadata = BackupMetadata {
            cid: cid.to_string(),
            size: data.len() as u64,
            encrypted: self.config.encryption_key.is_some(),
            compression_level: None,
            created_at: Utc::now(),
        };
        let sidecar = metadata_path(path);
        let json = serde_json::to_vec_pretty(&metadata).map_err(|source| AgentError::Metadata {
            path: sidecar.clone(),
            source,
        })?;

        create_parent_dir(path)?;
        commit(path, &stored, &sidecar, &json)?;

        self.blocks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cid, stored);

        tracing::info!(
            cid = %cid,
            size = data.len(),
            encrypted = metadata.encrypted,
            path = %path.display(),
            "backup stored"
        );
        Ok(metadata)
    }

    /// Verifies the backup at `path` against its sidecar and writes the payload to `dest`.
    ///
    /// When the payload file is gone but this agent still caches it, the cached
    /// block is used instead.
    pub fn restore(&self, path: &Path, dest: &Path) -> Result<BackupMetadata, AgentError> {
        let metadata = read_metadata(path)?;

        let stored = match fs::read(path) {
            Ok(stored) => stored,
            Err(e) if e.kind() == ErrorKind::NotFound => metadata
                .cid
                .parse::<Cid>()
                .ok()
                .and_then(|cid| self.block(&cid))
                .ok_or_else(|| AgentError::NotFound(path.to_path_buf()))?,
            Err(e) => return Err(AgentError::io(path, e)),
        };

        let payload = if metadata.encrypted {
            let key = self
                .config
                .encryption_key
                .as_ref()
                .ok_or_else(|| AgentError::KeyRequired(path.to_path_buf()))?;
            key.open(&stored)
                .ok_or_else(|| AgentError::Decrypt(path.to_path_buf()))?
        } else {
            stored
        };

        let actual = content_id(&payload).to_string();
        if actual != metadata.cid {
            return Err(AgentError::IntegrityMismatch {
                path: path.to_path_buf(),
                expected: metadata.cid,
                actual,
            });
        }

        create_parent_dir(dest)?;
        stage(dest, &payload)?
            .persist(dest)
            .map_err(|e| AgentError::io(dest, e.error))?;

        tracing::info!(
            cid = %metadata.cid,
            size = payload.len(),
            dest = %dest.display(),
            "backup restored"
        );
        Ok(metadata)
    }
}

/// Replaces the payload at `path` and then its sidecar. If either step fails the
/// previous payload is moved back.
fn commit(path: &Path, payload: &[u8], sidecar: &Path, metadata: &[u8]) -> Result<(), AgentError> {
    let staged_payload = stage(path, payload)?;
    let staged_sidecar = stage(sidecar, metadata)?;
    let previous = set_aside(path)?;

    let committed = staged_payload
        .persist(path)
        .map_err(|e| AgentError::io(path, e.error))
        .and_then(|_| {
            staged_sidecar
                .persist(sidecar)
                .map_err(|e| AgentError::io(sidecar, e.error))
        });

    if let Err(err) = committed {
        let rollback = match &previous {
            Some(previous) => fs::rename(previous, path),
            None => fs::remove_file(path),
        };
        match rollback {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::error!("failed to roll back `{}`: {e}", path.display()),
        }
        return Err(err);
    }
    Ok(())
}

/// Writes `bytes` to a temporary file next to `target`.
fn stage(target: &Path, bytes: &[u8]) -> Result<NamedTempFile, AgentError> {
    let dir = parent_dir(target);
    let mut staged = tempfile::Builder::new()
        .prefix(".staged")
        .tempfile_in(dir)
        .map_err(|e| AgentError::io(dir, e))?;
    staged
        .write_all(bytes)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| AgentError::io(target, e))?;
    Ok(staged)
}

/// Moves an existing payload out of the way. The returned path deletes it when dropped.
fn set_aside(path: &Path) -> Result<Option<TempPath>, AgentError> {
    if !path.exists() {
        return Ok(None);
    }
    let dir = parent_dir(path);
    let placeholder = tempfile::Builder::new()
        .prefix(".previous")
        .tempfile_in(dir)
        .map_err(|e| AgentError::io(dir, e))?
        .into_temp_path();
    fs::rename(path, &placeholder).map_err(|e| AgentError::io(path, e))?;
    Ok(Some(placeholder))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn create_parent_dir(path: &Path) -> Result<(), AgentError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| AgentError::io(parent, e))
        }
        _ => Ok(()),
    }
}

fn read_metadata(path: &Path) -> Result<BackupMetadata, AgentError> {
    let sidecar = metadata_path(path);
    let raw = match fs::read(&sidecar) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AgentError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(AgentError::io(&sidecar, e)),
    };
    serde_json::from_slice(&raw).map_err(|source| AgentError::Metadata {
        path: sidecar,
        source,
    })
}
