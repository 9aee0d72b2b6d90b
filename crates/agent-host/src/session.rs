//! One-shot agent sessions: create an agent, issue a single call, release it.

use std::path::PathBuf;
use std::time::Instant;

use crate::agent::Agent;
use crate::error::AgentError;
use crate::library::AgentApi;
use crate::telemetry::AgentMetrics;

pub const DEFAULT_BACKUP_DATA: &str = "some data";
pub const DEFAULT_BACKUP_PATH: &str = "/path/to/backup";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRequest {
    pub data: Vec<u8>,
    pub path: PathBuf,
}

impl Default for BackupRequest {
    fn default() -> Self {
        Self {
            data: DEFAULT_BACKUP_DATA.as_bytes().to_vec(),
            path: PathBuf::from(DEFAULT_BACKUP_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub path: PathBuf,
    pub dest: PathBuf,
}

/// Creates an agent, backs up `request.data` to `request.path` and releases the agent.
pub fn run_backup<A: AgentApi + ?Sized>(
    api: &A,
    request: &BackupRequest,
    metrics: &AgentMetrics,
) -> Result<(), AgentError> {
    tracing::info!(
        size = request.data.len(),
        path = %request.path.display(),
        "starting backup"
    );
    let started = Instant::now();

    let result =
        Agent::create(api).and_then(|agent| agent.backup(&request.data, &request.path));

    metrics.record_backup(request.data.len(), started.elapsed(), result.is_ok());
    match &result {
        Ok(()) => tracing::info!(elapsed = ?started.elapsed(), "backup completed"),
        Err(err) => tracing::error!("backup failed: {err}"),
    }
    result
}

/// Creates an agent, restores `request.path` into `request.dest` and releases the agent.
pub fn run_restore<A: AgentApi + ?Sized>(
    api: &A,
    request: &RestoreRequest,
    metrics: &AgentMetrics,
) -> Result<(), AgentError> {
    tracing::info!(
        path = %request.path.display(),
        dest = %request.dest.display(),
        "starting restore"
    );

    let result =
        Agent::create(api).and_then(|agent| agent.restore(&request.path, &request.dest));

    metrics.record_restore(result.is_ok());
    if let Err(err) = &result {
        tracing::error!("restore failed: {err}");
    }
    result
}

#[cfg(test)]
mod tests {
    use agent_abi::AgentStatus;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::agent::tests::Call;
    use crate::agent::tests::RecordingApi;
    use crate::telemetry::Telemetry;

    fn metrics() -> AgentMetrics {
        Telemetry::disabled().metrics().clone()
    }

    #[test]
    fn default_request_uses_built_in_payload() {
        let request = BackupRequest::default();
        assert_eq!(request.data.len(), 9);
        assert_eq!(request.path.as_os_str().len(), 15);
    }

    #[test_log::test]
    fn backup_session_follows_create_backup_release() {
        let api = RecordingApi::default();

        run_backup(&api, &BackupRequest::default(), &metrics()).unwrap();

        assert_eq!(
            api.calls(),
            vec![
                Call::Create,
                Call::Backup {
                    agent: 0x1000,
                    data_len: 9,
                    path_len: 15,
                    data: b"some data".to_vec(),
                    path: b"/path/to/backup".to_vec(),
                },
                Call::Destroy { agent: 0x1000 },
            ]
        );
    }

    #[test]
    fn backup_session_skips_backup_on_null_handle() {
        let api = RecordingApi::default();
        api.handle.set(0);

        let err = run_backup(&api, &BackupRequest::default(), &metrics()).unwrap_err();

        assert!(matches!(err, AgentError::NullHandle));
        assert_eq!(api.calls(), vec![Call::Create]);
    }

    #[test]
    fn backup_session_reports_failure_and_still_releases() {
        let api = RecordingApi {
            backup_status: AgentStatus::Io.code(),
            ..RecordingApi::default()
        };

        let err = run_backup(&api, &BackupRequest::default(), &metrics()).unwrap_err();

        assert_eq!(err.status(), Some(AgentStatus::Io.code()));
        assert_eq!(api.calls().last(), Some(&Call::Destroy { agent: 0x1000 }));
    }

    #[test]
    fn restore_session_follows_create_restore_release() {
        let api = RecordingApi::default();
        let request = RestoreRequest {
            path: PathBuf::from("/path/to/backup"),
            dest: PathBuf::from("/restore/here"),
        };

        run_restore(&api, &request, &metrics()).unwrap();

        assert_eq!(
            api.calls(),
            vec![
                Call::Create,
                Call::Restore {
                    agent: 0x1000,
                    path: b"/path/to/backup".to_vec(),
                    dest: b"/restore/here".to_vec(),
                },
                Call::Destroy { agent: 0x1000 },
            ]
        );
    }
}
