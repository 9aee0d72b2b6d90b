use std::env;

use crate::crypto::EncryptionKey;
use crate::error::AgentError;

/// Default payload limit: 64 MiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;
/// Default size of the in-memory block cache: 64 MiB.
pub const DEFAULT_BLOCK_CACHE_BYTES: usize = 64 * 1024 * 1024;

const MAX_PAYLOAD_BYTES_ENV: &str = "AGENT_MAX_PAYLOAD_BYTES";
const BLOCK_CACHE_BYTES_ENV: &str = "AGENT_BLOCK_CACHE_BYTES";
const ENCRYPTION_KEY_ENV: &str = "AGENT_ENCRYPTION_KEY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Largest payload a single backup call accepts
    pub max_payload_bytes: usize,
    /// Upper bound on payload bytes kept in memory after backup
    pub block_cache_bytes: usize,
    /// Payloads are encrypted at rest when set
    pub encryption_key: Option<EncryptionKey>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            block_cache_bytes: DEFAULT_BLOCK_CACHE_BYTES,
            encryption_key: None,
        }
    }
}

impl AgentConfig {
    /// Reads the configuration from the environment of the host process.
    ///
    /// Size limits fall back to their defaults when malformed. A malformed
    /// encryption key is an error, since ignoring it would store plaintext.
    pub fn from_env() -> Result<Self, AgentError> {
        Ok(Self {
            max_payload_bytes: parse_size(
                MAX_PAYLOAD_BYTES_ENV,
                env::var(MAX_PAYLOAD_BYTES_ENV).ok(),
                DEFAULT_MAX_PAYLOAD_BYTES,
            ),
            block_cache_bytes: parse_size(
                BLOCK_CACHE_BYTES_ENV,
                env::var(BLOCK_CACHE_BYTES_ENV).ok(),
                DEFAULT_BLOCK_CACHE_BYTES,
            ),
            encryption_key: parse_encryption_key(env::var(ENCRYPTION_KEY_ENV).ok())?,
        })
    }
}

fn parse_size(name: &str, raw: Option<String>, default: usize) -> usize {
    match raw {
        None => default,
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(size) => size,
            Err(e) => {
                tracing::error!("Failed to parse {name}={raw:?}: {e}, using default {default}");
                default
            }
        },
    }
}

fn parse_encryption_key(raw: Option<String>) -> Result<Option<EncryptionKey>, AgentError> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => raw.parse().map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_limit_uses_default() {
        assert_eq!(
            parse_size(MAX_PAYLOAD_BYTES_ENV, None, DEFAULT_MAX_PAYLOAD_BYTES),
            DEFAULT_MAX_PAYLOAD_BYTES
        );
    }

    #[test]
    fn limit_is_parsed_with_whitespace() {
        assert_eq!(
            parse_size(MAX_PAYLOAD_BYTES_ENV, Some(" 1024\n".to_string()), 0),
            1024
        );
    }

    #[test]
    fn malformed_limit_falls_back_to_default() {
        assert_eq!(
            parse_size(BLOCK_CACHE_BYTES_ENV, Some("lots".to_string()), 77),
            77
        );
    }

    #[test]
    fn unset_or_blank_key_disables_encryption() {
        assert_eq!(parse_encryption_key(None).unwrap(), None);
        assert_eq!(parse_encryption_key(Some("  ".to_string())).unwrap(), None);
    }

    #[test]
    fn hex_key_is_parsed() {
        let key = parse_encryption_key(Some("00".repeat(32))).unwrap();
        assert_eq!(key, Some(EncryptionKey::new([0; 32])));
    }

    #[test]
    fn malformed_key_is_an_error() {
        let err = parse_encryption_key(Some("00ff".to_string())).unwrap_err();
        assert!(matches!(err, AgentError::InvalidKey(_)));
        assert_eq!(err.status(), agent_abi::AgentStatus::Crypto);
    }
}
