//! Payload encryption at rest.
//!
//! Payloads are sealed with AES-256-GCM. The stored form is the 12-byte nonce
//! followed by the ciphertext and its authentication tag.

use std::fmt;
use std::str::FromStr;

use aes_gcm::aead::Aead;
use aes_gcm::aead::AeadCore;
use aes_gcm::aead::KeyInit;
use aes_gcm::aead::OsRng;
use aes_gcm::Aes256Gcm;
use aes_gcm::Key;
use aes_gcm::Nonce;

use crate::error::AgentError;

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// AES-256 key, parsed from 64 hex characters.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }

    /// Encrypts `plaintext` under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, AgentError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher()
            .encrypt(&nonce, plaintext)
            .map_err(|_| AgentError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypts a payload produced by [`EncryptionKey::seal`]. `None` means the
    /// key is wrong or the payload was modified.
    pub fn open(&self, sealed: &[u8]) -> Option<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .ok()
    }
}

impl FromStr for EncryptionKey {
    type Err = AgentError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(raw.trim()).map_err(|e| AgentError::InvalidKey(e.to_string()))?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            AgentError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(key))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    const KEY_HEX: &str = "4e6f742061207265616c206b6579206275742069747320333220627974657321";

    #[test]
    fn sealed_payload_opens_with_same_key() {
        let key: EncryptionKey = KEY_HEX.parse().unwrap();

        let sealed = key.seal(b"some data").unwrap();

        assert_eq!(sealed.len(), NONCE_LEN + 9 + 16);
        assert_ne!(&sealed[NONCE_LEN..NONCE_LEN + 9], b"some data");
        assert_eq!(key.open(&sealed), Some(b"some data".to_vec()));
    }

    #[test]
    fn each_seal_uses_a_fresh_nonce() {
        let key = EncryptionKey::new([7; KEY_LEN]);
        assert_ne!(key.seal(b"x").unwrap(), key.seal(b"x").unwrap());
    }

    #[test]
    fn wrong_key_or_truncated_payload_does_not_open() {
        let sealed = EncryptionKey::new([1; KEY_LEN]).seal(b"some data").unwrap();

        assert_eq!(EncryptionKey::new([2; KEY_LEN]).open(&sealed), None);
        assert_eq!(EncryptionKey::new([1; KEY_LEN]).open(&sealed[..5]), None);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(matches!(
            "not hex".parse::<EncryptionKey>(),
            Err(AgentError::InvalidKey(_))
        ));
        assert!(matches!(
            "abcd".parse::<EncryptionKey>(),
            Err(AgentError::InvalidKey(_))
        ));
        assert!(format!(" {KEY_HEX}\n").parse::<EncryptionKey>().is_ok());
    }

    #[test]
    fn debug_output_hides_key_material() {
        let key = EncryptionKey::new([0xab; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "EncryptionKey(..)");
    }
}
