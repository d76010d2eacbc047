//! At-rest encryption of provider credentials.
//!
//! Credentials are sealed with AES-256-GCM under a fresh random 128-bit nonce.
//! The sealed form is a JSON envelope:
//!
//! ```json
//! {"v":1,"iv":"<hex nonce>","ciphertext":"<hex>","tag":"<hex auth tag>"}
//! ```
//!
//! The vault only ever emits and consumes well-formed envelopes. Tolerating
//! legacy plaintext rows is the factory's job.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;
use zeroize::Zeroizing;

/// Current envelope schema version.
pub const SCHEMA_VERSION: u32 = 1;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// Seed for the development-only key. Anyone can derive it.
const INSECURE_KEY_SEED: &str = "sms-gateway-insecure-development-key";

type VaultCipher = AesGcm<Aes256, U16>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("CREDENTIAL_ENCRYPTION_KEY is required in production")]
    MissingKey,

    #[error("encryption key must be {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("encryption key is neither hex nor base64")]
    InvalidKeyEncoding,

    #[error("malformed credential envelope: {0}")]
    MalformedEnvelope(String),

    #[error("unsupported credential envelope version {0}")]
    UnsupportedVersion(u32),

    /// Wrong key or tampered envelope.
    #[error("credential envelope failed authentication")]
    Authentication,

    #[error("credential encryption failed")]
    Encryption,
}

/// A sealed credential blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    #[serde(rename = "v")]
    pub schema_version: u32,
    /// Hex nonce.
    pub iv: String,
    /// Hex ciphertext.
    pub ciphertext: String,
    /// Hex authentication tag.
    pub tag: String,
}

impl SealedEnvelope {
    /// Whether a JSON value carries the envelope fields.
    pub fn is_envelope(value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|obj| obj.contains_key("iv") && obj.contains_key("tag") && obj.contains_key("ciphertext"))
    }
}

/// Symmetric authenticated encryption of credential blobs.
pub struct CredentialVault {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Parse a key given as hex (optionally `hex:`-prefixed) or base64.
    pub fn from_key_str(encoded: &str) -> Result<Self, VaultError> {
        Ok(Self::new(decode_key(encoded)?))
    }

    /// Build the vault from configuration.
    ///
    /// Without a key, production refuses to start and every other
    /// environment falls back to a well-known key with a warning.
    pub fn from_settings(key: Option<&str>, production: bool) -> Result<Self, VaultError> {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(encoded) => Self::from_key_str(encoded),
            None if production => Err(VaultError::MissingKey),
            None => {
                warn!(
                    "!!! CREDENTIAL_ENCRYPTION_KEY is not set: using the INSECURE development key. \
                     Stored provider credentials can be decrypted by anyone. Never run this in production. !!!"
                );
                Ok(Self::insecure_development())
            }
        }
    }

    fn insecure_development() -> Self {
        let digest = Sha256::digest(INSECURE_KEY_SEED.as_bytes());
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&digest);
        Self::new(key)
    }

    fn cipher(&self) -> Result<VaultCipher, VaultError> {
        VaultCipher::new_from_slice(self.key.as_slice()).map_err(|_| VaultError::InvalidKeyLength(KEY_LEN))
    }

    /// Seal plaintext into an envelope.
    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedEnvelope, VaultError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher()?
            .encrypt_in_place_detached(Nonce::<U16>::from_slice(&nonce), b"", &mut buffer)
            .map_err(|_| VaultError::Encryption)?;

        Ok(SealedEnvelope {
            schema_version: SCHEMA_VERSION,
            iv: hex::encode(nonce),
            ciphertext: hex::encode(&buffer),
            tag: hex::encode(tag),
        })
    }

    /// Open an envelope. Fails on a wrong key, tampering or a malformed envelope.
    pub fn open(&self, envelope: &SealedEnvelope) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        if envelope.schema_version != SCHEMA_VERSION {
            return Err(VaultError::UnsupportedVersion(envelope.schema_version));
        }

        let nonce = decode_field("iv", &envelope.iv, Some(NONCE_LEN))?;
        let tag = decode_field("tag", &envelope.tag, Some(TAG_LEN))?;
        let mut buffer = Zeroizing::new(decode_field("ciphertext", &envelope.ciphertext, None)?);

        self.cipher()?
            .decrypt_in_place_detached(
                Nonce::<U16>::from_slice(&nonce),
                b"",
                buffer.as_mut_slice(),
                Tag::<U16>::from_slice(&tag),
            )
            .map_err(|_| VaultError::Authentication)?;

        Ok(buffer)
    }

    /// Encrypt a string into a serialized envelope.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let envelope = self.seal(plaintext.as_bytes())?;
        serde_json::to_string(&envelope).map_err(|e| VaultError::MalformedEnvelope(e.to_string()))
    }

    /// Decrypt a serialized envelope produced by [`CredentialVault::encrypt`].
    pub fn decrypt(&self, sealed: &str) -> Result<Zeroizing<String>, VaultError> {
        let envelope: SealedEnvelope = serde_json::from_str(sealed)
            .map_err(|e| VaultError::MalformedEnvelope(e.to_string()))?;
        let plaintext = self.open(&envelope)?;
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| VaultError::MalformedEnvelope("plaintext is not UTF-8".to_string()))?;
        Ok(Zeroizing::new(text.to_string()))
    }
}

fn decode_field(name: &str, value: &str, expected_len: Option<usize>) -> Result<Vec<u8>, VaultError> {
    let bytes = hex::decode(value)
        .map_err(|_| VaultError::MalformedEnvelope(format!("{name} is not hex")))?;
    if let Some(len) = expected_len {
        if bytes.len() != len {
            return Err(VaultError::MalformedEnvelope(format!(
                "{name} must be {len} bytes, got {}",
                bytes.len()
            )));
        }
    }
    Ok(bytes)
}

fn decode_key(encoded: &str) -> Result<[u8; KEY_LEN], VaultError> {
    let encoded = encoded.trim();
    let bytes = if let Some(hex_key) = encoded.strip_prefix("hex:") {
        hex::decode(hex_key).map_err(|_| VaultError::InvalidKeyEncoding)?
    } else if encoded.len() == KEY_LEN * 2 && encoded.chars().all(|c| c.is_ascii_hexdigit()) {
        hex::decode(encoded).map_err(|_| VaultError::InvalidKeyEncoding)?
    } else {
        BASE64
            .decode(encoded)
            .map_err(|_| VaultError::InvalidKeyEncoding)?
    };

    let bytes = Zeroizing::new(bytes);
    if bytes.len() != KEY_LEN {
        return Err(VaultError::InvalidKeyLength(bytes.len()));
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}
