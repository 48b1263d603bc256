//! On-disk envelope format
//!
//! The store file is a small JSON object whose fields are lowercase hex:
//!
//! ```json
//! {
//!   "encrypted": "…",
//!   "iv": "<12 bytes>",
//!   "authTag": "<16 bytes>",
//!   "salt": "<16 bytes>",
//!   "kdfVersion": 1
//! }
//! ```
//!
//! `kdfVersion` is optional on read. Envelopes without it were written by the
//! previous release and open with the legacy cipher suite.

use super::error::CryptoError;
use serde::{Deserialize, Serialize};

/// Lengths of fixed-size fields
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// KDF parameter set selectors stored in `kdfVersion`
pub mod kdf_flags {
    /// Envelopes without `kdfVersion`: PBKDF2-HMAC-SHA256 (100000 rounds) and AES-256-GCM
    pub const KDF_LEGACY: u32 = 0;

    /// KDF v1: Argon2id with 64MB memory, 3 iterations, parallelism=4, and ChaCha20-Poly1305
    pub const KDF_V1: u32 = 1;

    /// Current KDF version used for new envelopes
    pub const CURRENT_KDF: u32 = KDF_V1;
}

fn default_kdf_version() -> u32 {
    kdf_flags::KDF_LEGACY
}

/// Authenticated ciphertext plus everything needed to re-derive its key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub encrypted: String,
    pub iv: String,
    pub auth_tag: String,
    pub salt: String,
    #[serde(default = "default_kdf_version")]
    pub kdf_version: u32,
}

impl Envelope {
    pub fn from_parts(
        ciphertext: &[u8],
        nonce: &[u8; NONCE_LEN],
        tag: &[u8; TAG_LEN],
        salt: &[u8; SALT_LEN],
        kdf_version: u32,
    ) -> Self {
        Self {
            encrypted: hex::encode(ciphertext),
            iv: hex::encode(nonce),
            auth_tag: hex::encode(tag),
            salt: hex::encode(salt),
            kdf_version,
        }
    }

    pub fn ciphertext(&self) -> Result<Vec<u8>, CryptoError> {
        hex::decode(&self.encrypted)
            .map_err(|e| CryptoError::InvalidFormat(format!("encrypted: {}", e)))
    }

    pub fn nonce(&self) -> Result<[u8; NONCE_LEN], CryptoError> {
        decode_fixed("iv", &self.iv)
    }

    pub fn tag(&self) -> Result<[u8; TAG_LEN], CryptoError> {
        decode_fixed("authTag", &self.auth_tag)
    }

    pub fn salt(&self) -> Result<[u8; SALT_LEN], CryptoError> {
        decode_fixed("salt", &self.salt)
    }
}

fn decode_fixed<const N: usize>(field: &str, value: &str) -> Result<[u8; N], CryptoError> {
    let bytes =
        hex::decode(value).map_err(|e| CryptoError::InvalidFormat(format!("{}: {}", field, e)))?;

    bytes.try_into().map_err(|bytes: Vec<u8>| {
        CryptoError::InvalidFormat(format!(
            "{}: expected {} bytes, got {}",
            field,
            N,
            bytes.len()
        ))
    })
}
