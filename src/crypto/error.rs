//! Error types for envelope encryption/decryption

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Unsupported KDF version: {0}")]
    UnsupportedKdfVersion(u32),

    #[error("Invalid envelope: {0}")]
    InvalidFormat(String),

    #[error("Encryption failed")]
    EncryptionFailed,

    /// AEAD tag mismatch. With a well-formed envelope this means the password is wrong
    /// (or the ciphertext was modified); the two cannot be told apart.
    #[error("Authentication failed (wrong password or tampered data)")]
    AuthenticationFailed,

    #[error("Key derivation failed")]
    KeyDerivation,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
