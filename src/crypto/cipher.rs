//! Key derivation and AEAD operations for store envelopes

use aes_gcm::Aes256Gcm;
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, KeyInit, Nonce};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::envelope::{kdf_flags, Envelope, KEY_LEN, NONCE_LEN, SALT_LEN, TAG_LEN};
use super::error::CryptoError;

/// Key derivation and cipher selected by `kdfVersion`
enum Suite {
    /// Envelopes written without `kdfVersion`: PBKDF2-HMAC-SHA256 with AES-256-GCM
    Legacy { rounds: u32 },
    /// Argon2id with ChaCha20-Poly1305
    Argon2id {
        memory_cost: u32, // in KB
        iterations: u32,
        parallelism: u32,
    },
}

impl Suite {
    fn for_version(version: u32) -> Result<Self, CryptoError> {
        match version {
            kdf_flags::KDF_LEGACY => Ok(Suite::Legacy { rounds: 100_000 }),
            kdf_flags::KDF_V1 => Ok(Suite::Argon2id {
                memory_cost: 65536, // 64 MB
                iterations: 3,
                parallelism: 4,
            }),
            _ => Err(CryptoError::UnsupportedKdfVersion(version)),
        }
    }

    fn derive(
        &self,
        password: &str,
        salt: &[u8; SALT_LEN],
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);

        match *self {
            Suite::Legacy { rounds } => {
                pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut *key);
            }
            Suite::Argon2id {
                memory_cost,
                iterations,
                parallelism,
            } => {
                let params = Params::new(memory_cost, iterations, parallelism, Some(KEY_LEN))
                    .map_err(|_| CryptoError::KeyDerivation)?;

                Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                    .hash_password_into(password.as_bytes(), salt, &mut *key)
                    .map_err(|_| CryptoError::KeyDerivation)?;
            }
        }

        Ok(key)
    }

    /// Encrypt, returning ciphertext with the tag appended
    fn seal(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let nonce = Nonce::from_slice(nonce);
        let sealed = match self {
            Suite::Legacy { .. } => Aes256Gcm::new_from_slice(key)
                .map_err(|_| CryptoError::KeyDerivation)?
                .encrypt(nonce, plaintext),
            Suite::Argon2id { .. } => ChaCha20Poly1305::new_from_slice(key)
                .map_err(|_| CryptoError::KeyDerivation)?
                .encrypt(nonce, plaintext),
        };
        sealed.map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Verify the tag and decrypt
    fn open(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        sealed: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let nonce = Nonce::from_slice(nonce);
        let opened = match self {
            Suite::Legacy { .. } => Aes256Gcm::new_from_slice(key)
                .map_err(|_| CryptoError::KeyDerivation)?
                .decrypt(nonce, sealed),
            Suite::Argon2id { .. } => ChaCha20Poly1305::new_from_slice(key)
                .map_err(|_| CryptoError::KeyDerivation)?
                .decrypt(nonce, sealed),
        };
        opened.map_err(|_| CryptoError::AuthenticationFailed)
    }
}

/// A content key together with the salt it was derived from
pub struct DerivedKey {
    pub key: Zeroizing<[u8; KEY_LEN]>,
    pub salt: [u8; SALT_LEN],
}

/// Derive a content key from the master password.
///
/// A fresh random salt is generated when `salt` is `None`. The result is
/// deterministic for a given password, salt and KDF version, which is what lets
/// [`decrypt`] re-derive the key from the salt stored in the envelope.
pub fn derive_key(
    password: &str,
    salt: Option<[u8; SALT_LEN]>,
    kdf_version: u32,
) -> Result<DerivedKey, CryptoError> {
    let suite = Suite::for_version(kdf_version)?;

    let salt = salt.unwrap_or_else(|| {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        salt
    });

    let key = suite.derive(password, &salt)?;
    Ok(DerivedKey { key, salt })
}

/// Serialize `value` and seal it under a key derived from `password`.
///
/// Every call uses a new salt and nonce, so encrypting the same value twice
/// never produces the same envelope. New envelopes always use
/// [`kdf_flags::CURRENT_KDF`].
pub fn encrypt<T: Serialize + ?Sized>(value: &T, password: &str) -> Result<Envelope, CryptoError> {
    encrypt_with_version(value, password, kdf_flags::CURRENT_KDF)
}

fn encrypt_with_version<T: Serialize + ?Sized>(
    value: &T,
    password: &str,
    kdf_version: u32,
) -> Result<Envelope, CryptoError> {
    let suite = Suite::for_version(kdf_version)?;
    let derived = derive_key(password, None, kdf_version)?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let plaintext = Zeroizing::new(serde_json::to_vec(value)?);
    let ciphertext = suite.seal(&derived.key, &nonce, plaintext.as_slice())?;

    // Both ciphers append the 16-byte tag to the ciphertext
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::EncryptionFailed);
    }

    let (encrypted_data, tag_slice) = ciphertext.split_at(ciphertext.len() - TAG_LEN);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(tag_slice);

    Ok(Envelope::from_parts(
        encrypted_data,
        &nonce,
        &tag,
        &derived.salt,
        kdf_version,
    ))
}

/// Open an envelope and deserialize its plaintext.
///
/// Returns [`CryptoError::AuthenticationFailed`] when the tag does not verify,
/// which is how a wrong master password shows up.
pub fn decrypt<T: DeserializeOwned>(envelope: &Envelope, password: &str) -> Result<T, CryptoError> {
    // Decode every field before spending time on the KDF
    let suite = Suite::for_version(envelope.kdf_version)?;
    let salt = envelope.salt()?;
    let nonce = envelope.nonce()?;
    let tag = envelope.tag()?;
    let mut ciphertext_with_tag = envelope.ciphertext()?;
    ciphertext_with_tag.extend_from_slice(&tag);

    let key = suite.derive(password, &salt)?;
    let plaintext = Zeroizing::new(suite.open(&key, &nonce, &ciphertext_with_tag)?);

    Ok(serde_json::from_slice(&plaintext)?)
}
