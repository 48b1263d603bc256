//! Password-based envelope encryption
//!
//! Stateless helpers that turn a master password into a content key and seal
//! any serializable value into an [`Envelope`]. Nothing in here knows about
//! workspaces or connections.

pub mod cipher;
pub mod envelope;
pub mod error;

pub use cipher::{decrypt, derive_key, encrypt, DerivedKey};
pub use envelope::{kdf_flags, Envelope, KEY_LEN, NONCE_LEN, SALT_LEN, TAG_LEN};
pub use error::CryptoError;
