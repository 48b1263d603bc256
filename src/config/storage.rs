//! Store Storage
//!
//! Reads and writes the encrypted store file.
//! Default location: ~/.ssh-manager
//!
//! There is no locking against other processes: two processes saving the same
//! file race and the last writer wins.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use zeroize::Zeroizing;

use super::migration::VersionedDocument;
use super::types::Document;
use crate::crypto::{self, CryptoError, Envelope};

/// Store file name inside the home directory
pub const STORE_FILENAME: &str = ".ssh-manager";

/// Minimum master password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to determine home directory")]
    NoConfigDir,

    #[error("Incorrect master password")]
    IncorrectPassword,

    #[error("Store file {path:?} is corrupted: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("Workspace \"{0}\" already exists")]
    DuplicateWorkspace(String),

    #[error("Connection \"{name}\" already exists in workspace \"{workspace}\"")]
    DuplicateConnection { workspace: String, name: String },

    #[error("Workspace \"{0}\" not found")]
    WorkspaceNotFound(String),

    #[error("Connection \"{name}\" not found in workspace \"{workspace}\"")]
    ConnectionNotFound { workspace: String, name: String },

    #[error("Name cannot be empty")]
    InvalidName,

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Password must be at least {} characters", MIN_PASSWORD_LEN)]
    PasswordTooShort,

    #[error("Encryption error: {0}")]
    Crypto(CryptoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Validation failures the user can fix by answering a prompt differently
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateWorkspace(_)
                | StoreError::DuplicateConnection { .. }
                | StoreError::WorkspaceNotFound(_)
                | StoreError::ConnectionNotFound { .. }
                | StoreError::InvalidName
                | StoreError::InvalidConnection(_)
                | StoreError::PasswordTooShort
        )
    }
}

/// Get the default store path (~/.ssh-manager)
pub fn default_store_path() -> Result<PathBuf, StoreError> {
    dirs::home_dir()
        .map(|home| home.join(STORE_FILENAME))
        .ok_or(StoreError::NoConfigDir)
}

/// File-backed, password-gated access to the store document
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    path: PathBuf,
}

impl WorkspaceStore {
    /// Create a store with the default path
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self {
            path: default_store_path()?,
        })
    }

    /// Create a store with a custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the store file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    fn corrupt(&self, reason: impl ToString) -> StoreError {
        StoreError::CorruptStore {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    /// Load and decrypt the store document.
    ///
    /// Returns an empty document (without creating the file) when the store
    /// does not exist yet. Legacy stores are migrated and written back before
    /// returning.
    pub async fn load(&self, password: &str) -> Result<Document, StoreError> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No store at {:?}, starting empty", self.path);
                return Ok(Document::default());
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        let envelope: Envelope =
            serde_json::from_slice(&contents).map_err(|e| self.corrupt(e))?;

        let password_owned = Zeroizing::new(password.to_string());
        let payload: Value = tokio::task::spawn_blocking(move || {
            crypto::decrypt(&envelope, &password_owned)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
        .map_err(|e| match e {
            CryptoError::AuthenticationFailed => StoreError::IncorrectPassword,
            other => self.corrupt(other),
        })?;

        let versioned = VersionedDocument::detect(payload).map_err(|e| self.corrupt(e))?;
        let needs_migration = versioned.needs_migration();

        let mut document = versioned.into_current();
        document.normalize();

        if needs_migration {
            tracing::info!("Migrating legacy store {:?} to workspaces", self.path);
            self.save(&document, password).await?;
        }

        Ok(document)
    }

    /// Encrypt the full document and atomically replace the store file.
    ///
    /// Each call derives a fresh salt and nonce.
    pub async fn save(&self, document: &Document, password: &str) -> Result<(), StoreError> {
        let document = document.clone();
        let password_owned = Zeroizing::new(password.to_string());
        let envelope = tokio::task::spawn_blocking(move || {
            crypto::encrypt(&document, &password_owned)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
        .map_err(StoreError::Crypto)?;

        let json = serde_json::to_string_pretty(&envelope)?;

        self.ensure_dir().await?;

        // Write to temp file first, then rename (atomic write)
        let temp_path = self.temp_path();
        let written = match write_private(&temp_path, json.as_bytes()).await {
            Ok(()) => fs::rename(&temp_path, &self.path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                tracing::debug!("Could not remove {:?}: {}", temp_path, cleanup);
            }
            return Err(StoreError::Io(e));
        }

        tracing::debug!("Store saved to {:?}", self.path);
        Ok(())
    }

    /// Delete the store file. Returns whether a file was removed.
    pub async fn remove(&self) -> Result<bool, StoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!("Store {:?} removed", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Store {:?} did not exist", self.path);
                Ok(false)
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Ensure the parent directory exists
    async fn ensure_dir(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| STORE_FILENAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Create or truncate `path` readable only by the owner, write `contents` and fsync
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;

    // A leftover file keeps its old mode when truncated
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }

    file.write_all(contents).await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::migration::LEGACY_WORKSPACE;
    use crate::config::types::Connection;
    use serde_json::json;
    use tempfile::tempdir;

    const PASSWORD: &str = "hunter2pass";

    fn read_envelope(path: &Path) -> Envelope {
        let contents = std::fs::read_to_string(path).unwrap();
        serde_json::from_str(&contents).unwrap()
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let store = WorkspaceStore::with_path(&path);

        let doc = store.load("any password").await.unwrap();
        assert_eq!(doc, Document::default());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = tempdir().unwrap();
        let store = WorkspaceStore::with_path(temp.path().join("store"));

        let mut doc = Document::default();
        doc.create_workspace("work").unwrap();
        doc.add_connection("work", "db", Connection::new("10.0.0.1", "ops"))
            .unwrap();

        store.save(&doc, PASSWORD).await.unwrap();

        let loaded = store.load(PASSWORD).await.unwrap();
        assert_eq!(loaded, doc);
    }

    #[tokio::test]
    async fn test_file_is_pretty_printed_envelope() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let store = WorkspaceStore::with_path(&path);

        store.save(&Document::default(), PASSWORD).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("{\n  \""));
        let value: Value = serde_json::from_str(&contents).unwrap();
        for field in ["encrypted", "iv", "authTag", "salt"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert!(!contents.contains("workspaces"));
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let temp = tempdir().unwrap();
        let store = WorkspaceStore::with_path(temp.path().join("store"));
        store.save(&Document::default(), PASSWORD).await.unwrap();

        let result = store.load("wrongpass").await;
        assert!(matches!(result, Err(StoreError::IncorrectPassword)));
    }

    #[tokio::test]
    async fn test_corrupt_json() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        std::fs::write(&path, "{ not json").unwrap();

        let result = WorkspaceStore::with_path(&path).load(PASSWORD).await;
        assert!(matches!(result, Err(StoreError::CorruptStore { path: p, .. }) if p == path));
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_corrupt() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let store = WorkspaceStore::with_path(&path);
        store.save(&Document::default(), PASSWORD).await.unwrap();

        let mut envelope = read_envelope(&path);
        envelope.iv = "abcd".to_string();
        std::fs::write(&path, serde_json::to_string(&envelope).unwrap()).unwrap();

        let result = store.load(PASSWORD).await;
        assert!(matches!(result, Err(StoreError::CorruptStore { .. })));
    }

    #[tokio::test]
    async fn test_unrecognized_payload_is_corrupt() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let envelope = crypto::encrypt(&json!({ "hello": "world" }), PASSWORD).unwrap();
        std::fs::write(&path, serde_json::to_string(&envelope).unwrap()).unwrap();

        let result = WorkspaceStore::with_path(&path).load(PASSWORD).await;
        assert!(matches!(result, Err(StoreError::CorruptStore { .. })));
    }

    #[tokio::test]
    async fn test_every_save_uses_fresh_salt_and_nonce() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let store = WorkspaceStore::with_path(&path);
        let doc = Document::default();

        store.save(&doc, PASSWORD).await.unwrap();
        let first = read_envelope(&path);
        store.save(&doc, PASSWORD).await.unwrap();
        let second = read_envelope(&path);

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.encrypted, second.encrypted);

        // The latest salt is the one used on load
        assert_eq!(store.load(PASSWORD).await.unwrap(), doc);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let temp = tempdir().unwrap();
        let store = WorkspaceStore::with_path(temp.path().join("store"));
        store.save(&Document::default(), PASSWORD).await.unwrap();
        store.save(&Document::default(), PASSWORD).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("store")]);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupied"), "x").unwrap();

        let store = WorkspaceStore::with_path(&path);
        let result = store.save(&Document::default(), PASSWORD).await;

        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_save_creates_parent_dir() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("store");
        let store = WorkspaceStore::with_path(&path);

        store.save(&Document::default(), PASSWORD).await.unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_store_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        WorkspaceStore::with_path(&path)
            .save(&Document::default(), PASSWORD)
            .await
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_private_restricts_leftover_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let path = temp.path().join("store.tmp");
        std::fs::write(&path, "stale contents that are longer").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_private(&path, b"fresh").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read(&path).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_legacy_store_is_migrated_on_disk() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let legacy = json!({
            "connections": {
                "x": {
                    "host": "legacy.example.com",
                    "username": "root",
                    "port": 22,
                    "createdAt": "2023-06-01T12:00:00.000Z"
                }
            }
        });
        let envelope = crypto::encrypt(&legacy, PASSWORD).unwrap();
        std::fs::write(&path, serde_json::to_string(&envelope).unwrap()).unwrap();

        let store = WorkspaceStore::with_path(&path);
        let doc = store.load(PASSWORD).await.unwrap();

        assert_eq!(doc.last_workspace.as_deref(), Some(LEGACY_WORKSPACE));
        assert_eq!(
            doc.connection(LEGACY_WORKSPACE, "x").unwrap().host,
            "legacy.example.com"
        );

        let on_disk: Value = crypto::decrypt(&read_envelope(&path), PASSWORD).unwrap();
        assert!(on_disk.get("connections").is_none());
        assert_eq!(on_disk["lastWorkspace"], LEGACY_WORKSPACE);
        assert_eq!(
            on_disk["workspaces"][LEGACY_WORKSPACE]["connections"]["x"]["username"],
            "root"
        );
    }

    #[tokio::test]
    async fn test_store_from_previous_release_is_migrated() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".ssh-manager");
        std::fs::write(&path, include_str!("../crypto/testdata/legacy_store.json")).unwrap();

        let store = WorkspaceStore::with_path(&path);
        let doc = store.load(PASSWORD).await.unwrap();

        let web = doc.connection(LEGACY_WORKSPACE, "web").unwrap();
        assert_eq!(web.host, "10.0.0.5");
        assert_eq!(web.username, "deploy");
        assert_eq!(web.port, 2222);
        assert_eq!(web.key_path.as_deref(), Some("/home/ops/.ssh/id_ed25519"));
        assert_eq!(doc.last_workspace.as_deref(), Some(LEGACY_WORKSPACE));

        // Written back in the current format
        let envelope = read_envelope(&path);
        assert_eq!(envelope.kdf_version, crypto::kdf_flags::CURRENT_KDF);
        let on_disk: Value = crypto::decrypt(&envelope, PASSWORD).unwrap();
        assert!(on_disk.get("connections").is_none());
        assert_eq!(
            on_disk["workspaces"][LEGACY_WORKSPACE]["connections"]["web"]["host"],
            "10.0.0.5"
        );

        assert_eq!(store.load(PASSWORD).await.unwrap(), doc);
    }

    #[tokio::test]
    async fn test_store_from_previous_release_wrong_password() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".ssh-manager");
        std::fs::write(&path, include_str!("../crypto/testdata/legacy_store.json")).unwrap();

        let result = WorkspaceStore::with_path(&path).load("wrongpass").await;
        assert!(matches!(result, Err(StoreError::IncorrectPassword)));
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let legacy = json!({ "connections": { "x": { "host": "h", "username": "u" } } });
        let envelope = crypto::encrypt(&legacy, PASSWORD).unwrap();
        std::fs::write(&path, serde_json::to_string(&envelope).unwrap()).unwrap();

        let store = WorkspaceStore::with_path(&path);
        let first = store.load(PASSWORD).await.unwrap();
        let after_migration = read_envelope(&path);

        let second = store.load(PASSWORD).await.unwrap();
        let third = store.load(PASSWORD).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(second.workspaces.len(), 1);
        // Loading a current store never rewrites it
        assert_eq!(read_envelope(&path), after_migration);
    }

    #[tokio::test]
    async fn test_remove() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let store = WorkspaceStore::with_path(&path);

        assert!(!store.remove().await.unwrap());

        store.save(&Document::default(), PASSWORD).await.unwrap();
        assert!(store.exists().await);
        assert!(store.remove().await.unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_path_for_dotfile() {
        let store = WorkspaceStore::with_path("/home/u/.ssh-manager");
        assert_eq!(store.temp_path(), PathBuf::from("/home/u/.ssh-manager.tmp"));
    }
}
