//! Workspace Store Module
//!
//! Handles the encrypted store file, the document it holds (workspaces and
//! their connections), legacy format migration, and the session that gates
//! access behind the master password.

pub mod migration;
pub mod session;
pub mod storage;
pub mod types;

pub use migration::{migrate_legacy, LegacyDocument, VersionedDocument, LEGACY_WORKSPACE};
pub use session::{Session, UnlockedSession};
pub use storage::{default_store_path, StoreError, WorkspaceStore, MIN_PASSWORD_LEN};
pub use types::{Connection, Document, Workspace, DEFAULT_PORT};
