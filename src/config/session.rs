//! Session state
//!
//! A session starts locked and becomes unlocked once the store has been
//! decrypted with the master password. Only an unlocked session holds the
//! password and the document, and only it can mutate the store.

use zeroize::Zeroizing;

use super::storage::{StoreError, WorkspaceStore, MIN_PASSWORD_LEN};
use super::types::{Connection, Document, Workspace};

/// A store plus, once unlocked, the password and decrypted document.
///
/// `unlocked` is `None` while locked.
#[derive(Debug)]
pub struct Session {
    store: WorkspaceStore,
    unlocked: Option<UnlockedSession>,
}

impl Session {
    pub fn new(store: WorkspaceStore) -> Self {
        Self {
            store,
            unlocked: None,
        }
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    /// Load the store with `password`.
    ///
    /// On failure the session stays locked and nothing is cached. Unlocking an
    /// already unlocked session is a no-op.
    pub async fn unlock(&mut self, password: &str) -> Result<&mut UnlockedSession, StoreError> {
        match self.unlocked {
            Some(ref mut session) => Ok(session),
            None => {
                if password.chars().count() < MIN_PASSWORD_LEN {
                    return Err(StoreError::PasswordTooShort);
                }

                let document = self.store.load(password).await?;
                Ok(self.unlocked.insert(UnlockedSession {
                    store: self.store.clone(),
                    password: Zeroizing::new(password.to_string()),
                    document,
                }))
            }
        }
    }

    /// Drop the cached password and document
    pub fn lock(&mut self) {
        if self.unlocked.take().is_some() {
            tracing::debug!("Session for {:?} locked", self.store.path());
        }
    }
}

/// An authenticated session with the decrypted document loaded
pub struct UnlockedSession {
    store: WorkspaceStore,
    password: Zeroizing<String>,
    document: Document,
}

impl std::fmt::Debug for UnlockedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockedSession")
            .field("store", &self.store)
            .field("password", &"<redacted>")
            .field("workspaces", &self.document.workspaces.len())
            .finish()
    }
}

impl UnlockedSession {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn active_workspace(&self) -> Option<&str> {
        self.document.active_workspace()
    }

    /// Apply `apply` to a copy of the document, persist it, then commit.
    ///
    /// Nothing changes in memory when either step fails.
    async fn commit<R>(
        &mut self,
        apply: impl FnOnce(&mut Document) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut draft = self.document.clone();
        let result = apply(&mut draft)?;
        self.store.save(&draft, &self.password).await?;
        self.document = draft;
        Ok(result)
    }

    pub async fn create_workspace(&mut self, name: &str) -> Result<&Workspace, StoreError> {
        self.commit(|doc| doc.create_workspace(name).map(|_| ()))
            .await?;
        tracing::info!("Workspace {:?} created", name);
        self.document.workspace(name)
    }

    pub async fn select_workspace(&mut self, name: &str) -> Result<(), StoreError> {
        self.commit(|doc| doc.select_workspace(name)).await
    }

    pub async fn remove_workspace(&mut self, name: &str) -> Result<Workspace, StoreError> {
        let removed = self.commit(|doc| doc.remove_workspace(name)).await?;
        tracing::info!("Workspace {:?} removed", name);
        Ok(removed)
    }

    pub async fn add_connection(
        &mut self,
        workspace: &str,
        name: &str,
        connection: Connection,
    ) -> Result<(), StoreError> {
        self.commit(|doc| doc.add_connection(workspace, name, connection))
            .await?;
        tracing::info!("Connection {:?} added to workspace {:?}", name, workspace);
        Ok(())
    }

    pub async fn remove_connection(
        &mut self,
        workspace: &str,
        name: &str,
    ) -> Result<Connection, StoreError> {
        self.commit(|doc| doc.remove_connection(workspace, name))
            .await
    }
}
