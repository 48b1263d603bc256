//! Store document types
//!
//! These are the plaintext shapes sealed inside the store envelope. Field
//! names are camelCase on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::storage::StoreError;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// A saved remote-login profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub host: String,
    pub username: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            port: DEFAULT_PORT,
            key_path: None,
            created_at: Utc::now(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.host.trim().is_empty() {
            return Err(StoreError::InvalidConnection("host cannot be empty".into()));
        }
        if self.username.trim().is_empty() {
            return Err(StoreError::InvalidConnection(
                "username cannot be empty".into(),
            ));
        }
        if self.port == 0 {
            return Err(StoreError::InvalidConnection("port cannot be 0".into()));
        }
        Ok(())
    }
}

/// A named group of connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(default)]
    pub connections: BTreeMap<String, Connection>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            connections: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// The decrypted store payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub workspaces: BTreeMap<String, Workspace>,
    #[serde(default)]
    pub last_workspace: Option<String>,
}

impl Document {
    /// Name of the active workspace, if it still exists
    pub fn active_workspace(&self) -> Option<&str> {
        self.last_workspace
            .as_deref()
            .filter(|name| self.workspaces.contains_key(*name))
    }

    pub fn workspace(&self, name: &str) -> Result<&Workspace, StoreError> {
        self.workspaces
            .get(name)
            .ok_or_else(|| StoreError::WorkspaceNotFound(name.to_string()))
    }

    pub fn workspace_names(&self) -> Vec<&str> {
        self.workspaces.keys().map(String::as_str).collect()
    }

    /// Create an empty workspace and make it the active one
    /// Add and select a new workspace. An empty name counts as a duplicate.
    pub fn create_workspace(&mut self, name: &str) -> Result<&Workspace, StoreError> {
        if name.trim().is_empty() || self.workspaces.contains_key(name) {
            return Err(StoreError::DuplicateWorkspace(name.to_string()));
        }

        self.workspaces.insert(name.to_string(), Workspace::new());
        self.last_workspace = Some(name.to_string());
        self.workspace(name)
    }

    pub fn select_workspace(&mut self, name: &str) -> Result<(), StoreError> {
        if !self.workspaces.contains_key(name) {
            return Err(StoreError::WorkspaceNotFound(name.to_string()));
        }
        self.last_workspace = Some(name.to_string());
        Ok(())
    }

    /// Remove a workspace and everything in it.
    ///
    /// Clears `last_workspace` when it pointed at the removed workspace.
    pub fn remove_workspace(&mut self, name: &str) -> Result<Workspace, StoreError> {
        let removed = self
            .workspaces
            .remove(name)
            .ok_or_else(|| StoreError::WorkspaceNotFound(name.to_string()))?;

        if self.last_workspace.as_deref() == Some(name) {
            self.last_workspace = None;
        }
        Ok(removed)
    }

    pub fn connection(&self, workspace: &str, name: &str) -> Result<&Connection, StoreError> {
        self.workspace(workspace)?
            .connections
            .get(name)
            .ok_or_else(|| StoreError::ConnectionNotFound {
                workspace: workspace.to_string(),
                name: name.to_string(),
            })
    }

    /// Insert a connection; `created_at` is stamped at insertion time
    pub fn add_connection(
        &mut self,
        workspace: &str,
        name: &str,
        mut connection: Connection,
    ) -> Result<(), StoreError> {
        let target = self
            .workspaces
            .get_mut(workspace)
            .ok_or_else(|| StoreError::WorkspaceNotFound(workspace.to_string()))?;

        validate_name(name)?;
        connection.validate()?;

        if target.connections.contains_key(name) {
            return Err(StoreError::DuplicateConnection {
                workspace: workspace.to_string(),
                name: name.to_string(),
            });
        }

        connection.created_at = Utc::now();
        target.connections.insert(name.to_string(), connection);
        Ok(())
    }

    pub fn remove_connection(
        &mut self,
        workspace: &str,
        name: &str,
    ) -> Result<Connection, StoreError> {
        self.workspaces
            .get_mut(workspace)
            .ok_or_else(|| StoreError::WorkspaceNotFound(workspace.to_string()))?
            .connections
            .remove(name)
            .ok_or_else(|| StoreError::ConnectionNotFound {
                workspace: workspace.to_string(),
                name: name.to_string(),
            })
    }

    /// Drop a `last_workspace` that names no workspace. Returns true if changed.
    pub fn normalize(&mut self) -> bool {
        match &self.last_workspace {
            Some(name) if !self.workspaces.contains_key(name) => {
                tracing::warn!("Clearing dangling last workspace {:?}", name);
                self.last_workspace = None;
                true
            }
            _ => false,
        }
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidName);
    }
    Ok(())
}
