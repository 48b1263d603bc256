//! Store document versions
//!
//! Early stores kept a flat `connections` map at the top level. Current stores
//! group connections into named workspaces. Detection is purely structural and
//! conversion is a pure function, so both are tested here without touching disk.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::types::{Connection, Document, Workspace};

/// Workspace created when wrapping a legacy store
pub const LEGACY_WORKSPACE: &str = "default";

/// Pre-workspace document layout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyDocument {
    pub connections: BTreeMap<String, Connection>,
}

/// A decrypted payload classified by layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedDocument {
    Legacy(LegacyDocument),
    Current(Document),
}

/// Why a decrypted payload could not be classified
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has neither `workspaces` nor `connections`")]
    UnknownLayout,

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl VersionedDocument {
    /// Classify a decrypted payload.
    ///
    /// A top-level `workspaces` key always means the current layout, even if a
    /// stray `connections` key is also present.
    pub fn detect(value: Value) -> Result<Self, DetectError> {
        let object = value.as_object().ok_or(DetectError::NotAnObject)?;
        let has_workspaces = object.contains_key("workspaces");
        let has_connections = object.contains_key("connections");

        if has_workspaces {
            Ok(Self::Current(serde_json::from_value(value)?))
        } else if has_connections {
            Ok(Self::Legacy(serde_json::from_value(value)?))
        } else {
            Err(DetectError::UnknownLayout)
        }
    }

    pub fn needs_migration(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Convert to the current layout
    pub fn into_current(self) -> Document {
        match self {
            Self::Current(document) => document,
            Self::Legacy(legacy) => migrate_legacy(legacy),
        }
    }
}

/// Wrap legacy connections into a single selected `default` workspace
pub fn migrate_legacy(legacy: LegacyDocument) -> Document {
    let workspace = Workspace {
        connections: legacy.connections,
        created_at: Utc::now(),
    };

    let mut workspaces = BTreeMap::new();
    workspaces.insert(LEGACY_WORKSPACE.to_string(), workspace);

    Document {
        workspaces,
        last_workspace: Some(LEGACY_WORKSPACE.to_string()),
    }
}
