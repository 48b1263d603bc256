//! SSH key discovery
//!
//! Lists candidate private keys in `~/.ssh`, skipping public keys,
//! known_hosts, config and authorized_keys files.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A private key file offered when adding a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    /// File name shown to the user
    pub name: String,
    /// Full path stored in the connection
    pub path: PathBuf,
}

/// Get the default SSH directory (~/.ssh)
pub fn default_ssh_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh"))
}

/// Expand ~ to home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    } else if path_str == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    path.to_path_buf()
}

fn is_excluded(file_name: &str) -> bool {
    file_name.ends_with(".pub")
        || file_name.starts_with("known_hosts")
        || file_name.ends_with(".known_hosts")
        || file_name == "config"
        || file_name.ends_with(".config")
        || file_name.starts_with("authorized_keys")
        || file_name.starts_with('.')
}

/// List key files in `dir`, sorted by name.
///
/// An unreadable directory yields an empty list.
pub fn list_available_keys(dir: &Path) -> Vec<KeyEntry> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read SSH directory {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut keys: Vec<KeyEntry> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_excluded(&name) {
                return None;
            }
            Some(KeyEntry {
                name,
                path: entry.path(),
            })
        })
        .collect();

    keys.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Found {} key candidates in {:?}", keys.len(), dir);
    keys
}
