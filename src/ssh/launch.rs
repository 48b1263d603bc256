//! Hand a stored connection off to the system `ssh` client

use std::path::Path;
use std::process::ExitStatus;
use thiserror::Error;
use tracing::{info, warn};

use super::keys::expand_tilde;
use crate::config::{Connection, DEFAULT_PORT};

/// External client binary
pub const SSH_PROGRAM: &str = "ssh";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("'{0}' was not found in PATH")]
    NotFound(String),

    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Build the argument list: `-t [-p PORT] [-i KEY] user@host`
pub fn ssh_args(connection: &Connection) -> Vec<String> {
    let mut args = vec!["-t".to_string()];

    if connection.port != DEFAULT_PORT {
        args.push("-p".to_string());
        args.push(connection.port.to_string());
    }

    if let Some(key_path) = &connection.key_path {
        args.push("-i".to_string());
        args.push(expand_tilde(Path::new(key_path)).to_string_lossy().to_string());
    }

    args.push(format!("{}@{}", connection.username, connection.host));
    args
}

/// Run `ssh` with inherited stdio and wait for it to exit
pub async fn connect(name: &str, connection: &Connection) -> Result<ExitStatus, LaunchError> {
    let args = ssh_args(connection);
    info!("Connecting to {:?}: {} {}", name, SSH_PROGRAM, args.join(" "));

    let mut child = tokio::process::Command::new(SSH_PROGRAM)
        .args(&args)
        .stdin(std::process::Stdio::inherit())
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LaunchError::NotFound(SSH_PROGRAM.to_string()),
            _ => LaunchError::Spawn {
                program: SSH_PROGRAM.to_string(),
                source: e,
            },
        })?;

    let status = child.wait().await.map_err(|e| LaunchError::Spawn {
        program: SSH_PROGRAM.to_string(),
        source: e,
    })?;

    if !status.success() {
        warn!("ssh for {:?} exited with {}", name, status);
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_omitted() {
        let conn = Connection::new("10.0.0.1", "ops");
        assert_eq!(ssh_args(&conn), vec!["-t", "ops@10.0.0.1"]);
    }

    #[test]
    fn test_custom_port_and_key() {
        let conn = Connection::new("bastion.example.com", "admin")
            .port(2222)
            .key_path("/keys/id_ed25519");

        assert_eq!(
            ssh_args(&conn),
            vec![
                "-t",
                "-p",
                "2222",
                "-i",
                "/keys/id_ed25519",
                "admin@bastion.example.com"
            ]
        );
    }

    #[test]
    fn test_key_path_tilde_is_expanded() {
        let conn = Connection::new("h", "u").key_path("~/.ssh/id_rsa");
        let args = ssh_args(&conn);
        assert!(!args[2].starts_with('~'));
        assert!(args[2].ends_with("id_rsa"));
    }
}
