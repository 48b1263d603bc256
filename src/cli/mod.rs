//! Command-line entry: argument parsing, prompts and the interactive menu

pub mod menu;
pub mod prompt;

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::StoreError;
use crate::ssh::LaunchError;

/// Exit code for a wrong master password, distinct from other failures
pub const EXIT_INCORRECT_PASSWORD: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "ssh-manager")]
#[command(version, about = "Encrypted SSH connection manager with workspaces", long_about = None)]
pub struct Cli {
    /// Delete the encrypted store and exit
    #[arg(short, long)]
    pub reset: bool,

    /// Path of the encrypted store file
    #[arg(long, env = "SSH_MANAGER_STORE", value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Connect directly to this connection in the active workspace
    pub connection: Option<String>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("Terminal error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Store(StoreError::IncorrectPassword) => EXIT_INCORRECT_PASSWORD,
            // Direct connect to an unknown name is reported, not a failure
            CliError::Store(StoreError::ConnectionNotFound { .. }) => 0,
            _ => 1,
        }
    }

    /// Line printed to stderr before exiting with [`exit_code`](Self::exit_code)
    pub fn report(&self) -> String {
        match self {
            CliError::Store(StoreError::IncorrectPassword) => {
                "\nError: Incorrect master password".to_string()
            }
            CliError::Store(e @ StoreError::ConnectionNotFound { .. }) => e.to_string(),
            e => format!("Fatal error: {}", e),
        }
    }

    /// Errors reported inside the menu loop without leaving it
    pub fn is_recoverable(&self) -> bool {
        match self {
            CliError::Store(e) => e.is_recoverable(),
            CliError::Launch(_) => true,
            CliError::Io(_) => false,
        }
    }
}
