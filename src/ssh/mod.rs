//! SSH glue
//!
//! Everything needed around a stored connection that is not the store itself:
//! discovering private keys under `~/.ssh` and handing a connection off to the
//! system `ssh` binary.

pub mod keys;
pub mod launch;

pub use keys::{default_ssh_dir, expand_tilde, list_available_keys, KeyEntry};
pub use launch::{connect, ssh_args, LaunchError, SSH_PROGRAM};
