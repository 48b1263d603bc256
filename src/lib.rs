//! ssh-manager - encrypted SSH connection profiles grouped into workspaces
//!
//! The store is a single file sealed with a key derived from the master
//! password. Connecting hands the selected profile to the system `ssh`.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod ssh;

use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::menu::Menu;
use cli::prompt::{self, Prompter};
use cli::{Cli, CliError};
use config::{Session, WorkspaceStore};

/// Initialize logging
fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn reset(store: &WorkspaceStore) -> Result<(), CliError> {
    if store.remove().await? {
        println!("Database reset successfully.");
    } else {
        println!("Database was already empty.");
    }
    Ok(())
}

async fn interactive(store: WorkspaceStore, connection: Option<String>) -> Result<(), CliError> {
    let mut session = Session::new(store);
    let creating = !session.store().exists().await;

    let password = prompt::master_password(creating)?;
    let unlocked = session.unlock(&password).await?;
    drop(password);

    let mut menu = Menu::new(unlocked, Prompter::stdio());
    let result = match connection {
        Some(name) => menu.connect(Some(&name)).await,
        None => menu.run().await,
    };
    drop(menu);

    session.lock();
    result
}

pub async fn run(cli: Cli) -> ExitCode {
    init_logging();

    let store = match cli.store {
        Some(path) => WorkspaceStore::with_path(path),
        None => match WorkspaceStore::new() {
            Ok(store) => store,
            Err(e) => {
                eprintln!("Fatal error: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };
    tracing::debug!("Using store {:?}", store.path());

    let result = if cli.reset {
        reset(&store).await
    } else {
        interactive(store, cli.connection).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.report());
            ExitCode::from(e.exit_code())
        }
    }
}
