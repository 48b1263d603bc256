//! Interactive main menu

use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::debug;

use super::prompt::Prompter;
use super::CliError;
use crate::config::{Connection, UnlockedSession, DEFAULT_PORT};
use crate::ssh;

const CREATE_WORKSPACE: &str = "+ Create new workspace";
const NO_KEY: &str = "(no key, use ssh defaults)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Connect,
    Add,
    List,
    Switch,
    Remove,
    Quit,
}

const ACTIONS: [(Action, &str); 6] = [
    (Action::Connect, "Connect"),
    (Action::Add, "Add connection"),
    (Action::List, "List connections"),
    (Action::Switch, "Switch workspace"),
    (Action::Remove, "Remove connection"),
    (Action::Quit, "Quit"),
];

pub struct Menu<'a, R, W> {
    session: &'a mut UnlockedSession,
    prompt: Prompter<R, W>,
    ssh_dir: Option<PathBuf>,
}

impl<'a, R: BufRead, W: Write> Menu<'a, R, W> {
    pub fn new(session: &'a mut UnlockedSession, prompt: Prompter<R, W>) -> Self {
        Self {
            session,
            prompt,
            ssh_dir: ssh::default_ssh_dir(),
        }
    }

    /// Look for keys in `dir` instead of ~/.ssh
    pub fn with_ssh_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ssh_dir = Some(dir.into());
        self
    }

    pub fn prompter(&mut self) -> &mut Prompter<R, W> {
        &mut self.prompt
    }

    /// Main loop. Returns when the user quits, input ends, or no workspace is
    /// chosen on first run.
    pub async fn run(&mut self) -> Result<(), CliError> {
        loop {
            let Some(workspace) = self.active_workspace().await? else {
                return Ok(());
            };
            self.prompt.say(format!("\n[{}]\n", workspace))?;

            let labels: Vec<String> = ACTIONS.iter().map(|(_, l)| l.to_string()).collect();
            let Some(choice) = self.prompt.choose("What would you like to do?", &labels)? else {
                return Ok(());
            };

            let result = match ACTIONS[choice].0 {
                Action::Connect => self.connect(None).await,
                Action::Add => self.add_connection().await,
                Action::List => self.list_connections(),
                Action::Switch => self.switch_workspace().await.map(|_| ()),
                Action::Remove => self.remove_connection().await,
                Action::Quit => return Ok(()),
            };

            match result {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => self.prompt.say(format!("Error: {}", e))?,
                Err(e) => return Err(e),
            }
        }
    }

    /// The selected workspace, asking the user to pick or create one if needed.
    /// `None` when the user cancels.
    pub async fn active_workspace(&mut self) -> Result<Option<String>, CliError> {
        if let Some(name) = self.session.active_workspace() {
            return Ok(Some(name.to_string()));
        }
        self.switch_workspace().await
    }

    /// Pick another workspace or create one. Cancelling keeps the current one.
    async fn switch_workspace(&mut self) -> Result<Option<String>, CliError> {
        let mut names: Vec<String> = self
            .session
            .document()
            .workspace_names()
            .into_iter()
            .map(String::from)
            .collect();

        if names.is_empty() {
            self.prompt
                .say("\nNo workspaces found. Creating first workspace...")?;
            return self.create_workspace().await;
        }

        if let Some(current) = self.session.active_workspace() {
            self.prompt.say(format!("\nCurrent workspace: {}", current))?;
        }

        names.push(CREATE_WORKSPACE.to_string());
        let Some(choice) = self.prompt.choose("Choose a workspace:", &names)? else {
            return Ok(None);
        };

        if choice == names.len() - 1 {
            return self.create_workspace().await;
        }

        let name = names.swap_remove(choice);
        self.session.select_workspace(&name).await?;
        self.prompt.say(format!("Workspace \"{}\" selected.", name))?;
        Ok(Some(name))
    }

    async fn create_workspace(&mut self) -> Result<Option<String>, CliError> {
        loop {
            let Some(name) = self.prompt.required("New workspace name:")? else {
                return Ok(None);
            };

            match self.session.create_workspace(&name).await {
                Ok(_) => {
                    self.prompt
                        .say(format!("Workspace \"{}\" created and selected.", name))?;
                    return Ok(Some(name));
                }
                Err(e) if e.is_recoverable() => self.prompt.say(format!("Error: {}", e))?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn connection_names(&self, workspace: &str) -> Result<Vec<String>, CliError> {
        Ok(self
            .session
            .document()
            .workspace(workspace)?
            .connections
            .keys()
            .cloned()
            .collect())
    }

    /// Launch ssh for `name`, or for a connection picked from the active workspace
    pub async fn connect(&mut self, name: Option<&str>) -> Result<(), CliError> {
        let Some(workspace) = self.active_workspace().await? else {
            return Ok(());
        };

        let name = match name {
            Some(name) => name.to_string(),
            None => {
                let names = self.connection_names(&workspace)?;
                if names.is_empty() {
                    self.prompt
                        .say(format!("\nNo connections in workspace \"{}\"", workspace))?;
                    return Ok(());
                }
                match self.prompt.choose("Choose a connection:", &names)? {
                    Some(i) => names[i].clone(),
                    None => return Ok(()),
                }
            }
        };

        let connection = self.session.document().connection(&workspace, &name)?.clone();
        self.prompt.say(format!("\nConnecting to {}...", name))?;

        let status = ssh::connect(&name, &connection).await?;
        self.prompt.say(format!("ssh exited with {}", status))?;
        self.prompt.pause("Press Enter to return to the menu...")?;
        Ok(())
    }

    async fn add_connection(&mut self) -> Result<(), CliError> {
        let Some(workspace) = self.active_workspace().await? else {
            return Ok(());
        };

        let Some(name) = self.prompt.required("Connection name:")? else {
            return Ok(());
        };
        let Some(host) = self.prompt.required("Host:")? else {
            return Ok(());
        };
        let Some(username) = self.prompt.required("Username:")? else {
            return Ok(());
        };

        let keys = self
            .ssh_dir
            .as_deref()
            .map(ssh::list_available_keys)
            .unwrap_or_default();
        debug!("Offering {} SSH keys", keys.len());

        let mut choices: Vec<String> = keys.iter().map(|k| k.name.clone()).collect();
        choices.push(NO_KEY.to_string());
        let key_path = match self.prompt.choose("Select SSH key:", &choices)? {
            Some(i) if i < keys.len() => Some(keys[i].path.to_string_lossy().to_string()),
            _ => None,
        };

        let Some(port) = self.prompt.port("Port:", DEFAULT_PORT)? else {
            return Ok(());
        };

        let mut connection = Connection::new(host, username).port(port);
        connection.key_path = key_path;

        self.session
            .add_connection(&workspace, &name, connection)
            .await?;
        self.prompt.say(format!(
            "✓ Connection \"{}\" added to workspace \"{}\"",
            name, workspace
        ))?;
        Ok(())
    }

    fn list_connections(&mut self) -> Result<(), CliError> {
        let Some(workspace) = self.session.active_workspace().map(String::from) else {
            return Ok(());
        };
        let ws = self.session.document().workspace(&workspace)?;

        if ws.connections.is_empty() {
            self.prompt
                .say(format!("\nNo connections in workspace \"{}\"", workspace))?;
            return Ok(());
        }

        let mut lines = vec![format!("\nConnections in workspace \"{}\":", workspace)];
        for (name, conn) in &ws.connections {
            lines.push(format!("\n{}:", name));
            lines.push(format!("  Host: {}", conn.host));
            lines.push(format!("  Username: {}", conn.username));
            lines.push(format!("  Port: {}", conn.port));
            if let Some(key) = &conn.key_path {
                lines.push(format!("  Key: {}", key));
            }
        }

        for line in lines {
            self.prompt.say(line)?;
        }
        Ok(())
    }

    async fn remove_connection(&mut self) -> Result<(), CliError> {
        let Some(workspace) = self.active_workspace().await? else {
            return Ok(());
        };
        let names = self.connection_names(&workspace)?;
        if names.is_empty() {
            self.prompt
                .say(format!("\nNo connections in workspace \"{}\"", workspace))?;
            return Ok(());
        }

        let Some(i) = self.prompt.choose("Remove which connection?", &names)? else {
            return Ok(());
        };
        if !self.prompt.confirm(&format!("Remove \"{}\"?", names[i]))? {
            return Ok(());
        }

        self.session.remove_connection(&workspace, &names[i]).await?;
        self.prompt.say(format!("Connection \"{}\" removed.", names[i]))?;
        Ok(())
    }
}
