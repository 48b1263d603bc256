use clap::Parser;
use ssh_manager_lib::cli::Cli;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    ssh_manager_lib::run(cli).await
}
