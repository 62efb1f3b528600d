//! Radio alarm clock CLI - wakes you with internet radio or a playlist
//!
//! The `daemon` subcommand hosts the alarm engine; every other subcommand
//! talks to the running daemon over a Unix socket.

use anyhow::Result;
use clap::{CommandFactory, Parser};

use mezamashi::cli::{Cli, Commands, Display, IpcClient};
use mezamashi::daemon::{self, DaemonOptions};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let cli = Cli::parse();

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&e.to_string());
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    match cli.command {
        Some(Commands::Add(args)) => {
            let client = IpcClient::new()?;
            let response = client.add(&args).await?;
            if response.status == "success" {
                Display::show_add_success(&response);
            } else {
                Display::show_error(&response.message);
            }
        }
        Some(Commands::List) => {
            let client = IpcClient::new()?;
            let response = client.list().await?;
            Display::show_list(&response);
        }
        Some(Commands::Enable { id }) => {
            let client = IpcClient::new()?;
            let response = client.enable(&id).await?;
            Display::show_message(&response);
        }
        Some(Commands::Disable { id }) => {
            let client = IpcClient::new()?;
            let response = client.disable(&id).await?;
            Display::show_message(&response);
        }
        Some(Commands::Delete { id }) => {
            let client = IpcClient::new()?;
            let response = client.delete(&id).await?;
            Display::show_message(&response);
        }
        Some(Commands::Snooze { minutes }) => {
            let client = IpcClient::new()?;
            let response = client.snooze(minutes).await?;
            Display::show_message(&response);
        }
        Some(Commands::Stop) => {
            let client = IpcClient::new()?;
            let response = client.stop().await?;
            Display::show_message(&response);
        }
        Some(Commands::Status) => {
            let client = IpcClient::new()?;
            let response = client.status().await?;
            Display::show_status(&response);
        }
        Some(Commands::Preview(args)) => {
            let client = IpcClient::new()?;
            let response = client.preview(&args).await?;
            Display::show_message(&response);
        }
        Some(Commands::PreviewStop) => {
            let client = IpcClient::new()?;
            let response = client.preview_stop().await?;
            Display::show_message(&response);
        }
        Some(Commands::Daemon) => {
            let options = DaemonOptions::resolve()?;
            daemon::run(options).await?;
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
