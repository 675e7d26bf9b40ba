// ABOUTME: Entry point for the keyferry service.
// ABOUTME: Parses arguments, wires the transport into the dispatcher, and runs it.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use keyferry::config::Config;
use keyferry::error::Result;
use keyferry::flow::{Dispatcher, text};
use keyferry::session::Store;
use keyferry::transport::{self, ConsoleTransport, Conversation};
use keyferry::types::SessionId;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { config } => {
            let config = load_config(config)?;
            serve(config).await
        }
        Commands::CheckConfig { config } => {
            let config = load_config(config)?;
            println!("SSH port: {}", config.ssh.port);
            println!("Connect timeout: {:?}", config.ssh.connect_timeout);
            println!("Command timeout: {:?}", config.ssh.command_timeout);
            println!("Trust on first use: {}", config.ssh.trust_on_first_use);
            match &config.ssh.known_hosts {
                Some(path) => println!("Known hosts: {}", path.display()),
                None => println!("Known hosts: ~/.ssh/known_hosts"),
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let cwd = env::current_dir().expect("Failed to get current directory");
    Config::load(path.as_deref(), &cwd)
}

/// Run the dispatcher over the single-session console transport until
/// stdin closes.
async fn serve(config: Config) -> Result<()> {
    let store = Arc::new(Store::new());
    let conversation: Arc<dyn Conversation> = Arc::new(ConsoleTransport::new());
    let dispatcher = Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&conversation),
        config.client_settings(),
    );

    let (events_tx, events_rx) = mpsc::channel(64);
    tokio::spawn(transport::console::read_events(
        SessionId::CONSOLE,
        events_tx,
    ));

    conversation
        .send_prompt(SessionId::CONSOLE, text::WELCOME)
        .await?;
    conversation
        .send_prompt(SessionId::CONSOLE, text::MAIN_MENU)
        .await?;

    dispatcher.run(events_rx).await;
    Ok(())
}
