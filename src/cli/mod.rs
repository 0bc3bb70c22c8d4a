//! Command-line interface parsing and startup.
//!
//! This module parses arguments, discovers credentials, resolves the model,
//! and hands a ready session to the console front-end.

pub mod model_list;

use std::error::Error;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::api::models::resolve_startup_model;
use crate::core::client::{ChatClient, DEFAULT_BASE_URL};
use crate::core::config::Config;
use crate::core::credentials::{resolve_api_key, API_KEY_CONSOLE_URL};
use crate::core::session::ChatSession;
use crate::ui::run_chat;
use crate::utils::logging::LoggingState;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "A console chat interface for the Gemini API")]
#[command(
    long_about = "Parley is a console chat interface that streams responses from the \
Gemini API and keeps a history of past conversations for the session.\n\n\
Environment Variables:\n\
  GEMINI_API_KEY    Your API key (GOOGLE_API_KEY also works)\n\n\
Commands inside the chat:\n\
  /new              Start a new chat (saves the current one)\n\
  /history          Show saved chats\n\
  /load <n>         Load a saved chat\n\
  /delete <n>       Delete a saved chat\n\
  /clear            Delete all saved chats\n\
  /quit             Exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for chat (skips the startup model scan)
    #[arg(short = 'm', long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Append the conversation to the given log file
    #[arg(short = 'l', long, value_name = "FILE")]
    pub log: Option<String>,

    /// Override the API base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the models available to the configured API key
    Models,
    /// Start the chat interface (default)
    Chat,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Args {
        command,
        model,
        log,
        base_url,
    } = Args::parse();
    let config = Config::load()?;
    let base_url = base_url
        .or_else(|| config.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    match command {
        Some(Commands::Models) => model_list::list_models(&config, &base_url).await,
        Some(Commands::Chat) | None => run_chat_command(model, log, config, base_url).await,
    }
}

async fn run_chat_command(
    model: Option<String>,
    log: Option<String>,
    config: Config,
    base_url: String,
) -> Result<(), Box<dyn Error>> {
    let client = build_client(&config, base_url, model).await;
    print_banner(client.as_ref(), log.as_deref());

    let logging = LoggingState::new(log)?;
    let session = ChatSession::new(logging);

    run_chat(client, session).await
}

/// Build the completion client, or report why it is unavailable and return
/// `None`. A missing key degrades the session instead of aborting it: every
/// send then answers with the initialization error until restart.
async fn build_client(
    config: &Config,
    base_url: String,
    requested_model: Option<String>,
) -> Option<ChatClient> {
    let api_key = match resolve_api_key(config) {
        Ok(key) => key,
        Err(err) => {
            eprintln!("{err}");
            eprintln!();
            eprintln!("Quick fixes:");
            for fix in err.quick_fixes() {
                eprintln!("  - {fix}");
            }
            return None;
        }
    };

    let http = reqwest::Client::new();
    let model = match requested_model.or_else(|| config.default_model.clone()) {
        Some(model) => model,
        None => resolve_startup_model(&http, &base_url, &api_key).await,
    };

    Some(ChatClient {
        http,
        api_key,
        base_url,
        model,
    })
}

fn print_banner(client: Option<&ChatClient>, log_file: Option<&str>) {
    eprintln!("Starting Parley - Console Chat Interface");
    match client {
        Some(client) => {
            eprintln!("Using model: {}", client.model);
            eprintln!("API endpoint: {}", client.base_url);
        }
        None => {
            eprintln!("WARNING: Model not initialized; sends will fail until a key is set.");
            eprintln!("Troubleshooting:");
            eprintln!("  1. Get an API key from: {API_KEY_CONSOLE_URL}");
            eprintln!("  2. export GEMINI_API_KEY=\"your-actual-api-key\"");
            eprintln!("  3. Restart parley");
        }
    }
    if let Some(path) = log_file {
        eprintln!("Logging to: {path}");
    }
    eprintln!("Press Enter to send, /quit to exit.");
}
