//! ragchat binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing (RUST_LOG, else the configured level)
//! 3. Build the token store, chat service client and session manager
//! 4. Dispatch the subcommand

mod chat;
mod cli;
mod render;

use std::io::IsTerminal;
use std::sync::Arc;

use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Password};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use ragchat_client::{AuthClient, HttpChatService, SignupRequest};
use ragchat_core::{ConversationId, FileTokenStore, RagchatConfig, TokenProvider};
use ragchat_session::SessionManager;

use cli::{CliArgs, Command};

fn build_session(config: &RagchatConfig, tokens: Arc<dyn TokenProvider>) -> SessionManager {
    let service = Arc::new(HttpChatService::from_config(&config.service));
    tracing::debug!(base_url = service.base_url(), "Chat service client ready");
    SessionManager::new(service, tokens, config.session.clone())
}

/// Read the password: hidden input on a terminal, otherwise one line of
/// piped stdin.
async fn read_password() -> Result<String, Box<dyn std::error::Error>> {
    if std::io::stdin().is_terminal() {
        let password = tokio::task::spawn_blocking(|| {
            Password::with_theme(&ColorfulTheme::default())
                .with_prompt("Password")
                .interact()
        })
        .await??;
        return Ok(password);
    }
    Ok(first_line(BufReader::new(tokio::io::stdin())).await?)
}

async fn first_line<R: AsyncBufRead + Unpin>(reader: R) -> Result<String, std::io::Error> {
    Ok(reader.lines().next_line().await?.unwrap_or_default())
}

async fn run(
    command: Command,
    config: RagchatConfig,
    tokens: Arc<dyn TokenProvider>,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => read_password().await?,
            };
            let auth = AuthClient::from_config(&config.service, tokens);
            let response = auth.login(&username, &password).await?;
            println!(
                "Logged in as {}.",
                response.full_name.as_deref().unwrap_or(&username)
            );
        }
        Command::Signup {
            full_name,
            username,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => read_password().await?,
            };
            let auth = AuthClient::from_config(&config.service, tokens);
            auth.signup(&SignupRequest::new(full_name, username.clone(), password))
                .await?;
            println!("Account created. Log in with `ragchat login {}`.", username);
        }
        Command::Logout => {
            build_session(&config, tokens).sign_out()?;
            println!("Signed out.");
        }
        Command::Conversations => {
            let manager = build_session(&config, tokens);
            manager.initialize().await?;
            chat::print_conversations(&manager);
        }
        Command::Chat { conversation } => {
            let manager = Arc::new(build_session(&config, tokens));
            chat::run(manager, conversation.map(ConversationId::new)).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let loaded = config_file
        .exists()
        .then(|| RagchatConfig::load(&config_file));
    let mut config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => RagchatConfig::default(),
    };
    args.apply(&mut config);

    // Tracing. Logs go to stderr so they never interleave with chat output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting ragchat v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Some(Ok(_)) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(Err(e)) => {
            tracing::warn!(path = %config_file.display(), error = %e, "Failed to load config, using defaults")
        }
        None => tracing::debug!(path = %config_file.display(), "No config file, using defaults"),
    }

    // Credentials.
    let credentials_path = config.general.credentials_path();
    let tokens: Arc<dyn TokenProvider> = Arc::new(FileTokenStore::new(&credentials_path));
    tracing::debug!(path = %credentials_path.display(), "Token store ready");

    if let Err(e) = run(args.command(), config, tokens).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
