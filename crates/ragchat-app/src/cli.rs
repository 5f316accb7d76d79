//! CLI argument definitions for the ragchat client.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragchat_core::RagchatConfig;

/// ragchat: chat with your knowledge base from the terminal.
#[derive(Parser, Debug)]
#[command(name = "ragchat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Directory holding the stored credentials.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Base URL of the chat backend.
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in and store the bearer token.
    Login {
        username: String,
        /// Prompted without echo when omitted, or read from piped stdin.
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account. Does not log in.
    Signup {
        /// Full name shown in the chat header.
        #[arg(long = "name")]
        full_name: String,
        username: String,
        /// Prompted without echo when omitted, or read from piped stdin.
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored token and display name.
    Logout,
    /// List conversations.
    Conversations,
    /// Interactive chat (the default).
    Chat {
        /// Open this conversation on start.
        #[arg(long = "conversation")]
        conversation: Option<String>,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > RAGCHAT_CONFIG env var > platform default (~/.ragchat/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("RAGCHAT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the backend base URL.
    ///
    /// Priority: --base-url flag > RAGCHAT_BASE_URL env var > config file value.
    /// Returns `None` if not overridden.
    pub fn resolve_base_url(&self) -> Option<String> {
        if let Some(ref url) = self.base_url {
            return Some(url.clone());
        }
        std::env::var("RAGCHAT_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
    }

    /// Fold command-line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut RagchatConfig) {
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(url) = self.resolve_base_url() {
            config.service.base_url = url;
        }
    }

    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Chat { conversation: None })
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".ragchat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".ragchat").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_chat() {
        let args = CliArgs::try_parse_from(["ragchat"]).unwrap();
        assert_eq!(args.command(), Command::Chat { conversation: None });
    }

    #[test]
    fn test_parse_subcommands() {
        let args = CliArgs::try_parse_from(["ragchat", "login", "ada@example.com"]).unwrap();
        assert_eq!(
            args.command(),
            Command::Login {
                username: "ada@example.com".to_string(),
                password: None
            }
        );

        let args = CliArgs::try_parse_from([
            "ragchat", "signup", "--name", "Ada Lovelace", "ada", "--password", "secret1",
        ])
        .unwrap();
        assert_eq!(
            args.command(),
            Command::Signup {
                full_name: "Ada Lovelace".to_string(),
                username: "ada".to_string(),
                password: Some("secret1".to_string())
            }
        );

        let args = CliArgs::try_parse_from(["ragchat", "chat", "--conversation", "7"]).unwrap();
        assert_eq!(
            args.command(),
            Command::Chat {
                conversation: Some("7".to_string())
            }
        );
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let args = CliArgs::try_parse_from([
            "ragchat",
            "-d",
            "/tmp/ragchat",
            "-l",
            "debug",
            "--base-url",
            "http://rag.internal:9000",
            "conversations",
        ])
        .unwrap();
        let mut config = RagchatConfig::default();
        args.apply(&mut config);

        assert_eq!(config.general.data_dir, "/tmp/ragchat");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.service.base_url, "http://rag.internal:9000");
        assert_eq!(args.command(), Command::Conversations);
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let args = CliArgs::try_parse_from(["ragchat", "-c", "/etc/ragchat.toml"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/ragchat.toml"));
    }
}
