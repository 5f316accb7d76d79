//! Interactive chat loop.
//!
//! Reads one line at a time from stdin and forwards it to the session
//! manager. Every action runs as its own task, so a slow upload never
//! blocks the next question. A separate task listens for session events
//! and prints whatever changed in the timeline. On exit the loop waits for
//! every action still in flight, so no reply goes unprinted.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinHandle, JoinSet};

use ragchat_core::{ConversationId, Document};
use ragchat_session::{Reconciliation, SessionEvent, SessionManager};

use crate::render::{format_conversation, format_message, TimelineRenderer};

pub const HELP: &str = "Commands: /new, /open <id>, /list, /attach <path>, /help, /quit. \
                        Anything else is sent as a message.";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    New,
    Open(ConversationId),
    List,
    Attach(PathBuf),
    Help,
    Quit,
    Say(String),
    Nothing,
}

pub fn parse_command(line: &str) -> Result<ChatCommand, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(ChatCommand::Nothing);
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(ChatCommand::Say(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "new" => Ok(ChatCommand::New),
        "list" => Ok(ChatCommand::List),
        "help" => Ok(ChatCommand::Help),
        "quit" | "exit" => Ok(ChatCommand::Quit),
        "open" if !arg.is_empty() => Ok(ChatCommand::Open(ConversationId::new(arg))),
        "open" => Err("Usage: /open <id>".to_string()),
        "attach" if !arg.is_empty() => Ok(ChatCommand::Attach(PathBuf::from(arg))),
        "attach" => Err("Usage: /attach <path>".to_string()),
        other => Err(format!("Unknown command: /{}", other)),
    }
}

pub fn print_conversations(manager: &SessionManager) {
    let view = manager.view();
    if view.conversations.is_empty() {
        println!("No conversations yet. Type /new to start one.");
        return;
    }
    for conversation in &view.conversations {
        println!("{}", format_conversation(conversation));
    }
}

/// Read a document from disk if its extension is accepted.
async fn load_document(manager: &SessionManager, path: &Path) -> Result<Document, String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| format!("Not a file: {}", path.display()))?;

    let mut document = Document::new(name, Vec::new());
    if !manager.accepts(&document) {
        return Err(format!(
            "Unsupported file type. Allowed: {}",
            manager.config().allowed_extensions.join(", ")
        ));
    }
    document.bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Could not read {}: {}", path.display(), e))?;
    Ok(document)
}

fn print_timeline(manager: &SessionManager, renderer: &Mutex<TimelineRenderer>) {
    let view = manager.view();
    let mut renderer = renderer.lock().unwrap_or_else(PoisonError::into_inner);
    for message in renderer.changes(&view.timeline) {
        let local = message.timestamp.with_timezone(&Local);
        println!("{}", format_message(message, &local));
    }
}

fn spawn_renderer(
    manager: Arc<SessionManager>,
    renderer: Arc<Mutex<TimelineRenderer>>,
) -> JoinHandle<()> {
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::TimelineChanged) => print_timeline(&manager, &renderer),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Renderer lagged behind session events");
                    print_timeline(&manager, &renderer);
                }
                Ok(_) => {}
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Run the interactive loop on stdin until `/quit` or end of input.
pub async fn run(
    manager: Arc<SessionManager>,
    open: Option<ConversationId>,
) -> Result<(), Box<dyn std::error::Error>> {
    run_with_input(manager, open, BufReader::new(tokio::io::stdin())).await
}

async fn run_with_input<R: AsyncBufRead + Unpin>(
    manager: Arc<SessionManager>,
    open: Option<ConversationId>,
    input: R,
) -> Result<(), Box<dyn std::error::Error>> {
    let renderer = Arc::new(Mutex::new(TimelineRenderer::new()));
    let render_task = spawn_renderer(manager.clone(), renderer.clone());

    if let Err(e) = manager.initialize().await {
        println!("Could not load conversations: {}", e);
    }
    println!("Hello, {}.", manager.view().display_name);
    print_conversations(&manager);
    match open {
        Some(id) => {
            if let Err(e) = manager.select_conversation(&id).await {
                println!("Could not open conversation {}: {}", id, e);
            }
        }
        None => println!("{}", HELP),
    }

    let mut actions = JoinSet::new();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match command {
            ChatCommand::Nothing => {}
            ChatCommand::Help => println!("{}", HELP),
            ChatCommand::Quit => break,
            ChatCommand::List => print_conversations(&manager),
            ChatCommand::New => {
                let manager = manager.clone();
                actions.spawn(async move {
                    match manager.start_new_conversation().await {
                        Ok(Reconciliation::Applied) => {
                            if let Some(id) = manager.view().active_conversation {
                                println!("Started Chat {}.", id);
                            }
                        }
                        Ok(Reconciliation::Discarded) => {}
                        Err(e) => println!("Failed to start new chat: {}", e),
                    }
                });
            }
            ChatCommand::Open(id) => {
                let manager = manager.clone();
                actions.spawn(async move {
                    if let Err(e) = manager.select_conversation(&id).await {
                        println!("Could not open conversation {}: {}", id, e);
                    }
                });
            }
            ChatCommand::Attach(path) => match load_document(&manager, &path).await {
                Ok(document) => {
                    let manager = manager.clone();
                    actions.spawn(async move {
                        manager.upload_document(document).await;
                    });
                }
                Err(message) => println!("{}", message),
            },
            ChatCommand::Say(text) => {
                let manager = manager.clone();
                actions.spawn(async move {
                    manager.send_message(&text).await;
                });
            }
        }
    }

    if !actions.is_empty() {
        tracing::debug!(pending = actions.len(), "Waiting for in-flight actions");
    }
    while let Some(joined) = actions.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "Chat action task failed");
        }
    }
    render_task.abort();
    print_timeline(&manager, &renderer);
    Ok(())
}
