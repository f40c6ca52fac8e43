//! CLI interface for the chat client
//!
//! Command parsing, the text panels (chat list, message list) and async stdin
//! reading for the main loop.

use crate::error::{ClientError, Result};
use crate::models::{Chat, Message, Role};
use crate::state::ChatState;
use std::fmt::Write as _;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Longest preview of the last message shown in the chat list
const PREVIEW_LEN: usize = 40;

pub const HELP: &str = "\
Commands:
  /login <username> [password]             log in (password is prompted when omitted)
  /register <username> <email> [password]  create an account
  /new [title]                             start a new chat
  /list                                    show your chats
  /select <n>                              open chat n from the list
  /delete [n]                              delete chat n (default: current)
  /rename <n> <title>                      rename chat n
  /refresh                                 reload chats from the server
  /show                                    show the current chat
  /logout                                  log out
  /help                                    show this help
  /quit                                    exit
Anything else is sent to the current chat.";

/// Command types for CLI
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login {
        username: String,
        password: Option<String>,
    },
    Register {
        username: String,
        email: String,
        password: Option<String>,
    },
    NewChat(Option<String>),
    List,
    /// 1-based position in the chat list
    Select(usize),
    Delete(Option<usize>),
    Rename(usize, String),
    Refresh,
    Show,
    Logout,
    Help,
    Quit,
    Message(String),
}

impl Command {
    /// Parse a command string
    pub fn parse(input: &str) -> std::result::Result<Self, String> {
        let input = input.trim();

        if !input.starts_with('/') {
            return Ok(Command::Message(input.to_string()));
        }

        let (name, rest) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (input, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        match name {
            "/quit" | "/exit" => Ok(Command::Quit),
            "/help" => Ok(Command::Help),
            "/list" => Ok(Command::List),
            "/refresh" => Ok(Command::Refresh),
            "/show" => Ok(Command::Show),
            "/logout" => Ok(Command::Logout),
            "/new" => Ok(Command::NewChat(
                Some(rest.to_string()).filter(|t| !t.is_empty()),
            )),
            "/login" => match args.as_slice() {
                [username] => Ok(Command::Login {
                    username: username.to_string(),
                    password: None,
                }),
                [username, password] => Ok(Command::Login {
                    username: username.to_string(),
                    password: Some(password.to_string()),
                }),
                _ => Err("Usage: /login <username> [password]".to_string()),
            },
            "/register" => match args.as_slice() {
                [username, email] => Ok(Command::Register {
                    username: username.to_string(),
                    email: email.to_string(),
                    password: None,
                }),
                [username, email, password] => Ok(Command::Register {
                    username: username.to_string(),
                    email: email.to_string(),
                    password: Some(password.to_string()),
                }),
                _ => Err("Usage: /register <username> <email> [password]".to_string()),
            },
            "/select" => match args.as_slice() {
                [n] => parse_index(n).map(Command::Select),
                _ => Err("Usage: /select <n>".to_string()),
            },
            "/delete" => match args.as_slice() {
                [] => Ok(Command::Delete(None)),
                [n] => parse_index(n).map(|n| Command::Delete(Some(n))),
                _ => Err("Usage: /delete [n]".to_string()),
            },
            "/rename" => {
                let (n, title) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                let title = title.trim();
                if n.is_empty() || title.is_empty() {
                    return Err("Usage: /rename <n> <title>".to_string());
                }
                parse_index(n).map(|n| Command::Rename(n, title.to_string()))
            }
            _ => Err(format!("Unknown command: {}", name)),
        }
    }
}

fn parse_index(raw: &str) -> std::result::Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("Not a chat number: {}", raw)),
    }
}

/// Parse a command from user input
pub fn parse_command(input: &str) -> Result<Command> {
    Command::parse(input).map_err(ClientError::InvalidCommand)
}

/// Normalize composer input; blank input is not sent
pub fn compose(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > PREVIEW_LEN || text.lines().count() > 1 {
        let cut: String = line.chars().take(PREVIEW_LEN).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

/// Format the chat list panel; the current chat is marked with `*`
pub fn format_chat_list(state: &ChatState) -> String {
    if state.chats.is_empty() {
        return "No chats yet. Start one with /new".to_string();
    }

    let current = state.current_id();
    let mut out = String::new();
    for (i, chat) in state.chats.iter().enumerate() {
        let marker = if Some(chat.id) == current { '*' } else { ' ' };
        let _ = write!(out, "{} {:>2}. {}", marker, i + 1, chat.title);
        if let Some(last) = chat.last_message() {
            let _ = write!(out, " - {}", preview(&last.content));
        }
        out.push('\n');
    }
    out.pop();
    out
}

/// Format a single message for display
pub fn format_message(message: &Message) -> String {
    let label = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::System => "system",
    };
    format!(
        "[{}] <{}> {}",
        message.created_at.format("%H:%M"),
        label,
        message.content
    )
}

/// Format the message list panel for a chat
pub fn format_chat(chat: &Chat) -> String {
    let mut out = format!("== {} ==", chat.title);
    if chat.messages.is_empty() {
        out.push_str("\n(no messages yet)");
    }
    for message in &chat.messages {
        out.push('\n');
        out.push_str(&format_message(message));
    }
    out
}

/// Async stdin reader that yields one line at a time
///
/// Prints the prompt and flushes stdout before waiting on input.
///
/// # Returns
/// - `Ok(Some(line))` - User entered a line
/// - `Ok(None)` - EOF reached (Ctrl+D)
/// - `Err(e)` - I/O error
pub async fn read_line_async(
    reader: &mut BufReader<tokio::io::Stdin>,
    prompt: &str,
) -> Result<Option<String>> {
    print!("{}", prompt);
    std::io::stdout().flush()?;

    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => Ok(None),
        Ok(_) => {
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            Ok(Some(line))
        }
        Err(e) => Err(e.into()),
    }
}

/// Prompt for a password without echoing it
pub async fn prompt_password(prompt: &str) -> Result<String> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
        .await
        .map_err(|e| ClientError::StateError(format!("Password prompt failed: {}", e)))?
        .map_err(ClientError::from)
}
