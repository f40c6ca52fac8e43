/// Main chat client orchestrator
///
/// Wires the session, the API client and both stores together, applies the
/// route guards and turns CLI commands into store operations.

use crate::api::ChatApi;
use crate::cli::{self, Command, HELP};
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::models::ChatId;
use crate::router::{self, Route};
use crate::services::{AuthService, ChatService};
use crate::session::SessionHandle;
use crate::storage::LocalStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::watch;

/// Result of handling one command
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Keep going, printing this text (may be empty)
    Continue(String),
    Quit,
}

pub struct ChatClient {
    session: SessionHandle,
    auth: AuthService,
    chats: ChatService,
    routes: watch::Receiver<Route>,
    route: Route,
}

impl ChatClient {
    /// Create a client from the parsed configuration
    ///
    /// # Errors
    /// * Invalid server URL
    /// * File system errors when creating the state directory
    /// * Database initialization errors
    pub fn new(config: &Config) -> Result<Self> {
        let server_url = config.server_url()?;
        let storage_dir = config.storage_dir()?;
        std::fs::create_dir_all(&storage_dir).map_err(|e| {
            ClientError::StorageError(format!("Failed to create {}: {}", storage_dir.display(), e))
        })?;

        let store = LocalStore::new(storage_dir.join("session.db"))?;
        log::info!("Session database: {}", storage_dir.join("session.db").display());

        Self::with_store(&server_url, store, config.request_timeout())
    }

    /// Create a client over an already opened store
    pub fn with_store(server_url: &str, store: LocalStore, timeout: Duration) -> Result<Self> {
        let session = SessionHandle::new(store);
        let api = Arc::new(ChatApi::with_timeout(server_url, session.clone(), timeout)?);
        let routes = session.subscribe();

        Ok(ChatClient {
            auth: AuthService::new(api.clone()),
            chats: ChatService::new(api),
            session,
            routes,
            route: Route::Login,
        })
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn chats(&self) -> &ChatService {
        &self.chats
    }

    /// The view currently shown
    pub fn route(&self) -> Route {
        self.route
    }

    /// Restore the previous session and open the first view
    pub async fn start(&mut self) -> String {
        let restored = self.auth.restore().await;
        let mut out = match restored {
            Some(user) => format!("Welcome back, {}!", user.username),
            None => "Not logged in. Use /login <username> or /register <username> <email>.".to_string(),
        };

        // "/" always points at the chat view; the guard decides the rest
        self.session.navigate(Route::Chat);
        if let Some(view) = self.follow_route().await {
            out.push('\n');
            out.push_str(&view);
        }
        out
    }

    /// Prompt matching the current view
    pub fn prompt(&self) -> String {
        match self.route {
            Route::Chat => match self.chats.snapshot().current {
                Some(chat) => format!("[{}]> ", chat.title),
                None => "> ".to_string(),
            },
            Route::Login | Route::Register => "login> ".to_string(),
        }
    }

    /// Run the interactive loop until /quit or end of input
    pub async fn run(&mut self) -> Result<()> {
        println!("{}", self.start().await);
        println!("Type /help for commands");

        let mut reader = BufReader::new(tokio::io::stdin());
        loop {
            let line = match cli::read_line_async(&mut reader, &self.prompt()).await? {
                Some(line) => line,
                None => break,
            };
            if line.trim().is_empty() {
                continue;
            }

            let command = match cli::parse_command(&line) {
                Ok(command) => command,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };

            match self.handle(command).await? {
                Step::Continue(out) => {
                    if !out.is_empty() {
                        println!("{}", out);
                    }
                }
                Step::Quit => break,
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Handle one command in the current view
    pub async fn handle(&mut self, command: Command) -> Result<Step> {
        let mut out = match command {
            Command::Quit => return Ok(Step::Quit),
            Command::Help => HELP.to_string(),
            command if self.route == Route::Chat => self.handle_chat(command).await?,
            command => self.handle_public(command).await?,
        };

        if let Some(view) = self.follow_route().await {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&view);
        }
        Ok(Step::Continue(out))
    }

    async fn handle_public(&mut self, command: Command) -> Result<String> {
        match command {
            Command::Login { username, password } => {
                let password = match password {
                    Some(password) => password,
                    None => cli::prompt_password("Password: ").await?,
                };
                self.chats.reset();
                match self.auth.login(&username, &password).await {
                    Ok(user) => Ok(format!("Logged in as {}", user.username)),
                    Err(e) if e.is_auth() => Ok("Invalid username or password.".to_string()),
                    Err(e) => Ok(format!("Login failed: {}", e)),
                }
            }
            Command::Register {
                username,
                email,
                password,
            } => {
                let password = match password {
                    Some(password) => password,
                    None => cli::prompt_password("Password: ").await?,
                };
                match self.auth.register(&username, &email, &password).await {
                    Ok(user) => {
                        self.session.navigate(Route::Login);
                        Ok(format!(
                            "Registered {}. Log in with /login {}",
                            user.username, user.username
                        ))
                    }
                    Err(ClientError::ValidationError(detail)) => {
                        self.session.navigate(Route::Register);
                        Ok(format!("Registration rejected: {}", detail))
                    }
                    Err(e) => Ok(format!("Registration failed: {}", e)),
                }
            }
            _ => Ok("Please log in first: /login <username>".to_string()),
        }
    }

    async fn handle_chat(&mut self, command: Command) -> Result<String> {
        let out = match command {
            Command::Login { .. } | Command::Register { .. } => {
                let name = self
                    .auth
                    .current_user()
                    .map(|u| u.username)
                    .unwrap_or_default();
                return Ok(format!("Already logged in as {}. Use /logout first.", name));
            }
            Command::Logout => {
                return Ok(match self.auth.logout() {
                    Ok(()) => "Logged out.".to_string(),
                    Err(e) => {
                        log::error!("Failed to remove stored token: {}", e);
                        format!("Logged out, but the saved login could not be removed: {}", e)
                    }
                });
            }
            Command::NewChat(title) => {
                self.chats.create_chat(title.as_deref()).await;
                self.render_current()
            }
            Command::List => cli::format_chat_list(&self.chats.snapshot()),
            Command::Refresh => {
                self.chats.fetch_chats().await;
                cli::format_chat_list(&self.chats.snapshot())
            }
            Command::Show => self.render_current(),
            Command::Select(n) => match self.chat_at(n) {
                Some(id) => {
                    self.chats.select_chat(id).await;
                    self.render_current()
                }
                None => return Ok(format!("No chat #{}", n)),
            },
            Command::Delete(n) => {
                let target = match n {
                    Some(n) => self.chat_at(n),
                    None => self.chats.snapshot().current_id(),
                };
                match target {
                    Some(id) => {
                        self.chats.delete_chat(id).await;
                        cli::format_chat_list(&self.chats.snapshot())
                    }
                    None => return Ok("No chat to delete".to_string()),
                }
            }
            Command::Rename(n, title) => match self.chat_at(n) {
                Some(id) => {
                    self.chats.rename_chat(id, &title).await;
                    cli::format_chat_list(&self.chats.snapshot())
                }
                None => return Ok(format!("No chat #{}", n)),
            },
            Command::Message(text) => {
                let content = match cli::compose(&text) {
                    Some(content) => content,
                    None => return Ok(String::new()),
                };
                if self.chats.snapshot().current.is_none() {
                    return Ok("No chat selected. Start one with /new".to_string());
                }
                self.chats.send_message(&content).await;
                self.render_last_exchange()
            }
            Command::Help | Command::Quit => String::new(),
        };

        Ok(self.with_error(out))
    }

    /// Follow a pending route change (login, logout, expired session)
    async fn follow_route(&mut self) -> Option<String> {
        if !self.routes.has_changed().unwrap_or(false) {
            return None;
        }
        let requested = *self.routes.borrow_and_update();
        self.enter(requested).await
    }

    async fn enter(&mut self, requested: Route) -> Option<String> {
        let target = router::resolve(
            requested,
            self.auth.is_authenticated(),
            self.auth.is_loading(),
        )?;
        if target == self.route {
            return None;
        }

        let previous = std::mem::replace(&mut self.route, target);
        log::debug!("Route {} -> {}", previous, target);

        match target {
            Route::Chat => {
                self.chats.fetch_chats().await;
                let list = cli::format_chat_list(&self.chats.snapshot());
                Some(self.with_error(list))
            }
            Route::Login | Route::Register => {
                self.chats.reset();
                if previous == Route::Chat {
                    Some("Session ended. Log in with /login <username>.".to_string())
                } else {
                    None
                }
            }
        }
    }

    fn chat_at(&self, n: usize) -> Option<ChatId> {
        self.chats
            .snapshot()
            .chats
            .get(n.checked_sub(1)?)
            .map(|c| c.id)
    }

    fn render_current(&self) -> String {
        match self.chats.snapshot().current {
            Some(chat) => cli::format_chat(&chat),
            None => "No chat selected. Start one with /new".to_string(),
        }
    }

    fn render_last_exchange(&self) -> String {
        let state = self.chats.snapshot();
        if state.error.is_some() {
            return String::new();
        }
        state
            .current
            .map(|chat| {
                let skip = chat.messages.len().saturating_sub(2);
                chat.messages[skip..]
                    .iter()
                    .map(cli::format_message)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

    fn with_error(&self, out: String) -> String {
        match self.chats.snapshot().error {
            Some(error) if out.is_empty() => format!("error: {}", error),
            Some(error) => format!("{}\nerror: {}", out, error),
            None => out,
        }
    }
}
