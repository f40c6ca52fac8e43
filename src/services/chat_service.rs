/// Chat synchronization service.
/// Runs chat operations against the server and reconciles the local chat list
/// and current chat with each result.

use crate::api::ChatApi;
use crate::error::ClientError;
use crate::models::{Chat, ChatCreate, ChatId, ChatUpdate};
use crate::session::SessionHandle;
use crate::state::ChatState;
use std::sync::{Arc, Mutex, MutexGuard};

pub const FETCH_CHATS_FAILED: &str = "Failed to load chats.";
pub const CREATE_CHAT_FAILED: &str = "Failed to create a new chat.";
pub const LOAD_MESSAGES_FAILED: &str = "Failed to load messages.";
pub const SEND_MESSAGE_FAILED: &str = "Failed to send message.";
pub const DELETE_CHAT_FAILED: &str = "Failed to delete chat.";
pub const RENAME_CHAT_FAILED: &str = "Failed to rename chat.";

/// Counts one in-flight send for `sending` until dropped
struct SendingGuard<'a> {
    state: &'a Mutex<ChatState>,
}

impl<'a> SendingGuard<'a> {
    fn acquire(state: &'a Mutex<ChatState>) -> Self {
        lock(state).begin_send();
        SendingGuard { state }
    }
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).end_send();
    }
}

fn lock(state: &Mutex<ChatState>) -> MutexGuard<'_, ChatState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owner of the chat state. Failures never escape an operation; they are
/// logged and left in `ChatState::error`.
pub struct ChatService {
    api: Arc<ChatApi>,
    session: SessionHandle,
    state: Mutex<ChatState>,
}

impl ChatService {
    pub fn new(api: Arc<ChatApi>) -> Self {
        let session = api.session().clone();
        ChatService {
            api,
            session,
            state: Mutex::new(ChatState::default()),
        }
    }

    /// Copy of the state for rendering
    pub fn snapshot(&self) -> ChatState {
        lock(&self.state).clone()
    }

    /// Drop everything, e.g. after logout
    pub fn reset(&self) {
        lock(&self.state).reset();
    }

    fn begin(&self) {
        lock(&self.state).begin_attempt();
    }

    fn fail(&self, message: &str, err: &ClientError) {
        log::error!("{} {}", message, err);
        lock(&self.state).fail(message);
    }

    /// Replace the chat list with the server's
    pub async fn fetch_chats(&self) {
        self.begin();

        match self.api.list_chats().await {
            Ok(chats) => {
                log::debug!("Fetched {} chats", chats.len());
                lock(&self.state).replace_chats(chats);
            }
            Err(e) => self.fail(FETCH_CHATS_FAILED, &e),
        }
    }

    /// Create a chat and make it current.
    ///
    /// Without a hint the title is "New chat {n}", n being the list size plus one.
    pub async fn create_chat(&self, title_hint: Option<&str>) -> Option<Chat> {
        self.begin();

        let user = match self.session.user() {
            Some(user) => user,
            None => {
                self.fail(
                    CREATE_CHAT_FAILED,
                    &ClientError::StateError("No active session".to_string()),
                );
                return None;
            }
        };

        let title = match title_hint.map(str::trim).filter(|t| !t.is_empty()) {
            Some(hint) => hint.to_string(),
            None => format!("New chat {}", lock(&self.state).chats.len() + 1),
        };

        let request = ChatCreate {
            title,
            user_id: user.id,
        };

        match self.api.create_chat(&request).await {
            Ok(chat) => {
                log::info!("Created chat {} ({})", chat.id, chat.title);
                lock(&self.state).insert_created(chat.clone());
                Some(chat)
            }
            Err(e) => {
                self.fail(CREATE_CHAT_FAILED, &e);
                None
            }
        }
    }

    /// Select a chat immediately, then load its messages.
    ///
    /// The selection stays even if loading fails. Loaded messages are written
    /// to that chat only; `current` is touched only if it still shows it.
    pub async fn select_chat(&self, chat_id: ChatId) {
        {
            let mut state = lock(&self.state);
            state.begin_attempt();
            if !state.select(chat_id) {
                log::warn!("Chat {} is not in the list", chat_id);
                state.fail(LOAD_MESSAGES_FAILED);
                return;
            }
        }

        match self.api.list_messages(chat_id).await {
            Ok(messages) => {
                log::debug!("Loaded {} messages for chat {}", messages.len(), chat_id);
                lock(&self.state).apply_messages(chat_id, messages);
            }
            Err(e) => self.fail(LOAD_MESSAGES_FAILED, &e),
        }
    }

    /// Send a message in the current chat and append it with the reply.
    ///
    /// Does nothing without a current chat or an authenticated user.
    pub async fn send_message(&self, content: &str) {
        let chat_id = match lock(&self.state).current_id() {
            Some(id) => id,
            None => return,
        };
        if !self.session.is_authenticated() {
            return;
        }

        let _sending = SendingGuard::acquire(&self.state);
        self.begin();

        match self.api.send_message(chat_id, content).await {
            Ok(exchange) => {
                let appended = lock(&self.state).append_exchange(
                    chat_id,
                    exchange.user_message,
                    exchange.assistant_message,
                );
                if !appended {
                    log::debug!("Exchange for chat {} already present", chat_id);
                }
            }
            Err(e) => self.fail(SEND_MESSAGE_FAILED, &e),
        }
    }

    /// Delete a chat on the server, then drop it locally
    pub async fn delete_chat(&self, chat_id: ChatId) {
        self.begin();

        match self.api.delete_chat(chat_id).await {
            Ok(()) => {
                log::info!("Deleted chat {}", chat_id);
                lock(&self.state).remove_chat(chat_id);
            }
            Err(e) => self.fail(DELETE_CHAT_FAILED, &e),
        }
    }

    /// Rename a chat; local messages are kept
    pub async fn rename_chat(&self, chat_id: ChatId, title: &str) {
        self.begin();

        let update = ChatUpdate {
            title: Some(title.trim().to_string()),
            is_active: None,
        };

        match self.api.update_chat(chat_id, &update).await {
            Ok(chat) => lock(&self.state).apply_update(&chat),
            Err(e) => self.fail(RENAME_CHAT_FAILED, &e),
        }
    }
}
