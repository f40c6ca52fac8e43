//! Local mirror of the user's chats.
//!
//! `ChatState` holds the chat list and the current chat and knows how to apply
//! each server result to both. Every write is keyed by chat id, so a slow
//! response for a chat the user has since left still lands on the right list
//! entry without touching the current selection.

use crate::models::{Chat, ChatId, Message};

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    /// Server order; newly created chats are prepended
    pub chats: Vec<Chat>,
    pub current: Option<Chat>,
    /// At least one send is in flight
    pub sending: bool,
    pending_sends: usize,
    /// Last failure, cleared when the next operation starts
    pub error: Option<String>,
}

impl ChatState {
    pub fn current_id(&self) -> Option<ChatId> {
        self.current.as_ref().map(|c| c.id)
    }

    pub fn find(&self, chat_id: ChatId) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    pub fn begin_attempt(&mut self) {
        self.error = None;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn begin_send(&mut self) {
        self.pending_sends += 1;
        self.sending = true;
    }

    /// `sending` stays set while any other send is still pending
    pub fn end_send(&mut self) {
        self.pending_sends = self.pending_sends.saturating_sub(1);
        self.sending = self.pending_sends > 0;
    }

    /// Replace the list with the server's copy.
    ///
    /// The current chat is refreshed from the new list when it is still
    /// present; otherwise the first chat (or nothing) becomes current.
    pub fn replace_chats(&mut self, chats: Vec<Chat>) {
        self.chats = chats;

        let still_present = self
            .current_id()
            .and_then(|id| self.find(id).cloned());

        self.current = still_present.or_else(|| self.chats.first().cloned());
    }

    /// A chat was created on the server: it goes first and becomes current
    pub fn insert_created(&mut self, mut chat: Chat) {
        chat.messages.clear();
        self.chats.retain(|c| c.id != chat.id);
        self.chats.insert(0, chat.clone());
        self.current = Some(chat);
    }

    /// Optimistic selection with whatever messages the list entry has
    pub fn select(&mut self, chat_id: ChatId) -> bool {
        match self.find(chat_id).cloned() {
            Some(chat) => {
                self.current = Some(chat);
                true
            }
            None => false,
        }
    }

    /// Store a freshly fetched message sequence for one chat.
    ///
    /// Local messages newer than the last fetched one are kept: they come from
    /// a send that completed after the server produced this list. An empty
    /// list drops nothing.
    pub fn apply_messages(&mut self, chat_id: ChatId, messages: Vec<Message>) {
        let newest = messages.iter().map(|m| m.id).max();

        self.update_chat(chat_id, |chat| {
            let newer: Vec<Message> = chat
                .messages
                .iter()
                .filter(|m| newest.map_or(true, |newest| m.id > newest))
                .cloned()
                .collect();
            chat.messages = messages.clone();
            chat.messages.extend(newer);
        });
    }

    /// Append the user message and the assistant reply of one send.
    ///
    /// Both land in the same call, on the list entry and on `current` if it
    /// still shows that chat. Returns false when the pair was already present.
    pub fn append_exchange(&mut self, chat_id: ChatId, user_message: Message, assistant_message: Message) -> bool {
        let known = self
            .find(chat_id)
            .or(self.current.as_ref().filter(|c| c.id == chat_id))
            .map(|chat| {
                chat.contains_message(user_message.id) && chat.contains_message(assistant_message.id)
            })
            .unwrap_or(false);
        if known {
            return false;
        }

        self.update_chat(chat_id, |chat| {
            for message in [&user_message, &assistant_message] {
                if !chat.contains_message(message.id) {
                    chat.messages.push(message.clone());
                }
            }
        });
        true
    }

    /// Apply a renamed/updated chat while keeping the local messages
    pub fn apply_update(&mut self, updated: &Chat) {
        self.update_chat(updated.id, |chat| {
            chat.title = updated.title.clone();
            chat.is_active = updated.is_active;
            chat.updated_at = updated.updated_at;
        });
    }

    /// Remove a deleted chat; a deleted current chat hands over to the first remaining one
    pub fn remove_chat(&mut self, chat_id: ChatId) -> bool {
        let before = self.chats.len();
        self.chats.retain(|c| c.id != chat_id);
        let removed = self.chats.len() != before;

        if self.current_id() == Some(chat_id) {
            self.current = self.chats.first().cloned();
        }
        removed
    }

    pub fn reset(&mut self) {
        *self = ChatState::default();
    }

    /// The current chat is listed and both copies agree
    pub fn is_consistent(&self) -> bool {
        match &self.current {
            None => self.chats.is_empty(),
            Some(current) => self
                .find(current.id)
                .map(|entry| entry.messages == current.messages && entry.title == current.title)
                .unwrap_or(false),
        }
    }

    fn update_chat(&mut self, chat_id: ChatId, mut apply: impl FnMut(&mut Chat)) {
        if let Some(entry) = self.chats.iter_mut().find(|c| c.id == chat_id) {
            apply(entry);
        }
        if let Some(current) = self.current.as_mut().filter(|c| c.id == chat_id) {
            apply(current);
        }
    }
}
