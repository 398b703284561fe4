use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::chat::{self, AssistantReply, PendingTurn};
use super::settings::AppSettings;
use super::state::{ChatState, Restored, StateError};
use super::storage::{read_json, read_json_list, remove_key, write_json, KeyValueStore};
use crate::config;
use crate::models::Message;
use crate::providers::{ApiError, AssistantBackend};

/// Owns the current `ChatState` and writes changed collections back to
/// storage on every commit, once hydration has happened.
pub struct ChatStore {
    state: ChatState,
    storage: Arc<dyn KeyValueStore>,
    hydrated: bool,
}

impl ChatStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            state: ChatState::seeded(),
            storage,
            hydrated: false,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Load persisted collections over the seeds and open the gate for
    /// writes. Runs once; later calls are ignored.
    pub fn hydrate(&mut self, now: DateTime<Utc>) {
        if self.hydrated {
            tracing::warn!("Chat store already hydrated");
            return;
        }

        let storage = self.storage.as_ref();
        let conversations = read_json_list(storage, config::CONVERSATIONS_KEY);
        let damaged = conversations.as_ref().is_some_and(|list| list.damaged);
        let restored = Restored {
            conversations: conversations.map(|list| list.items),
            folders: read_json_list(storage, config::FOLDERS_KEY).map(|list| list.items),
            templates: read_json_list(storage, config::TEMPLATES_KEY).map(|list| list.items),
            selected_id: read_json(storage, config::SELECTED_CONVERSATION_KEY),
        };
        self.state = self.state.restore(restored);
        self.hydrated = true;

        tracing::info!(
            "Restored {} conversations, {} folders, {} templates",
            self.state.conversations.len(),
            self.state.folders.len(),
            self.state.templates.len()
        );

        let next = self.state.ensure_selection(now);
        if damaged {
            // The stored list and selection stay as they are until the user
            // changes something.
            tracing::warn!("Stored conversations are damaged; not rewriting them on startup");
            self.state = next;
        } else {
            self.commit(next);
        }
    }

    fn commit(&mut self, next: ChatState) {
        if self.hydrated {
            self.persist_changes(&next);
        } else {
            tracing::debug!("Skipping persistence before hydration");
        }
        self.state = next;
    }

    fn persist_changes(&self, next: &ChatState) {
        let storage = self.storage.as_ref();
        let prev = &self.state;

        if !Arc::ptr_eq(&prev.conversations, &next.conversations) {
            write_json(storage, config::CONVERSATIONS_KEY, next.conversations.as_slice());
        }
        if !Arc::ptr_eq(&prev.folders, &next.folders) {
            write_json(storage, config::FOLDERS_KEY, next.folders.as_slice());
        }
        if !Arc::ptr_eq(&prev.templates, &next.templates) {
            write_json(storage, config::TEMPLATES_KEY, next.templates.as_slice());
        }
        if prev.selected_id != next.selected_id {
            match &next.selected_id {
                Some(id) => write_json(storage, config::SELECTED_CONVERSATION_KEY, id),
                None => remove_key(storage, config::SELECTED_CONVERSATION_KEY),
            }
        }
    }

    fn apply<F>(&mut self, command: F) -> Result<(), StateError>
    where
        F: FnOnce(&ChatState) -> Result<ChatState, StateError>,
    {
        let next = command(&self.state)?;
        self.commit(next);
        Ok(())
    }

    /// Start a new conversation and return its id.
    pub fn create(&mut self, now: DateTime<Utc>) -> String {
        let next = self.state.create(now);
        let id = next.selected_id.clone().unwrap_or_default();
        self.commit(next);
        id
    }

    pub fn select(&mut self, conversation_id: &str) -> Result<(), StateError> {
        self.apply(|s| s.select(conversation_id))
    }

    pub fn toggle_pin(&mut self, conversation_id: &str) -> Result<(), StateError> {
        self.apply(|s| s.toggle_pin(conversation_id))
    }

    pub fn edit_message(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StateError> {
        self.apply(|s| s.edit_message(conversation_id, message_id, content, now))
    }

    pub fn set_query(&mut self, query: &str) {
        let next = self.state.set_query(query);
        self.commit(next);
    }

    pub fn create_folder(&mut self, name: &str) -> Result<(), StateError> {
        self.apply(|s| s.create_folder(name))
    }

    pub fn add_template(&mut self, title: &str, content: &str) {
        let next = self.state.add_template(title, content);
        self.commit(next);
    }

    pub fn update_template(
        &mut self,
        template_id: &str,
        title: &str,
        content: &str,
    ) -> Result<(), StateError> {
        self.apply(|s| s.update_template(template_id, title, content))
    }

    pub fn remove_template(&mut self, template_id: &str) -> Result<(), StateError> {
        self.apply(|s| s.remove_template(template_id))
    }

    /// Hide the waiting state. A request in flight still completes and its
    /// reply is still appended.
    pub fn pause(&mut self) {
        let next = self.state.stop_thinking();
        self.commit(next);
    }

    /// Append the user message and mark the conversation as thinking.
    /// Blank input is ignored and yields `None`.
    pub fn begin_send(
        &mut self,
        conversation_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingTurn>, StateError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let next = self
            .state
            .append_message(conversation_id, Message::user(text, now), now)?
            .start_thinking(conversation_id);
        let history = next
            .conversation(conversation_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default();
        self.commit(next);

        Ok(Some(PendingTurn {
            conversation_id: conversation_id.to_string(),
            prompt: text.to_string(),
            history,
        }))
    }

    /// Append the reply (or the error message) for a pending turn and clear
    /// the thinking flag.
    pub fn finish_send(
        &mut self,
        turn: &PendingTurn,
        result: Result<AssistantReply, ApiError>,
        now: DateTime<Utc>,
    ) -> Result<(), StateError> {
        let message = chat::reply_message(result, now);
        let next = self
            .state
            .stop_thinking()
            .append_message(&turn.conversation_id, message, now)?;
        self.commit(next);
        Ok(())
    }

    /// Send the content of an existing message again as a new user turn.
    pub fn begin_resend(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingTurn>, StateError> {
        let content = self
            .state
            .conversation(conversation_id)
            .ok_or_else(|| StateError::ConversationNotFound(conversation_id.to_string()))?
            .message(message_id)
            .ok_or_else(|| StateError::MessageNotFound(message_id.to_string()))?
            .content
            .clone();
        self.begin_send(conversation_id, &content, now)
    }

    /// Run a whole turn: append, call the backend, append the reply.
    pub async fn send(
        &mut self,
        backend: &dyn AssistantBackend,
        settings: &AppSettings,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), StateError> {
        let Some(turn) = self.begin_send(conversation_id, text, Utc::now())? else {
            return Ok(());
        };
        let result = chat::respond(backend, settings, &turn).await;
        self.finish_send(&turn, result, Utc::now())
    }

    pub async fn resend(
        &mut self,
        backend: &dyn AssistantBackend,
        settings: &AppSettings,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<(), StateError> {
        let Some(turn) = self.begin_resend(conversation_id, message_id, Utc::now())? else {
            return Ok(());
        };
        let result = chat::respond(backend, settings, &turn).await;
        self.finish_send(&turn, result, Utc::now())
    }
}
