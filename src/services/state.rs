//! The conversation state as an immutable snapshot.
//!
//! Commands take `&self` and return the next snapshot. Collections sit behind
//! `Arc`s so a command only copies what it changes, and an observer can tell
//! which collections changed with `Arc::ptr_eq`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::RECENT_LIMIT;
use crate::models::{Conversation, Folder, Message, Template};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Folder already exists: {0}")]
    DuplicateFolder(String),

    #[error("Folder name cannot be empty")]
    EmptyFolderName,

    #[error("Template not found: {0}")]
    TemplateNotFound(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub conversations: Arc<Vec<Conversation>>,
    pub selected_id: Option<String>,
    pub folders: Arc<Vec<Folder>>,
    pub templates: Arc<Vec<Template>>,
    /// Sidebar search text.
    pub query: String,
    /// Conversation currently waiting on a reply.
    pub thinking: Option<String>,
}

pub fn seed_folders() -> Vec<Folder> {
    ["Work Projects", "Personal", "Code Reviews"]
        .into_iter()
        .map(Folder::new)
        .collect()
}

pub fn seed_templates() -> Vec<Template> {
    vec![
        Template::new(
            "Bug Report",
            "**Bug Description:**\n\n**Steps to Reproduce:**\n1. \n2. \n3. \n\n**Expected Behavior:**\n\n**Actual Behavior:**",
        ),
        Template::new(
            "Code Review",
            "Please review this code for correctness, readability and performance:\n\n",
        ),
        Template::new(
            "Meeting Notes",
            "**Meeting:** \n**Date:** \n**Attendees:** \n\n**Agenda:**\n- \n\n**Action Items:**\n- ",
        ),
        Template::new("Explain Like I'm Five", "Explain the following in simple terms: "),
    ]
}

/// Persisted collections read back at startup.
#[derive(Debug, Clone, Default)]
pub struct Restored {
    pub conversations: Option<Vec<Conversation>>,
    pub folders: Option<Vec<Folder>>,
    pub templates: Option<Vec<Template>>,
    pub selected_id: Option<String>,
}

impl ChatState {
    /// In-memory defaults used before anything is restored.
    pub fn seeded() -> Self {
        Self {
            folders: Arc::new(seed_folders()),
            templates: Arc::new(seed_templates()),
            ..Self::default()
        }
    }

    // Commands

    /// Merge restored collections over the current ones. Folder and template
    /// lists only replace the seeds when non-empty; the selected id is kept
    /// only if it names a restored conversation.
    pub fn restore(&self, restored: Restored) -> Self {
        let mut next = self.clone();

        let has_conversations = restored.conversations.is_some();
        if let Some(conversations) = restored.conversations {
            next.conversations = Arc::new(conversations);
        }
        if let Some(folders) = restored.folders.filter(|f| !f.is_empty()) {
            next.folders = Arc::new(folders);
        }
        if let Some(templates) = restored.templates.filter(|t| !t.is_empty()) {
            next.templates = Arc::new(templates);
        }
        if has_conversations {
            next.selected_id = restored
                .selected_id
                .filter(|id| next.conversation(id).is_some());
        }
        next
    }

    /// Prepend an empty conversation, select it and clear the search.
    pub fn create(&self, now: DateTime<Utc>) -> Self {
        let conversation = Conversation::new(now);
        let mut next = self.clone();
        next.selected_id = Some(conversation.id.clone());
        next.query.clear();
        Arc::make_mut(&mut next.conversations).insert(0, conversation);
        next
    }

    /// Create a conversation if there are none, then make sure something
    /// valid is selected.
    pub fn ensure_selection(&self, now: DateTime<Utc>) -> Self {
        if self.conversations.is_empty() {
            return self.create(now);
        }
        if self.selected().is_some() {
            return self.clone();
        }
        let mut next = self.clone();
        next.selected_id = self.conversations.first().map(|c| c.id.clone());
        next
    }

    pub fn select(&self, conversation_id: &str) -> Result<Self, StateError> {
        self.require(conversation_id)?;
        let mut next = self.clone();
        next.selected_id = Some(conversation_id.to_string());
        Ok(next)
    }

    pub fn toggle_pin(&self, conversation_id: &str) -> Result<Self, StateError> {
        self.update_conversation(conversation_id, |conv| {
            conv.pinned = !conv.pinned;
            Ok(())
        })
    }

    /// Append a message and bump the conversation's `updated_at`.
    pub fn append_message(
        &self,
        conversation_id: &str,
        message: Message,
        now: DateTime<Utc>,
    ) -> Result<Self, StateError> {
        self.update_conversation(conversation_id, |conv| {
            conv.messages.push(message);
            conv.updated_at = now;
            conv.refresh_summary();
            Ok(())
        })
    }

    /// Replace one message's content and stamp the edit time. `updated_at`
    /// is left alone.
    pub fn edit_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, StateError> {
        self.update_conversation(conversation_id, |conv| {
            let message = conv
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or_else(|| StateError::MessageNotFound(message_id.to_string()))?;
            message.content = content.to_string();
            message.edited_at = Some(now);
            conv.refresh_summary();
            Ok(())
        })
    }

    pub fn set_query(&self, query: &str) -> Self {
        let mut next = self.clone();
        next.query = query.to_string();
        next
    }

    pub fn start_thinking(&self, conversation_id: &str) -> Self {
        let mut next = self.clone();
        next.thinking = Some(conversation_id.to_string());
        next
    }

    /// Drop the waiting flag. Used both for pause and for reply delivery.
    pub fn stop_thinking(&self) -> Self {
        let mut next = self.clone();
        next.thinking = None;
        next
    }

    pub fn create_folder(&self, name: &str) -> Result<Self, StateError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StateError::EmptyFolderName);
        }
        if self.folders.iter().any(|f| f.same_name(name)) {
            return Err(StateError::DuplicateFolder(name.to_string()));
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.folders).push(Folder::new(name));
        Ok(next)
    }

    pub fn add_template(&self, title: &str, content: &str) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.templates).push(Template::new(title.trim(), content));
        next
    }

    pub fn update_template(
        &self,
        template_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Self, StateError> {
        let index = self.template_index(template_id)?;
        let mut next = self.clone();
        let template = &mut Arc::make_mut(&mut next.templates)[index];
        template.title = title.trim().to_string();
        template.content = content.to_string();
        Ok(next)
    }

    pub fn remove_template(&self, template_id: &str) -> Result<Self, StateError> {
        let index = self.template_index(template_id)?;
        let mut next = self.clone();
        Arc::make_mut(&mut next.templates).remove(index);
        Ok(next)
    }

    // Queries

    pub fn conversation(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn selected(&self) -> Option<&Conversation> {
        self.selected_id.as_deref().and_then(|id| self.conversation(id))
    }

    pub fn template(&self, template_id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == template_id)
    }

    pub fn is_thinking(&self, conversation_id: &str) -> bool {
        self.thinking.as_deref() == Some(conversation_id)
    }

    /// Conversations matching the search, in list order.
    pub fn filtered(&self) -> Vec<&Conversation> {
        let query = self.query.trim().to_lowercase();
        self.conversations
            .iter()
            .filter(|c| query.is_empty() || c.matches_query(&query))
            .collect()
    }

    /// Pinned matches, newest first.
    pub fn pinned(&self) -> Vec<&Conversation> {
        let mut pinned: Vec<_> = self.filtered().into_iter().filter(|c| c.pinned).collect();
        pinned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        pinned
    }

    /// The ten newest unpinned matches.
    pub fn recent(&self) -> Vec<&Conversation> {
        let mut recent: Vec<_> = self.filtered().into_iter().filter(|c| !c.pinned).collect();
        recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        recent.truncate(RECENT_LIMIT);
        recent
    }

    /// Conversations per folder, matched on exact name.
    pub fn folder_counts(&self) -> Vec<(&Folder, usize)> {
        self.folders
            .iter()
            .map(|folder| {
                let count = self
                    .conversations
                    .iter()
                    .filter(|c| c.folder == folder.name)
                    .count();
                (folder, count)
            })
            .collect()
    }

    fn require(&self, conversation_id: &str) -> Result<usize, StateError> {
        self.conversations
            .iter()
            .position(|c| c.id == conversation_id)
            .ok_or_else(|| StateError::ConversationNotFound(conversation_id.to_string()))
    }

    fn template_index(&self, template_id: &str) -> Result<usize, StateError> {
        self.templates
            .iter()
            .position(|t| t.id == template_id)
            .ok_or_else(|| StateError::TemplateNotFound(template_id.to_string()))
    }

    fn update_conversation<F>(&self, conversation_id: &str, f: F) -> Result<Self, StateError>
    where
        F: FnOnce(&mut Conversation) -> Result<(), StateError>,
    {
        let index = self.require(conversation_id)?;
        let mut conversation = self.conversations[index].clone();
        f(&mut conversation)?;

        let mut next = self.clone();
        Arc::make_mut(&mut next.conversations)[index] = conversation;
        Ok(next)
    }
}
