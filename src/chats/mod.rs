use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ParlanceError;

/// Author of a locally persisted chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

/// Processing state of a message, for callers that hand replies off to a
/// background pipeline. The gateway itself only produces completed replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    #[default]
    Completed,
    Failed,
}

/// A local conversation record, one per end-user chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Remote thread backing this chat. `None` until the first message is
    /// sent; replaced wholesale when the conversation is cleared or the
    /// remote thread disappears.
    #[serde(default, rename = "threadId")]
    pub thread_id: Option<String>,
    #[serde(default = "Utc::now", rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(title: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            thread_id: None,
            created_at: Utc::now(),
        }
    }
}

/// One transcript entry belonging to a [`Chat`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "chatId")]
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now", rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ProcessingStatus,
    /// Remote run that produced this message, when known.
    #[serde(default, rename = "runId")]
    pub run_id: Option<String>,
    /// Failure detail when processing failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatMessage {
    pub fn user(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_role(chat_id, Role::User, content)
    }

    pub fn bot(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_role(chat_id, Role::Bot, content)
    }

    fn with_role(chat_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            status: ProcessingStatus::Completed,
            run_id: None,
            error: None,
        }
    }

    pub fn with_status(mut self, status: ProcessingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.status = ProcessingStatus::Failed;
        self.error = Some(error.into());
        self
    }
}

/// Durable storage seam for chat records.
///
/// `save` must complete before the gateway sends anything on a newly minted
/// thread, so a later retry or a concurrent caller observes the thread id.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn get(&self, chat_id: &str) -> Result<Option<Chat>, ParlanceError>;
    async fn save(&self, chat: &Chat) -> Result<(), ParlanceError>;
}

/// In-memory [`ChatStore`] for tests and single-process embedders. Also
/// keeps a per-chat transcript so callers have somewhere to persist the
/// messages the gateway returns.
#[derive(Default)]
pub struct MemoryChatStore {
    chats: Mutex<HashMap<String, Chat>>,
    messages: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_message(&self, message: ChatMessage) {
        let mut messages = self
            .messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        messages
            .entry(message.chat_id.clone())
            .or_default()
            .push(message);
    }

    pub fn messages(&self, chat_id: &str) -> Vec<ChatMessage> {
        let messages = self
            .messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        messages.get(chat_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn get(&self, chat_id: &str) -> Result<Option<Chat>, ParlanceError> {
        let chats = self
            .chats
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(chats.get(chat_id).cloned())
    }

    async fn save(&self, chat: &Chat) -> Result<(), ParlanceError> {
        let mut chats = self
            .chats
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        chats.insert(chat.id.clone(), chat.clone());
        Ok(())
    }
}
