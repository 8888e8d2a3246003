//! AI completion abstraction
//!
//! The pipeline only needs "send an ordered conversation, get text back". Concrete
//! providers implement [`CompletionClient`]; tests swap in a canned client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use vitae_core::PipelineError;

/// Roles a completion provider accepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl Display for ChatRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(ChatRole::System),
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// One conversation turn as built by callers. The role is free text until it is filtered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System.as_str(), content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User.as_str(), content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant.as_str(), content)
    }
}

/// Keep the turns whose role a provider accepts, in order.
///
/// Each dropped turn is logged at warn level so a shortened conversation is visible.
pub fn filter_supported_messages(messages: &[ChatMessage]) -> Vec<(ChatRole, &str)> {
    messages
        .iter()
        .enumerate()
        .filter_map(|(index, message)| match message.role.parse::<ChatRole>() {
            Ok(role) => Some((role, message.content.as_str())),
            Err(_) => {
                tracing::warn!(
                    role = %message.role,
                    index = index,
                    "Dropping chat message with unsupported role"
                );
                None
            }
        })
        .collect()
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the conversation and return the text of the first choice.
    ///
    /// Unsupported roles are dropped first; a conversation with nothing left is a
    /// [`PipelineError::Completion`] without any network call.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, PipelineError>;
}
