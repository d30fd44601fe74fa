use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::reservation::TicketRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    ChatMessage,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::ChatMessage => "chat_message",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered ticket, e.g. a PDF, ready to be attached to a notification.
#[derive(Clone, PartialEq, Eq)]
pub struct TicketArtifact {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for TicketArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketArtifact")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub subject: String,
    pub body: String,
    pub attachment: Option<Arc<TicketArtifact>>,
}

/// What a job points at: the cached record and, when rendering succeeded,
/// the artifact to attach.
#[derive(Debug, Clone)]
pub struct JobPayload {
    pub order_id: String,
    pub artifact: Option<Arc<TicketArtifact>>,
}

#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub channel: ChannelKind,
    pub target: String,
    pub payload: JobPayload,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl NotificationJob {
    pub fn new(channel: ChannelKind, target: String, payload: JobPayload) -> Self {
        Self {
            channel,
            target,
            payload,
            attempts: 0,
            last_error: None,
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Recipient rejected: {0}")]
    Rejected(String),
    #[error("Transport failure: {0}")]
    Transport(String),
}

/// A delivery channel's send capability.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn send(&self, target: &str, message: &NotificationMessage) -> Result<(), ChannelError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Ticket rendering failed: {0}")]
    Failed(String),
}

/// Turns a finalized record into a printable artifact.
#[async_trait]
pub trait TicketRenderer: Send + Sync {
    async fn render(&self, record: &TicketRecord) -> Result<TicketArtifact, RenderError>;
}
