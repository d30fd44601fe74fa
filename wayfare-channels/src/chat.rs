use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use wayfare_core::{ChannelError, ChannelKind, NotificationChannel, NotificationMessage};

use crate::ChannelBuildError;

#[derive(Debug, Serialize)]
struct OutgoingDocument<'a> {
    file_name: &'a str,
    mime_type: &'a str,
    data_base64: String,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    to: &'a str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<OutgoingDocument<'a>>,
}

/// Delivers tickets through a chat-messaging HTTP gateway, addressed by phone number.
pub struct ChatMessageChannel {
    client: reqwest::Client,
    gateway_url: String,
    api_token: String,
}

impl ChatMessageChannel {
    pub fn new(gateway_url: impl Into<String>, api_token: String) -> Result<Self, ChannelBuildError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChannelBuildError::Invalid(e.to_string()))?;

        Ok(Self {
            client,
            gateway_url: gateway_url.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }
}

#[async_trait]
impl NotificationChannel for ChatMessageChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::ChatMessage
    }

    async fn send(&self, target: &str, message: &NotificationMessage) -> Result<(), ChannelError> {
        let body = OutgoingMessage {
            to: target,
            text: format!("{}\n\n{}", message.subject, message.body),
            document: message.attachment.as_deref().map(|a| OutgoingDocument {
                file_name: &a.file_name,
                mime_type: &a.content_type,
                data_base64: STANDARD.encode(&a.bytes),
            }),
        };

        let response = self
            .client
            .post(format!("{}/messages", self.gateway_url))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(with_document = body.document.is_some(), "Chat message accepted");
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        warn!(%status, "Chat gateway refused message: {}", detail);
        match status {
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                Err(ChannelError::Transport(format!("{}: {}", status, detail)))
            }
            s if s.is_client_error() => Err(ChannelError::Rejected(format!("{}: {}", status, detail))),
            _ => Err(ChannelError::Transport(format!("{}: {}", status, detail))),
        }
    }
}
