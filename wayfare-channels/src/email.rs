use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, warn};
use wayfare_core::{ChannelError, ChannelKind, NotificationChannel, NotificationMessage};

use crate::ChannelBuildError;

/// Sends ticket notifications over SMTP with STARTTLS.
pub struct SmtpEmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailChannel {
    pub fn new(
        host: &str,
        port: u16,
        username: String,
        password: String,
        from_address: &str,
    ) -> Result<Self, ChannelBuildError> {
        let from = from_address
            .parse::<Mailbox>()
            .map_err(|e| ChannelBuildError::Invalid(format!("from address: {}", e)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| ChannelBuildError::Invalid(format!("smtp relay {}: {}", host, e)))?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self { transport, from })
    }
}

/// Builds the MIME message. The ticket goes in as a second part when present.
pub fn build_message(
    from: &Mailbox,
    target: &str,
    message: &NotificationMessage,
) -> Result<Message, ChannelError> {
    let to = target
        .parse::<Mailbox>()
        .map_err(|e| ChannelError::Rejected(format!("invalid recipient: {}", e)))?;

    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.as_str());

    let built = match &message.attachment {
        Some(artifact) => {
            let content_type = ContentType::parse(&artifact.content_type)
                .map_err(|e| ChannelError::Transport(format!("attachment content type: {}", e)))?;
            let attachment = Attachment::new(artifact.file_name.clone())
                .body(artifact.bytes.clone(), content_type);
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(message.body.clone()))
                    .singlepart(attachment),
            )
        }
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone()),
    };

    built.map_err(|e| ChannelError::Transport(format!("failed to build email: {}", e)))
}

#[async_trait]
impl NotificationChannel for SmtpEmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, target: &str, message: &NotificationMessage) -> Result<(), ChannelError> {
        let email = build_message(&self.from, target, message)?;

        match self.transport.send(email).await {
            Ok(response) => {
                debug!(code = %response.code(), "Email accepted by relay");
                Ok(())
            }
            Err(e) if e.is_permanent() => {
                warn!("Email permanently rejected: {}", e);
                Err(ChannelError::Rejected(e.to_string()))
            }
            Err(e) => Err(ChannelError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wayfare_core::TicketArtifact;

    fn from() -> Mailbox {
        "Wayfare <tickets@wayfare.example>".parse().unwrap()
    }

    fn message(attachment: Option<TicketArtifact>) -> NotificationMessage {
        NotificationMessage {
            subject: "Your ticket".to_string(),
            body: "Have a good trip".to_string(),
            attachment: attachment.map(Arc::new),
        }
    }

    #[test]
    fn test_message_carries_attachment() {
        let artifact = TicketArtifact {
            file_name: "ticket-order-1.txt".to_string(),
            content_type: "text/plain".to_string(),
            bytes: b"SEAT 12".to_vec(),
        };

        let email = build_message(&from(), "ana@example.com", &message(Some(artifact))).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("ticket-order-1.txt"));
        assert!(raw.contains("Subject: Your ticket"));
    }

    #[test]
    fn test_message_without_attachment_is_plain() {
        let email = build_message(&from(), "ana@example.com", &message(None)).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(!raw.contains("multipart"));
        assert!(raw.contains("Have a good trip"));
    }

    #[test]
    fn test_bad_recipient_is_rejected() {
        let err = build_message(&from(), "not an address", &message(None)).unwrap_err();
        assert!(matches!(err, ChannelError::Rejected(_)));
    }
}
