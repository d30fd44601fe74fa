//! Delivery channels for ticket notifications: SMTP email and a chat-messaging gateway.

pub mod chat;
pub mod email;

pub use chat::ChatMessageChannel;
pub use email::SmtpEmailChannel;

#[derive(Debug, thiserror::Error)]
pub enum ChannelBuildError {
    #[error("invalid channel configuration: {0}")]
    Invalid(String),
}
