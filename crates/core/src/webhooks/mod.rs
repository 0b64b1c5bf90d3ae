//! Inbound organization webhooks: signature check, event parsing and application.

pub mod crypto;
pub mod event;
pub mod processor;

pub use event::WebhookEvent;
pub use processor::{WebhookProcessor, WebhookReply};
