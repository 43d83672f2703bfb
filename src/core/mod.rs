//! Core types: configuration, errors, identifiers and transcript data.

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;

pub use config::ClientConfig;
pub use errors::{ClientError, ClientResult};
pub use ids::{ConversationId, UtteranceId};
pub use message::{Attachment, AttachmentKind, Conversation, Message, OutgoingMessage, Role};
