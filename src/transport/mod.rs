//! Boundary to the remote chat service.
//!
//! The dispatcher only sees [`ChatTransport`]; [`HttpTransport`] is the
//! production adapter.

pub mod http;
pub mod types;

pub use http::HttpTransport;
pub use types::{ChatResponse, HistoryResponse, PreferenceUpdate, SendRequest, ServerReply};

use std::future::Future;
use std::pin::Pin;

use crate::core::errors::ClientResult;
use crate::core::ids::ConversationId;
use crate::core::message::{Conversation, OutgoingMessage};

/// Boxed future type for transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything needed to submit one message.
#[derive(Clone, Copy, Debug)]
pub struct SendContext<'a> {
    /// Active conversation, `None` for a draft.
    pub chat_id: Option<&'a ConversationId>,
    /// Reply language.
    pub language: &'a str,
}

/// Operations consumed from the chat service.
pub trait ChatTransport: Send + Sync {
    /// Fetch the conversation history, most recent first.
    ///
    /// # Errors
    /// Returns an error if the request fails or the body cannot be decoded.
    fn fetch_history(&self) -> TransportFuture<'_, ClientResult<Vec<Conversation>>>;

    /// Submit a message over the text or attachment channel.
    ///
    /// A service-level `{ error }` body is a successful call returning
    /// [`ServerReply::Error`].
    ///
    /// # Errors
    /// Returns an error on connection failures or undecodable bodies.
    fn send_message<'a>(
        &'a self,
        message: &'a OutgoingMessage,
        context: SendContext<'a>,
    ) -> TransportFuture<'a, ClientResult<ServerReply>>;

    /// Persist preference changes.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn save_preferences(&self, update: PreferenceUpdate) -> TransportFuture<'_, ClientResult<()>>;
}
