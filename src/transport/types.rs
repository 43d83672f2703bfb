//! Wire types exchanged with the chat service.

use serde::{Deserialize, Serialize};

use crate::core::message::Conversation;
use crate::voice::types::VoiceGender;

/// JSON body of a text-only send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SendRequest<'a> {
    /// Message text.
    pub message: &'a str,
    /// Conversation to append to, `null` to start a new one.
    pub chat_id: Option<&'a str>,
    /// Reply language.
    pub lang: &'a str,
}

/// Body of `GET /api/history`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct HistoryResponse {
    /// Conversations, most recent first.
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

/// Raw body of `POST /api/chat`. Any subset of fields may be present.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatResponse {
    /// Full conversation list after the exchange.
    #[serde(default)]
    pub conversations: Option<Vec<Conversation>>,
    /// Bare assistant reply.
    #[serde(default)]
    pub response: Option<String>,
    /// Service-reported error.
    #[serde(default)]
    pub error: Option<String>,
}

/// Interpreted chat response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerReply {
    /// Authoritative conversation list, never empty.
    Conversations(Vec<Conversation>),
    /// Single assistant reply without the list.
    Reply(String),
    /// Error notice for the user, not part of the transcript.
    Error(String),
    /// None of the above.
    Empty,
}

impl From<ChatResponse> for ServerReply {
    /// Precedence: non-empty list, then reply, then error.
    fn from(raw: ChatResponse) -> Self {
        match raw {
            ChatResponse {
                conversations: Some(list),
                ..
            } if !list.is_empty() => Self::Conversations(list),
            ChatResponse {
                response: Some(text),
                ..
            } => Self::Reply(text),
            ChatResponse {
                error: Some(text), ..
            } => Self::Error(text),
            _ => Self::Empty,
        }
    }
}

/// Body of `POST /api/user/prefs`. Absent fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PreferenceUpdate {
    /// New narration and reply language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// New voice gender.
    #[serde(rename = "voiceGender", skip_serializing_if = "Option::is_none")]
    pub voice_gender: Option<VoiceGender>,
}

impl PreferenceUpdate {
    /// Update only the language.
    #[must_use]
    pub fn language(lang: impl Into<String>) -> Self {
        Self {
            lang: Some(lang.into()),
            voice_gender: None,
        }
    }

    /// Update only the voice gender.
    #[must_use]
    pub const fn gender(gender: VoiceGender) -> Self {
        Self {
            lang: None,
            voice_gender: Some(gender),
        }
    }
}
