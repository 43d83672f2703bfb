//! Transcript types shared by the store, the transport and the dispatcher.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::ids::ConversationId;

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Written by the local user.
    User,
    /// Produced by the remote service. Spelled `model` on the wire.
    #[serde(rename = "model", alias = "assistant")]
    Assistant,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "model",
        }
    }
}

/// One entry of a transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author.
    pub role: Role,
    /// Text content.
    pub content: String,
}

impl Message {
    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Whether the message was produced by the service.
    #[must_use]
    pub const fn is_assistant(&self) -> bool {
        matches!(self.role, Role::Assistant)
    }
}

/// A titled transcript as persisted by the remote service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Server-issued identifier.
    pub id: ConversationId,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Creation time as reported by the service, when parseable.
    #[serde(rename = "created", default, with = "created_serde")]
    pub created_at: Option<NaiveDateTime>,
    /// Messages in append order.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Title to display, falling back to the id when the title is blank.
    #[must_use]
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            self.id.as_str()
        } else {
            &self.title
        }
    }
}

/// Kind of binary payload attached to an outgoing message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Picture for the model to describe or analyse.
    Image,
    /// Recording for the model to transcribe or analyse.
    Audio,
}

impl AttachmentKind {
    /// Multipart field name used by the service.
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }

    /// MIME type assumed when the caller provides none.
    #[must_use]
    pub const fn default_mime(&self) -> &'static str {
        match self {
            Self::Image => "image/png",
            Self::Audio => "audio/webm",
        }
    }
}

/// Binary payload sent alongside a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Image or audio.
    pub kind: AttachmentKind,
    /// Original file name, forwarded to the service.
    pub file_name: String,
    /// Explicit MIME type.
    pub mime_type: Option<String>,
    /// Raw bytes.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Create an attachment.
    #[must_use]
    pub fn new(kind: AttachmentKind, file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            kind,
            file_name: file_name.into(),
            mime_type: None,
            data,
        }
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// MIME type to send.
    #[must_use]
    pub fn mime(&self) -> &str {
        self.mime_type
            .as_deref()
            .unwrap_or_else(|| self.kind.default_mime())
    }

    /// Short transcript label such as `[image] cat.png`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("[{}] {}", self.kind.field_name(), self.file_name)
    }
}

/// One user intent: text, optionally paired with a single attachment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Text typed by the user. May be empty when an attachment is present.
    pub text: String,
    /// Optional image or audio payload.
    pub attachment: Option<Attachment>,
}

impl OutgoingMessage {
    /// Plain text message.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    /// Message carrying an attachment.
    #[must_use]
    pub fn with_attachment(text: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            text: text.into(),
            attachment: Some(attachment),
        }
    }

    /// True when there is nothing to send.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachment.is_none()
    }

    /// Content shown in the transcript while the request is pending.
    #[must_use]
    pub fn optimistic_content(&self) -> String {
        let text = self.text.trim();
        match (&self.attachment, text.is_empty()) {
            (Some(attachment), true) => attachment.label(),
            _ => text.to_string(),
        }
    }
}

/// Lenient parsing of the service's `created` field.
///
/// Unparseable or missing timestamps become `None` instead of failing the
/// whole payload.
mod created_serde {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| {
            s.parse::<NaiveDateTime>()
                .ok()
                .or_else(|| DateTime::parse_from_rfc3339(&s).ok().map(|dt| dt.naive_utc()))
        }))
    }
}
