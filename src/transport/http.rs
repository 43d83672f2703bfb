//! reqwest-backed [`ChatTransport`].

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use url::Url;

use crate::core::config::ClientConfig;
use crate::core::errors::{ClientError, ClientResult};
use crate::core::message::{Attachment, Conversation, OutgoingMessage};
use crate::transport::types::{
    ChatResponse, HistoryResponse, PreferenceUpdate, SendRequest, ServerReply,
};
use crate::transport::{ChatTransport, SendContext, TransportFuture};

/// History endpoint.
const HISTORY_PATH: &str = "api/history";
/// Chat endpoint, JSON or multipart.
const CHAT_PATH: &str = "api/chat";
/// Preference endpoint.
const PREFS_PATH: &str = "api/user/prefs";

/// HTTP client for the chat service.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpTransport {
    /// Build a transport from configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base(&config.api_base_url)?,
            token: config.token.clone(),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an endpoint path.
    ///
    /// # Errors
    /// Returns an error if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post_chat(
        &self,
        message: &OutgoingMessage,
        context: SendContext<'_>,
    ) -> ClientResult<ServerReply> {
        let url = self.endpoint(CHAT_PATH)?;
        let request = self.authorize(self.client.post(url));

        let request = match &message.attachment {
            None => request.json(&SendRequest {
                message: message.text.trim(),
                chat_id: context.chat_id.map(|id| id.as_str()),
                lang: context.language,
            }),
            Some(attachment) => request.multipart(multipart_form(message, attachment, context)?),
        };

        let response = request.send().await?;
        let raw: ChatResponse = decode(response).await?;
        Ok(ServerReply::from(raw))
    }
}

impl ChatTransport for HttpTransport {
    fn fetch_history(&self) -> TransportFuture<'_, ClientResult<Vec<Conversation>>> {
        Box::pin(async move {
            let url = self.endpoint(HISTORY_PATH)?;
            let response = self.authorize(self.client.get(url)).send().await?;
            let history: HistoryResponse = decode(response).await?;
            tracing::debug!(count = history.conversations.len(), "Fetched history");
            Ok(history.conversations)
        })
    }

    fn send_message<'a>(
        &'a self,
        message: &'a OutgoingMessage,
        context: SendContext<'a>,
    ) -> TransportFuture<'a, ClientResult<ServerReply>> {
        Box::pin(self.post_chat(message, context))
    }

    fn save_preferences(&self, update: PreferenceUpdate) -> TransportFuture<'_, ClientResult<()>> {
        Box::pin(async move {
            let url = self.endpoint(PREFS_PATH)?;
            let response = self
                .authorize(self.client.post(url))
                .json(&update)
                .send()
                .await?;
            response.error_for_status()?;
            Ok(())
        })
    }
}

/// Ensure the base URL ends with `/` so relative joins keep its path.
fn normalize_base(raw: &str) -> ClientResult<Url> {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("{trimmed}/"))?)
    }
}

fn multipart_form(
    message: &OutgoingMessage,
    attachment: &Attachment,
    context: SendContext<'_>,
) -> ClientResult<Form> {
    let part = Part::bytes(attachment.data.clone())
        .file_name(attachment.file_name.clone())
        .mime_str(attachment.mime())?;

    Ok(Form::new()
        .text("message", message.text.trim().to_string())
        .text(
            "chat_id",
            context
                .chat_id
                .map(ToString::to_string)
                .unwrap_or_default(),
        )
        .text("lang", context.language.to_string())
        .part(attachment.kind.field_name(), part))
}

/// Decode a JSON body regardless of status.
///
/// The service reports failures as `{ "error": ... }` with a non-2xx status,
/// so the body matters more than the status line.
async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|err| {
        tracing::warn!(%status, "Undecodable response body");
        ClientError::from(err)
    })
}
