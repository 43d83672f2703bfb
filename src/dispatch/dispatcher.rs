//! Message submission and reconciliation routing.
//!
//! Every channel (plain text, image, audio) goes through the same sequence:
//! optimistic append, transport send, reconcile or record the failure, then
//! narrate the newest assistant message when narration is on.
//!
//! One dispatch may be in flight per session. A send issued while another is
//! pending is rejected with [`ClientError::DispatchInFlight`].
//!
//! A send whose future is dropped before the response arrives is closed out
//! with a failure notice. A response that arrives after the user signed out
//! or changed conversation is discarded.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::conversation::store::{ConversationStore, Reconciled, SessionSnapshot};
use crate::core::config::ClientConfig;
use crate::core::errors::{ClientError, ClientResult};
use crate::core::ids::{ConversationId, UtteranceId};
use crate::core::message::{Attachment, OutgoingMessage};
use crate::transport::types::PreferenceUpdate;
use crate::transport::{ChatTransport, SendContext};
use crate::voice::speech::SpeechController;
use crate::voice::types::{VoiceGender, VoicePreference};

/// Narration toggle and voice preference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NarrationSettings {
    /// Whether new assistant replies are spoken.
    pub enabled: bool,
    /// Language and gender used for replies and narration.
    pub preference: VoicePreference,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            preference: VoicePreference::default(),
        }
    }
}

impl From<&ClientConfig> for NarrationSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            enabled: config.narration_enabled,
            preference: config.voice_preference(),
        }
    }
}

/// Result of one send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing to send; state untouched.
    Skipped,
    /// The service returned the full list; it replaced local state.
    Replaced {
        /// Utterance started for the newest reply, if narrated.
        narrated: Option<UtteranceId>,
    },
    /// The service returned a single reply; it was appended.
    Appended {
        /// Utterance started for the reply, if narrated.
        narrated: Option<UtteranceId>,
    },
    /// The service reported an error; show it outside the transcript.
    ServiceError(String),
    /// The response carried nothing usable.
    Ambiguous,
    /// The request failed; a notice was appended to the transcript.
    TransportFailed(String),
    /// The session changed while the request was in flight; the response
    /// was dropped.
    Discarded,
}

/// Closes out a pending send if its future is dropped mid-flight.
struct InFlight {
    store: Arc<RwLock<ConversationStore>>,
    epoch: u64,
    armed: bool,
}

impl InFlight {
    const fn new(store: Arc<RwLock<ConversationStore>>, epoch: u64) -> Self {
        Self {
            store,
            epoch,
            armed: true,
        }
    }

    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(epoch = self.epoch, "Send dropped before its response");
        if let Ok(mut store) = self.store.try_write() {
            store.abandon_dispatch(self.epoch);
            return;
        }
        // Lock busy: finish on the runtime instead of blocking in drop.
        let store = Arc::clone(&self.store);
        let epoch = self.epoch;
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                store.write().await.abandon_dispatch(epoch);
            });
        }
    }
}

/// Submits user intents and routes responses into the store and narration.
pub struct MessageDispatcher {
    store: Arc<RwLock<ConversationStore>>,
    transport: Arc<dyn ChatTransport>,
    speech: Arc<SpeechController>,
    narration: RwLock<NarrationSettings>,
}

impl MessageDispatcher {
    /// Create a dispatcher over an empty store.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        speech: Arc<SpeechController>,
        narration: NarrationSettings,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(ConversationStore::new())),
            transport,
            speech,
            narration: RwLock::new(narration),
        }
    }

    /// Shared handle to the store, for readers.
    #[must_use]
    pub fn store(&self) -> Arc<RwLock<ConversationStore>> {
        Arc::clone(&self.store)
    }

    /// Speech controller used for narration.
    #[must_use]
    pub const fn speech(&self) -> &Arc<SpeechController> {
        &self.speech
    }

    /// Copy of the session state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.store.read().await.snapshot()
    }

    /// Current narration settings.
    pub async fn narration(&self) -> NarrationSettings {
        self.narration.read().await.clone()
    }

    /// Fetch history and install it. Returns the number of conversations.
    ///
    /// # Errors
    /// Returns an error if the transport fails; local state is untouched.
    pub async fn load_history(&self) -> ClientResult<usize> {
        let list = self.transport.fetch_history().await.map_err(|err| {
            warn!(?err, "Failed to load history");
            err
        })?;
        let count = list.len();
        self.store.write().await.load_history(list);
        info!(count, "History loaded");
        Ok(count)
    }

    /// Send plain text.
    ///
    /// # Errors
    /// See [`Self::send`].
    pub async fn send_text(&self, text: impl Into<String>) -> ClientResult<DispatchOutcome> {
        self.send(OutgoingMessage::text(text)).await
    }

    /// Send an image or audio attachment with optional text.
    ///
    /// # Errors
    /// See [`Self::send`].
    pub async fn send_attachment(
        &self,
        text: impl Into<String>,
        attachment: Attachment,
    ) -> ClientResult<DispatchOutcome> {
        self.send(OutgoingMessage::with_attachment(text, attachment))
            .await
    }

    /// Submit one message.
    ///
    /// Transport failures and service errors are outcomes, not errors.
    ///
    /// # Errors
    /// Returns [`ClientError::DispatchInFlight`] if another send is pending.
    pub async fn send(&self, message: OutgoingMessage) -> ClientResult<DispatchOutcome> {
        if message.is_empty() {
            return Ok(DispatchOutcome::Skipped);
        }

        let (chat_id, epoch) = {
            let mut store = self.store.write().await;
            if store.is_pending() {
                debug!("Rejecting send while another is pending");
                return Err(ClientError::DispatchInFlight);
            }
            store.append_optimistic(message.optimistic_content());
            (store.active_id().cloned(), store.epoch())
        };
        let mut in_flight = InFlight::new(Arc::clone(&self.store), epoch);
        let settings = self.narration().await;

        let context = SendContext {
            chat_id: chat_id.as_ref(),
            language: &settings.preference.language_tag,
        };
        let result = self.transport.send_message(&message, context).await;

        let mut store = self.store.write().await;
        in_flight.disarm();
        if store.epoch() != epoch {
            debug!(epoch, current = store.epoch(), "Discarding stale response");
            return Ok(DispatchOutcome::Discarded);
        }
        let effect = match result {
            Ok(reply) => store.reconcile(reply),
            Err(err) => {
                let reason = err.to_string();
                store.reconcile_failure(&reason);
                return Ok(DispatchOutcome::TransportFailed(reason));
            }
        };

        let latest = effect
            .has_new_reply()
            .then(|| store.latest_assistant_message().map(|m| m.content.clone()))
            .flatten();
        drop(store);

        let outcome = match effect {
            Reconciled::Replaced => DispatchOutcome::Replaced {
                narrated: self.narrate(latest.as_deref(), &settings),
            },
            Reconciled::Appended => DispatchOutcome::Appended {
                narrated: self.narrate(latest.as_deref(), &settings),
            },
            Reconciled::Notice(notice) => {
                info!(%notice, "Service reported an error");
                DispatchOutcome::ServiceError(notice)
            }
            Reconciled::Nothing => DispatchOutcome::Ambiguous,
        };
        Ok(outcome)
    }

    /// Make `id` the active conversation. Returns `false` if unknown.
    ///
    /// A send still in flight for the previous conversation is discarded.
    pub async fn select_conversation(&self, id: &ConversationId) -> bool {
        self.store.write().await.select_conversation(id)
    }

    /// Switch to an empty draft conversation, discarding any send in flight.
    pub async fn start_new_conversation(&self) {
        self.store.write().await.start_new_conversation();
    }

    /// Clear the session and stop narration. A send in flight is discarded.
    pub async fn sign_out(&self) {
        self.speech.stop();
        self.store.write().await.reset();
        info!("Session cleared");
    }

    /// Turn narration on or off. Turning it off stops playback.
    pub async fn set_narration_enabled(&self, enabled: bool) {
        self.narration.write().await.enabled = enabled;
        if !enabled {
            self.speech.stop();
        }
    }

    /// Change the reply and narration language and persist it in the
    /// background.
    pub async fn set_language(&self, language: impl Into<String>) -> JoinHandle<()> {
        let language = language.into();
        self.narration.write().await.preference.language_tag = language.clone();
        self.persist(PreferenceUpdate::language(language))
    }

    /// Change the narration voice gender and persist it in the background.
    pub async fn set_voice_gender(&self, gender: VoiceGender) -> JoinHandle<()> {
        self.narration.write().await.preference.gender = gender;
        self.persist(PreferenceUpdate::gender(gender))
    }

    fn persist(&self, update: PreferenceUpdate) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(err) = transport.save_preferences(update).await {
                warn!(?err, "Failed to save preferences");
            }
        })
    }

    fn narrate(&self, text: Option<&str>, settings: &NarrationSettings) -> Option<UtteranceId> {
        if !settings.enabled {
            return None;
        }
        match self.speech.speak(text?, &settings.preference, None) {
            Ok(id) => id,
            Err(err) => {
                warn!(?err, "Narration failed");
                None
            }
        }
    }
}
