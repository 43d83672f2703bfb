//! Narration playback with a single active utterance.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::errors::{ClientError, ClientResult};
use crate::core::ids::UtteranceId;
use crate::voice::catalog::VoiceCatalog;
use crate::voice::hints::GenderHints;
use crate::voice::selector;
use crate::voice::types::VoicePreference;

/// Prosody settings applied to every utterance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeechSettings {
    /// Speaking rate, 1.0 is normal.
    pub rate: f32,
    /// Pitch, 1.0 is normal.
    pub pitch: f32,
    /// Volume between 0.0 and 1.0.
    pub volume: f32,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// One narration playback request handed to the platform.
#[derive(Clone, Debug, PartialEq)]
pub struct Utterance {
    /// Local identifier.
    pub id: UtteranceId,
    /// Text to narrate.
    pub text: String,
    /// Language the platform should assume.
    pub language_tag: String,
    /// Voice name, `None` for the platform default.
    pub voice: Option<String>,
    /// Speaking rate.
    pub rate: f32,
    /// Pitch.
    pub pitch: f32,
    /// Volume.
    pub volume: f32,
}

/// Platform speech output.
pub trait SpeechEngine: Send + Sync {
    /// Start playing an utterance.
    ///
    /// # Errors
    /// Returns an error if the platform rejects the utterance.
    fn start(&self, utterance: &Utterance) -> ClientResult<()>;

    /// Cancel whatever is playing. Must be harmless when idle.
    fn cancel(&self);
}

/// Engine that narrates into the log, for hosts without audio output.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSpeechEngine;

impl SpeechEngine for TracingSpeechEngine {
    fn start(&self, utterance: &Utterance) -> ClientResult<()> {
        info!(
            id = %utterance.id,
            voice = utterance.voice.as_deref().unwrap_or("<default>"),
            lang = %utterance.language_tag,
            chars = utterance.text.chars().count(),
            "Speaking"
        );
        Ok(())
    }

    fn cancel(&self) {
        debug!("Speech cancelled");
    }
}

/// Owns the single "currently playing" utterance.
pub struct SpeechController {
    engine: Arc<dyn SpeechEngine>,
    catalog: Arc<VoiceCatalog>,
    hints: GenderHints,
    settings: SpeechSettings,
    active: Mutex<Option<UtteranceId>>,
}

impl SpeechController {
    /// Create a controller.
    #[must_use]
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        catalog: Arc<VoiceCatalog>,
        hints: GenderHints,
        settings: SpeechSettings,
    ) -> Self {
        Self {
            engine,
            catalog,
            hints,
            settings,
            active: Mutex::new(None),
        }
    }

    /// Voice catalog used for selection.
    #[must_use]
    pub const fn catalog(&self) -> &Arc<VoiceCatalog> {
        &self.catalog
    }

    /// Narrate `text`, replacing anything currently playing.
    ///
    /// Blank text is a no-op and returns `Ok(None)`. When no voice is given
    /// one is selected from the catalog; an unknown or missing voice falls
    /// back to the platform default.
    ///
    /// # Errors
    /// Returns an error if the engine refuses to start the utterance.
    pub fn speak(
        &self,
        text: &str,
        preference: &VoicePreference,
        voice: Option<&str>,
    ) -> ClientResult<Option<UtteranceId>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.take() {
            debug!(%previous, "Cancelling previous utterance");
        }
        self.engine.cancel();

        let voices = self.catalog.snapshot();
        let requested = voice.map(str::to_string).or_else(|| {
            selector::select(
                &voices,
                &preference.language_tag,
                preference.gender,
                &self.hints,
            )
        });
        let resolved = requested.filter(|name| voices.iter().any(|v| &v.name == name));
        if resolved.is_none() {
            debug!("No matching voice, using platform default");
        }

        let utterance = Utterance {
            id: UtteranceId::new(),
            text: text.to_string(),
            language_tag: preference.language_tag.clone(),
            voice: resolved,
            rate: self.settings.rate,
            pitch: self.settings.pitch,
            volume: self.settings.volume,
        };

        self.engine.start(&utterance).map_err(|err| {
            warn!(?err, "Speech engine refused utterance");
            match err {
                ClientError::Speech(msg) => ClientError::Speech(msg),
                other => ClientError::Speech(other.to_string()),
            }
        })?;
        *active = Some(utterance.id);
        Ok(Some(utterance.id))
    }

    /// Cancel playback. Idempotent.
    pub fn stop(&self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        self.engine.cancel();
        if let Some(id) = active.take() {
            debug!(%id, "Utterance stopped");
        }
    }

    /// Identifier of the current utterance, if any.
    #[must_use]
    pub fn active(&self) -> Option<UtteranceId> {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::voice::catalog::StaticVoiceSource;
    use crate::voice::types::{Voice, VoiceGender};

    /// Engine event recorded by [`RecordingEngine`].
    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum EngineEvent {
        Start { text: String, voice: Option<String> },
        Cancel,
    }

    /// Engine recording calls and tracking how many utterances play at once.
    #[derive(Default)]
    pub(crate) struct RecordingEngine {
        pub(crate) events: Mutex<Vec<EngineEvent>>,
        playing: Mutex<usize>,
        max_playing: Mutex<usize>,
    }

    impl RecordingEngine {
        pub(crate) fn events(&self) -> Vec<EngineEvent> {
            self.events.lock().unwrap().clone()
        }

        pub(crate) fn spoken(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    EngineEvent::Start { text, .. } => Some(text),
                    EngineEvent::Cancel => None,
                })
                .collect()
        }

        /// Voice requested by each started utterance, in order.
        pub(crate) fn voices(&self) -> Vec<Option<String>> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    EngineEvent::Start { voice, .. } => Some(voice),
                    EngineEvent::Cancel => None,
                })
                .collect()
        }

        fn max_playing(&self) -> usize {
            *self.max_playing.lock().unwrap()
        }
    }

    impl SpeechEngine for RecordingEngine {
        fn start(&self, utterance: &Utterance) -> ClientResult<()> {
            self.events.lock().unwrap().push(EngineEvent::Start {
                text: utterance.text.clone(),
                voice: utterance.voice.clone(),
            });
            let mut playing = self.playing.lock().unwrap();
            let mut max = self.max_playing.lock().unwrap();
            *playing += 1;
            *max = (*max).max(*playing);
            Ok(())
        }

        fn cancel(&self) {
            self.events.lock().unwrap().push(EngineEvent::Cancel);
            *self.playing.lock().unwrap() = 0;
        }
    }

    fn build(voices: Vec<Voice>) -> (SpeechController, Arc<RecordingEngine>) {
        let engine = Arc::new(RecordingEngine::default());
        let catalog = Arc::new(VoiceCatalog::new(Arc::new(StaticVoiceSource::new(voices))));
        let controller = SpeechController::new(
            engine.clone(),
            catalog,
            GenderHints::default(),
            SpeechSettings::default(),
        );
        (controller, engine)
    }

    #[test]
    fn test_blank_text_is_noop() {
        let (controller, engine) = build(vec![Voice::new("Aria", "en-US")]);
        let result = controller.speak("   ", &VoicePreference::default(), None);
        assert!(matches!(result, Ok(None)));
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_second_speak_cancels_first() {
        let (controller, engine) = build(vec![Voice::new("Aria", "en-US")]);
        let pref = VoicePreference::default();

        let first = controller.speak("one", &pref, None).unwrap();
        let second = controller.speak("two", &pref, None).unwrap();

        assert!(first.is_some());
        assert_ne!(first, second);
        assert_eq!(controller.active(), second);
        assert_eq!(engine.max_playing(), 1);
        let events = engine.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[2], EngineEvent::Cancel);
    }

    #[test]
    fn test_selects_voice_from_catalog() {
        let (controller, engine) =
            build(vec![Voice::new("Aria", "en-US"), Voice::new("Daniel", "en-GB")]);
        let pref = VoicePreference::new("en-US", VoiceGender::Male);
        controller.speak("hello", &pref, None).unwrap();

        assert_eq!(engine.voices(), vec![Some("Daniel".to_string())]);
        assert_eq!(
            engine.events().last(),
            Some(&EngineEvent::Start {
                text: "hello".to_string(),
                voice: Some("Daniel".to_string()),
            })
        );
    }

    #[test]
    fn test_unknown_explicit_voice_falls_back_to_default() {
        let (controller, engine) = build(vec![Voice::new("Aria", "en-US")]);
        controller
            .speak("hello", &VoicePreference::default(), Some("Nobody"))
            .unwrap();

        assert_eq!(engine.voices(), vec![None]);
        assert_eq!(
            engine.events().last(),
            Some(&EngineEvent::Start {
                text: "hello".to_string(),
                voice: None,
            })
        );
    }

    #[test]
    fn test_empty_catalog_uses_platform_default() {
        let (controller, engine) = build(Vec::new());
        let result = controller.speak("hello", &VoicePreference::default(), None);
        assert!(matches!(result, Ok(Some(_))));
        assert_eq!(engine.spoken(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (controller, _engine) = build(vec![Voice::new("Aria", "en-US")]);
        controller.stop();
        let _ = controller.speak("hello", &VoicePreference::default(), None);
        assert!(controller.active().is_some());
        controller.stop();
        controller.stop();
        assert!(controller.active().is_none());
    }
}
