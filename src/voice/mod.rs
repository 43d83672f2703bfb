//! Voice output: catalog readiness, voice selection and narration playback.

pub mod catalog;
pub mod hints;
pub mod selector;
pub mod speech;
pub mod types;

pub use catalog::{StaticVoiceSource, VoiceCatalog, VoiceSource};
pub use hints::{GenderHints, HintTable};
pub use selector::select;
pub use speech::{SpeechController, SpeechEngine, SpeechSettings, TracingSpeechEngine, Utterance};
pub use types::{DEFAULT_LANGUAGE, Voice, VoiceGender, VoicePreference};
