//! Voice and preference types.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::ClientError;

/// Default narration language.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// A narration voice exposed by the platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Platform identifier, also what gender hints are matched against.
    pub name: String,
    /// BCP-47 language tag such as `en-GB`.
    #[serde(alias = "lang")]
    pub language_tag: String,
    /// Free-text description from the platform.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the platform marks this voice as its default.
    #[serde(default)]
    pub is_default: bool,
}

impl Voice {
    /// Create a voice with no extra metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, language_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language_tag: language_tag.into(),
            description: None,
            is_default: false,
        }
    }
}

/// Requested voice gender.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    /// Feminine voice.
    #[default]
    Female,
    /// Masculine voice.
    Male,
}

impl VoiceGender {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
        }
    }
}

impl fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceGender {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" => Ok(Self::Female),
            "male" => Ok(Self::Male),
            other => Err(ClientError::InvalidConfig(format!(
                "unknown voice gender: {other}"
            ))),
        }
    }
}

/// Per-request narration preference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicePreference {
    /// Language to narrate in.
    pub language_tag: String,
    /// Preferred voice gender.
    pub gender: VoiceGender,
}

impl Default for VoicePreference {
    fn default() -> Self {
        Self {
            language_tag: DEFAULT_LANGUAGE.to_string(),
            gender: VoiceGender::Female,
        }
    }
}

impl VoicePreference {
    /// Create a preference.
    #[must_use]
    pub fn new(language_tag: impl Into<String>, gender: VoiceGender) -> Self {
        Self {
            language_tag: language_tag.into(),
            gender,
        }
    }
}
