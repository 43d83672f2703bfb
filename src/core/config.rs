//! Configuration for the conversational client.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::errors::{ClientError, ClientResult};
use crate::voice::hints::{GenderHints, HintTable};
use crate::voice::speech::SpeechSettings;
use crate::voice::types::{DEFAULT_LANGUAGE, Voice, VoiceGender, VoicePreference};

/// Environment variable for the service base URL.
pub const API_URL_ENV: &str = "INTELLBEE_API_URL";
/// Environment variable for the bearer token.
pub const TOKEN_ENV: &str = "INTELLBEE_TOKEN";
/// Environment variable for the preferred language.
pub const LANG_ENV: &str = "INTELLBEE_LANG";
/// Environment variable for the preferred voice gender.
pub const VOICE_GENDER_ENV: &str = "INTELLBEE_VOICE_GENDER";
/// Environment variable toggling narration (`0`/`false`/`off` disable it).
pub const NARRATION_ENV: &str = "INTELLBEE_NARRATION";
/// Environment variable pointing at a JSON configuration file.
pub const CONFIG_FILE_ENV: &str = "INTELLBEE_CONFIG";

/// Default service base URL.
const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";

/// Top-level client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the chat service.
    pub api_base_url: String,
    /// Bearer token issued by the login flow.
    pub token: Option<String>,
    /// Reply and narration language.
    pub language: String,
    /// Preferred narration voice gender.
    pub voice_gender: VoiceGender,
    /// Whether assistant replies are narrated.
    pub narration_enabled: bool,
    /// Whole-request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Prosody settings.
    pub speech: SpeechSettings,
    /// Gender hint patterns.
    pub hints: HintTable,
    /// Voices offered when the host has no platform catalog.
    pub voices: Vec<Voice>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            token: None,
            language: DEFAULT_LANGUAGE.to_string(),
            voice_gender: VoiceGender::Female,
            narration_enabled: true,
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            speech: SpeechSettings::default(),
            hints: HintTable::default(),
            voices: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration: optional JSON file from `INTELLBEE_CONFIG`, then
    /// individual environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or an override
    /// is invalid.
    pub fn from_env() -> ClientResult<Self> {
        let mut config = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.api_base_url = url;
        }
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            config.token = Some(token).filter(|t| !t.trim().is_empty());
        }
        if let Ok(lang) = std::env::var(LANG_ENV) {
            config.language = lang;
        }
        if let Ok(gender) = std::env::var(VOICE_GENDER_ENV) {
            config.voice_gender = gender.parse()?;
        }
        if let Ok(flag) = std::env::var(NARRATION_ENV) {
            config.narration_enabled = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file. Missing fields take defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Set the service base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the language.
    #[must_use]
    pub fn with_language(mut self, lang: impl Into<String>) -> Self {
        self.language = lang.into();
        self
    }

    /// Set the voice gender.
    #[must_use]
    pub const fn with_voice_gender(mut self, gender: VoiceGender) -> Self {
        self.voice_gender = gender;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable narration.
    #[must_use]
    pub const fn with_narration(mut self, enabled: bool) -> Self {
        self.narration_enabled = enabled;
        self
    }

    /// Narration preference derived from language and gender.
    #[must_use]
    pub fn voice_preference(&self) -> VoicePreference {
        VoicePreference::new(self.language.clone(), self.voice_gender)
    }

    /// Compile the gender hint table.
    ///
    /// # Errors
    /// Returns an error if a pattern is invalid.
    pub fn gender_hints(&self) -> ClientResult<GenderHints> {
        GenderHints::compile(&self.hints)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ClientResult<()> {
        Url::parse(&self.api_base_url)?;

        if self.language.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "language must not be empty".to_string(),
            ));
        }

        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ClientError::InvalidConfig(
                "timeouts must be > 0".to_string(),
            ));
        }

        if !(0.1..=10.0).contains(&self.speech.rate) {
            return Err(ClientError::InvalidConfig(
                "speech.rate must be within 0.1..=10".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.speech.pitch) {
            return Err(ClientError::InvalidConfig(
                "speech.pitch must be within 0..=2".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.speech.volume) {
            return Err(ClientError::InvalidConfig(
                "speech.volume must be within 0..=1".to_string(),
            ));
        }

        self.gender_hints()?;
        Ok(())
    }
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.language, "en-US");
        assert_eq!(config.voice_gender, VoiceGender::Female);
        assert!(config.narration_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new()
            .with_api_base_url("https://chat.example.com")
            .with_token("abc")
            .with_language("ta-IN")
            .with_voice_gender(VoiceGender::Male)
            .with_timeout(Duration::from_secs(5))
            .with_narration(false);

        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.voice_preference(),
            VoicePreference::new("ta-IN", VoiceGender::Male)
        );
        assert!(!config.narration_enabled);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ClientConfig::new().with_api_base_url("nope").validate().is_err());
        assert!(ClientConfig::new().with_timeout(Duration::ZERO).validate().is_err());

        let mut loud = ClientConfig::new();
        loud.speech.volume = 3.0;
        assert!(loud.validate().is_err());

        let mut broken = ClientConfig::new();
        broken.hints.male.push("(".to_string());
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let json = r#"{"language":"hi-IN","request_timeout":15,
                       "voices":[{"name":"Lekha","lang":"hi-IN"}]}"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.language, "hi-IN");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.voices.len(), 1);
    }
}
