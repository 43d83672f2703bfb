//! Gender hint table used to guess a voice's gender from its name.
//!
//! Platforms rarely expose gender metadata, so selection falls back to
//! matching voice names against an ordered list of patterns per gender.
//! The table is data: locales can extend it without touching selection.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::core::errors::ClientResult;
use crate::voice::types::VoiceGender;

/// Raw, serializable pattern table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintTable {
    /// Patterns suggesting a feminine voice, in priority order.
    pub female: Vec<String>,
    /// Patterns suggesting a masculine voice, in priority order.
    pub male: Vec<String>,
}

impl Default for HintTable {
    fn default() -> Self {
        Self {
            female: vec![
                r"\bfemale\b".to_string(),
                r"\bwoman\b".to_string(),
                r"samantha|victoria|zira|zia|karen|susan|google.*\bfemale\b".to_string(),
                r"neural.*\bfemale\b".to_string(),
            ],
            male: vec![
                r"\bmale\b".to_string(),
                r"\bman\b".to_string(),
                r"daniel|alex|fred|david|google.*\bmale\b".to_string(),
                r"neural.*\bmale\b".to_string(),
            ],
        }
    }
}

impl HintTable {
    /// Append a feminine pattern.
    #[must_use]
    pub fn with_female(mut self, pattern: impl Into<String>) -> Self {
        self.female.push(pattern.into());
        self
    }

    /// Append a masculine pattern.
    #[must_use]
    pub fn with_male(mut self, pattern: impl Into<String>) -> Self {
        self.male.push(pattern.into());
        self
    }
}

/// Compiled, case-insensitive hint table.
#[derive(Clone, Debug)]
pub struct GenderHints {
    female: Vec<Regex>,
    male: Vec<Regex>,
}

impl GenderHints {
    /// Compile a table.
    ///
    /// # Errors
    /// Returns an error if any pattern is not a valid regex.
    pub fn compile(table: &HintTable) -> ClientResult<Self> {
        Ok(Self {
            female: compile_all(&table.female)?,
            male: compile_all(&table.male)?,
        })
    }

    /// Whether `name` looks like a voice of the given gender.
    #[must_use]
    pub fn matches(&self, name: &str, gender: VoiceGender) -> bool {
        self.patterns(gender).iter().any(|re| re.is_match(name))
    }

    fn patterns(&self, gender: VoiceGender) -> &[Regex] {
        match gender {
            VoiceGender::Female => &self.female,
            VoiceGender::Male => &self.male,
        }
    }
}

impl Default for GenderHints {
    fn default() -> Self {
        // The built-in table is known to compile.
        Self::compile(&HintTable::default()).unwrap_or_else(|_| Self {
            female: Vec::new(),
            male: Vec::new(),
        })
    }
}

fn compile_all(patterns: &[String]) -> ClientResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(Into::into)
        })
        .collect()
}
