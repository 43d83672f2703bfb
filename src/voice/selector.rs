//! Deterministic voice selection.
//!
//! Precedence, first match wins:
//! 1. gender hint inside the requested language,
//! 2. gender hint anywhere in the catalog,
//! 3. first voice of the requested language,
//! 4. first voice of the catalog.

use crate::voice::hints::GenderHints;
use crate::voice::types::{DEFAULT_LANGUAGE, Voice, VoiceGender};

/// Pick a voice name for the given language and gender.
///
/// Pure: the same inputs always yield the same output.
#[must_use]
pub fn select(
    voices: &[Voice],
    language_tag: &str,
    gender: VoiceGender,
    hints: &GenderHints,
) -> Option<String> {
    let wanted = normalize_tag(language_tag);
    let wanted_primary = primary_subtag(&wanted);

    let in_language: Vec<&Voice> = voices
        .iter()
        .filter(|v| {
            let tag = v.language_tag.to_lowercase();
            tag == wanted || primary_subtag(&tag) == wanted_primary
        })
        .collect();

    let by_gender = |v: &&Voice| hints.matches(&v.name, gender);

    in_language
        .iter()
        .copied()
        .find(by_gender)
        .or_else(|| voices.iter().find(by_gender))
        .or_else(|| in_language.first().copied())
        .or_else(|| voices.first())
        .map(|v| v.name.clone())
}

fn normalize_tag(tag: &str) -> String {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        DEFAULT_LANGUAGE.to_lowercase()
    } else {
        trimmed.to_lowercase()
    }
}

/// First two characters of a lowercased tag.
fn primary_subtag(tag: &str) -> &str {
    tag.char_indices()
        .nth(2)
        .map_or(tag, |(idx, _)| &tag[..idx])
}
