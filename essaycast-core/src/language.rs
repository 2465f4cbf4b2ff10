//! Language token normalisation.
//!
//! Maps the free-form language token a caller supplies (`"en"`, `"Deutsch"`,
//! `" español "`) onto the descriptor used by the text, speech and prompt
//! back-ends.

use serde::Serialize;
use thiserror::Error;

/// Canonical description of a supported narration language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LanguageDescriptor {
    /// ISO 639-1 code, forwarded to the speech back-end.
    pub code: &'static str,
    /// English display name.
    pub display_name: &'static str,
    /// Name interpolated into generation prompts.
    pub generation_name: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageError {
    #[error("unsupported language: {0}")]
    NotFound(String),
}

const ITALIAN: LanguageDescriptor = LanguageDescriptor {
    code: "it",
    display_name: "Italian",
    generation_name: "Italian",
};
const ENGLISH: LanguageDescriptor = LanguageDescriptor {
    code: "en",
    display_name: "English",
    generation_name: "English",
};
const SPANISH: LanguageDescriptor = LanguageDescriptor {
    code: "es",
    display_name: "Spanish",
    generation_name: "Spanish",
};
const FRENCH: LanguageDescriptor = LanguageDescriptor {
    code: "fr",
    display_name: "French",
    generation_name: "French",
};
const GERMAN: LanguageDescriptor = LanguageDescriptor {
    code: "de",
    display_name: "German",
    generation_name: "German",
};

const TABLE: &[(&str, LanguageDescriptor)] = &[
    ("it", ITALIAN),
    ("italiano", ITALIAN),
    ("italian", ITALIAN),
    ("en", ENGLISH),
    ("english", ENGLISH),
    ("es", SPANISH),
    ("español", SPANISH),
    ("espanol", SPANISH),
    ("spanish", SPANISH),
    ("fr", FRENCH),
    ("français", FRENCH),
    ("francais", FRENCH),
    ("french", FRENCH),
    ("de", GERMAN),
    ("deutsch", GERMAN),
    ("german", GERMAN),
];

/// Resolve a user-supplied token. Lower-cases and trims before lookup.
pub fn resolve(token: &str) -> Result<LanguageDescriptor, LanguageError> {
    let key = token.trim().to_lowercase();
    TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, descriptor)| *descriptor)
        .ok_or_else(|| LanguageError::NotFound(token.trim().to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_codes_and_native_names() {
        assert_eq!(resolve("en").unwrap().code, "en");
        assert_eq!(resolve("Deutsch").unwrap().code, "de");
        assert_eq!(resolve("  Français ").unwrap().display_name, "French");
        assert_eq!(resolve("ESPANOL").unwrap().generation_name, "Spanish");
        assert_eq!(resolve("italiano").unwrap(), resolve("it").unwrap());
    }

    #[test]
    fn unknown_token_is_not_found() {
        assert_eq!(resolve("xx"), Err(LanguageError::NotFound("xx".into())));
        assert!(resolve("").is_err());
    }
}
