//! Language table and translation resolution.
//!
//! Requested target languages may be given either as display names
//! ("German") or as short codes ("de"), in any case. Each one is resolved
//! against the configured table and translated independently.

use std::collections::BTreeMap;

use planbot_core::error::CapabilityError;
use planbot_core::service::Translator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Canonical lower-case code → display name. Read-only after startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageTable {
    entries: BTreeMap<String, String>,
}

impl LanguageTable {
    /// Build a table; codes are normalized to lower case.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(code, name)| (code.trim().to_lowercase(), name.trim().to_string()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `(code, display name)` pairs in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, n)| (c.as_str(), n.as_str()))
    }

    /// Resolve a user-supplied token to a canonical code.
    ///
    /// Display names win over codes.
    pub fn resolve(&self, token: &str) -> Option<String> {
        let wanted = token.trim().to_lowercase();
        let by_name: BTreeMap<String, &str> = self
            .entries
            .iter()
            .map(|(code, name)| (name.to_lowercase(), code.as_str()))
            .collect();

        if let Some(code) = by_name.get(&wanted) {
            return Some((*code).to_string());
        }
        self.entries.contains_key(&wanted).then_some(wanted)
    }

    /// The "Show languages" listing.
    pub fn listing(&self) -> String {
        if self.entries.is_empty() {
            return "No supported languages found in the configuration.".to_string();
        }
        let lines: Vec<String> = self
            .iter()
            .map(|(code, name)| format!("{name} ({code})"))
            .collect();
        format!("Supported languages:\n{}", lines.join("\n"))
    }
}

/// The batch was cancelled before every target was processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationAborted;

/// Translate `text` into every target, one result line per target, in order.
///
/// Backend failures become inline lines and processing continues; only
/// cancellation stops the batch.
pub async fn translate_all(
    translator: &dyn Translator,
    languages: &LanguageTable,
    text: &str,
    targets: &[String],
    cancel: &CancellationToken,
) -> Result<Vec<String>, TranslationAborted> {
    let mut lines = Vec::with_capacity(targets.len());

    for target in targets {
        let Some(code) = languages.resolve(target) else {
            lines.push(format!("The language '{target}' is not supported."));
            continue;
        };

        debug!(target = %target, code = %code, "Translating");
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TranslationAborted),
            result = translator.translate(text, &code) => result,
        };

        match result {
            Ok(translated) => lines.push(format!("Translated to {target}: {translated}")),
            Err(CapabilityError::Cancelled(_)) => return Err(TranslationAborted),
            Err(e) => {
                warn!(target = %target, error = %e, "Translation failed");
                lines.push(format!("Failed to translate to {target}: {e}"));
            }
        }
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedTranslator;

    fn table() -> LanguageTable {
        LanguageTable::new([
            ("de".to_string(), "German".to_string()),
            ("FR".to_string(), "French".to_string()),
            ("zh-Hans".to_string(), "Chinese Simplified".to_string()),
        ])
    }

    #[test]
    fn resolves_names_and_codes_case_insensitively() {
        let t = table();
        assert_eq!(t.resolve("German").as_deref(), Some("de"));
        assert_eq!(t.resolve("german").as_deref(), Some("de"));
        assert_eq!(t.resolve("DE").as_deref(), Some("de"));
        assert_eq!(t.resolve("fr").as_deref(), Some("fr"));
        assert_eq!(t.resolve("chinese simplified").as_deref(), Some("zh-hans"));
        assert_eq!(t.resolve("Klingon"), None);
    }

    #[test]
    fn display_name_wins_over_code() {
        // "fr" is a code, but also the display name of "xx".
        let t = LanguageTable::new([
            ("fr".to_string(), "French".to_string()),
            ("xx".to_string(), "FR".to_string()),
        ]);
        assert_eq!(t.resolve("fr").as_deref(), Some("xx"));
    }

    #[test]
    fn listing_is_stable_and_ordered() {
        let t = table();
        let first = t.listing();
        assert_eq!(
            first,
            "Supported languages:\nGerman (de)\nFrench (fr)\nChinese Simplified (zh-hans)"
        );
        assert_eq!(first, t.listing());
    }

    #[test]
    fn empty_listing_fallback() {
        assert_eq!(
            LanguageTable::default().listing(),
            "No supported languages found in the configuration."
        );
    }

    #[tokio::test]
    async fn one_line_per_target_in_order() {
        let translator = ScriptedTranslator::new().fail_for("fr");
        let targets: Vec<String> = ["German", "Klingon", "fr"].map(String::from).into();

        let lines = translate_all(&translator, &table(), "Hello", &targets, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Translated to German: [de] Hello");
        assert_eq!(lines[1], "The language 'Klingon' is not supported.");
        assert!(lines[2].starts_with("Failed to translate to fr: translate backend failed (status: 401)"));
        assert_eq!(translator.calls(), ["de", "fr"]);
    }

    #[tokio::test]
    async fn cancellation_aborts_batch() {
        let translator = ScriptedTranslator::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let targets = vec!["German".to_string()];

        let result = translate_all(&translator, &table(), "Hello", &targets, &cancel).await;
        assert_eq!(result, Err(TranslationAborted));
        assert!(translator.calls().is_empty());
    }
}
