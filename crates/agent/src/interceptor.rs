//! Explicit command syntax, handled before any planning.
//!
//! Two commands bypass the planner:
//! - `Translate: <text> to <lang>[, <lang>...]`
//! - `Show languages`

use std::sync::Arc;

use planbot_core::channel::Replier;
use planbot_core::service::Translator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::translation::{LanguageTable, TranslationAborted, translate_all};

pub const INVALID_TRANSLATION: &str =
    "Invalid translation request. Use the format: 'Translate: [text] to [language1, language2,...]'.";
pub const NO_LANGUAGES: &str = "No valid languages were specified.";
pub const TRANSLATION_FAILED: &str =
    "Failed to translate text. Please ensure the input format is correct.";
pub const TRANSLATION_NOT_CONFIGURED: &str = "Translation is not configured.";

const TRANSLATE_PREFIX: &str = "translate";

/// Outcome of interception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intercept {
    /// The command was answered; the reply has already been sent.
    Handled(String),
    NotHandled,
}

/// A recognized command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Translate { text: String, targets: Vec<String> },
    MalformedTranslate,
    NoTargets,
    ShowLanguages,
}

/// Recognize command syntax in a raw user message.
pub fn parse(raw: &str) -> Option<Command> {
    let input = raw.trim();

    if input.eq_ignore_ascii_case("show languages") {
        return Some(Command::ShowLanguages);
    }

    let rest = input
        .get(..TRANSLATE_PREFIX.len())
        .filter(|p| p.eq_ignore_ascii_case(TRANSLATE_PREFIX))
        .map(|_| &input[TRANSLATE_PREFIX.len()..])?;
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':').unwrap_or(rest).trim();

    let Some((text, targets)) = rest.split_once(" to ") else {
        return Some(Command::MalformedTranslate);
    };
    let (text, targets) = (text.trim(), targets.trim());
    if text.is_empty() || targets.is_empty() {
        return Some(Command::MalformedTranslate);
    }

    let targets: Vec<String> = targets
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    if targets.is_empty() {
        return Some(Command::NoTargets);
    }

    Some(Command::Translate {
        text: text.to_string(),
        targets,
    })
}

/// Answers commands that do not need the planner.
pub struct CommandInterceptor {
    languages: Arc<LanguageTable>,
    translator: Option<Arc<dyn Translator>>,
}

impl CommandInterceptor {
    pub fn new(languages: Arc<LanguageTable>, translator: Option<Arc<dyn Translator>>) -> Self {
        Self {
            languages,
            translator,
        }
    }

    /// Handle `raw` if it is a command, replying through `replier`.
    pub async fn intercept(&self, raw: &str, replier: &Replier, cancel: &CancellationToken) -> Intercept {
        let Some(command) = parse(raw) else {
            return Intercept::NotHandled;
        };
        debug!(command = ?command, "Intercepted command");

        let reply = match command {
            Command::ShowLanguages => self.languages.listing(),
            Command::MalformedTranslate => INVALID_TRANSLATION.to_string(),
            Command::NoTargets => NO_LANGUAGES.to_string(),
            Command::Translate { text, targets } => self.translate(&text, &targets, cancel).await,
        };

        replier.notify_text(reply.clone()).await;
        Intercept::Handled(reply)
    }

    async fn translate(&self, text: &str, targets: &[String], cancel: &CancellationToken) -> String {
        let Some(translator) = &self.translator else {
            return TRANSLATION_NOT_CONFIGURED.to_string();
        };

        info!(targets = targets.len(), "Translating");
        match translate_all(translator.as_ref(), &self.languages, text, targets, cancel).await {
            Ok(lines) => lines.join("\n"),
            Err(TranslationAborted) => TRANSLATION_FAILED.to_string(),
        }
    }
}
