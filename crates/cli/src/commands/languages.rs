//! `planbot languages` — print the translation language table.

use planbot_agent::LanguageTable;
use planbot_config::AppConfig;

/// The language table from configuration.
pub fn language_table(config: &AppConfig) -> LanguageTable {
    LanguageTable::new(
        config
            .languages
            .iter()
            .map(|(code, name)| (code.clone(), name.clone())),
    )
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", language_table(&config).listing());
    Ok(())
}
