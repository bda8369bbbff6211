//! `planbot config` — Configuration inspection and setup.

use std::path::Path;

use planbot_config::AppConfig;

/// Print the effective configuration. Secrets are redacted.
pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let config_path = AppConfig::config_dir().join("config.toml");

    println!("Config file: {}", config_path.display());
    if !config.has_api_key() {
        println!("Warning: no API key set (set PLANBOT_API_KEY or OPENAI_API_KEY)");
    }
    println!();
    println!("{config:#?}");
    Ok(())
}

/// Write a default config file, leaving an existing one alone.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    if write_default(&config_path)? {
        println!("Created {}", config_path.display());
    } else {
        println!("Config already exists: {}", config_path.display());
    }
    Ok(())
}

/// Returns whether a file was written.
fn write_default(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn default_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default(&path).unwrap());
        assert!(!write_default(&path).unwrap());

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.chat_model, "gpt-4o");
    }
}
