//! Language registry for submission execution

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Deserialize;

/// Configuration for a supported submission language
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Canonical language name (registry key, lowercased)
    pub name: String,
    /// Name of the source file the program is written to (e.g. "main.py")
    pub source_file: String,
    /// Run command, executed with the scratch directory as cwd
    pub run_command: Vec<String>,
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    source_file: String,
    run_command: String,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Global language configurations
static LANGUAGES: OnceLock<HashMap<String, LanguageConfig>> = OnceLock::new();

/// Initialize the registry from the embedded TOML file
pub fn init_languages() -> anyhow::Result<()> {
    let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));
    let raw_configs: HashMap<String, RawLanguageConfig> = toml::from_str(content)?;

    let mut languages = HashMap::new();

    for (name, raw) in raw_configs {
        let config = LanguageConfig {
            name: name.to_lowercase(),
            source_file: raw.source_file,
            run_command: into_command(&raw.run_command),
        };

        // Canonical name first, then aliases
        languages.insert(name.to_lowercase(), config.clone());
        for alias in raw.aliases {
            languages.insert(alias.to_lowercase(), config.clone());
        }
    }

    LANGUAGES
        .set(languages)
        .map_err(|_| anyhow::anyhow!("Languages already initialized"))?;

    Ok(())
}

/// Get language configuration by name or alias
pub fn get_language_config(language: &str) -> Option<LanguageConfig> {
    LANGUAGES.get()?.get(&language.to_lowercase()).cloned()
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
