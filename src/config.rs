use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::text_map::{MatchEngine, MatchPolicy};

const APP_DIR: &str = "phrasemark";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "phrasemark.db";
const DEFAULT_TRANSLATE_ENDPOINT: &str =
    "https://translation.googleapis.com/language/translate/v2";

/// Languages the translation endpoint is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "it")]
    Italian,
    #[serde(rename = "pt")]
    Portuguese,
}

impl Language {
    /// Returns the ISO 639-1 code for this language.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Italian => "it",
            Language::Portuguese => "pt",
        }
    }

    /// Parses an ISO 639-1 code, ignoring case.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "en" => Some(Language::English),
            "es" => Some(Language::Spanish),
            "fr" => Some(Language::French),
            "de" => Some(Language::German),
            "it" => Some(Language::Italian),
            "pt" => Some(Language::Portuguese),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub storage: StorageConfig,
    pub translation: TranslationConfig,
    pub matching: MatchingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the database location under the user data directory
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub target_language: Language,
    /// Left to the endpoint's detection when unset
    pub source_language: Option<Language>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TRANSLATE_ENDPOINT.to_string(),
            api_key: None,
            target_language: Language::Spanish,
            source_language: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub policy: MatchPolicy,
    pub engine: MatchEngine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl StorageConfig {
    /// Returns the configured database path, falling back to the data directory
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join(APP_DIR).join(DATABASE_FILE)))
    }
}

impl ReaderConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads the user config file, or the defaults when there is none.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(path),
            _ => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Returns the path to the user config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_spanish() {
        let config = ReaderConfig::default();
        assert_eq!(config.translation.target_language, Language::Spanish);
        assert_eq!(config.translation.target_language.code(), "es");
        assert_eq!(config.matching.policy, MatchPolicy::LeftmostFirst);
        assert_eq!(config.matching.engine, MatchEngine::Regex);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReaderConfig::from_toml(
            r#"
            [translation]
            target_language = "fr"
            api_key = "secret"

            [matching]
            policy = "leftmost-longest"
            engine = "aho-corasick"
            "#,
        )
        .unwrap();

        assert_eq!(config.translation.target_language, Language::French);
        assert_eq!(config.translation.api_key.as_deref(), Some("secret"));
        assert_eq!(config.translation.endpoint, DEFAULT_TRANSLATE_ENDPOINT);
        assert_eq!(config.matching.policy, MatchPolicy::LeftmostLongest);
        assert_eq!(config.matching.engine, MatchEngine::AhoCorasick);
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_malformed_toml_is_error() {
        assert!(matches!(
            ReaderConfig::from_toml("[translation\nendpoint = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\ndatabase_path = \"/tmp/x.db\"\n").unwrap();

        let config = ReaderConfig::load_from_file(&path).unwrap();
        assert_eq!(
            config.storage.resolved_database_path(),
            Some(PathBuf::from("/tmp/x.db"))
        );
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReaderConfig::load_from_file(dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::from_code("ES"), Some(Language::Spanish));
        assert_eq!(Language::from_code("xx"), None);
        assert_eq!(Language::German.code(), "de");
    }
}
