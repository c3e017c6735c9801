use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::console::{TruncationPolicy, DEFAULT_TRUNCATION_NOTICE};
use crate::snippets::sql::DEFAULT_DATAFRAME_NAME;
use crate::snippets::{ParserRegistry, SqlParser};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub snippets: SnippetsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Tail window in lines; absent disables truncation
    #[serde(default)]
    pub max_lines: Option<i64>,

    /// `{max_lines}` is replaced by the budget
    #[serde(default = "default_truncation_notice")]
    pub truncation_notice: String,

    /// Keep interpreter state across chunks of a live run
    #[serde(default = "default_true")]
    pub stateful_streaming: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetsConfig {
    #[serde(default)]
    pub default_sql_engine: Option<String>,

    #[serde(default = "default_dataframe_name")]
    pub default_dataframe_name: String,
}

fn default_truncation_notice() -> String {
    DEFAULT_TRUNCATION_NOTICE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_dataframe_name() -> String {
    DEFAULT_DATAFRAME_NAME.to_string()
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            max_lines: None,
            truncation_notice: default_truncation_notice(),
            stateful_streaming: true,
        }
    }
}

impl Default for SnippetsConfig {
    fn default() -> Self {
        Self {
            default_sql_engine: None,
            default_dataframe_name: default_dataframe_name(),
        }
    }
}

impl ConsoleConfig {
    #[must_use]
    pub fn truncation_policy(&self) -> TruncationPolicy {
        TruncationPolicy {
            max_lines: self.max_lines,
            notice: self.truncation_notice.clone(),
        }
    }
}

impl SnippetsConfig {
    /// Parser registry whose SQL parser uses the configured defaults
    #[must_use]
    pub fn registry(&self) -> ParserRegistry {
        ParserRegistry::new().with_sql(SqlParser::with_defaults(
            self.default_dataframe_name.clone(),
            self.default_sql_engine.clone(),
        ))
    }
}

impl Config {
    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

        let config: Config = serde_yaml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_yaml::to_string(self).context("Failed to serialize config")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        fs::write(path.as_ref(), contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get default configuration path
    pub fn default_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;

        Ok(home.join(".cellout").join("config.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.console.max_lines, None);
        assert!(config.console.stateful_streaming);
        assert_eq!(config.snippets.default_dataframe_name, "_df");
        assert_eq!(config.console.truncation_policy(), TruncationPolicy::default());
    }

    #[test]
    fn test_partial_deserialization() {
        let yaml = r#"
console:
  max_lines: 200
snippets:
  default_sql_engine: warehouse
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.console.max_lines, Some(200));
        assert_eq!(config.console.truncation_notice, DEFAULT_TRUNCATION_NOTICE);
        assert!(config.console.stateful_streaming);
        assert_eq!(config.snippets.default_sql_engine.as_deref(), Some("warehouse"));
        assert_eq!(config.snippets.default_dataframe_name, "_df");
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_registry_uses_snippet_defaults() {
        use crate::snippets::{LanguageParser, SnippetMetadata};

        let snippets = SnippetsConfig {
            default_sql_engine: Some("conn".to_string()),
            default_dataframe_name: "result".to_string(),
        };
        let registry = snippets.registry();
        let metadata = registry.sql().default_metadata();
        assert_eq!(metadata.dataframe_name, "result");
        assert_eq!(metadata.engine.as_deref(), Some("conn"));

        let parsed = registry.transform_in("df = mo.sql('SELECT 1')");
        let SnippetMetadata::Sql(sql) = parsed.metadata else {
            panic!("expected SQL metadata");
        };
        assert_eq!(sql.dataframe_name, "df");
        assert_eq!(sql.engine, None);
    }
}
