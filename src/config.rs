//! TOML configuration with environment overrides.
//!
//! Every field has a default, so an empty file (or no file at all) is a valid
//! starting point. Credentials are usually supplied through the environment:
//! `GMAIL_USER`, `GMAIL_PASS`, and `OPENAI_API_KEY`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::email::{ClassifierRules, MailboxConfig};
use crate::extract::ExtractionConfig;

/// Errors from loading or validating configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(jobmail::config::read),
        help("Check that the file exists and is readable, or omit --config to use defaults.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file: {path}")]
    #[diagnostic(
        code(jobmail::config::write),
        help("Check that the parent directory is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(
        code(jobmail::config::parse),
        help(
            "The config file must be valid TOML with [mailbox], [extraction], [classifier], \
             [schedule] and [store] sections."
        )
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(jobmail::config::invalid))]
    Invalid { message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// How and how often ingestion passes run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between the end of one pass and the start of the next. Passes
    /// never overlap, so the effective period is this plus the pass duration.
    pub interval_secs: u64,
    /// Clear the store before each pass and rebuild it from the window.
    pub rescan: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 20 * 60,
            rescan: false,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Where records are stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Data directory. Defaults to `$XDG_DATA_HOME/jobmail`.
    pub data_dir: Option<PathBuf>,
}

/// Complete jobmail configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobmailConfig {
    pub mailbox: MailboxConfig,
    pub extraction: ExtractionConfig,
    pub classifier: ClassifierRules,
    pub schedule: ScheduleConfig,
    pub store: StoreConfig,
}

impl JobmailConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse TOML text.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Apply `GMAIL_USER`, `GMAIL_PASS` and `OPENAI_API_KEY` from the process
    /// environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides using `lookup`. Empty values are ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(user) = lookup("GMAIL_USER") {
            self.mailbox.user = user;
        }
        if let Some(pass) = lookup("GMAIL_PASS") {
            self.mailbox.pass = pass;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.extraction.api_key = key;
        }
    }

    /// Validate settings needed for an ingestion pass.
    pub fn validate(&self) -> ConfigResult<()> {
        self.mailbox.validate().map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })?;
        if self.schedule.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "schedule.interval_secs must be at least 1".to_string(),
            });
        }
        if self.extraction.enabled {
            if self.extraction.base_url.is_empty() {
                return Err(ConfigError::Invalid {
                    message: "extraction.base_url must not be empty when extraction is enabled"
                        .to_string(),
                });
            }
            if self.extraction.api_key.is_empty() {
                return Err(ConfigError::Invalid {
                    message: "extraction is enabled but no api_key is set \
                              (set extraction.api_key or OPENAI_API_KEY, or enabled = false)"
                        .to_string(),
                });
            }
        }
        if self.classifier.subject_keywords.iter().all(|k| k.is_empty()) {
            return Err(ConfigError::Invalid {
                message: "classifier.subject_keywords must contain at least one keyword"
                    .to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runnable() -> JobmailConfig {
        let mut config = JobmailConfig::default();
        config.mailbox.user = "me@gmail.com".into();
        config.mailbox.pass = "app-password".into();
        config.extraction.api_key = "sk-test".into();
        config
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = JobmailConfig::from_toml("").unwrap();
        assert_eq!(config.mailbox.host, "imap.gmail.com");
        assert_eq!(config.mailbox.fetch_window, 1000);
        assert_eq!(config.schedule.interval_secs, 1200);
        assert!(!config.schedule.rescan);
        assert_eq!(config.classifier, ClassifierRules::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = JobmailConfig::from_toml(
            r#"
            [mailbox]
            fetch_window = 10

            [extraction]
            enabled = false

            [classifier]
            denied_senders = ["linkedin.com", "ziprecruiter.com"]
            "#,
        )
        .unwrap();
        assert_eq!(config.mailbox.fetch_window, 10);
        assert_eq!(config.mailbox.port, 993);
        assert!(!config.extraction.enabled);
        assert_eq!(config.extraction.model, "gpt-4");
        assert_eq!(config.classifier.denied_senders.len(), 2);
        assert!(!config.classifier.subject_keywords.is_empty());
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = JobmailConfig::from_toml("[mailbox\nport = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_credentials() {
        let mut config = JobmailConfig::default();
        config.apply_env_with(|key| match key {
            "GMAIL_USER" => Some("me@gmail.com".into()),
            "GMAIL_PASS" => Some("secret".into()),
            "OPENAI_API_KEY" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.mailbox.user, "me@gmail.com");
        assert_eq!(config.mailbox.pass, "secret");
        assert!(config.extraction.api_key.is_empty());
    }

    #[test]
    fn validate_requires_api_key_when_extraction_enabled() {
        let mut config = runnable();
        assert!(config.validate().is_ok());

        config.extraction.api_key.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api_key"));

        config.extraction.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = runnable();
        config.schedule.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_surfaces_mailbox_errors() {
        let mut config = runnable();
        config.mailbox.fetch_batch = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fetch_batch"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = runnable();
        config.mailbox.fetch_window = 3000;
        config.save(&path).unwrap();

        let loaded = JobmailConfig::load(&path).unwrap();
        assert_eq!(loaded.mailbox.fetch_window, 3000);
        assert_eq!(loaded.mailbox.user, "me@gmail.com");
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let config = JobmailConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.mailbox.mailbox, "INBOX");
    }
}
