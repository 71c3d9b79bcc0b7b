use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const APP_DIR: &str = "timeline-rss";
const TOKEN_ENV: &str = "TIMELINE_RSS_BEARER_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_feed_path")]
    pub feed_path: String,

    pub log_path: Option<String>,

    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,

    #[serde(default = "default_initial_fetch_count")]
    pub initial_fetch_count: u32,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub timeline: TimelineConfig,
}

/// Channel metadata for the rendered feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_title")]
    pub title: String,
    #[serde(default = "default_feed_link")]
    pub link: String,
    #[serde(default = "default_feed_description")]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    pub bearer_token: Option<String>,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// 0 means keep paging until the API runs dry.
    #[serde(default)]
    pub max_pages: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_db_path() -> String {
    data_dir().join("items.sqlite").to_string_lossy().to_string()
}

fn default_feed_path() -> String {
    data_dir().join("timeline.xml").to_string_lossy().to_string()
}

fn default_retention_hours() -> u32 {
    8
}

fn default_initial_fetch_count() -> u32 {
    250
}

fn default_feed_title() -> String {
    "Home timeline".to_string()
}

fn default_feed_link() -> String {
    "https://twitter.com/home".to_string()
}

fn default_feed_description() -> String {
    "Recent posts from my home timeline".to_string()
}

fn default_api_base() -> String {
    "https://api.twitter.com/1.1/".to_string()
}

fn default_page_size() -> u32 {
    200
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: default_feed_title(),
            link: default_feed_link(),
            description: default_feed_description(),
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            bearer_token: None,
            page_size: default_page_size(),
            max_pages: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            feed_path: default_feed_path(),
            log_path: None,
            retention_hours: default_retention_hours(),
            initial_fetch_count: default_initial_fetch_count(),
            feed: FeedConfig::default(),
            timeline: TimelineConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`. A missing
    /// file is created with default settings.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map_or_else(Self::config_path, Path::to_path_buf);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                config.timeline.bearer_token = Some(token);
            }
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_fetch_count == 0 {
            return Err(AppError::Config(
                "initial_fetch_count must be greater than zero".to_string(),
            ));
        }
        if self.db_path.trim().is_empty() {
            return Err(AppError::Config("db_path must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config = Config::from_toml("db_path = \"/tmp/items.sqlite\"\n").unwrap();

        assert_eq!(config.db_path, "/tmp/items.sqlite");
        assert_eq!(config.retention_hours, 8);
        assert_eq!(config.initial_fetch_count, 250);
        assert_eq!(config.timeline.page_size, 200);
        assert_eq!(config.timeline.max_pages, 0);
        assert!(config.log_path.is_none());
    }

    #[test]
    fn test_nested_tables() {
        let toml = r#"
            db_path = "items.sqlite"
            retention_hours = 0
            initial_fetch_count = 50

            [feed]
            title = "Mine"

            [timeline]
            api_base = "http://localhost:9000/1.1"
            max_pages = 3
        "#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.retention_hours, 0);
        assert_eq!(config.initial_fetch_count, 50);
        assert_eq!(config.feed.title, "Mine");
        assert_eq!(config.feed.link, default_feed_link());
        assert_eq!(config.timeline.api_base, "http://localhost:9000/1.1");
        assert_eq!(config.timeline.max_pages, 3);
    }

    #[test]
    fn test_zero_initial_fetch_count_rejected() {
        let err = Config::from_toml("db_path = \"x\"\ninitial_fetch_count = 0\n").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_negative_retention_rejected_by_parser() {
        let err = Config::from_toml("db_path = \"x\"\nretention_hours = -1\n").unwrap_err();
        assert!(matches!(err, AppError::ConfigParse(_)));
    }

    #[test]
    fn test_save_then_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.toml");
        let mut config = Config::default();
        config.db_path = dir.path().join("db.sqlite").to_string_lossy().to_string();
        config.retention_hours = 24;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.db_path, config.db_path);
        assert_eq!(loaded.retention_hours, 24);
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.initial_fetch_count, 250);
    }
}
