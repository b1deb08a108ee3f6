use crate::error::{ConfigError, Result as AppResult};
use config::{Config, Environment, File, Value, ValueKind};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(deserialize_with = "deserialize_string_or_list")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSourceType {
    File,
    Http,
}

/// Where question sets live. Sets are addressed as `<topic>/<level>/set<N>.json`
/// below either a local directory or a remote base URL.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    pub source_type: ContentSourceType,
    pub file_root: Option<String>,
    pub http_base_url: Option<String>,
    /// Serve `file_root` under `/data` so browsers and other instances can
    /// read the same bank.
    #[serde(default)]
    pub serve_static: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchMode {
    Idle,
    Deferred,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    pub discovery_limit: u32,
    pub wrong_feedback_delay_ms: u64,
    pub default_random_count: usize,
    pub prefetch: PrefetchMode,
    pub prefetch_delay_ms: u64,
    pub stagger_ms: u64,
    pub default_subtitle_prefix: String,
    pub session_idle_timeout_secs: u64,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            discovery_limit: 50,
            wrong_feedback_delay_ms: 150,
            default_random_count: 10,
            prefetch: PrefetchMode::Idle,
            prefetch_delay_ms: 2000,
            stagger_ms: 30,
            default_subtitle_prefix: "MCQ Practice".to_string(),
            session_idle_timeout_secs: 60 * 60,
        }
    }
}

impl PracticeConfig {
    pub fn wrong_feedback_delay(&self) -> Duration {
        Duration::from_millis(self.wrong_feedback_delay_ms)
    }

    pub fn prefetch_delay(&self) -> Duration {
        Duration::from_millis(self.prefetch_delay_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    pub server: ServerConfig,
    pub content: ContentConfig,
    #[serde(default)]
    pub practice: PracticeConfig,
}

impl AppSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.content.source_type {
            ContentSourceType::File if self.content.file_root.is_none() => {
                return Err(ConfigError::Missing(
                    "content.file_root is required for the file source".to_string(),
                ));
            }
            ContentSourceType::Http if self.content.http_base_url.is_none() => {
                return Err(ConfigError::Missing(
                    "content.http_base_url is required for the http source".to_string(),
                ));
            }
            _ => {}
        }

        if self.content.serve_static && self.content.file_root.is_none() {
            return Err(ConfigError::Missing(
                "content.file_root is required when content.serve_static is set".to_string(),
            ));
        }

        if self.practice.discovery_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "practice.discovery_limit must be at least 1".to_string(),
            ));
        }

        if self.practice.default_random_count == 0 {
            return Err(ConfigError::InvalidValue(
                "practice.default_random_count must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

pub fn load_settings() -> AppResult<AppSettings> {
    let builder = Config::builder()
        .add_source(
            Environment::with_prefix("MCQ_DECK")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        )
        .add_source(File::with_name("config").required(false))
        .set_default("server.port", 8080)
        .and_then(|b| {
            b.set_default(
                "server.cors_origins",
                Value::new(None, ValueKind::Array(Vec::new())),
            )
        })
        .and_then(|b| b.set_default("content.source_type", "file"))
        .and_then(|b| b.set_default("content.file_root", "data"))
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let settings = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_settings: AppSettings = settings
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    app_settings.validate()?;
    Ok(app_settings)
}

fn deserialize_string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;
    let mut items = Vec::new();

    match value {
        Value::String(s) => {
            for item in s.split(',') {
                let trimmed = item.trim();
                if !trimmed.is_empty() {
                    items.push(trimmed.to_string());
                }
            }
        }
        Value::Array(arr) => {
            for item in arr {
                if let Value::String(s) = item {
                    let trimmed = s.trim();
                    if !trimmed.is_empty() {
                        items.push(trimmed.to_string());
                    }
                } else {
                    return Err(D::Error::custom("Array must contain only strings"));
                }
            }
        }
        _ => return Err(D::Error::custom("Expected string or array of strings")),
    }

    Ok(items)
}
