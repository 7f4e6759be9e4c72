//! Immutable application configuration.
//!
//! Loaded once at startup from the environment (and an optional `.env`
//! file), then shared by `Arc` with every component that needs it.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ConfigError;

/// Static description of one listing source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub base_url: String,
    pub search_urls: Vec<String>,
    /// Politeness delay between page and detail batches.
    pub delay: Duration,
    pub login_required: bool,
    pub enabled: bool,
}

/// How rendered documents are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FetchMode {
    Http,
    Browser,
}

/// Inference provider flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LlmProvider {
    Gemini,
    #[strum(serialize = "openai", serialize = "ollama", serialize = "lmstudio")]
    OpenAi,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub api_token: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    /// Records per inference request.
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Highest page number requested per search URL.
    pub page_limit: usize,
    /// Pages requested together during link discovery.
    pub link_batch_size: usize,
    /// Detail pages fetched concurrently.
    pub detail_batch_size: usize,
    /// Concurrency budget handed to the fetcher.
    pub fetch_concurrency: usize,
    pub fetch_mode: FetchMode,
    pub data_dir: String,
    pub llm: LlmConfig,
    pub sources: Vec<Arc<SourceConfig>>,
}

const GEMINI_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
const OPENAI_BASE_URL: &str = "http://localhost:11434/v1";

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env_var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn env_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env_var(key) {
        Some(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
        None => Ok(default),
    }
}

/// Batch sizes of zero would stall the crawl loop.
fn positive(key: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
    } else {
        Ok(value)
    }
}

/// Loads `.env` into the process environment. A missing file is fine.
///
/// Runs before logging is set up so `LOG_LEVEL` may come from the file;
/// the caller reports an error once the subscriber is installed.
pub fn load_dotenv() -> Result<(), dotenvy::Error> {
    skip_missing(dotenvy::dotenv().map(drop))
}

pub fn load_dotenv_from(path: impl AsRef<Path>) -> Result<(), dotenvy::Error> {
    skip_missing(dotenvy::from_path(path))
}

fn skip_missing(result: Result<(), dotenvy::Error>) -> Result<(), dotenvy::Error> {
    match result {
        Err(e) if e.not_found() => Ok(()),
        other => other,
    }
}

/// Log filter directive from `LOG_LEVEL`, `info` when unset.
pub fn log_level() -> String {
    env_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string())
}

impl AppConfig {
    /// Reads configuration from the process environment. Call
    /// [`load_dotenv`] first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let delay = Duration::from_secs(env_parse("CRAWL_DELAY", 2u64)?);

        let provider_raw = env_var("LLM_PROVIDER").unwrap_or_else(|| "gemini".to_string());
        // Accept "gemini/gemini-2.0-flash" style values.
        let provider_name = provider_raw.split('/').next().unwrap_or_default();
        let provider = LlmProvider::from_str(provider_name)
            .map_err(|_| ConfigError::UnknownProvider(provider_raw.clone()))?;

        let default_base_url = match provider {
            LlmProvider::Gemini => GEMINI_BASE_URL,
            LlmProvider::OpenAi => OPENAI_BASE_URL,
        };
        let default_model = match provider {
            LlmProvider::Gemini => "gemini-2.0-flash",
            LlmProvider::OpenAi => "mistral",
        };

        let fetch_mode_raw = env_var("FETCH_MODE").unwrap_or_else(|| "http".to_string());
        let fetch_mode = FetchMode::from_str(&fetch_mode_raw)
            .map_err(|_| ConfigError::UnknownFetchMode(fetch_mode_raw))?;

        let mut sources = default_sources(delay);
        if let Some(enabled) = env_var("ENABLED_SOURCES") {
            let names: Vec<&str> = enabled.split(',').map(str::trim).collect();
            for source in &mut sources {
                source.enabled = names.contains(&source.name.as_str());
            }
        }

        Ok(Self {
            page_limit: positive("PAGES_SITE", env_parse("PAGES_SITE", 1)?)?,
            link_batch_size: positive("LINK_PER_BATCH", env_parse("LINK_PER_BATCH", 10)?)?,
            detail_batch_size: positive("ITEM_PER_BATCH", env_parse("ITEM_PER_BATCH", 10)?)?,
            fetch_concurrency: positive("FETCH_CONCURRENCY", env_parse("FETCH_CONCURRENCY", 5)?)?,
            fetch_mode,
            data_dir: env_var("DATA_DIR").unwrap_or_else(|| "data".to_string()),
            llm: LlmConfig {
                enabled: env_bool("LLM_ENABLED", true)?,
                provider,
                api_token: env_var("LLM_API_TOKEN"),
                base_url: env_var("LLM_API_BASE_URL")
                    .unwrap_or_else(|| default_base_url.to_string()),
                model: env_var("LLM_MODEL").unwrap_or_else(|| default_model.to_string()),
                timeout: Duration::from_secs(env_parse("LLM_TIMEOUT_SECS", 60u64)?),
                batch_size: positive("LLM_BATCH_SIZE", env_parse("LLM_BATCH_SIZE", 5)?)?,
            },
            sources: sources.into_iter().map(Arc::new).collect(),
        })
    }

    /// Sources with `enabled` set, in declaration order.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &Arc<SourceConfig>> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn source(&self, name: &str) -> Option<&Arc<SourceConfig>> {
        self.sources.iter().find(|s| s.name == name)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            page_limit: 1,
            link_batch_size: 10,
            detail_batch_size: 10,
            fetch_concurrency: 5,
            fetch_mode: FetchMode::Http,
            data_dir: "data".to_string(),
            llm: LlmConfig {
                enabled: false,
                provider: LlmProvider::Gemini,
                api_token: None,
                base_url: GEMINI_BASE_URL.to_string(),
                model: "gemini-2.0-flash".to_string(),
                timeout: Duration::from_secs(60),
                batch_size: 5,
            },
            sources: default_sources(Duration::from_secs(2))
                .into_iter()
                .map(Arc::new)
                .collect(),
        }
    }
}

/// Built-in source table.
fn default_sources(delay: Duration) -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "mogi.vn".to_string(),
            base_url: "https://mogi.vn/".to_string(),
            search_urls: vec![
                "https://mogi.vn/mua-nha-dat".to_string(),
                "https://mogi.vn/thue-nha-dat".to_string(),
            ],
            delay,
            login_required: false,
            enabled: true,
        },
        SourceConfig {
            name: "bds123.vn".to_string(),
            base_url: "https://bds123.vn/".to_string(),
            search_urls: vec!["https://bds123.vn/ban-nha.html".to_string()],
            delay,
            login_required: false,
            enabled: true,
        },
        SourceConfig {
            name: "muaban.net".to_string(),
            base_url: "https://muaban.net/".to_string(),
            search_urls: vec![
                "https://muaban.net/bat-dong-san/ban-nha-dat-chung-cu".to_string(),
                "https://muaban.net/bat-dong-san/cho-thue-nha-dat".to_string(),
            ],
            delay,
            login_required: false,
            enabled: true,
        },
    ]
}
