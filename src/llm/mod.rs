//! Inference providers used to fill in missing listing fields.

mod gemini;
mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{LlmConfig, LlmProvider};
use crate::error::InferenceError;

/// Sampling temperature for extraction prompts. Low to keep answers literal.
const TEMPERATURE: f32 = 0.1;

/// Text completion capability of an inference provider.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Sends `prompt` and returns the raw text of the first answer.
    async fn complete(&self, prompt: &str) -> Result<String, InferenceError>;
}

/// Builds the configured client, or `None` when enrichment is disabled.
pub fn create_client(config: &LlmConfig) -> Result<Option<Arc<dyn InferenceClient>>, InferenceError> {
    if !config.enabled {
        info!("LLM enrichment disabled");
        return Ok(None);
    }

    let client: Arc<dyn InferenceClient> = match config.provider {
        LlmProvider::Gemini => {
            let Some(token) = config.api_token.as_deref() else {
                warn!("LLM_API_TOKEN not set, Gemini enrichment disabled");
                return Ok(None);
            };
            Arc::new(GeminiClient::new(&config.base_url, token, config.timeout)?)
        }
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(
            &config.base_url,
            &config.model,
            config.api_token.clone(),
            config.timeout,
        )?),
    };

    info!(provider = client.name(), model = %config.model, "LLM enrichment enabled");
    Ok(Some(client))
}

/// Maps a non-success HTTP status to the matching error.
async fn status_error(response: reqwest::Response) -> InferenceError {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return InferenceError::RateLimited;
    }
    let body = response.text().await.unwrap_or_default();
    InferenceError::Status {
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn llm_config(provider: LlmProvider, token: Option<&str>) -> LlmConfig {
        LlmConfig {
            enabled: true,
            provider,
            api_token: token.map(str::to_string),
            base_url: "http://localhost:11434/v1".to_string(),
            model: "mistral".to_string(),
            timeout: Duration::from_secs(5),
            batch_size: 5,
        }
    }

    #[test]
    fn test_disabled_config_has_no_client() {
        let mut config = llm_config(LlmProvider::OpenAi, None);
        config.enabled = false;
        assert!(create_client(&config).unwrap().is_none());
    }

    #[test]
    fn test_gemini_requires_token() {
        assert!(create_client(&llm_config(LlmProvider::Gemini, None)).unwrap().is_none());
        let client = create_client(&llm_config(LlmProvider::Gemini, Some("key")))
            .unwrap()
            .unwrap();
        assert_eq!(client.name(), "gemini");
    }

    #[test]
    fn test_openai_compatible_without_token() {
        let client = create_client(&llm_config(LlmProvider::OpenAi, None))
            .unwrap()
            .unwrap();
        assert_eq!(client.name(), "openai");
    }
}
