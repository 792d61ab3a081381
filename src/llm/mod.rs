//! Text-generation backends for filler answers.
//!
//! One trait, two providers (OpenAI and a local Ollama), and a manager that
//! asks them in configuration order until one yields a word. Everything here
//! is best-effort: the filler path always has the random-word fallback, so
//! no error from this module reaches a player.

mod ollama;
mod openai;

use async_trait::async_trait;
use std::time::Duration;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider request failed: {0}")]
    Api(String),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("unusable reply: {0}")]
    Parse(String),

    #[error("{0}")]
    Config(String),
}

/// One word-association request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Prompt word the filler must associate from.
    pub prompt: String,
    /// Cap on the reply length, in provider tokens.
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

/// A provider's reply plus enough context to log it.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub text: String,
    pub provider: &'static str,
    pub model: String,
    pub latency: Duration,
}

/// Danish instruction shared by both providers: answer with exactly one word.
pub(crate) const ONE_WORD_SYSTEM_PROMPT: &str =
    "Du spiller ordassociationsspillet Helt Blank. Spillerne får et ord og svarer med det \
     første ord, de kommer i tanke om. Svar med præcis ét dansk ord. Ingen tegnsætning, \
     ingen forklaring, kun ordet.";

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// One-word association for the prompt word in `request`.
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse>;

    fn name(&self) -> &'static str;
}

/// Holds the configured providers in fallback order.
pub struct LlmManager {
    pub providers: Vec<Box<dyn LlmProvider>>,
}

impl LlmManager {
    pub fn new(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    /// A filler needs a single word, so there is no fan-out: each provider
    /// gets one try, the first answer wins, and only when all of them fail
    /// does the caller see an error.
    pub async fn generate_one(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        let mut last_error = LlmError::Config("no providers configured".to_string());

        for provider in &self.providers {
            match provider.generate(request.clone()).await {
                Ok(response) => {
                    tracing::debug!(
                        "{} answered via {} in {}ms",
                        provider.name(),
                        response.model,
                        response.latency.as_millis()
                    );
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!("{} gave no answer: {}", provider.name(), e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Provider configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    /// Unset falls back to the local default; set-but-blank disables Ollama.
    pub ollama_base_url: Option<String>,
    pub ollama_model: String,
    pub default_timeout: Duration,
    pub default_max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            ollama_base_url: Some("http://localhost:11434".to_string()),
            ollama_model: "llama3.2".to_string(),
            default_timeout: Duration::from_secs(30),
            // one word plus slack for chatty models
            default_max_tokens: 16,
        }
    }
}

/// Env var if set to a non-blank value.
fn env_nonblank(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let v = v.trim();
        (!v.is_empty()).then(|| v.to_string())
    })
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ollama_base_url = match std::env::var("OLLAMA_BASE_URL") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v.trim().to_string()),
            Err(_) => defaults.ollama_base_url,
        };

        Self {
            openai_api_key: env_nonblank("OPENAI_API_KEY"),
            openai_model: env_nonblank("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            ollama_base_url,
            ollama_model: env_nonblank("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            default_timeout: env_nonblank("LLM_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_timeout),
            default_max_tokens: env_nonblank("LLM_MAX_TOKENS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_max_tokens),
        }
    }

    /// Build the provider set this configuration describes. An empty set is
    /// an error so startup can log the downgrade once.
    pub fn build_manager(&self) -> LlmResult<LlmManager> {
        let mut providers: Vec<Box<dyn LlmProvider>> = Vec::new();

        if let Some(key) = &self.openai_api_key {
            providers.push(Box::new(OpenAiProvider::new(
                key.clone(),
                self.openai_model.clone(),
            )));
        }
        if let Some(url) = &self.ollama_base_url {
            providers.push(Box::new(OllamaProvider::new(
                url.clone(),
                self.ollama_model.clone(),
            )));
        }

        if providers.is_empty() {
            return Err(LlmError::Config(
                "no text-generation provider configured (set OPENAI_API_KEY or OLLAMA_BASE_URL)"
                    .to_string(),
            ));
        }
        Ok(LlmManager::new(providers))
    }
}
