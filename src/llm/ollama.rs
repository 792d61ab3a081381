use super::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Backend for a locally hosted Ollama instance.
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

/// Body for POST /api/generate.
#[derive(Debug, Serialize)]
struct OllamaBody<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaReply {
    response: String,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        let started = Instant::now();

        // /api/generate has no system role; the instruction rides in front
        // of the prompt itself.
        let body = OllamaBody {
            model: &self.model,
            prompt: format!("{} Ordet er: {}", ONE_WORD_SYSTEM_PROMPT, request.prompt),
            stream: false,
            options: request.max_tokens.map(|n| OllamaOptions { num_predict: n }),
        };

        let send = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send();
        let response = tokio::time::timeout(request.timeout, send)
            .await
            .map_err(|_| LlmError::Timeout(request.timeout))?
            .map_err(|e| LlmError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("status {}: {}", status, detail)));
        }

        let reply: OllamaReply = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(GenerateResponse {
            text: reply.response.trim().to_string(),
            provider: self.name(),
            model: self.model.clone(),
            latency: started.elapsed(),
        })
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_stripped() {
        let provider = OllamaProvider::new(
            "http://localhost:11434/".to_string(),
            "llama3.2".to_string(),
        );
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    #[ignore] // needs a running Ollama instance
    async fn test_ollama_generates_a_word() {
        let provider = OllamaProvider::new(
            "http://localhost:11434".to_string(),
            "llama3.2".to_string(),
        );

        let response = provider
            .generate(GenerateRequest {
                prompt: "hund".to_string(),
                max_tokens: Some(16),
                timeout: Duration::from_secs(60),
            })
            .await
            .unwrap();

        assert!(!response.text.is_empty());
        assert_eq!(response.provider, "ollama");
        println!("Generated word: {}", response.text);
    }
}
