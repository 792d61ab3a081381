use super::*;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use std::time::Instant;

/// Chat-completions backend.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        let client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
        Self { client, model }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        let started = Instant::now();

        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(ONE_WORD_SYSTEM_PROMPT)
            .build()
            .map_err(|e| LlmError::Api(e.to_string()))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(format!("Ordet er: {}", request.prompt))
            .build()
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages([system.into(), user.into()]);
        if let Some(cap) = request.max_tokens {
            builder.max_tokens(cap);
        }
        let chat_request = builder.build().map_err(|e| LlmError::Api(e.to_string()))?;

        let completion =
            tokio::time::timeout(request.timeout, self.client.chat().create(chat_request))
                .await
                .map_err(|_| LlmError::Timeout(request.timeout))?
                .map_err(|e| LlmError::Api(e.to_string()))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Parse("empty completion".to_string()))?;

        Ok(GenerateResponse {
            text: text.trim().to_string(),
            provider: self.name(),
            model: self.model.clone(),
            latency: started.elapsed(),
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // needs a real API key
    async fn test_openai_generates_a_word() {
        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let provider = OpenAiProvider::new(api_key, "gpt-4o-mini".to_string());

        let response = provider
            .generate(GenerateRequest {
                prompt: "hund".to_string(),
                max_tokens: Some(16),
                timeout: Duration::from_secs(30),
            })
            .await
            .unwrap();

        assert!(!response.text.is_empty());
        assert_eq!(response.provider, "openai");
        println!("Generated word: {}", response.text);
    }
}
