use crate::config::PredictorConfig;
use crate::harness::Predictor;
use crate::models::JsonMap;
use anyhow::{Context, Result};
use async_openai::{Client, config::OpenAIConfig, types::CreateChatCompletionRequestArgs};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Prediction function backed by an OpenAI-compatible chat endpoint, with
/// rate limiting shared across concurrent callers.
pub struct LlmPredictor {
    config: PredictorConfig,
    /// Last request time, serialized behind a lock so the rate limit holds
    /// under the harness's concurrent fan-out
    last_request: Mutex<Option<Instant>>,
}

impl LlmPredictor {
    /// Create a predictor for the given endpoint configuration
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            last_request: Mutex::new(None),
        }
    }

    /// Enforce the configured requests-per-second limit
    async fn enforce_rate_limit(&self) {
        if self.config.rate_limit_rps <= 0.0 {
            return;
        }

        let min_interval = Duration::from_secs_f64(1.0 / self.config.rate_limit_rps);
        let mut last_request = self.last_request.lock().await;

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < min_interval {
                sleep(min_interval - elapsed).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    /// Create the OpenAI client for the configured endpoint
    fn create_client(&self) -> Result<Client<OpenAIConfig>> {
        let api_key = std::env::var(&self.config.env_var_api_key).with_context(|| {
            format!(
                "Environment variable {} not found",
                self.config.env_var_api_key
            )
        })?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&self.config.api_endpoint);

        Ok(Client::with_config(openai_config))
    }

    /// The user message is the request's `question` field when present,
    /// otherwise the whole request object, JSON-encoded
    fn request_content(request: &JsonMap) -> String {
        match request.get("question").and_then(|question| question.as_str()) {
            Some(question) => question.to_string(),
            None => Value::Object(request.clone()).to_string(),
        }
    }

    /// Build the chat completion request for one row
    fn build_request(
        &self,
        content: &str,
    ) -> Result<async_openai::types::CreateChatCompletionRequest> {
        let system_message = async_openai::types::ChatCompletionRequestSystemMessageArgs::default()
            .content(self.config.system_prompt.clone())
            .build()
            .context("Failed to build system message")?
            .into();

        let user_message = async_openai::types::ChatCompletionRequestUserMessageArgs::default()
            .content(content.to_string())
            .build()
            .context("Failed to build user message")?
            .into();

        CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages([system_message, user_message])
            .temperature(self.config.temperature as f32)
            .max_tokens(self.config.max_tokens as u16)
            .build()
            .context("Failed to build chat completion request")
    }

    /// Extract the response text from the API response
    fn extract_content(response: async_openai::types::CreateChatCompletionResponse) -> String {
        match response.choices.first() {
            Some(choice) => match &choice.message.content {
                Some(content) => content.clone(),
                None => String::new(),
            },
            None => String::new(),
        }
    }
}

#[async_trait::async_trait]
impl Predictor for LlmPredictor {
    async fn predict(&self, request: &JsonMap) -> Result<Value> {
        self.enforce_rate_limit().await;

        let client = self.create_client()?;
        let chat_request = self.build_request(&Self::request_content(request))?;
        let response = client
            .chat()
            .create(chat_request)
            .await
            .context("Failed to generate response")?;

        Ok(Value::String(Self::extract_content(response)))
    }
}
