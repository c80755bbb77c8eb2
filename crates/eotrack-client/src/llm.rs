use std::time::Duration;

use eotrack_core::error::AppError;
use eotrack_core::traits::Summarizer;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1000;

const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert in law, government, and policy analysis. Your task is to analyze executive orders and provide concise, balanced summaries that help ordinary citizens understand them.";

/// Anthropic messages-API client producing executive order summaries.
#[derive(Clone)]
pub struct AnthropicSummarizer {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    system_prompt: String,
}

impl AnthropicSummarizer {
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, DEFAULT_MODEL, base_url, DEFAULT_LLM_TIMEOUT)
    }

    pub fn with_model(self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        let mut rebuilt = Self::build(&self.api_key, &self.model, &self.base_url, timeout)?;
        rebuilt.system_prompt = self.system_prompt;
        Ok(rebuilt)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }
}

/// The four-part analysis requested for every order.
fn build_prompt(title: &str, date: &str, content: &str) -> String {
    format!(
        "You are analyzing an executive order titled \"{title}\" issued on {date}.\n\n\
         Here is the full text of the executive order:\n---\n{content}\n---\n\n\
         Please provide a concise summary covering:\n\
         1. A simplified explanation of what this executive order is about (2-3 sentences)\n\
         2. Potential pros and cons of this order (2-3 bullet points each)\n\
         3. What it means and its potential impact (2-3 sentences)\n\
         4. Whether it appears lawful/constitutional or potentially overreaches executive power (1-2 sentences)\n\n\
         Format your response in a simple text format without any markdown or special formatting.\n"
    )
}

// ---- Anthropic API types ----

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl Summarizer for AnthropicSummarizer {
    async fn summarize(
        &self,
        title: &str,
        date: &str,
        content: &str,
    ) -> Result<String, AppError> {
        let url = format!("{}/messages", self.base_url);

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            system: self.system_prompt.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: build_prompt(title, date, content),
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {}", e))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();

            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status_code, body));

            if status_code == 429 {
                return Err(AppError::RateLimitExceeded);
            }

            return Err(AppError::LlmError {
                message,
                status_code,
                retryable: status_code >= 500,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse LLM response: {}", e)))?;

        let summary = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if summary.is_empty() {
            return Err(AppError::LlmError {
                message: "Empty response from LLM".into(),
                status_code: 200,
                retryable: false,
            });
        }

        Ok(summary)
    }
}
