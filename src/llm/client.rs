// src/llm/client.rs
use async_trait::async_trait;
use reqwest::header;

use crate::llm::models::{ApiErrorResponse, ChatCompletionResponse, CompletionRequest};
use crate::utils::config::Settings;
use crate::utils::error::CompletionError;

/// Text completion capability: prompt in, free-form text out.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Client for an OpenAI-compatible Chat Completions endpoint.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// Creates a reqwest client configured from the resolved settings.
    pub fn new(settings: &Settings) -> Result<Self, CompletionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = self.completions_url();
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request to {}",
            url
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?; // Propagates reqwest::Error as CompletionError::Network

        // Check if the request was successful (status code 2xx)
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!("Completion service returned HTTP {}", status);
            if status == reqwest::StatusCode::UNAUTHORIZED {
                tracing::warn!("Received 401 Unauthorized - check OPENAI_API_KEY.");
                return Err(CompletionError::Unauthorized);
            }
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(CompletionError::Http { status, body: message });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::EmptyResponse)?;
        tracing::debug!(
            model = ?completion.model,
            finish_reason = ?choice.finish_reason,
            "Received completion"
        );

        // A choice without content (e.g. a refusal) is handed on as empty text.
        Ok(choice.message.content.unwrap_or_default())
    }
}
