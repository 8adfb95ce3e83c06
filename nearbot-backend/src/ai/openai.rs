use super::TextBackend;
use crate::config::AiConfig;
use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};

const TEMPERATURE: f32 = 0.9;
const PRESENCE_PENALTY: f32 = 0.6;

/// Client for the legacy OpenAI completions endpoint
pub struct OpenAiCompletionClient {
    client: reqwest::Client,
    auth_headers: header::HeaderMap,
    endpoint: String,
    model: String,
    stop_sequence: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: String,
    stop: &'a str,
    max_tokens: u32,
    temperature: f32,
    n: u32,
    presence_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiCompletionClient {
    pub fn new(config: &AiConfig) -> Result<Self, String> {
        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| format!("Invalid API key header: {}", e))?,
        );
        if let Some(org) = &config.organization {
            auth_headers.insert(
                "openai-organization",
                header::HeaderValue::from_str(org)
                    .map_err(|e| format!("Invalid organization header: {}", e))?,
            );
        }

        Ok(Self {
            client: crate::http::shared_client().clone(),
            auth_headers,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            stop_sequence: config.stop_sequence.clone(),
            max_tokens: config.max_response_tokens,
        })
    }
}

/// Join fragments with `"\n" + stop`, blanking any stop token inside a fragment
pub fn join_prompts(prompts: &[String], stop_sequence: &str) -> String {
    prompts
        .iter()
        .map(|prompt| {
            if stop_sequence.is_empty() {
                prompt.clone()
            } else {
                prompt.replace(stop_sequence, " ")
            }
        })
        .collect::<Vec<_>>()
        .join(&format!("\n{}", stop_sequence))
}

#[async_trait]
impl TextBackend for OpenAiCompletionClient {
    async fn complete(&self, prompts: &[String]) -> Result<String, String> {
        let request = CompletionRequest {
            model: &self.model,
            prompt: join_prompts(prompts, &self.stop_sequence),
            stop: &self.stop_sequence,
            max_tokens: self.max_tokens,
            temperature: TEMPERATURE,
            n: 1,
            presence_penalty: PRESENCE_PENALTY,
        };
        log::info!(
            "OpenAI: completion request model={} fragments={} prompt_chars={}",
            request.model,
            prompts.len(),
            request.prompt.len()
        );
        log::debug!("OpenAI: prompt={}", request.prompt);

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.auth_headers.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("OpenAI request failed: {}", e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(format!("OpenAI API error ({}): {}", status, message));
        }

        let data: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse OpenAI response: {}", e))?;
        log::info!("OpenAI: received {} choice(s)", data.choices.len());

        data.choices
            .into_iter()
            .next()
            .map(|choice| choice.text.trim().to_string())
            .ok_or_else(|| "OpenAI response contained no choices".to_string())
    }
}
