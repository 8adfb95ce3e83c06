//! Transaction signing abstraction
//!
//! Keys never live in this process. Function calls are handed to a signing
//! relay which builds, signs and submits the transaction and answers with the
//! final execution outcome.
//!
//! Required environment variables:
//! - SIGNER_RELAY_URL: base URL of the relay
//! - SIGNER_RELAY_TOKEN: optional bearer token

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// A single function call action, amounts as decimal strings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    pub signer_id: String,
    pub receiver_id: String,
    pub method_name: String,
    pub args: Value,
    pub gas: String,
    pub deposit: String,
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign and submit; returns the raw final execution outcome.
    async fn function_call(&self, call: &FunctionCall) -> Result<Value, String>;
}

pub struct RelaySigner {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl RelaySigner {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: crate::http::shared_client().clone(),
        }
    }
}

#[async_trait]
impl TransactionSigner for RelaySigner {
    async fn function_call(&self, call: &FunctionCall) -> Result<Value, String> {
        let url = format!("{}/function_call", self.base_url);
        let mut request = self.client.post(&url).json(call);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("Signer relay request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Signer relay error ({}): {}", status, body));
        }

        response
            .json()
            .await
            .map_err(|e| format!("Failed to parse signer relay response: {}", e))
    }
}
