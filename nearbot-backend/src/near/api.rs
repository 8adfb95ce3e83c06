//! HTTP client for the cached social API (api.near.social style).

use super::{IndexOptions, SocialApi};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct SocialApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl SocialApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: crate::http::shared_client().clone(),
        }
    }
}

#[async_trait]
impl SocialApi for SocialApiClient {
    async fn call(&self, method_name: &str, args: &Value) -> Result<Option<Value>, String> {
        let url = format!("{}/{}", self.base_url, method_name);
        let response = self
            .client
            .post(&url)
            .json(args)
            .send()
            .await
            .map_err(|e| format!("Social API request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Social API error ({}): {}", status, body));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| format!("Invalid response from social API: {}", e))?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn index(
        &self,
        action: &str,
        key: &Value,
        options: &IndexOptions,
    ) -> Result<Option<Vec<Value>>, String> {
        let url = format!("{}/index", self.base_url);
        let body = json!({
            "action": action,
            "key": key,
            "options": options,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Social index request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Social: index {} returned {}", action, status);
            return Ok(None);
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| format!("Invalid index response: {}", e))?;
        match value {
            Value::Array(rows) => Ok(Some(rows)),
            Value::Null => Ok(None),
            other => {
                log::warn!("Social: index {} returned a non-array body: {}", action, other);
                Ok(None)
            }
        }
    }
}
