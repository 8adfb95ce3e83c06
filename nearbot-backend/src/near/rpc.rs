//! NEAR JSON-RPC view-call provider.

use super::{BlockReference, ViewProvider};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct JsonRpcProvider {
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<CallResult>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CallResult {
    #[serde(default)]
    result: Vec<u8>,
    /// Present when the contract panicked during the view call
    error: Option<String>,
}

impl JsonRpcProvider {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client: crate::http::shared_client().clone(),
        }
    }
}

/// Build the `params` object of a `query`/`call_function` request
fn call_function_params(
    contract_id: &str,
    method_name: &str,
    args: &Value,
    block: BlockReference,
) -> Value {
    let args_base64 = base64::engine::general_purpose::STANDARD.encode(args.to_string());
    let mut params = json!({
        "request_type": "call_function",
        "account_id": contract_id,
        "method_name": method_name,
        "args_base64": args_base64,
    });
    match block {
        BlockReference::Height(height) => params["block_id"] = json!(height),
        other => params["finality"] = json!(other.finality().unwrap_or("optimistic")),
    }
    params
}

/// Contract return bytes -> JSON; empty or `null` means no value
fn decode_result(bytes: &[u8]) -> Result<Option<Value>, String> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| format!("Failed to parse view call result: {}", e))?;
    Ok(if value.is_null() { None } else { Some(value) })
}

#[async_trait]
impl ViewProvider for JsonRpcProvider {
    async fn view_call(
        &self,
        contract_id: &str,
        method_name: &str,
        args: &Value,
        block: BlockReference,
    ) -> Result<Option<Value>, String> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "dontcare",
            "method": "query",
            "params": call_function_params(contract_id, method_name, args, block),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("RPC request failed: {}", e))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(format!("RPC error ({}): {}", status, text));
        }

        let data: RpcResponse =
            serde_json::from_str(&text).map_err(|e| format!("Failed to parse RPC response: {}", e))?;

        if let Some(error) = data.error {
            return Err(format!("RPC {}.{} failed: {}", contract_id, method_name, error));
        }
        let result = data
            .result
            .ok_or_else(|| "RPC response has neither result nor error".to_string())?;
        if let Some(error) = result.error {
            return Err(format!("View call {}.{} failed: {}", contract_id, method_name, error));
        }
        decode_result(&result.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_use_finality_or_block_id() {
        let args = json!({ "keys": ["a.near/post/main"] });

        let params = call_function_params("social.near", "get", &args, BlockReference::Optimistic);
        assert_eq!(params["finality"], "optimistic");
        assert!(params.get("block_id").is_none());

        let params = call_function_params("social.near", "get", &args, BlockReference::Height(99));
        assert_eq!(params["block_id"], 99);
        assert!(params.get("finality").is_none());

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(params["args_base64"].as_str().unwrap())
            .unwrap();
        let round: Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(round, args);
    }

    #[test]
    fn test_decode_result() {
        assert_eq!(decode_result(b"").unwrap(), None);
        assert_eq!(decode_result(b"null").unwrap(), None);
        assert_eq!(decode_result(b"{\"a\":1}").unwrap(), Some(json!({ "a": 1 })));
        assert!(decode_result(b"not json").is_err());
    }
}
