//! Chain accessor
//!
//! Routes reads either to the cached social API or to a raw NEAR RPC provider,
//! depending on the requested finality, and submits write transactions through
//! an external signer.
//!
//! Routing:
//! - canonical contract + `final` finality: cached API first, RPC on transport failure
//! - explicit block height: archival RPC provider
//! - anything else: live RPC provider

pub mod api;
pub mod rpc;
pub mod signer;

use crate::config::NearConfig;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub use api::SocialApiClient;
pub use rpc::JsonRpcProvider;
pub use signer::{FunctionCall, RelaySigner, TransactionSigner};

pub const TGAS: u64 = 1_000_000_000_000;
pub const DEFAULT_GAS: u64 = 30 * TGAS;
pub const DEFAULT_DEPOSIT: u128 = 0;

/// View methods the cached API mirrors
const CACHED_API_METHODS: &[&str] = &["get", "keys"];

/// Point in chain history a read is evaluated at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockReference {
    #[default]
    Optimistic,
    Final,
    Height(u64),
}

impl BlockReference {
    /// Finality string for RPC / API requests, `None` for explicit heights
    pub fn finality(&self) -> Option<&'static str> {
        match self {
            BlockReference::Optimistic => Some("optimistic"),
            BlockReference::Final => Some("final"),
            BlockReference::Height(_) => None,
        }
    }
}

/// Raw view-call provider (live or archival RPC node)
#[async_trait]
pub trait ViewProvider: Send + Sync {
    async fn view_call(
        &self,
        contract_id: &str,
        method_name: &str,
        args: &Value,
        block: BlockReference,
    ) -> Result<Option<Value>, String>;
}

/// Cached indexing service
#[async_trait]
pub trait SocialApi: Send + Sync {
    /// Cached view call. Any `Err` is a transport failure and triggers the RPC fallback.
    async fn call(&self, method_name: &str, args: &Value) -> Result<Option<Value>, String>;

    /// Ordered index lookup. `Ok(None)` on a non-2xx response.
    async fn index(
        &self,
        action: &str,
        key: &Value,
        options: &IndexOptions,
    ) -> Result<Option<Vec<Value>>, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexOptions {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
}

/// One row returned by the indexing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub account_id: String,
    pub block_height: u64,
    #[serde(default)]
    pub value: Value,
}

pub struct Near {
    account_id: String,
    contract_id: String,
    live: Arc<dyn ViewProvider>,
    archival: Arc<dyn ViewProvider>,
    api: Arc<dyn SocialApi>,
    signer: Arc<dyn TransactionSigner>,
}

impl Near {
    pub fn new(
        account_id: &str,
        contract_id: &str,
        live: Arc<dyn ViewProvider>,
        archival: Arc<dyn ViewProvider>,
        api: Arc<dyn SocialApi>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Self {
        Self {
            account_id: account_id.to_string(),
            contract_id: contract_id.to_string(),
            live,
            archival,
            api,
            signer,
        }
    }

    /// Wire up the HTTP transports from configuration
    pub fn from_config(config: &NearConfig) -> Self {
        log::info!(
            "Near: account={}, contract={}, rpc={}, archival={}, api={}",
            config.account_id,
            config.contract_id,
            config.rpc_url,
            config.archival_rpc_url,
            config.api_url
        );
        Self::new(
            &config.account_id,
            &config.contract_id,
            Arc::new(JsonRpcProvider::new(&config.rpc_url)),
            Arc::new(JsonRpcProvider::new(&config.archival_rpc_url)),
            Arc::new(SocialApiClient::new(&config.api_url)),
            Arc::new(RelaySigner::new(
                &config.signer_relay_url,
                config.signer_relay_token.clone(),
            )),
        )
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    /// View call with cache-then-source routing
    pub async fn view_call(
        &self,
        contract_id: &str,
        method_name: &str,
        args: Value,
        block: BlockReference,
    ) -> Result<Option<Value>, String> {
        if contract_id == self.contract_id
            && block == BlockReference::Final
            && CACHED_API_METHODS.contains(&method_name)
        {
            match self.api.call(method_name, &args).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    log::warn!(
                        "Near: cached API call {} failed, falling back to RPC: {}",
                        method_name,
                        e
                    );
                }
            }
        }

        let provider = match block {
            BlockReference::Height(_) => &self.archival,
            _ => &self.live,
        };
        provider.view_call(contract_id, method_name, &args, block).await
    }

    /// Read a slash-delimited key path from the social contract.
    ///
    /// Descends into the returned tree along the path and stops at a `*`/`**`
    /// segment, returning the raw subtree there.
    pub async fn read(&self, key_path: &str, block: BlockReference) -> Result<Option<Value>, String> {
        let tree = self
            .view_call(&self.contract_id, "get", json!({ "keys": [key_path] }), block)
            .await?;
        Ok(tree.and_then(|tree| descend(tree, key_path)))
    }

    /// Block height at which a key was last written
    pub async fn read_block_height(
        &self,
        key_path: &str,
        block: BlockReference,
    ) -> Result<Option<u64>, String> {
        let args = json!({
            "keys": [key_path],
            "options": { "return_type": "BlockHeight" },
        });
        let tree = self.view_call(&self.contract_id, "keys", args, block).await?;
        Ok(tree
            .and_then(|tree| descend(tree, key_path))
            .and_then(|v| v.as_u64()))
    }

    /// Submit a function call transaction.
    ///
    /// Returns the decoded `SuccessValue` (JSON if it parses, raw string otherwise),
    /// or `None` for any non-success outcome. Transport failures are `Err`.
    pub async fn function_call(
        &self,
        contract_id: &str,
        method_name: &str,
        args: Value,
        gas: Option<u64>,
        deposit: Option<u128>,
    ) -> Result<Option<Value>, String> {
        let call = FunctionCall {
            signer_id: self.account_id.clone(),
            receiver_id: contract_id.to_string(),
            method_name: method_name.to_string(),
            args,
            gas: gas.unwrap_or(DEFAULT_GAS).to_string(),
            deposit: deposit.unwrap_or(DEFAULT_DEPOSIT).to_string(),
        };

        log::info!(
            "Near: functionCall {}.{} gas={} deposit={}",
            call.receiver_id,
            call.method_name,
            call.gas,
            call.deposit
        );
        log::debug!("Near: functionCall args={}", call.args);

        let outcome = self.signer.function_call(&call).await?;
        log::info!("Near: functionCall result status={}", outcome.get("status").unwrap_or(&Value::Null));

        Ok(success_value(&outcome))
    }

    /// Ordered lookup against the indexing service; `None` means "no data".
    pub async fn query(
        &self,
        action: &str,
        key: &Value,
        options: &IndexOptions,
    ) -> Result<Option<Vec<IndexEntry>>, String> {
        let Some(rows) = self.api.index(action, key, options).await? else {
            log::info!("Near: index {} returned no data", action);
            return Ok(None);
        };

        let entries = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<IndexEntry>(row.clone()) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::debug!("Near: skipping malformed index row {}: {}", row, e);
                    None
                }
            })
            .collect();
        Ok(Some(entries))
    }
}

/// Walk a `get`/`keys` response tree along `key_path`
pub fn descend(mut value: Value, key_path: &str) -> Option<Value> {
    for segment in key_path.split('/') {
        if segment == "*" || segment == "**" {
            break;
        }
        value = match value {
            Value::Object(mut map) => map.remove(segment)?,
            _ => return None,
        };
    }
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

/// Decode `status.SuccessValue` of a final execution outcome
fn success_value(outcome: &Value) -> Option<Value> {
    let encoded = outcome.get("status")?.get("SuccessValue")?.as_str()?;
    let bytes = match base64::engine::general_purpose::STANDARD.decode(encoded) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Near: undecodable SuccessValue: {}", e);
            return None;
        }
    };
    let text = String::from_utf8_lossy(&bytes).to_string();
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
