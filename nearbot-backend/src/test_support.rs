//! In-process stand-ins for the chain transports.
//!
//! `MockChain` answers view calls from an in-memory content table, serves the
//! `notify` / `comment` indexes, and records every submitted function call.

use crate::near::{
    BlockReference, FunctionCall, IndexEntry, IndexOptions, Near, Order, SocialApi,
    TransactionSigner, ViewProvider,
};
use crate::social::Social;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const CONTRACT_ID: &str = "social.near";

#[derive(Default)]
struct ChainState {
    /// Raw values by (key path, block height)
    content: HashMap<(String, u64), Value>,
    follows: HashSet<(String, String)>,
    notifications: Vec<IndexEntry>,
    /// `comment` index rows keyed by the commented item's path
    comment_index: HashMap<String, Vec<IndexEntry>>,
    last_comment_height: Option<u64>,
    function_calls: Vec<FunctionCall>,
    index_requests: Vec<(String, Value)>,
    /// Index actions answered like a non-2xx response
    unavailable_indexes: HashSet<String>,
    fail_writes: bool,
}

#[derive(Clone)]
pub struct MockChain {
    account_id: String,
    state: Arc<Mutex<ChainState>>,
}

/// Nest `value` under the segments of `key_path`, like a `get`/`keys` response
fn tree(key_path: &str, value: Value) -> Value {
    key_path.rsplit('/').fold(value, |acc, segment| {
        let mut map = Map::new();
        map.insert(segment.to_string(), acc);
        Value::Object(map)
    })
}

impl MockChain {
    pub fn new(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            state: Arc::new(Mutex::new(ChainState::default())),
        }
    }

    pub fn near(&self) -> Near {
        Near::new(
            &self.account_id,
            CONTRACT_ID,
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
        )
    }

    pub fn social(&self) -> Social {
        Social::new(self.near())
    }

    /// Store JSON content (serialized, as the contract does) at `path@height`
    pub fn put_content(&self, path: &str, height: u64, content: Value) {
        self.put_raw(path, height, Value::String(content.to_string()));
    }

    pub fn put_raw(&self, path: &str, height: u64, value: Value) {
        self.state
            .lock()
            .unwrap()
            .content
            .insert((path.to_string(), height), value);
    }

    pub fn add_follow(&self, from: &str, to: &str) {
        self.state
            .lock()
            .unwrap()
            .follows
            .insert((from.to_string(), to.to_string()));
    }

    pub fn push_notification(&self, account_id: &str, block_height: u64, value: Value) {
        self.state.lock().unwrap().notifications.push(IndexEntry {
            account_id: account_id.to_string(),
            block_height,
            value,
        });
    }

    /// Add a comment by `author` on `item_path` at `height`
    pub fn add_comment(&self, item_path: &str, item_height: u64, author: &str, height: u64, text: &str) {
        let item = json!({ "type": "social", "path": item_path, "blockHeight": item_height });
        self.put_content(
            &format!("{}/post/comment", author),
            height,
            json!({ "type": "md", "text": text, "item": item }),
        );
        self.state
            .lock()
            .unwrap()
            .comment_index
            .entry(item_path.to_string())
            .or_default()
            .push(IndexEntry {
                account_id: author.to_string(),
                block_height: height,
                value: json!({ "type": "md" }),
            });
    }

    pub fn set_last_comment_height(&self, height: Option<u64>) {
        self.state.lock().unwrap().last_comment_height = height;
    }

    /// Make the `action` index answer with no data until re-enabled
    pub fn set_index_available(&self, action: &str, available: bool) {
        let mut state = self.state.lock().unwrap();
        if available {
            state.unavailable_indexes.remove(action);
        } else {
            state.unavailable_indexes.insert(action.to_string());
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.state.lock().unwrap().function_calls.clone()
    }

    /// Options of every index request made for `action`, in order
    pub fn index_requests(&self, action: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .index_requests
            .iter()
            .filter(|(a, _)| a == action)
            .map(|(_, options)| options.clone())
            .collect()
    }

    fn lookup(&self, key_path: &str, block: BlockReference) -> Option<Value> {
        let state = self.state.lock().unwrap();
        if let BlockReference::Height(height) = block {
            return state.content.get(&(key_path.to_string(), height)).cloned();
        }
        let parts: Vec<&str> = key_path.split('/').collect();
        if let [from, "graph", "follow", to] = parts.as_slice() {
            return state
                .follows
                .contains(&(from.to_string(), to.to_string()))
                .then(|| json!(""));
        }
        None
    }
}

#[async_trait]
impl ViewProvider for MockChain {
    async fn view_call(
        &self,
        _contract_id: &str,
        method_name: &str,
        args: &Value,
        block: BlockReference,
    ) -> Result<Option<Value>, String> {
        let key_path = args["keys"][0]
            .as_str()
            .ok_or_else(|| "missing keys".to_string())?
            .to_string();
        match method_name {
            "get" => Ok(self.lookup(&key_path, block).map(|v| tree(&key_path, v))),
            "keys" => {
                let own_comments = format!("{}/post/comment", self.account_id);
                let height = self.state.lock().unwrap().last_comment_height;
                Ok(height
                    .filter(|_| key_path == own_comments)
                    .map(|h| tree(&key_path, json!(h))))
            }
            other => Err(format!("unsupported view method {}", other)),
        }
    }
}

#[async_trait]
impl SocialApi for MockChain {
    async fn call(&self, method_name: &str, _args: &Value) -> Result<Option<Value>, String> {
        Err(format!("cached API unavailable for {}", method_name))
    }

    async fn index(
        &self,
        action: &str,
        key: &Value,
        options: &IndexOptions,
    ) -> Result<Option<Vec<Value>>, String> {
        let mut state = self.state.lock().unwrap();
        state.index_requests.push((
            action.to_string(),
            serde_json::to_value(options).unwrap_or(Value::Null),
        ));
        if state.unavailable_indexes.contains(action) {
            return Ok(None);
        }

        let mut rows: Vec<IndexEntry> = match action {
            "notify" if key.as_str() == Some(self.account_id.as_str()) => {
                state.notifications.clone()
            }
            "comment" => key["path"]
                .as_str()
                .and_then(|path| state.comment_index.get(path).cloned())
                .unwrap_or_default(),
            _ => return Ok(None),
        };

        let from = options.from;
        match options.order {
            Order::Asc => {
                rows.retain(|r| from.map_or(true, |f| r.block_height >= f));
                rows.sort_by_key(|r| r.block_height);
            }
            Order::Desc => {
                rows.retain(|r| from.map_or(true, |f| r.block_height <= f));
                rows.sort_by_key(|r| std::cmp::Reverse(r.block_height));
            }
        }
        if let Some(limit) = options.limit {
            rows.truncate(limit as usize);
        }

        Ok(Some(
            rows.into_iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect(),
        ))
    }
}

#[async_trait]
impl TransactionSigner for MockChain {
    async fn function_call(&self, call: &FunctionCall) -> Result<Value, String> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err("Signer relay request failed: connection reset".to_string());
        }
        state.function_calls.push(call.clone());
        Ok(json!({ "status": { "SuccessValue": "" } }))
    }
}
