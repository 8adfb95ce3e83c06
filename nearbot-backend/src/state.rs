//! Persisted bot state: notification ledger, pending queue, reply and post history.
//!
//! Loaded once before a run and saved once after it, whether or not the run succeeded.

use crate::social::{Notification, SocialItem};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use strum::AsRefStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistentState {
    /// Replies per sender, oldest first
    pub account_replies: BTreeMap<String, Vec<ReplyRecord>>,
    pub post_history: Vec<DailyPost>,
    pub reply_history: Vec<ReplyRecord>,
    /// Every notification ever fetched, in fetch order
    pub notifications: Vec<Notification>,
    pub todo_notifications: VecDeque<Notification>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRecord {
    /// Milliseconds since the unix epoch
    pub time: i64,
    pub item: SocialItem,
    pub account_id: String,
    pub notification: Notification,
    pub prompts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_account_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
pub enum PostStatus {
    Preparing,
    Posting,
    #[serde(rename = "OK")]
    #[strum(serialize = "OK")]
    Ok,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPost {
    pub time: i64,
    pub status: PostStatus,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, alias = "openaiText", skip_serializing_if = "Option::is_none")]
    pub generated_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

impl PersistentState {
    /// Load from `path`; a missing file yields empty state
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            log::info!("State: no state at {}, starting fresh", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let state: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse state {}: {}", path.display(), e))?;
        log::info!(
            "State: loaded {} notifications ({} pending), {} replies, {} daily posts",
            state.notifications.len(),
            state.todo_notifications.len(),
            state.reply_history.len(),
            state.post_history.len()
        );
        Ok(state)
    }

    /// Write to a sibling temp file, then rename it over `path`
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize state: {}", e))?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = Path::new(&tmp_name);
        std::fs::write(tmp_path, content)
            .map_err(|e| format!("Failed to write {}: {}", tmp_path.display(), e))?;
        std::fs::rename(tmp_path, path)
            .map_err(|e| format!("Failed to replace {}: {}", path.display(), e))?;
        log::info!("State: saved to {}", path.display());
        Ok(())
    }

    /// Block height of the newest ledger entry
    pub fn last_notification_height(&self) -> Option<u64> {
        self.notifications.last().map(|n| n.block_height)
    }

    pub fn replies_for(&self, account_id: &str) -> &[ReplyRecord] {
        self.account_replies
            .get(account_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
