//! Social protocol layer on top of the chain accessor
//!
//! Reads posts/comments and the follow graph, and builds the `set` payloads for
//! posts, comments, follows and pokes. Every write goes through the umbrella
//! `set` call with a 1 yocto deposit.

pub mod mentions;
pub mod types;

use crate::near::{BlockReference, IndexEntry, IndexOptions, Near};
use serde_json::{json, Map, Value};

pub use mentions::{extract_mentions, merge_mentions};
pub use types::{
    parse_post_path, Notification, NotificationValue, PostContent, PostItem, PostType, SocialItem,
};

/// Attached to every `set` so storage can be paid for
const SET_DEPOSIT: u128 = 1;

pub struct Social {
    near: Near,
}

impl Social {
    pub fn new(near: Near) -> Self {
        Self { near }
    }

    pub fn account_id(&self) -> &str {
        self.near.account_id()
    }

    pub async fn index(
        &self,
        action: &str,
        key: &Value,
        options: &IndexOptions,
    ) -> Result<Option<Vec<IndexEntry>>, String> {
        self.near.query(action, key, options).await
    }

    pub async fn get(&self, key_path: &str, block: BlockReference) -> Result<Option<Value>, String> {
        self.near.read(key_path, block).await
    }

    /// Height of the latest write under `key_path`
    pub async fn last_write_height(
        &self,
        key_path: &str,
        block: BlockReference,
    ) -> Result<Option<u64>, String> {
        self.near.read_block_height(key_path, block).await
    }

    /// Resolve `item` as a top-level post
    pub async fn get_post(&self, item: &SocialItem) -> Result<Option<PostItem>, String> {
        self.get_post_item(item, PostType::Main).await
    }

    /// Resolve `item` as a comment
    pub async fn get_comment(&self, item: &SocialItem) -> Result<Option<PostItem>, String> {
        self.get_post_item(item, PostType::Comment).await
    }

    /// Resolve a row of the `comment` index into the comment it points at
    pub async fn get_comment_from_index(
        &self,
        entry: &IndexEntry,
    ) -> Result<Option<PostItem>, String> {
        let item = SocialItem::new(
            format!("{}/post/comment", entry.account_id),
            Some(entry.block_height),
        );
        self.get_comment(&item).await
    }

    async fn get_post_item(
        &self,
        item: &SocialItem,
        kind: PostType,
    ) -> Result<Option<PostItem>, String> {
        let Some(block_height) = item.block_height else {
            log::debug!("Social: item {} has no block height", item.path);
            return Ok(None);
        };
        let Some(account_id) = parse_post_path(&item.path, kind) else {
            log::debug!("Social: {} is not a {} path", item.path, kind.as_ref());
            return Ok(None);
        };

        let raw = self
            .get(&item.path, BlockReference::Height(block_height))
            .await?;
        let Some(Value::String(raw)) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<PostContent>(&raw) {
            Ok(data) => Ok(Some(PostItem {
                account_id: account_id.to_string(),
                block_height,
                path: item.path.clone(),
                data,
                kind,
            })),
            Err(e) => {
                log::info!("Social: unparseable content at {}@{}: {}", item.path, block_height, e);
                Ok(None)
            }
        }
    }

    /// Whether `account_id` follows `target`
    pub async fn is_following(&self, account_id: &str, target: &str) -> Result<bool, String> {
        let edge = self
            .get(
                &format!("{}/graph/follow/{}", account_id, target),
                BlockReference::Optimistic,
            )
            .await?;
        Ok(edge.is_some())
    }

    /// Umbrella write of a patch for the bot's own namespace
    pub async fn set(&self, patch: Value) -> Result<Option<Value>, String> {
        let mut data = Map::new();
        data.insert(self.account_id().to_string(), patch);
        let contract_id = self.near.contract_id().to_string();
        self.near
            .function_call(
                &contract_id,
                "set",
                json!({ "data": Value::Object(data) }),
                None,
                Some(SET_DEPOSIT),
            )
            .await
    }

    pub async fn follow(&self, account_id: &str) -> Result<Option<Value>, String> {
        let mut edge = Map::new();
        edge.insert(account_id.to_string(), json!(""));
        let patch = json!({
            "graph": { "follow": Value::Object(edge) },
            "index": {
                "graph": json!({
                    "key": "follow",
                    "value": { "type": "follow", "accountId": account_id },
                })
                .to_string(),
                "notify": json!({ "key": account_id, "value": { "type": "follow" } }).to_string(),
            },
        });
        self.set(patch).await
    }

    pub async fn poke(&self, account_id: &str) -> Result<Option<Value>, String> {
        let patch = json!({
            "index": {
                "graph": json!({ "key": "poke", "value": { "accountId": account_id } }).to_string(),
                "notify": json!({ "key": account_id, "value": { "type": "poke" } }).to_string(),
            },
        });
        self.set(patch).await
    }

    /// Publish a top-level post, notifying everyone it mentions
    pub async fn post(&self, text: &str) -> Result<Option<Value>, String> {
        let me = self.account_id().to_string();
        let item = SocialItem::new(format!("{}/post/main", me), None);
        let mentions = merge_mentions(extract_mentions(text).iter(), &me);

        let notify = mentions
            .iter()
            .map(|handle| mention_notification(handle, &item))
            .collect();

        let mut index = Map::new();
        index.insert(
            "post".to_string(),
            json!(json!({ "key": "main", "value": { "type": "md" } }).to_string()),
        );
        if let Some(notify) = notify_index(notify) {
            index.insert("notify".to_string(), json!(notify));
        }

        let patch = json!({
            "post": { "main": json!({ "type": "md", "text": text }).to_string() },
            "index": Value::Object(index),
        });
        self.set(patch).await
    }

    /// Comment on `item`.
    ///
    /// Mentions found in `text` are merged with `extra_mentions`; the author of
    /// the commented post (`notify_account_id`) gets a `comment` notification.
    pub async fn comment(
        &self,
        item: &SocialItem,
        text: &str,
        extra_mentions: &[String],
        notify_account_id: Option<&str>,
    ) -> Result<Option<Value>, String> {
        let me = self.account_id().to_string();
        let comment_item = SocialItem::new(format!("{}/post/comment", me), None);
        let text_mentions = extract_mentions(text);
        let mentions = merge_mentions(text_mentions.iter().chain(extra_mentions.iter()), &me);

        let mut notify: Vec<Value> = mentions
            .iter()
            .map(|handle| mention_notification(handle, &comment_item))
            .collect();
        if let Some(target) = notify_account_id.filter(|target| *target != me) {
            notify.push(json!({ "key": target, "value": { "type": "comment", "item": item } }));
        }

        let mut index = Map::new();
        index.insert(
            "comment".to_string(),
            json!(json!({ "key": item, "value": { "type": "md" } }).to_string()),
        );
        if let Some(notify) = notify_index(notify) {
            index.insert("notify".to_string(), json!(notify));
        }

        let patch = json!({
            "post": {
                "comment": json!({ "type": "md", "text": text, "item": item }).to_string(),
            },
            "index": Value::Object(index),
        });
        self.set(patch).await
    }
}

fn mention_notification(handle: &str, item: &SocialItem) -> Value {
    json!({ "key": handle, "value": { "type": "mention", "item": item } })
}

/// Serialized `index.notify` value: one object for a single recipient, an array otherwise
fn notify_index(mut entries: Vec<Value>) -> Option<String> {
    match entries.len() {
        0 => None,
        1 => entries.pop().map(|entry| entry.to_string()),
        _ => Some(Value::Array(entries).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockChain;

    fn set_patch(chain: &MockChain) -> Value {
        let calls = chain.function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method_name, "set");
        assert_eq!(calls[0].deposit, "1");
        calls[0].args["data"]["bot.near"].clone()
    }

    fn parse(field: &Value) -> Value {
        serde_json::from_str(field.as_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_post_with_single_mention_collapses_notify() {
        let chain = MockChain::new("bot.near");
        let social = chain.social();
        social.post("gm @alice.near and @bot.near").await.unwrap();

        let patch = set_patch(&chain);
        assert_eq!(
            parse(&patch["post"]["main"]),
            json!({ "type": "md", "text": "gm @alice.near and @bot.near" })
        );
        assert_eq!(
            parse(&patch["index"]["post"]),
            json!({ "key": "main", "value": { "type": "md" } })
        );
        let notify = parse(&patch["index"]["notify"]);
        assert_eq!(notify["key"], "alice.near");
        assert_eq!(notify["value"]["type"], "mention");
        assert_eq!(notify["value"]["item"]["path"], "bot.near/post/main");
    }

    #[tokio::test]
    async fn test_post_without_mentions_has_no_notify() {
        let chain = MockChain::new("bot.near");
        chain.social().post("### April 20\n\nhello").await.unwrap();
        let patch = set_patch(&chain);
        assert!(patch["index"].get("notify").is_none());
    }

    #[tokio::test]
    async fn test_comment_notifies_mentions_and_post_author() {
        let chain = MockChain::new("bot.near");
        let social = chain.social();
        let item = SocialItem::new("dave.near/post/main", Some(90));
        social
            .comment(
                &item,
                "@Carol.near, see @erin.near",
                &["carol.near".to_string()],
                Some("dave.near"),
            )
            .await
            .unwrap();

        let patch = set_patch(&chain);
        let body = parse(&patch["post"]["comment"]);
        assert_eq!(body["item"], json!({ "type": "social", "path": "dave.near/post/main", "blockHeight": 90 }));
        assert_eq!(parse(&patch["index"]["comment"])["key"]["path"], "dave.near/post/main");

        let notify = parse(&patch["index"]["notify"]);
        let notify = notify.as_array().unwrap();
        let keys: Vec<&str> = notify.iter().map(|n| n["key"].as_str().unwrap()).collect();
        assert_eq!(keys, vec!["carol.near", "erin.near", "dave.near"]);
        assert_eq!(notify[2]["value"]["type"], "comment");
        assert_eq!(notify[0]["value"]["item"]["path"], "bot.near/post/comment");
    }

    #[tokio::test]
    async fn test_comment_never_notifies_self() {
        let chain = MockChain::new("bot.near");
        let item = SocialItem::new("bot.near/post/main", Some(5));
        chain
            .social()
            .comment(&item, "hi @bot.near", &["BOT.near".to_string()], Some("bot.near"))
            .await
            .unwrap();
        let patch = set_patch(&chain);
        assert!(patch["index"].get("notify").is_none());
    }

    #[tokio::test]
    async fn test_follow_and_poke_payloads() {
        let chain = MockChain::new("bot.near");
        let social = chain.social();
        social.follow("alice.near").await.unwrap();
        social.poke("alice.near").await.unwrap();

        let calls = chain.function_calls();
        assert_eq!(calls.len(), 2);
        let follow = &calls[0].args["data"]["bot.near"];
        assert_eq!(follow["graph"]["follow"]["alice.near"], "");
        assert_eq!(parse(&follow["index"]["notify"])["value"]["type"], "follow");

        let poke = &calls[1].args["data"]["bot.near"];
        assert_eq!(parse(&poke["index"]["graph"])["key"], "poke");
        assert_eq!(parse(&poke["index"]["notify"])["key"], "alice.near");
    }

    #[tokio::test]
    async fn test_resolve_post_and_comment() {
        let chain = MockChain::new("bot.near");
        chain.put_content("dave.near/post/main", 90, json!({ "type": "md", "text": "hello" }));
        chain.put_raw("erin.near/post/main", 91, json!("{not json"));
        let social = chain.social();

        let post = social
            .get_post(&SocialItem::new("dave.near/post/main", Some(90)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.account_id, "dave.near");
        assert_eq!(post.kind, PostType::Main);
        assert_eq!(post.to_prompt(), "@dave.near: hello\n");

        // Wrong template, missing height, bad JSON and absent data all resolve to None
        assert!(social
            .get_comment(&SocialItem::new("dave.near/post/main", Some(90)))
            .await
            .unwrap()
            .is_none());
        assert!(social
            .get_post(&SocialItem::new("dave.near/post/main", None))
            .await
            .unwrap()
            .is_none());
        assert!(social
            .get_post(&SocialItem::new("erin.near/post/main", Some(91)))
            .await
            .unwrap()
            .is_none());
        assert!(social
            .get_post(&SocialItem::new("dave.near/post/main", Some(89)))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_is_following_reads_graph_edge() {
        let chain = MockChain::new("bot.near");
        chain.add_follow("alice.near", "bot.near");
        let social = chain.social();
        assert!(social.is_following("alice.near", "bot.near").await.unwrap());
        assert!(!social.is_following("bot.near", "alice.near").await.unwrap());
    }
}
