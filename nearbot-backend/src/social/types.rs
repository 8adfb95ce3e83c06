use crate::near::IndexEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::AsRefStr;

/// Pointer to a piece of social content at a given block height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialItem {
    #[serde(rename = "type", default = "default_item_type")]
    pub item_type: String,
    pub path: String,
    #[serde(
        rename = "blockHeight",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub block_height: Option<u64>,
}

fn default_item_type() -> String {
    "social".to_string()
}

impl SocialItem {
    pub fn new(path: impl Into<String>, block_height: Option<u64>) -> Self {
        Self {
            item_type: default_item_type(),
            path: path.into(),
            block_height,
        }
    }

    /// Same pointer, falling back to `block_height` when the item carries none
    pub fn with_default_height(&self, block_height: u64) -> Self {
        Self {
            block_height: self.block_height.or(Some(block_height)),
            ..self.clone()
        }
    }
}

/// Payload of a notification, keyed by its `type` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "type", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationValue {
    Follow,
    Like {
        #[serde(default, deserialize_with = "lenient_option")]
        item: Option<SocialItem>,
    },
    Poke,
    Comment {
        item: SocialItem,
    },
    Mention {
        item: SocialItem,
    },
    /// Unfollows, future tags and anything we could not parse
    #[serde(other)]
    Unknown,
}

impl Default for NotificationValue {
    fn default() -> Self {
        NotificationValue::Unknown
    }
}

impl NotificationValue {
    /// Whether handling this event may produce a generated reply
    pub fn produces_reply(&self) -> bool {
        matches!(self, NotificationValue::Comment { .. } | NotificationValue::Mention { .. })
    }
}

/// An event addressed to the bot, identified by `(account_id, block_height)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub account_id: String,
    pub block_height: u64,
    #[serde(default, deserialize_with = "lenient_notification_value")]
    pub value: NotificationValue,
}

impl From<IndexEntry> for Notification {
    fn from(entry: IndexEntry) -> Self {
        let value = parse_notification_value(entry.value);
        Self {
            account_id: entry.account_id,
            block_height: entry.block_height,
            value,
        }
    }
}

fn parse_notification_value(raw: Value) -> NotificationValue {
    serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
        log::debug!("Social: unrecognized notification value {}: {}", raw, e);
        NotificationValue::Unknown
    })
}

fn lenient_notification_value<'de, D>(deserializer: D) -> Result<NotificationValue, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_notification_value(Value::deserialize(deserializer)?))
}

/// Deserialize an optional field, turning a malformed value into `None`
fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum PostType {
    Main,
    Comment,
}

/// Decoded JSON body stored under `post/main` or `post/comment`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostContent {
    #[serde(rename = "type", default, deserialize_with = "lenient_option")]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub text: Option<String>,
    /// For comments: the post being commented on
    #[serde(default, deserialize_with = "lenient_option")]
    pub item: Option<SocialItem>,
}

/// Resolved post or comment
#[derive(Debug, Clone, PartialEq)]
pub struct PostItem {
    pub account_id: String,
    pub block_height: u64,
    pub path: String,
    pub data: PostContent,
    pub kind: PostType,
}

impl PostItem {
    /// Prompt fragment for this content: `@author: text\n`
    pub fn to_prompt(&self) -> String {
        format!(
            "@{}: {}\n",
            self.account_id,
            self.data.text.as_deref().unwrap_or("")
        )
    }
}

/// Author of `path` if it matches `<account>/post/<kind>`
pub fn parse_post_path(path: &str, kind: PostType) -> Option<&str> {
    let mut parts = path.split('/');
    let account_id = parts.next().filter(|a| !a.is_empty())?;
    if parts.next()? != "post" || parts.next()? != kind.as_ref() || parts.next().is_some() {
        return None;
    }
    Some(account_id)
}
