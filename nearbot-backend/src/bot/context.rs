//! Thread context and the reply pipeline

use super::Bot;
use crate::near::{IndexOptions, Order};
use crate::social::{Notification, PostItem, SocialItem};
use crate::state::{PersistentState, ReplyRecord};

/// Comments preceding the triggering event that go into the prompt
const THREAD_COMMENTS: u32 = 3;

impl Bot {
    /// Find the post a mention belongs to.
    ///
    /// The mention may sit in a post or in a comment; for a comment the
    /// comment's own `item` is the post to reply under. Returns the item to
    /// comment on and the resolved post, or `None` when neither resolves.
    pub(crate) async fn resolve_mention(
        &self,
        item: &SocialItem,
        block_height: u64,
    ) -> Result<Option<(SocialItem, Option<PostItem>)>, String> {
        let item = item.with_default_height(block_height);

        if let Some(post) = self.social.get_post(&item).await? {
            log::info!("Bot: mention in post {}@{}", post.path, post.block_height);
            return Ok(Some((item, Some(post))));
        }

        let Some(comment) = self.social.get_comment(&item).await? else {
            log::info!("Bot: unknown mention target {}", item.path);
            return Ok(None);
        };
        let Some(post_item) = comment.data.item.clone() else {
            log::info!(
                "Bot: mention in comment {}@{} that points at no post",
                comment.path,
                comment.block_height
            );
            return Ok(None);
        };

        log::info!(
            "Bot: mention in comment {}@{} on {}",
            comment.path,
            comment.block_height,
            post_item.path
        );
        let post = self.social.get_post(&post_item).await?;
        Ok(Some((post_item, post)))
    }

    /// Up to 3 comments on `item` at or before `block_height`, oldest first
    async fn preceding_comments(
        &self,
        item: &SocialItem,
        block_height: u64,
    ) -> Result<Vec<PostItem>, String> {
        let key = serde_json::to_value(item)
            .map_err(|e| format!("Failed to encode comment index key: {}", e))?;
        let options = IndexOptions {
            order: Order::Desc,
            limit: Some(THREAD_COMMENTS),
            from: Some(block_height),
        };
        let mut entries = self
            .social
            .index("comment", &key, &options)
            .await?
            .unwrap_or_default();
        entries.reverse();

        let mut comments = Vec::with_capacity(entries.len());
        for entry in &entries {
            match self.social.get_comment_from_index(entry).await? {
                Some(comment) => comments.push(comment),
                None => log::debug!(
                    "Bot: skipping unresolvable comment {}@{}",
                    entry.account_id,
                    entry.block_height
                ),
            }
        }
        Ok(comments)
    }

    /// Generate a reply to `notification` and comment it under `item`
    pub(crate) async fn reply(
        &self,
        state: &mut PersistentState,
        notification: &Notification,
        item: SocialItem,
        post: Option<PostItem>,
    ) -> Result<(), String> {
        let account_id = notification.account_id.clone();
        let comments = self
            .preceding_comments(&item, notification.block_height)
            .await?;

        let mut fragments: Vec<String> = post
            .iter()
            .chain(comments.iter())
            .map(PostItem::to_prompt)
            .collect();
        if fragments.is_empty() {
            log::info!(
                "Bot: no context for {} at {}, not replying",
                account_id,
                notification.block_height
            );
            return Ok(());
        }
        fragments.push(format!("@{}, ", account_id));

        let post_account_id = post.map(|p| p.account_id);
        let record = ReplyRecord {
            time: self.clock.now_ms(),
            item: item.clone(),
            account_id: account_id.clone(),
            notification: notification.clone(),
            prompts: fragments.clone(),
            reply: None,
            post_account_id: post_account_id.clone(),
        };
        state
            .account_replies
            .entry(account_id.clone())
            .or_default()
            .push(record.clone());
        state.reply_history.push(record);

        let prompts = self.budgeter.assemble(&fragments);
        let reply = self.ai.complete(&prompts).await?;
        log::info!("Bot: generated reply for {}: {}", account_id, reply);

        if let Some(r) = state
            .account_replies
            .get_mut(&account_id)
            .and_then(|replies| replies.last_mut())
        {
            r.reply = Some(reply.clone());
        }
        if let Some(r) = state.reply_history.last_mut() {
            r.reply = Some(reply.clone());
        }

        if reply.is_empty() {
            log::info!("Bot: empty reply for {}, nothing to post", account_id);
            return Ok(());
        }

        let outcome = self
            .social
            .comment(
                &item,
                &format!("@{}, {}", account_id, reply),
                std::slice::from_ref(&account_id),
                post_account_id.as_deref(),
            )
            .await?;
        if outcome.is_none() {
            log::warn!("Bot: reply comment to {} did not succeed", account_id);
        }
        Ok(())
    }
}
