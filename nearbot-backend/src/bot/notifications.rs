use super::Bot;
use crate::near::{BlockReference, IndexOptions, Order};
use crate::social::{Notification, NotificationValue};
use crate::state::PersistentState;
use serde_json::json;
use strum::AsRefStr;

/// Replies allowed per sender inside one window
const RATE_LIMIT_REPLIES: usize = 3;
const RATE_LIMIT_WINDOW_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum GateVerdict {
    Admit,
    OwnNotification,
    Duplicate,
    RateLimited,
}

/// Decide whether `notification` may trigger side effects.
///
/// A reply-producing notification is rate limited while the oldest of the
/// sender's last 3 replies is younger than 5 minutes.
pub fn check_gate(
    state: &PersistentState,
    own_account_id: &str,
    notification: &Notification,
    now_ms: i64,
) -> GateVerdict {
    if notification.account_id == own_account_id {
        return GateVerdict::OwnNotification;
    }

    let replies = state.replies_for(&notification.account_id);
    if replies
        .last()
        .is_some_and(|last| last.notification.block_height == notification.block_height)
    {
        return GateVerdict::Duplicate;
    }

    if notification.value.produces_reply() && replies.len() >= RATE_LIMIT_REPLIES {
        let oldest = &replies[replies.len() - RATE_LIMIT_REPLIES];
        if now_ms - oldest.time < RATE_LIMIT_WINDOW_MS {
            return GateVerdict::RateLimited;
        }
    }

    GateVerdict::Admit
}

impl Bot {
    /// Page new notifications into the ledger and the pending queue.
    ///
    /// Returns how many were fetched.
    pub(crate) async fn fetch_notifications(
        &self,
        state: &mut PersistentState,
    ) -> Result<usize, String> {
        let me = self.account_id().to_string();
        let mut from = state.last_notification_height().map_or(0, |h| h + 1);

        let own_comments = format!("{}/post/comment", me);
        if let Some(height) = self
            .social
            .last_write_height(&own_comments, BlockReference::Optimistic)
            .await?
        {
            // Only ever raises the start; this is not a lower bound on the ledger watermark
            let lookback_from = height.saturating_sub(self.config.lookback_blocks);
            if lookback_from > from {
                log::debug!(
                    "Bot: own comment at {}, moving fetch start from {} to {}",
                    height,
                    from,
                    lookback_from
                );
                from = lookback_from;
            }
        }

        let options = IndexOptions {
            order: Order::Asc,
            limit: Some(self.config.page_limit),
            from: Some(from),
        };
        let entries = self
            .social
            .index("notify", &json!(me), &options)
            .await?
            .unwrap_or_default();

        let fetched: Vec<Notification> = entries.into_iter().map(Notification::from).collect();
        if let Some(last) = fetched.last() {
            log::info!(
                "Bot: fetched {} notification(s) from block {}, last {} at {}",
                fetched.len(),
                from,
                last.account_id,
                last.block_height
            );
        } else {
            log::debug!("Bot: no new notifications from block {}", from);
        }

        let count = fetched.len();
        state.notifications.extend(fetched.iter().cloned());
        state.todo_notifications.extend(fetched);
        Ok(count)
    }

    /// Drain the pending queue front to back
    pub(crate) async fn process_notifications(
        &self,
        state: &mut PersistentState,
    ) -> Result<(), String> {
        while let Some(notification) = state.todo_notifications.pop_front() {
            self.process_notification(state, notification).await?;
        }
        Ok(())
    }

    async fn process_notification(
        &self,
        state: &mut PersistentState,
        notification: Notification,
    ) -> Result<(), String> {
        log::info!(
            "Bot: processing {} from {} at {}",
            notification.value.as_ref(),
            notification.account_id,
            notification.block_height
        );

        let verdict = check_gate(state, self.account_id(), &notification, self.clock.now_ms());
        if verdict != GateVerdict::Admit {
            log::info!(
                "Bot: skipping notification from {} at {} ({})",
                notification.account_id,
                notification.block_height,
                verdict.as_ref()
            );
            return Ok(());
        }

        match notification.value.clone() {
            NotificationValue::Follow => self.follow_back(&notification.account_id).await,
            NotificationValue::Poke => {
                log::info!("Bot: poking back {}", notification.account_id);
                self.social.poke(&notification.account_id).await?;
                Ok(())
            }
            NotificationValue::Comment { item } => {
                let post = self.social.get_post(&item).await?;
                log::info!(
                    "Bot: comment on {} (post {})",
                    item.path,
                    if post.is_some() { "resolved" } else { "unresolved" }
                );
                self.reply(state, &notification, item, post).await
            }
            NotificationValue::Mention { item } => {
                match self.resolve_mention(&item, notification.block_height).await? {
                    Some((item, post)) => self.reply(state, &notification, item, post).await,
                    None => Ok(()),
                }
            }
            NotificationValue::Like { .. } | NotificationValue::Unknown => Ok(()),
        }
    }

    /// Follow `account_id` if they follow us and we don't follow them yet
    async fn follow_back(&self, account_id: &str) -> Result<(), String> {
        let me = self.account_id();
        if self.social.is_following(account_id, me).await?
            && !self.social.is_following(me, account_id).await?
        {
            log::info!("Bot: following back {}", account_id);
            self.social.follow(account_id).await?;
        } else {
            log::debug!("Bot: no follow back needed for {}", account_id);
        }
        Ok(())
    }
}
