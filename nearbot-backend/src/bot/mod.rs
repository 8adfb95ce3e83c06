//! The bot's run loop
//!
//! One run: maybe publish the daily post, fetch new notifications into the
//! pending queue, then drain the queue one notification at a time. Every
//! step mutates the `PersistentState` handed in by the caller, which saves it
//! afterwards whether or not the run succeeded.

mod context;
mod daily_post;
mod notifications;


use crate::ai::{PromptBudgeter, TextBackend};
use crate::clock::Clock;
use crate::config::BotConfig;
use crate::social::Social;
use crate::state::PersistentState;
use std::sync::Arc;

pub struct Bot {
    config: BotConfig,
    social: Social,
    ai: Arc<dyn TextBackend>,
    budgeter: PromptBudgeter,
    clock: Arc<dyn Clock>,
}

impl Bot {
    pub fn new(
        config: BotConfig,
        social: Social,
        ai: Arc<dyn TextBackend>,
        budgeter: PromptBudgeter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            social,
            ai,
            budgeter,
            clock,
        }
    }

    pub fn account_id(&self) -> &str {
        self.social.account_id()
    }

    pub async fn run(&self, state: &mut PersistentState) -> Result<(), String> {
        log::info!("Bot: run started for {}", self.account_id());
        if self.config.daily_post_enabled {
            self.maybe_post(state).await?;
        }
        self.fetch_notifications(state).await?;
        self.process_notifications(state).await?;
        log::info!("Bot: run finished");
        Ok(())
    }
}
