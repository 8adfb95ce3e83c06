use super::Bot;
use crate::state::{DailyPost, PersistentState, PostStatus};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

/// Runs allowed to work on the same day's post before it is left alone
const MAX_DAILY_POST_ATTEMPTS: u32 = 3;

fn local_date(time_ms: i64) -> Option<NaiveDate> {
    Utc.timestamp_millis_opt(time_ms)
        .single()
        .map(|t| t.with_timezone(&Local).date_naive())
}

/// `April 20`
fn date_text(now: &DateTime<Local>) -> String {
    now.format("%B %-d").to_string()
}

pub(crate) fn daily_prompt(date_text: &str) -> String {
    format!("Tell me what important events happened on {}.", date_text)
}

impl Bot {
    /// Publish today's post unless it already went out.
    ///
    /// A same-day record that never reached `OK` is picked up again: a
    /// `Preparing` record regenerates its text, a `Posting` record re-issues
    /// the write with the text it already has.
    pub(crate) async fn maybe_post(&self, state: &mut PersistentState) -> Result<(), String> {
        let now = self.clock.now().with_timezone(&Local);
        let today = now.date_naive();

        let resume = match state.post_history.last() {
            Some(last) if local_date(last.time) == Some(today) => {
                if last.status == PostStatus::Ok {
                    return Ok(());
                }
                if last.attempts >= MAX_DAILY_POST_ATTEMPTS {
                    log::warn!(
                        "Bot: daily post stuck in {} after {} attempts, giving up for today",
                        last.status.as_ref(),
                        last.attempts
                    );
                    return Ok(());
                }
                true
            }
            _ => false,
        };

        let date_text = date_text(&now);
        if !resume {
            state.post_history.push(DailyPost {
                time: self.clock.now_ms(),
                status: PostStatus::Preparing,
                prompt: daily_prompt(&date_text),
                generated_text: None,
                text: None,
                attempts: 1,
            });
        }
        let Some(post) = state.post_history.last_mut() else {
            return Ok(());
        };
        if resume {
            post.attempts += 1;
            log::info!(
                "Bot: resuming daily post in {} (attempt {})",
                post.status.as_ref(),
                post.attempts
            );
        }

        if post.status == PostStatus::Preparing || post.text.is_none() {
            log::info!("Bot: generating daily post: {}", post.prompt);
            let prompts = self.budgeter.assemble(std::slice::from_ref(&post.prompt));
            let generated = self.ai.complete(&prompts).await?;
            post.text = Some(format!("### {}\n\n{}", date_text, generated));
            post.generated_text = Some(generated);
            post.status = PostStatus::Posting;
        }

        let text = post.text.clone().unwrap_or_default();
        log::info!("Bot: posting daily post ({} chars)", text.len());
        match self.social.post(&text).await? {
            Some(_) => {
                post.status = PostStatus::Ok;
                log::info!("Bot: daily post published");
            }
            None => log::warn!("Bot: daily post transaction did not succeed, will retry next run"),
        }
        Ok(())
    }
}
