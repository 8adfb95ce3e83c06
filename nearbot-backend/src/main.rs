use dotenv::dotenv;
use std::sync::Arc;

mod ai;
mod bot;
mod clock;
mod config;
mod http;
mod near;
mod social;
mod state;

#[cfg(test)]
mod test_support;

use ai::{OpenAiCompletionClient, PromptBudgeter};
use bot::Bot;
use clock::SystemClock;
use config::Config;
use near::Near;
use social::Social;
use state::PersistentState;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // A corrupt state file is left in place for inspection
    let mut state = match PersistentState::load(&config.state_path) {
        Ok(state) => state,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let outcome = match build_bot(&config) {
        Ok(bot) => bot.run(&mut state).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &outcome {
        log::error!("Run failed: {}", e);
    }

    if let Err(e) = state.save(&config.state_path) {
        log::error!("{}", e);
        std::process::exit(1);
    }
    if outcome.is_err() {
        std::process::exit(1);
    }
}

fn build_bot(config: &Config) -> Result<Bot, String> {
    log::info!(
        "Starting bot {} against {} (rpc {})",
        config.near.account_id,
        config.near.contract_id,
        config.near.rpc_url
    );
    let social = Social::new(Near::from_config(&config.near));
    let ai = Arc::new(OpenAiCompletionClient::new(&config.ai)?);
    let budgeter = PromptBudgeter::from_config(&config.ai)?;
    Ok(Bot::new(
        config.bot.clone(),
        social,
        ai,
        budgeter,
        Arc::new(SystemClock),
    ))
}
