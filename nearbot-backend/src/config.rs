use std::env;
use std::path::PathBuf;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const NEAR_ACCOUNT_ID: &str = "NEAR_ACCOUNT_ID";
    pub const NEAR_RPC_URL: &str = "NEAR_RPC_URL";
    pub const NEAR_ARCHIVAL_RPC_URL: &str = "NEAR_ARCHIVAL_RPC_URL";
    pub const SOCIAL_CONTRACT_ID: &str = "SOCIAL_CONTRACT_ID";
    pub const SOCIAL_API_URL: &str = "SOCIAL_API_URL";
    // Signing happens outside this process; we only talk to the relay
    pub const SIGNER_RELAY_URL: &str = "SIGNER_RELAY_URL";
    pub const SIGNER_RELAY_TOKEN: &str = "SIGNER_RELAY_TOKEN";
    pub const STATE_DIR: &str = "STATE_DIR";
    pub const STATE_FILENAME: &str = "STATE_FILENAME";
    // Text backend
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const OPENAI_ORG: &str = "OPENAI_ORG";
    pub const OPENAI_ENDPOINT: &str = "OPENAI_ENDPOINT";
    pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
    pub const AI_COMMAND: &str = "AI_COMMAND";
    pub const STOP_SEQ: &str = "STOP_SEQ";
    pub const MAX_TOKENS: &str = "MAX_TOKENS";
    pub const PROMPT_MAX_TOTAL_TOKENS: &str = "PROMPT_MAX_TOTAL_TOKENS";
    pub const PROMPT_MAX_TOKENS_PER_FRAGMENT: &str = "PROMPT_MAX_TOKENS_PER_FRAGMENT";
    // Notification intake
    pub const NOTIFICATION_LOOKBACK_BLOCKS: &str = "NOTIFICATION_LOOKBACK_BLOCKS";
    pub const NOTIFICATION_PAGE_LIMIT: &str = "NOTIFICATION_PAGE_LIMIT";
    pub const DAILY_POST_ENABLED: &str = "DAILY_POST_ENABLED";
}

/// Default values
pub mod defaults {
    pub const NEAR_RPC_URL: &str = "https://rpc.mainnet.near.org";
    pub const NEAR_ARCHIVAL_RPC_URL: &str = "https://rpc.mainnet.internal.near.org";
    pub const SOCIAL_CONTRACT_ID: &str = "social.near";
    pub const SOCIAL_API_URL: &str = "https://api.near.social";
    pub const STATE_DIR: &str = "res";
    pub const STATE_FILENAME: &str = "state.json";
    pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/completions";
    pub const OPENAI_MODEL: &str = "text-davinci-003";
    pub const STOP_SEQ: &str = "###";
    pub const MAX_TOKENS: u32 = 512;
    pub const PROMPT_MAX_TOTAL_TOKENS: usize = 3000;
    pub const PROMPT_MAX_TOKENS_PER_FRAGMENT: usize = 1000;
    pub const NOTIFICATION_LOOKBACK_BLOCKS: u64 = 30;
    pub const NOTIFICATION_PAGE_LIMIT: u32 = 100;
}

fn required(name: &str) -> Result<String, String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("{} not set", name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Chain + indexer endpoints
#[derive(Clone, Debug)]
pub struct NearConfig {
    pub account_id: String,
    pub rpc_url: String,
    pub archival_rpc_url: String,
    pub contract_id: String,
    pub api_url: String,
    pub signer_relay_url: String,
    pub signer_relay_token: Option<String>,
}

/// Text backend knobs
#[derive(Clone, Debug)]
pub struct AiConfig {
    pub api_key: String,
    pub organization: Option<String>,
    pub endpoint: String,
    pub model: String,
    /// Leading instruction fragment prepended to every prompt
    pub command: String,
    pub stop_sequence: String,
    pub max_response_tokens: u32,
    pub max_total_tokens: usize,
    pub max_tokens_per_fragment: usize,
}

/// Run loop knobs
#[derive(Clone, Debug)]
pub struct BotConfig {
    pub lookback_blocks: u64,
    pub page_limit: u32,
    pub daily_post_enabled: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            lookback_blocks: defaults::NOTIFICATION_LOOKBACK_BLOCKS,
            page_limit: defaults::NOTIFICATION_PAGE_LIMIT,
            daily_post_enabled: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub near: NearConfig,
    pub ai: AiConfig,
    pub bot: BotConfig,
    pub state_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let near = NearConfig {
            account_id: required(env_vars::NEAR_ACCOUNT_ID)?,
            rpc_url: optional(env_vars::NEAR_RPC_URL)
                .unwrap_or_else(|| defaults::NEAR_RPC_URL.to_string()),
            archival_rpc_url: optional(env_vars::NEAR_ARCHIVAL_RPC_URL)
                .unwrap_or_else(|| defaults::NEAR_ARCHIVAL_RPC_URL.to_string()),
            contract_id: optional(env_vars::SOCIAL_CONTRACT_ID)
                .unwrap_or_else(|| defaults::SOCIAL_CONTRACT_ID.to_string()),
            api_url: optional(env_vars::SOCIAL_API_URL)
                .unwrap_or_else(|| defaults::SOCIAL_API_URL.to_string()),
            signer_relay_url: required(env_vars::SIGNER_RELAY_URL)?,
            signer_relay_token: optional(env_vars::SIGNER_RELAY_TOKEN),
        };

        let ai = AiConfig {
            api_key: required(env_vars::OPENAI_API_KEY)?,
            organization: optional(env_vars::OPENAI_ORG),
            endpoint: optional(env_vars::OPENAI_ENDPOINT)
                .unwrap_or_else(|| defaults::OPENAI_ENDPOINT.to_string()),
            model: optional(env_vars::OPENAI_MODEL)
                .unwrap_or_else(|| defaults::OPENAI_MODEL.to_string()),
            command: env::var(env_vars::AI_COMMAND).unwrap_or_default(),
            stop_sequence: optional(env_vars::STOP_SEQ)
                .unwrap_or_else(|| defaults::STOP_SEQ.to_string()),
            max_response_tokens: parsed_or(env_vars::MAX_TOKENS, defaults::MAX_TOKENS),
            max_total_tokens: parsed_or(
                env_vars::PROMPT_MAX_TOTAL_TOKENS,
                defaults::PROMPT_MAX_TOTAL_TOKENS,
            ),
            max_tokens_per_fragment: parsed_or(
                env_vars::PROMPT_MAX_TOKENS_PER_FRAGMENT,
                defaults::PROMPT_MAX_TOKENS_PER_FRAGMENT,
            ),
        };

        let bot = BotConfig {
            lookback_blocks: parsed_or(
                env_vars::NOTIFICATION_LOOKBACK_BLOCKS,
                defaults::NOTIFICATION_LOOKBACK_BLOCKS,
            ),
            page_limit: parsed_or(env_vars::NOTIFICATION_PAGE_LIMIT, defaults::NOTIFICATION_PAGE_LIMIT)
                .max(1),
            daily_post_enabled: env::var(env_vars::DAILY_POST_ENABLED)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        };

        let state_dir = optional(env_vars::STATE_DIR).unwrap_or_else(|| defaults::STATE_DIR.to_string());
        let state_filename =
            optional(env_vars::STATE_FILENAME).unwrap_or_else(|| defaults::STATE_FILENAME.to_string());

        Ok(Self {
            near,
            ai,
            bot,
            state_path: PathBuf::from(state_dir).join(state_filename),
        })
    }
}
