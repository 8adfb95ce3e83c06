//! Token-budgeted prompt assembly
//!
//! Context fragments arrive oldest first (target post, preceding comments, the
//! address line). They are budgeted newest first so that, when tokens run out,
//! the most recent context survives and older fragments are cut or dropped.
//! The leading instruction is charged before any context.

use crate::config::AiConfig;
use std::sync::Arc;

/// Text <-> token ids for the completion model
pub trait TokenEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>, String>;
    fn decode(&self, tokens: &[u32]) -> Result<String, String>;
}

/// BPE encoder matching the configured completion model
pub struct TiktokenEncoder {
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenEncoder {
    /// Encoder for `model`, falling back to p50k_base (the davinci family) for unknown names
    pub fn for_model(model: &str) -> Result<Self, String> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(e) => {
                log::warn!("Prompt: no tokenizer for model {} ({}), using p50k_base", model, e);
                tiktoken_rs::p50k_base().map_err(|e| format!("Failed to load tokenizer: {}", e))?
            }
        };
        Ok(Self { bpe })
    }
}

impl TokenEncoder for TiktokenEncoder {
    fn encode(&self, text: &str) -> Result<Vec<u32>, String> {
        Ok(self
            .bpe
            .encode_with_special_tokens(text)
            .into_iter()
            .map(|t| t as u32)
            .collect())
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, String> {
        self.bpe
            .decode(tokens.iter().map(|&t| t as _).collect())
            .map_err(|e| format!("Failed to decode tokens: {}", e))
    }
}

pub struct PromptBudgeter {
    encoder: Arc<dyn TokenEncoder>,
    instruction: String,
    max_total_tokens: usize,
    max_tokens_per_fragment: usize,
}

impl PromptBudgeter {
    pub fn new(
        encoder: Arc<dyn TokenEncoder>,
        instruction: &str,
        max_total_tokens: usize,
        max_tokens_per_fragment: usize,
    ) -> Self {
        Self {
            encoder,
            instruction: instruction.to_string(),
            max_total_tokens,
            max_tokens_per_fragment,
        }
    }

    pub fn from_config(config: &AiConfig) -> Result<Self, String> {
        let encoder = TiktokenEncoder::for_model(&config.model)?;
        Ok(Self::new(
            Arc::new(encoder),
            &config.command,
            config.max_total_tokens,
            config.max_tokens_per_fragment,
        ))
    }

    /// Instruction followed by the budgeted context fragments, ready for the text backend
    pub fn assemble(&self, fragments: &[String]) -> Vec<String> {
        let mut remaining = self.max_total_tokens;
        let mut prompts = Vec::with_capacity(fragments.len() + 1);

        if !self.instruction.is_empty() {
            let allowance = self.max_tokens_per_fragment.min(remaining);
            match self.truncate(&self.instruction, allowance) {
                Ok((text, used)) => {
                    remaining -= used;
                    if !text.is_empty() {
                        prompts.push(text);
                    }
                }
                Err(e) => log::warn!("Prompt: dropping instruction: {}", e),
            }
        }

        prompts.extend(self.budget(fragments, remaining));
        prompts
    }

    /// Fit `fragments` (oldest first) into `total` tokens.
    ///
    /// Each fragment gets at most `min(max_tokens_per_fragment, remaining)` tokens,
    /// newest first. Fragments that fail to encode or truncate to nothing are dropped.
    pub fn budget(&self, fragments: &[String], total: usize) -> Vec<String> {
        let mut remaining = total;
        let mut kept = Vec::with_capacity(fragments.len());

        for fragment in fragments.iter().rev() {
            let allowance = self.max_tokens_per_fragment.min(remaining);
            match self.truncate(fragment, allowance) {
                Ok((text, used)) => {
                    remaining -= used;
                    kept.push(text);
                }
                Err(e) => {
                    log::warn!(
                        "Prompt: dropping fragment of {} chars that failed to encode: {}",
                        fragment.len(),
                        e
                    );
                }
            }
        }

        kept.reverse();
        kept.retain(|text| !text.is_empty());
        kept
    }

    /// Keep the leading `allowance` tokens of `text`; returns the text and its token count
    fn truncate(&self, text: &str, allowance: usize) -> Result<(String, usize), String> {
        let tokens = self.encoder.encode(text)?;
        if tokens.len() <= allowance {
            return Ok((text.to_string(), tokens.len()));
        }

        // Re-encoding a decoded prefix can merge differently; shrink until it fits
        let mut keep = allowance;
        while keep > 0 {
            let truncated = self.encoder.decode(&tokens[..keep])?;
            let used = self.encoder.encode(&truncated)?.len();
            if used <= allowance {
                log::debug!("Prompt: truncated fragment from {} to {} tokens", tokens.len(), used);
                return Ok((truncated, used));
            }
            keep -= 1;
        }
        Ok((String::new(), 0))
    }
}
