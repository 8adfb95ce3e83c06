pub mod openai;
pub mod prompt;

pub use openai::OpenAiCompletionClient;
pub use prompt::{PromptBudgeter, TokenEncoder};

use async_trait::async_trait;

/// Generative text backend: ordered, already budgeted prompt fragments in,
/// one completion out.
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn complete(&self, prompts: &[String]) -> Result<String, String>;
}

/// Test backend: returns queued completions and records every prompt list
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTextBackend {
    responses: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<Result<String, String>>>>,
    requests: std::sync::Arc<std::sync::Mutex<Vec<Vec<String>>>>,
}

#[cfg(test)]
impl MockTextBackend {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: std::sync::Arc::new(std::sync::Mutex::new(responses.into())),
            requests: Default::default(),
        }
    }

    /// Prompt lists received so far
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl TextBackend for MockTextBackend {
    async fn complete(&self, prompts: &[String]) -> Result<String, String> {
        self.requests.lock().unwrap().push(prompts.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("(mock exhausted)".to_string()))
    }
}
