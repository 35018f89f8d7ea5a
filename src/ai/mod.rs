mod openai;
pub mod prompts;

use async_trait::async_trait;

use crate::error::Result;

pub use openai::OpenAiClient;

/// One system + user exchange sent to a chat-completion model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Text generation backend used by the enrichment pipeline.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// The reply text, trimmed.
    async fn generate(&self, prompt: &ChatPrompt) -> Result<String>;
}
