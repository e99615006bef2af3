use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;

/// Selects the backend model profile for a prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClass {
    /// Short structured scoring tasks.
    Scorer,
    /// Long-form marketing copy.
    Content,
    /// Numeric analysis and reporting.
    Analyzer,
}

impl TaskClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scorer => "scorer",
            Self::Content => "content",
            Self::Analyzer => "analyzer",
        }
    }
}

/// A single request to the text-generation backend.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Raw backend output: free text expected to embed one JSON object.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationResponse {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl GenerationResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// A parsed payload together with how it was obtained.
#[derive(Clone, Debug)]
pub struct Generation<T> {
    pub payload: T,
    pub attempts: u32,
    /// Latency of the successful attempt.
    pub latency: Duration,
    pub usage: Option<TokenUsage>,
}

impl<T> Generation<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Generation<U> {
        Generation {
            payload: f(self.payload),
            attempts: self.attempts,
            latency: self.latency,
            usage: self.usage,
        }
    }
}

/// Implemented by each text-generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// False when no credential is configured; such a backend must never be called.
    fn is_configured(&self) -> bool;

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError>;
}
