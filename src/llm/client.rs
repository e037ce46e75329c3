use super::types::{LLMRequest, LLMResponse};
use crate::error::BackendError;
use async_trait::async_trait;

/// A single model provider.
///
/// Implementations make exactly one outbound call per `chat`; retries,
/// throttling and fallback are layered on top by `ModelClient`.
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError>;

    fn name(&self) -> &str;

    fn model_info(&self) -> Option<String> {
        None
    }
}
