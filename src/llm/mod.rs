//! Model provider access
//!
//! Provider adapters implement [`LLMClient`] and make one call each.
//! [`ModelClient`] layers per-provider token buckets, the retry policy and
//! fallback chains on top of them.

mod client;
mod genai;
mod mock;
pub mod model_client;
pub mod rate_limit;
pub mod retry;
mod types;

pub use client::LLMClient;
pub use genai::{parse_adapter_kind, GenAIClient};
pub use mock::{MockLLMClient, MockResponse};
pub use model_client::{CallStats, ModelClient};
pub use rate_limit::{RateLimit, RateLimiter};
pub use retry::{AttemptHistory, RetryDecision, RetryPolicy};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
