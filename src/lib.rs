//! triagebox - cost-bounded triage and multi-stage LLM analysis
//!
//! Upstream scanners produce many cheap-to-describe candidates; only a few are
//! worth an expensive model review. This crate ranks a batch, collapses
//! near-duplicates, keeps the top fraction and runs each survivor through
//! concurrent specialist roles (architecture, security, quality,
//! documentation) followed by a synthesis role that sees all of them.
//!
//! # Core Concepts
//!
//! - **Admission** ([`triage`]): priority scoring plus duplicate detection
//!   ([`similarity`]) decide which candidates get analysed
//! - **Model calls** ([`llm`]): per-provider token buckets, retry with backoff
//!   and ordered fallback chains over genai-backed clients
//! - **Parsing** ([`parser`]): model text becomes a confidence-scored
//!   [`ParsedResult`]; parsing never fails
//! - **Cache** ([`cache`]): results keyed by content fingerprint, role and
//!   model version, invalidated by TTL or source file mtime changes
//! - **Pipeline** ([`pipeline`]): the orchestration tying it together
//!
//! # Example Usage
//!
//! ```no_run
//! use triagebox::{triage_and_analyze, CandidateRecord, PipelineConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let candidates = vec![
//!     CandidateRecord::new("c1", "kv-store", "sha256:4be1").with_cheap_score(3.0),
//!     CandidateRecord::new("c2", "image-resizer", "sha256:90aa").with_cheap_score(1.5),
//! ];
//! let config = PipelineConfig::from_env();
//!
//! for record in triage_and_analyze(&candidates, &config).await? {
//!     println!("{}: {:.2}", record.candidate_id(), record.aggregate_confidence());
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod error;
pub mod llm;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod similarity;
pub mod triage;
pub mod util;

pub use analysis::{AnalysisRecord, ParsedResult, ParsingMethod, Placeholder, Role};
pub use cache::{CacheError, CacheKey, CacheStore};
pub use error::{BackendError, ClassifiedError, ErrorClass};
pub use llm::{LLMClient, ModelClient, RateLimit, RateLimiter, RetryPolicy};
pub use parser::ResponseParser;
pub use pipeline::{triage_and_analyze, ConfigError, PipelineConfig, PipelineController};
pub use similarity::{SimilarityEngine, SimilarityWeights};
pub use triage::{select, Admission, CandidateRecord, TriageOutcome};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_triagebox() {
        assert_eq!(NAME, "triagebox");
    }
}
