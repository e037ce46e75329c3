//! Pipeline configuration
//!
//! Every field has a default, so an empty YAML document is a valid config.
//! Values are layered: defaults, then an optional YAML file, then `TRIAGEBOX_*`
//! environment variables.
//!
//! # Environment Variables
//!
//! - `TRIAGEBOX_TOP_FRACTION` - fraction of surviving candidates analysed - default: 0.4
//! - `TRIAGEBOX_SIMILARITY_THRESHOLD` - duplicate edge threshold - default: 0.8
//! - `TRIAGEBOX_CACHE_TTL_SECS` - cache entry lifetime - default: 604800 (7 days)
//! - `TRIAGEBOX_CACHING_CONFIDENCE_THRESHOLD` - minimum confidence to cache - default: 0.5
//! - `TRIAGEBOX_PIPELINE_TIMEOUT_SECS` - specialist stage deadline - default: 300
//! - `TRIAGEBOX_REQUEST_TIMEOUT_SECS` - per-attempt call timeout - default: 30
//! - `TRIAGEBOX_MAX_CONCURRENT_CANDIDATES` - candidates in flight - default: 4
//! - `TRIAGEBOX_MODEL_VERSION` - cache key salt
//! - `TRIAGEBOX_CACHE_PATH` - SQLite file location
//! - `TRIAGEBOX_DEFAULT_CHAIN` - comma-separated provider names
//! - `TRIAGEBOX_PROVIDER` / `TRIAGEBOX_MODEL` - replace the provider list with a
//!   single provider of that adapter kind
//!
//! Provider credentials are read by the genai library itself
//! (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `OLLAMA_HOST`, ...).

use crate::analysis::Role;
use crate::cache::{CacheError, CacheStore};
use crate::llm::{parse_adapter_kind, GenAIClient, ModelClient, RateLimit, RetryPolicy};
use crate::similarity::{SimilarityEngine, SimilarityWeights};
use crate::triage::{Admission, PriorityPolicy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const DEFAULT_TOP_FRACTION: f64 = 0.4;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;
const DEFAULT_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_CACHING_CONFIDENCE_THRESHOLD: f64 = 0.5;
const DEFAULT_PIPELINE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_CONCURRENT_CANDIDATES: usize = 4;
const DEFAULT_MODEL_VERSION: &str = "triagebox-v1";
const DEFAULT_PROVIDER: &str = "ollama";
const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5-coder:7b";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Provider entry could not be turned into a client
    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// One model endpoint the pipeline may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name used in fallback chains and rate limits
    pub name: String,
    /// genai adapter kind (`ollama`, `openai`, `anthropic`, ...)
    pub adapter: String,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, adapter: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adapter: adapter.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub top_fraction: f64,
    pub similarity_threshold: f64,
    pub cache_ttl_secs: u64,
    /// Results below this confidence are returned but never cached
    pub caching_confidence_threshold: f64,
    /// Token bucket per provider name; unlisted providers get the default
    pub rate_limits: BTreeMap<String, RateLimit>,
    /// Ordered providers per role; roles not listed use `default_chain`
    pub fallback_chains: BTreeMap<Role, Vec<String>>,
    pub default_chain: Vec<String>,
    pub pipeline_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Part of every cache key; bump it to orphan old results
    pub model_version: String,
    pub max_concurrent_candidates: usize,
    pub retry: RetryPolicy,
    pub priority: PriorityPolicy,
    pub similarity_weights: SimilarityWeights,
    pub providers: Vec<ProviderConfig>,
    /// SQLite file; `None` uses the platform cache directory
    pub cache_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_fraction: DEFAULT_TOP_FRACTION,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            caching_confidence_threshold: DEFAULT_CACHING_CONFIDENCE_THRESHOLD,
            rate_limits: BTreeMap::new(),
            fallback_chains: BTreeMap::new(),
            default_chain: vec![DEFAULT_PROVIDER.to_string()],
            pipeline_timeout_secs: DEFAULT_PIPELINE_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            max_concurrent_candidates: DEFAULT_MAX_CONCURRENT_CANDIDATES,
            retry: RetryPolicy::default(),
            priority: PriorityPolicy::default(),
            similarity_weights: SimilarityWeights::default(),
            providers: vec![ProviderConfig::new(
                DEFAULT_PROVIDER,
                DEFAULT_PROVIDER,
                DEFAULT_OLLAMA_MODEL,
            )],
            cache_path: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn in_unit_range(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ValidationFailed(format!(
            "{} must be within [0, 1], got {}",
            field, value
        )));
    }
    Ok(())
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// YAML file (if any), then environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("TRIAGEBOX_TOP_FRACTION") {
            self.top_fraction = v;
        }
        if let Some(v) = env_parse("TRIAGEBOX_SIMILARITY_THRESHOLD") {
            self.similarity_threshold = v;
        }
        if let Some(v) = env_parse("TRIAGEBOX_CACHE_TTL_SECS") {
            self.cache_ttl_secs = v;
        }
        if let Some(v) = env_parse("TRIAGEBOX_CACHING_CONFIDENCE_THRESHOLD") {
            self.caching_confidence_threshold = v;
        }
        if let Some(v) = env_parse("TRIAGEBOX_PIPELINE_TIMEOUT_SECS") {
            self.pipeline_timeout_secs = v;
        }
        if let Some(v) = env_parse("TRIAGEBOX_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("TRIAGEBOX_MAX_CONCURRENT_CANDIDATES") {
            self.max_concurrent_candidates = v;
        }
        if let Ok(v) = env::var("TRIAGEBOX_MODEL_VERSION") {
            self.model_version = v;
        }
        if let Ok(v) = env::var("TRIAGEBOX_CACHE_PATH") {
            self.cache_path = Some(PathBuf::from(v));
        }

        if let Ok(adapter) = env::var("TRIAGEBOX_PROVIDER") {
            let adapter = adapter.trim().to_lowercase();
            let model = env::var("TRIAGEBOX_MODEL").unwrap_or_else(|_| {
                self.providers
                    .iter()
                    .find(|p| p.adapter == adapter)
                    .map(|p| p.model.clone())
                    .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string())
            });
            debug!(provider = %adapter, model = %model, "Provider overridden from environment");
            self.providers = vec![ProviderConfig::new(adapter.clone(), adapter.clone(), model)];
            self.default_chain = vec![adapter];
            self.fallback_chains.clear();
        } else if let Ok(model) = env::var("TRIAGEBOX_MODEL") {
            if let Some(first) = self.providers.first_mut() {
                first.model = model;
            }
        }

        if let Ok(v) = env::var("TRIAGEBOX_DEFAULT_CHAIN") {
            self.default_chain = split_list(&v);
        }
        self
    }

    pub fn with_top_fraction(mut self, top_fraction: f64) -> Self {
        self.top_fraction = top_fraction;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_caching_confidence_threshold(mut self, threshold: f64) -> Self {
        self.caching_confidence_threshold = threshold;
        self
    }

    pub fn with_rate_limit(mut self, provider: impl Into<String>, limit: RateLimit) -> Self {
        self.rate_limits.insert(provider.into(), limit);
        self
    }

    pub fn with_fallback_chain<I, S>(mut self, role: Role, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_chains
            .insert(role, chain.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_default_chain<I, S>(mut self, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_chain = chain.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_model_version(mut self, model_version: impl Into<String>) -> Self {
        self.model_version = model_version.into();
        self
    }

    pub fn with_max_concurrent_candidates(mut self, max: usize) -> Self {
        self.max_concurrent_candidates = max;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_priority(mut self, priority: PriorityPolicy) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_similarity_weights(mut self, weights: SimilarityWeights) -> Self {
        self.similarity_weights = weights;
        self
    }

    pub fn with_providers(mut self, providers: Vec<ProviderConfig>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Providers to try for `role`, in order
    pub fn chain_for(&self, role: Role) -> &[String] {
        self.fallback_chains
            .get(&role)
            .filter(|chain| !chain.is_empty())
            .unwrap_or(&self.default_chain)
    }

    /// Opens `cache_path` (or the platform default) with the configured TTL
    pub fn open_cache(&self) -> Result<CacheStore, CacheError> {
        let store = match &self.cache_path {
            Some(path) => CacheStore::open(path)?,
            None => CacheStore::open_default()?,
        };
        Ok(store.with_ttl(self.cache_ttl()))
    }

    /// Admission built from the priority policy and similarity settings
    pub fn admission(&self) -> Admission {
        let engine = SimilarityEngine::new(self.similarity_weights, self.similarity_threshold);
        Admission::new(self.priority.clone(), engine)
    }

    pub fn rate_limit_for(&self, provider: &str) -> RateLimit {
        self.rate_limits.get(provider).copied().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        in_unit_range("top_fraction", self.top_fraction)?;
        in_unit_range("caching_confidence_threshold", self.caching_confidence_threshold)?;

        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ConfigError::ValidationFailed(format!(
                "similarity_threshold must be within (0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.pipeline_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Pipeline timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Cache TTL must be at least 1 second".to_string(),
            ));
        }
        if self.max_concurrent_candidates == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent_candidates must be at least 1".to_string(),
            ));
        }
        if self.model_version.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model_version must not be empty".to_string(),
            ));
        }
        if self.default_chain.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "default_chain must name at least one provider".to_string(),
            ));
        }

        for (provider, limit) in &self.rate_limits {
            if limit.capacity == 0 || !(limit.refill_per_second > 0.0) {
                return Err(ConfigError::ValidationFailed(format!(
                    "Rate limit for {} needs capacity >= 1 and a positive refill rate",
                    provider
                )));
            }
        }

        let mut names = HashSet::new();
        for provider in &self.providers {
            if !names.insert(provider.name.as_str()) {
                return Err(ConfigError::InvalidProvider(format!(
                    "{} is declared more than once",
                    provider.name
                )));
            }
        }

        self.similarity_weights
            .validate()
            .map_err(ConfigError::ValidationFailed)?;
        self.priority
            .validate()
            .map_err(ConfigError::ValidationFailed)?;

        Ok(())
    }

    /// Builds a `ModelClient` with one genai client per declared provider
    pub fn build_model_client(&self) -> Result<ModelClient, ConfigError> {
        let mut client = ModelClient::new(self.retry.clone());
        for provider in &self.providers {
            let adapter = parse_adapter_kind(&provider.adapter)
                .map_err(|e| ConfigError::InvalidProvider(format!("{}: {}", provider.name, e)))?;
            let llm = GenAIClient::new(
                provider.name.clone(),
                adapter,
                provider.model.clone(),
                provider.base_url.clone(),
            );
            client.register(Arc::new(llm), self.rate_limit_for(&provider.name));
        }
        Ok(client)
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Triagebox Configuration:")?;
        writeln!(f, "  Top Fraction: {}", self.top_fraction)?;
        writeln!(f, "  Similarity Threshold: {}", self.similarity_threshold)?;
        writeln!(f, "  Cache TTL: {}s", self.cache_ttl_secs)?;
        writeln!(
            f,
            "  Caching Confidence Threshold: {}",
            self.caching_confidence_threshold
        )?;
        writeln!(f, "  Pipeline Timeout: {}s", self.pipeline_timeout_secs)?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Max Concurrent Candidates: {}", self.max_concurrent_candidates)?;
        writeln!(f, "  Model Version: {}", self.model_version)?;
        if let Some(ref path) = self.cache_path {
            writeln!(f, "  Cache Path: {}", path.display())?;
        }
        writeln!(f, "  Default Chain: {}", self.default_chain.join(" -> "))?;
        for (role, chain) in &self.fallback_chains {
            writeln!(f, "  Chain[{}]: {}", role, chain.join(" -> "))?;
        }
        for provider in &self.providers {
            writeln!(
                f,
                "  Provider {}: {}/{}",
                provider.name, provider.adapter, provider.model
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.top_fraction, 0.4);
        assert_eq!(config.similarity_threshold, 0.8);
        assert_eq!(config.cache_ttl(), Duration::from_secs(604_800));
        assert_eq!(config.caching_confidence_threshold, 0.5);
        assert_eq!(config.pipeline_timeout(), Duration::from_secs(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_concurrent_candidates, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chain_for_falls_back_to_default() {
        let config = PipelineConfig::new()
            .with_default_chain(["primary", "backup"])
            .with_fallback_chain(Role::Security, ["careful"])
            .with_fallback_chain(Role::Quality, Vec::<String>::new());

        assert_eq!(config.chain_for(Role::Security), ["careful".to_string()]);
        assert_eq!(config.chain_for(Role::Quality), ["primary", "backup"]);
        assert_eq!(config.chain_for(Role::Synthesis), ["primary", "backup"]);
    }

    #[test]
    fn test_yaml_partial_document() {
        let config = PipelineConfig::from_yaml_str(
            r#"
top_fraction: 0.25
default_chain: [openai, ollama]
fallback_chains:
  security: [anthropic, openai]
rate_limits:
  openai:
    capacity: 2
    refill_per_second: 0.5
providers:
  - name: openai
    adapter: openai
    model: gpt-4o-mini
retry:
  max_rate_limit_attempts: 5
"#,
        )
        .unwrap();

        assert_eq!(config.top_fraction, 0.25);
        assert_eq!(config.similarity_threshold, 0.8);
        assert_eq!(config.chain_for(Role::Security), ["anthropic", "openai"]);
        assert_eq!(config.rate_limit_for("openai").capacity, 2);
        assert_eq!(config.rate_limit_for("unknown"), RateLimit::default());
        assert_eq!(config.retry.max_rate_limit_attempts, 5);
        assert_eq!(config.retry.transient_retries, 1);
        assert_eq!(config.providers.len(), 1);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(
            PipelineConfig::from_yaml_str("").unwrap(),
            PipelineConfig::default()
        );
    }

    #[test]
    fn test_yaml_file_errors() {
        let missing = PipelineConfig::from_yaml_file(Path::new("/nonexistent/triagebox.yaml"));
        assert!(matches!(missing, Err(ConfigError::ReadError { .. })));

        let bad = PipelineConfig::from_yaml_str("top_fraction: [1, 2]");
        assert!(matches!(bad, Err(ConfigError::YamlError(_))));
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        let _guards = vec![
            EnvGuard::set("TRIAGEBOX_TOP_FRACTION", "0.6"),
            EnvGuard::set("TRIAGEBOX_PIPELINE_TIMEOUT_SECS", "60"),
            EnvGuard::set("TRIAGEBOX_MODEL_VERSION", "v9"),
            EnvGuard::set("TRIAGEBOX_DEFAULT_CHAIN", "a, b ,,c"),
            EnvGuard::set("TRIAGEBOX_MAX_CONCURRENT_CANDIDATES", "not-a-number"),
        ];

        let config = PipelineConfig::from_env();
        assert_eq!(config.top_fraction, 0.6);
        assert_eq!(config.pipeline_timeout_secs, 60);
        assert_eq!(config.model_version, "v9");
        assert_eq!(config.default_chain, vec!["a", "b", "c"]);
        assert_eq!(config.max_concurrent_candidates, 4);
    }

    #[test]
    #[serial]
    fn test_environment_provider_override() {
        let _guards = vec![
            EnvGuard::set("TRIAGEBOX_PROVIDER", "OpenAI"),
            EnvGuard::set("TRIAGEBOX_MODEL", "gpt-4o"),
        ];

        let config = PipelineConfig::from_env();
        assert_eq!(config.providers, vec![ProviderConfig::new("openai", "openai", "gpt-4o")]);
        assert_eq!(config.chain_for(Role::Architecture), ["openai".to_string()]);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = vec![
            PipelineConfig::new().with_top_fraction(1.5),
            PipelineConfig::new().with_similarity_threshold(0.0),
            PipelineConfig::new().with_caching_confidence_threshold(-0.1),
            PipelineConfig::new().with_pipeline_timeout(Duration::ZERO),
            PipelineConfig::new().with_max_concurrent_candidates(0),
            PipelineConfig::new().with_default_chain(Vec::<String>::new()),
            PipelineConfig::new().with_rate_limit(
                "p",
                RateLimit {
                    capacity: 0,
                    refill_per_second: 1.0,
                },
            ),
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(ConfigError::ValidationFailed(_))),
                "{}",
                config
            );
        }
    }

    #[test]
    fn test_non_numeric_bonus_cap_rejected_without_panicking() {
        for yaml in ["priority:\n  max_bonus: .nan\n", "priority:\n  max_bonus: -1.0\n"] {
            let config = PipelineConfig::from_yaml_str(yaml).unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::ValidationFailed(ref m)) if m.contains("max_bonus")),
                "{:?} accepted",
                yaml
            );

            let candidates = vec![
                crate::triage::CandidateRecord::new("a", "kv-store", "fp-a").with_cheap_score(2.0),
                crate::triage::CandidateRecord::new("b", "mail-relay", "fp-b").with_cheap_score(1.0),
            ];
            let outcome = config.admission().select(&candidates, 0.5);
            assert_eq!(outcome.selected_ids(), vec!["a"]);
            assert_eq!(outcome.selected[0].priority.bonus, 0.0);
        }
    }

    #[test]
    fn test_validation_rejects_duplicate_providers() {
        let config = PipelineConfig::new().with_providers(vec![
            ProviderConfig::new("p", "ollama", "m"),
            ProviderConfig::new("p", "openai", "m"),
        ]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProvider(_))
        ));
    }

    #[test]
    fn test_build_model_client() {
        let config = PipelineConfig::new().with_providers(vec![
            ProviderConfig::new("local", "ollama", "qwen2.5-coder:7b"),
            ProviderConfig::new("remote", "openai", "gpt-4o-mini")
                .with_base_url("http://localhost:9999/v1/"),
        ]);
        let client = config.build_model_client().unwrap();
        assert_eq!(client.provider_names(), vec!["local", "remote"]);

        let bad = PipelineConfig::new()
            .with_providers(vec![ProviderConfig::new("x", "no-such-adapter", "m")]);
        assert!(matches!(
            bad.build_model_client(),
            Err(ConfigError::InvalidProvider(_))
        ));
    }

    #[test]
    fn test_config_display() {
        let display = format!("{}", PipelineConfig::default());
        assert!(display.contains("Triagebox Configuration:"));
        assert!(display.contains("Default Chain: ollama"));
    }
}
