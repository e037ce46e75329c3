//! Outbound model calls with throttling, retry and provider fallback

use super::client::LLMClient;
use super::rate_limit::{RateLimit, RateLimiter};
use super::retry::{AttemptHistory, RetryDecision, RetryPolicy};
use super::types::LLMRequest;
use crate::error::{BackendError, ClassifiedError, ErrorClass};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct Provider {
    client: Arc<dyn LLMClient>,
    limiter: Arc<RateLimiter>,
}

/// Attempt counters, exposed for observability only
#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    successes: AtomicU64,
    retries: AtomicU64,
    escalations: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallStats {
    pub attempts: u64,
    pub successes: u64,
    pub retries: u64,
    pub escalations: u64,
    /// Calls (or chains) that ended without a response
    pub failures: u64,
}

/// Registry of providers, each behind its own rate limiter, plus the shared
/// retry policy.
pub struct ModelClient {
    providers: HashMap<String, Provider>,
    policy: RetryPolicy,
    counters: Counters,
}

impl ModelClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            providers: HashMap::new(),
            policy,
            counters: Counters::default(),
        }
    }

    /// Registers a provider under its `name()`
    pub fn with_provider(mut self, client: Arc<dyn LLMClient>, limit: RateLimit) -> Self {
        self.register(client, limit);
        self
    }

    pub fn register(&mut self, client: Arc<dyn LLMClient>, limit: RateLimit) {
        let name = client.name().to_string();
        debug!(
            provider = %name,
            capacity = limit.capacity,
            refill_per_second = limit.refill_per_second,
            "Registered provider"
        );
        self.providers.insert(
            name,
            Provider {
                client,
                limiter: Arc::new(RateLimiter::new(limit)),
            },
        );
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> CallStats {
        CallStats {
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            successes: self.counters.successes.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            escalations: self.counters.escalations.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Calls one provider, retrying per the policy.
    ///
    /// Every attempt takes a fresh rate-limiter token. `timeout` bounds each
    /// attempt individually, not the whole retry sequence.
    pub async fn call(
        &self,
        provider: &str,
        request: &LLMRequest,
        timeout: Duration,
    ) -> Result<String, ClassifiedError> {
        let result = self.call_provider(provider, request, timeout).await;
        if result.is_err() {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Walks a fallback chain until a provider answers.
    ///
    /// Escalating failures move on to the next provider; an unrecoverable one
    /// ends the chain. The error returned is the last provider's.
    pub async fn call_chain(
        &self,
        chain: &[String],
        request: &LLMRequest,
        timeout: Duration,
    ) -> Result<String, ClassifiedError> {
        let mut last_error: Option<ClassifiedError> = None;

        for (position, provider) in chain.iter().enumerate() {
            if !self.has_provider(provider) {
                warn!(provider = %provider, "Provider in fallback chain is not configured, skipping");
                continue;
            }

            match self.call_provider(provider, request, timeout).await {
                Ok(text) => {
                    if position > 0 {
                        info!(provider = %provider, position, "Fallback provider succeeded");
                    }
                    return Ok(text);
                }
                Err(err) if err.class.escalates() => {
                    self.counters.escalations.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        provider = %provider,
                        class = %err.class,
                        attempts = err.attempts,
                        "Escalating to next provider"
                    );
                    last_error = Some(err);
                }
                Err(err) => {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(err);
                }
            }
        }

        self.counters.failures.fetch_add(1, Ordering::Relaxed);
        Err(last_error.unwrap_or_else(|| {
            ClassifiedError::new(
                ErrorClass::Unrecoverable,
                "chain",
                0,
                format!("no configured provider in fallback chain {:?}", chain),
            )
        }))
    }

    async fn call_provider(
        &self,
        name: &str,
        request: &LLMRequest,
        timeout: Duration,
    ) -> Result<String, ClassifiedError> {
        let Some(provider) = self.providers.get(name) else {
            return Err(ClassifiedError::new(
                ErrorClass::Unrecoverable,
                name,
                0,
                "provider is not configured",
            ));
        };

        let mut history = AttemptHistory::default();

        loop {
            provider.limiter.acquire().await;
            self.counters.attempts.fetch_add(1, Ordering::Relaxed);
            let attempt = history.attempts + 1;
            let start = Instant::now();

            let outcome = match tokio::time::timeout(timeout, provider.client.chat(request.clone()))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(BackendError::TimeoutError {
                    millis: timeout.as_millis() as u64,
                }),
            };
            let latency_ms = start.elapsed().as_millis() as u64;

            let err = match outcome {
                Ok(response) => {
                    self.counters.successes.fetch_add(1, Ordering::Relaxed);
                    info!(
                        provider = %name,
                        attempt,
                        latency_ms,
                        outcome = "ok",
                        chars = response.content.len(),
                        "Provider call"
                    );
                    return Ok(response.content);
                }
                Err(err) => err,
            };

            let class = err.class();
            history.record(class);
            warn!(
                provider = %name,
                attempt,
                latency_ms,
                outcome = class.as_str(),
                error = %err,
                "Provider call"
            );

            match self.policy.decide(class, &history) {
                RetryDecision::Retry(delay) => {
                    let delay = match &err {
                        BackendError::RateLimitError { retry_after } => {
                            self.policy.rate_limit_delay(delay, *retry_after)
                        }
                        _ => delay,
                    };
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    debug!(provider = %name, ?delay, "Retrying after backoff");
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Escalate | RetryDecision::Stop => {
                    return Err(ClassifiedError::new(
                        class,
                        name,
                        history.attempts,
                        err.to_string(),
                    ));
                }
            }
        }
    }
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("providers", &self.provider_names())
            .field("policy", &self.policy)
            .finish()
    }
}
