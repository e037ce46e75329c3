//! Per-candidate analysis: concurrent specialists, then the aggregator
//!
//! Every specialist runs as its own task. A task ends in exactly one of three
//! states: a parsed result (fresh or cached), a failed placeholder when the
//! fallback chain is exhausted, or a timed-out placeholder when the pipeline
//! deadline passes first. The aggregator starts only once all specialists are
//! terminal.

use super::config::PipelineConfig;
use super::prompt;
use super::single_flight::SingleFlight;
use crate::analysis::{AnalysisRecord, ParsedResult, Role};
use crate::cache::{CacheKey, CacheLookup, CacheStore};
use crate::error::ErrorClass;
use crate::llm::ModelClient;
use crate::parser::ResponseParser;
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::triage::CandidateRecord;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Everything a role task needs, shared across tasks and candidates
pub(crate) struct Shared {
    pub model: Arc<ModelClient>,
    pub cache: Arc<CacheStore>,
    pub flights: SingleFlight,
    pub parser: ResponseParser,
    pub progress: Option<Arc<dyn ProgressHandler>>,
}

impl Shared {
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(handler) = &self.progress {
            handler.on_progress(&event);
        }
    }

    /// Cache read where any storage failure counts as a miss
    fn cached(&self, key: &CacheKey) -> Option<ParsedResult> {
        match self.cache.get(key) {
            Ok(CacheLookup::Hit(entry)) => Some(entry.payload),
            Ok(CacheLookup::Miss(_)) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    fn store(&self, key: &CacheKey, result: &ParsedResult, candidate: &CandidateRecord) {
        if let Err(e) = self.cache.put(key, result, &candidate.source_files) {
            warn!(key = %key, error = %e, "Cache write failed, result not cached");
        }
    }
}

/// Per-run knobs copied into each task
#[derive(Debug, Clone)]
struct RoleSettings {
    request_timeout: Duration,
    caching_threshold: f64,
    model_version: String,
}

impl RoleSettings {
    fn from_config(config: &PipelineConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            caching_threshold: config.caching_confidence_threshold,
            model_version: config.model_version.clone(),
        }
    }
}

struct RoleOutcome {
    result: ParsedResult,
    from_cache: bool,
}

/// Runs one role to a terminal result.
///
/// The cache write happens after the last await, so a task aborted mid-call
/// never writes.
async fn run_role(
    shared: &Shared,
    candidate: &CandidateRecord,
    role: Role,
    chain: &[String],
    settings: &RoleSettings,
    specialists: Option<&BTreeMap<Role, ParsedResult>>,
) -> RoleOutcome {
    let key = CacheKey::new(candidate.fingerprint.clone(), role, settings.model_version.clone());

    if let Some(result) = shared.cached(&key) {
        return RoleOutcome {
            result,
            from_cache: true,
        };
    }

    let _flight = shared.flights.acquire(&candidate.id, role).await;

    // Another task may have filled the entry while we waited
    if let Some(result) = shared.cached(&key) {
        return RoleOutcome {
            result,
            from_cache: true,
        };
    }

    let request = match specialists {
        Some(specialists) => prompt::synthesis_request(candidate, specialists),
        None => prompt::specialist_request(role, candidate),
    };

    let result = match shared
        .model
        .call_chain(chain, &request, settings.request_timeout)
        .await
    {
        Ok(raw) => {
            let parsed = shared.parser.parse(role, &raw);
            let cacheable = specialists
                .map(|s| s.values().all(|r| !r.is_placeholder()))
                .unwrap_or(true);

            if parsed.confidence >= settings.caching_threshold && cacheable {
                shared.store(&key, &parsed, candidate);
            } else {
                debug!(
                    candidate = %candidate.id,
                    role = %role,
                    confidence = parsed.confidence,
                    cacheable,
                    "Result not cached"
                );
            }
            parsed
        }
        Err(e) => {
            warn!(
                candidate = %candidate.id,
                role = %role,
                error = %e,
                "Role failed, using placeholder"
            );
            ParsedResult::failed(role, e.class, e.to_string())
        }
    };

    RoleOutcome {
        result,
        from_cache: false,
    }
}

pub(crate) struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    pub fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Analyses one candidate. Never fails: provider trouble degrades
    /// individual roles to placeholders.
    pub async fn analyze(&self, candidate: &CandidateRecord, config: &PipelineConfig) -> AnalysisRecord {
        let settings = RoleSettings::from_config(config);
        let specialists = self.run_specialists(candidate, config, &settings).await;

        let started = Instant::now();
        let synthesis = run_role(
            &self.shared,
            candidate,
            Role::Synthesis,
            config.chain_for(Role::Synthesis),
            &settings,
            Some(&specialists),
        )
        .await;
        self.report(candidate, Role::Synthesis, &synthesis, started.elapsed());

        let mut results = specialists;
        results.insert(Role::Synthesis, synthesis.result);
        AnalysisRecord::new(candidate.id.clone(), results)
    }

    async fn run_specialists(
        &self,
        candidate: &CandidateRecord,
        config: &PipelineConfig,
        settings: &RoleSettings,
    ) -> BTreeMap<Role, ParsedResult> {
        let deadline = Instant::now() + config.pipeline_timeout();
        let candidate_arc = Arc::new(candidate.clone());
        let mut tasks = JoinSet::new();

        for role in Role::SPECIALISTS {
            let shared = self.shared.clone();
            let candidate = candidate_arc.clone();
            let chain = config.chain_for(role).to_vec();
            let settings = settings.clone();
            tasks.spawn(async move {
                let started = Instant::now();
                let outcome = run_role(&shared, &candidate, role, &chain, &settings, None).await;
                (role, outcome, started.elapsed())
            });
        }

        let mut results = BTreeMap::new();
        let mut timed_out = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((role, outcome, elapsed)))) => {
                    self.report(candidate, role, &outcome, elapsed);
                    results.insert(role, outcome.result);
                }
                Ok(Some(Err(e))) => {
                    warn!(candidate = %candidate.id, error = %e, "Specialist task did not complete");
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        if timed_out {
            let pending = Role::SPECIALISTS.len() - results.len();
            warn!(
                candidate = %candidate.id,
                pending,
                timeout_secs = config.pipeline_timeout_secs,
                "Pipeline deadline reached, aborting pending specialists"
            );
            self.shared.emit(ProgressEvent::SpecialistsTimedOut {
                candidate_id: candidate.id.clone(),
                pending,
            });
            tasks.abort_all();
            // Drain so owned locks are released before the aggregator runs.
            // A task that finished in the same instant keeps its result.
            while let Some(joined) = tasks.join_next().await {
                if let Ok((role, outcome, elapsed)) = joined {
                    self.report(candidate, role, &outcome, elapsed);
                    results.insert(role, outcome.result);
                }
            }
        }

        for role in Role::SPECIALISTS {
            results.entry(role).or_insert_with(|| {
                let placeholder = if timed_out {
                    ParsedResult::timed_out(role)
                } else {
                    ParsedResult::failed(role, ErrorClass::Unrecoverable, "task aborted")
                };
                self.report(
                    candidate,
                    role,
                    &RoleOutcome {
                        result: placeholder.clone(),
                        from_cache: false,
                    },
                    Duration::ZERO,
                );
                placeholder
            });
        }

        info!(
            candidate = %candidate.id,
            placeholders = results.values().filter(|r| r.is_placeholder()).count(),
            "Specialist stage complete"
        );
        results
    }

    fn report(&self, candidate: &CandidateRecord, role: Role, outcome: &RoleOutcome, duration: Duration) {
        self.shared.emit(ProgressEvent::RoleComplete {
            candidate_id: candidate.id.clone(),
            role,
            confidence: outcome.result.confidence,
            from_cache: outcome.from_cache,
            placeholder: outcome.result.is_placeholder(),
            duration,
        });
    }
}
