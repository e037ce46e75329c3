//! Batch entry point: admission, then bounded per-candidate analysis

use super::config::PipelineConfig;
use super::orchestrator::{Orchestrator, Shared};
use super::single_flight::SingleFlight;
use crate::analysis::AnalysisRecord;
use crate::cache::CacheStore;
use crate::llm::ModelClient;
use crate::parser::ResponseParser;
use crate::progress::{LoggingHandler, ProgressEvent, ProgressHandler};
use crate::triage::{CandidateRecord, TriageOutcome};
use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Owns the shared cache handle and model client for a series of runs.
///
/// One controller can serve many batches; the cache and the single-flight
/// registry persist between them.
pub struct PipelineController {
    shared: Arc<Shared>,
    orchestrator: Orchestrator,
}

impl PipelineController {
    pub fn new(model: Arc<ModelClient>, cache: Arc<CacheStore>) -> Self {
        Self::build(model, cache, ResponseParser::new(), None)
    }

    /// Opens the cache and registers the providers named in `config`.
    ///
    /// A cache that cannot be opened is replaced by an in-memory one for
    /// this controller's lifetime; the batch still runs, just uncached
    /// across processes.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate().context("Invalid pipeline configuration")?;

        let cache = match config.open_cache() {
            Ok(cache) => cache,
            Err(e) => {
                warn!(
                    path = ?config.cache_path,
                    error = %e,
                    "Result cache unavailable, continuing with an in-memory cache"
                );
                CacheStore::memory()
                    .context("Failed to create in-memory result cache")?
                    .with_ttl(config.cache_ttl())
            }
        };

        let model = config
            .build_model_client()
            .context("Failed to configure providers")?;

        Ok(Self::new(Arc::new(model), Arc::new(cache))
            .with_progress(Arc::new(LoggingHandler)))
    }

    fn build(
        model: Arc<ModelClient>,
        cache: Arc<CacheStore>,
        parser: ResponseParser,
        progress: Option<Arc<dyn ProgressHandler>>,
    ) -> Self {
        let shared = Arc::new(Shared {
            model,
            cache,
            flights: SingleFlight::new(),
            parser,
            progress,
        });
        Self {
            orchestrator: Orchestrator::new(shared.clone()),
            shared,
        }
    }

    fn rebuild(self, parser: ResponseParser, progress: Option<Arc<dyn ProgressHandler>>) -> Self {
        Self::build(
            self.shared.model.clone(),
            self.shared.cache.clone(),
            parser,
            progress,
        )
    }

    pub fn with_progress(self, handler: Arc<dyn ProgressHandler>) -> Self {
        let parser = self.shared.parser.clone();
        self.rebuild(parser, Some(handler))
    }

    pub fn with_parser(self, parser: ResponseParser) -> Self {
        let progress = self.shared.progress.clone();
        self.rebuild(parser, progress)
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.shared.cache
    }

    pub fn model(&self) -> &Arc<ModelClient> {
        &self.shared.model
    }

    /// Admission only; no model calls
    pub fn triage(&self, candidates: &[CandidateRecord], config: &PipelineConfig) -> TriageOutcome {
        config.admission().select(candidates, config.top_fraction)
    }

    /// Analyses a single candidate, bypassing admission
    pub async fn analyze(&self, candidate: &CandidateRecord, config: &PipelineConfig) -> AnalysisRecord {
        self.orchestrator.analyze(candidate, config).await
    }

    /// Selects the top fraction of unique candidates and analyses each one.
    ///
    /// Records come back in selection order. Provider failures never abort
    /// the batch; they show up as placeholder results inside the records.
    pub async fn triage_and_analyze(
        &self,
        candidates: &[CandidateRecord],
        config: &PipelineConfig,
    ) -> Vec<AnalysisRecord> {
        let start = Instant::now();
        self.shared.emit(ProgressEvent::Started {
            candidates: candidates.len(),
        });

        let outcome = self.triage(candidates, config);
        let duplicates = outcome
            .duplicate_groups
            .iter()
            .map(|g| g.members.len().saturating_sub(1))
            .sum();
        self.shared.emit(ProgressEvent::TriageComplete {
            candidates: candidates.len(),
            selected: outcome.selected.len(),
            duplicates,
        });

        let total = outcome.selected.len();
        let limit = config.max_concurrent_candidates.max(1);

        let records: Vec<AnalysisRecord> = stream::iter(outcome.selected.iter().enumerate())
            .map(|(position, selection)| async move {
                let candidate = &selection.candidate;
                let index = position + 1;
                let started = Instant::now();
                self.shared.emit(ProgressEvent::CandidateStarted {
                    candidate_id: candidate.id.clone(),
                    index,
                    total,
                });

                let record = self.orchestrator.analyze(candidate, config).await;

                self.shared.emit(ProgressEvent::CandidateComplete {
                    candidate_id: candidate.id.clone(),
                    index,
                    total,
                    aggregate_confidence: record.aggregate_confidence(),
                    duration: started.elapsed(),
                });
                record
            })
            .buffered(limit)
            .collect()
            .await;

        info!(
            records = records.len(),
            provider_calls = self.shared.model.stats().attempts,
            "Batch complete"
        );
        self.shared.emit(ProgressEvent::Completed {
            records: records.len(),
            total_time: start.elapsed(),
        });
        records
    }
}

/// One-shot run: builds a controller from `config` and processes the batch
pub async fn triage_and_analyze(
    candidates: &[CandidateRecord],
    config: &PipelineConfig,
) -> Result<Vec<AnalysisRecord>> {
    let controller = PipelineController::from_config(config)?;
    Ok(controller.triage_and_analyze(candidates, config).await)
}
