//! Command handlers; each returns a process exit code

use super::commands::{AnalyzeArgs, CacheAction, CacheArgs, ClearArgs, CommonArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::cache::CacheStore;
use crate::pipeline::{PipelineConfig, PipelineController};
use crate::triage::CandidateRecord;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use tracing::{debug, error, info};

pub async fn handle_analyze(args: &AnalyzeArgs, quiet: bool) -> i32 {
    match run_analyze(args, quiet).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

pub fn handle_cache(args: &CacheArgs) -> i32 {
    let result = match &args.action {
        CacheAction::Stats(common) => run_cache_stats(common),
        CacheAction::Clear(clear) => run_cache_clear(clear),
    };
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn load_config(common: &CommonArgs) -> Result<PipelineConfig> {
    let config = PipelineConfig::load(common.config.as_deref()).context("Failed to load configuration")?;
    debug!("{}", config);
    Ok(config)
}

fn read_candidates(path: &Path) -> Result<Vec<CandidateRecord>> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read candidates from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read candidates from {}", path.display()))?
    };
    serde_json::from_str(&text).context("Candidates must be a JSON array of candidate records")
}

fn open_cache(config: &PipelineConfig) -> Result<CacheStore> {
    config.open_cache().context("Failed to open result cache")
}

fn emit(output: &str, destination: Option<&Path>) -> Result<()> {
    match destination {
        Some(path) => std::fs::write(path, output)
            .with_context(|| format!("Failed to write output to {}", path.display())),
        None => {
            println!("{}", output.trim_end());
            Ok(())
        }
    }
}

async fn run_analyze(args: &AnalyzeArgs, quiet: bool) -> Result<()> {
    let mut config = load_config(&args.common)?;
    if let Some(top_fraction) = args.top_fraction {
        config.top_fraction = top_fraction;
        config.validate().context("Invalid --top-fraction")?;
    }

    let candidates = read_candidates(&args.candidates)?;
    info!(candidates = candidates.len(), "Loaded candidates");
    let formatter = OutputFormatter::new(OutputFormat::from(args.common.format));

    if args.triage_only {
        let outcome = config.admission().select(&candidates, config.top_fraction);
        return emit(&formatter.format_triage(&outcome)?, args.output.as_deref());
    }

    let controller = PipelineController::from_config(&config)?;
    let records = controller.triage_and_analyze(&candidates, &config).await;

    if !quiet {
        let placeholders: usize = records.iter().map(|r| r.placeholder_count()).sum();
        let stats = controller.model().stats();
        eprintln!(
            "Analysed {} of {} candidates ({} provider calls, {} degraded roles)",
            records.len(),
            candidates.len(),
            stats.attempts,
            placeholders
        );
    }

    emit(&formatter.format_records(&records)?, args.output.as_deref())
}

fn run_cache_stats(common: &CommonArgs) -> Result<()> {
    let config = load_config(common)?;
    let stats = open_cache(&config)?.stats()?;
    let formatter = OutputFormatter::new(OutputFormat::from(common.format));
    emit(&formatter.format_stats(&stats)?, None)
}

fn run_cache_clear(args: &ClearArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let cache = open_cache(&config)?;
    let removed = if args.expired_only {
        cache.purge_expired()?
    } else {
        cache.clear_all()?
    };
    info!(removed, expired_only = args.expired_only, "Cache cleared");
    println!("Removed {} cache entries", removed);
    Ok(())
}
