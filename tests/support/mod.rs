//! Shared helpers for pipeline integration tests

#![allow(dead_code)]

use std::sync::Arc;
use triagebox::llm::{LLMRequest, MockLLMClient, MockResponse};
use triagebox::{CacheStore, ModelClient, PipelineConfig, PipelineController, RateLimit, RetryPolicy};

/// Generous bucket so throttling never shapes a test unless it means to
pub const UNTHROTTLED: RateLimit = RateLimit {
    capacity: 1000,
    refill_per_second: 1000.0,
};

/// Role named on the first line of the user prompt
pub fn role_of(request: &LLMRequest) -> &str {
    request
        .last_user_message()
        .and_then(|m| m.lines().next())
        .and_then(|line| line.strip_prefix("Role: "))
        .unwrap_or("")
}

/// Candidate id named in the user prompt
pub fn candidate_of(request: &LLMRequest) -> Option<String> {
    request
        .last_user_message()?
        .lines()
        .find_map(|line| line.strip_prefix("Candidate: "))
        .map(str::to_string)
}

/// A well-formed fenced JSON answer for whichever role asked
pub fn well_formed(request: &LLMRequest) -> MockResponse {
    let body = match role_of(request) {
        "architecture" => {
            r#"{"summary": "layered service", "complexity_score": 5, "patterns": ["repository"], "components": ["api", "store"]}"#
        }
        "security" => {
            r#"{"summary": "no obvious exposure", "risk_level": "low", "findings": ["pinned deps"], "recommendations": ["enable audit"]}"#
        }
        "quality" => {
            r#"{"summary": "tidy codebase", "quality_score": 7, "strengths": ["tests"], "issues": ["long functions"]}"#
        }
        "documentation" => {
            r#"{"summary": "readme only", "completeness_score": 4, "gaps": ["api docs"], "recommendations": ["add examples"]}"#
        }
        _ => {
            r#"{"summary": "worth adopting", "priority": 7, "key_findings": ["solid core"], "recommendations": ["document api"]}"#
        }
    };
    MockResponse::text(format!("Here is the report.\n```json\n{}\n```", body))
}

pub fn scripted(name: &str) -> Arc<MockLLMClient> {
    Arc::new(MockLLMClient::with_name(name).with_responder(well_formed))
}

pub fn controller(providers: &[Arc<MockLLMClient>], cache: CacheStore) -> PipelineController {
    let mut model = ModelClient::new(RetryPolicy::default());
    for provider in providers {
        model.register(provider.clone(), UNTHROTTLED);
    }
    PipelineController::new(Arc::new(model), Arc::new(cache))
}

pub fn config(chain: &[&str]) -> PipelineConfig {
    PipelineConfig::new()
        .with_default_chain(chain.iter().copied())
        .with_providers(Vec::new())
}
