//! End-to-end batch runs against scripted providers

mod support;

use std::time::Duration;
use support::{candidate_of, config, controller, role_of, scripted};
use triagebox::llm::{MockLLMClient, MockResponse};
use triagebox::triage::{Dependency, RejectionReason};
use triagebox::{BackendError, CacheStore, CandidateRecord, ErrorClass, ParsingMethod, Placeholder, Role};

const LANGUAGES: [&str; 10] = [
    "rust", "go", "python", "typescript", "java", "ruby", "elixir", "typescript", "haskell", "c",
];

const NAMES: [&str; 10] = [
    "kv-store",
    "image-resizer",
    "log-shipper",
    "json-parser",
    "mail-relay",
    "chart-render",
    "queue-broker",
    "json_parser_rs",
    "auth-gateway",
    "pdf-splitter",
];

/// The duplicate pair c3/c7 outranks c1 and c2, so dropping c7 changes
/// which four candidates are selected.
const CHEAP_SCORES: [f64; 10] = [10.0, 9.0, 8.0, 9.8, 6.0, 5.0, 4.0, 9.6, 2.0, 1.0];

/// Ten candidates; c3 and c7 are the same project under two names.
fn batch() -> Vec<CandidateRecord> {
    (0..10)
        .map(|i| {
            let mut candidate = CandidateRecord::new(format!("c{}", i), NAMES[i], format!("sha256:{:04x}", i))
                .with_languages([LANGUAGES[i]])
                .with_cheap_score(CHEAP_SCORES[i]);
            if i == 3 || i == 7 {
                candidate = candidate
                    .with_dependencies([Dependency::new("npm", "ajv")])
                    .with_tags(["parser"]);
            }
            candidate
        })
        .collect()
}

#[tokio::test]
async fn test_top_fraction_of_unique_candidates_is_analysed() {
    let provider = scripted("mock");
    let pipeline = controller(&[provider.clone()], CacheStore::memory().unwrap());
    let config = config(&["mock"]).with_top_fraction(0.4);

    let records = pipeline.triage_and_analyze(&batch(), &config).await;

    let ids: Vec<&str> = records.iter().map(|r| r.candidate_id()).collect();
    assert_eq!(ids, vec!["c0", "c3", "c1", "c2"]);
    assert_eq!(provider.call_count(), 20);

    for record in &records {
        assert_eq!(record.results().len(), 5);
        assert_eq!(record.placeholder_count(), 0);
        for role in Role::ALL {
            let result = record.result(role).unwrap();
            assert_eq!(result.parsing_method, ParsingMethod::Exact, "{} for {}", role, record.candidate_id());
        }
        assert!(record.aggregate_confidence() > 0.5);
    }

    // The duplicate never reaches a provider
    let analysed: Vec<String> = provider.requests().iter().filter_map(candidate_of).collect();
    assert_eq!(analysed.len(), 20);
    assert!(!analysed.iter().any(|id| id == "c7"));
}

#[tokio::test]
async fn test_duplicate_is_reported_in_triage() {
    let pipeline = controller(&[scripted("mock")], CacheStore::memory().unwrap());
    let config = config(&["mock"]).with_top_fraction(0.4);

    let outcome = pipeline.triage(&batch(), &config);
    assert_eq!(outcome.duplicate_groups.len(), 1);
    assert_eq!(outcome.duplicate_groups[0].representative, "c3");
    assert_eq!(outcome.duplicate_groups[0].members, vec!["c3", "c7"]);

    // Without deduplication c7 would have displaced c2 from the top four
    let c7 = outcome.rejection("c7").unwrap();
    assert_eq!(
        c7.reason,
        RejectionReason::Duplicate {
            of: "c3".to_string()
        }
    );
    let last_selected = outcome.selected.last().unwrap();
    assert_eq!(last_selected.candidate.id, "c2");
    assert!(c7.priority > last_selected.priority.total);
}

#[tokio::test]
async fn test_synthesis_runs_after_every_specialist() {
    let provider = scripted("mock");
    let pipeline = controller(&[provider.clone()], CacheStore::memory().unwrap());
    let candidate = batch().remove(0);

    pipeline.analyze(&candidate, &config(&["mock"])).await;

    let requests = provider.requests();
    assert_eq!(requests.len(), 5);
    let last = requests.last().unwrap();
    assert_eq!(role_of(last), "synthesis");

    let prompt = last.last_user_message().unwrap();
    for summary in ["layered service", "no obvious exposure", "tidy codebase", "readme only"] {
        assert!(prompt.contains(summary), "synthesis prompt is missing {:?}", summary);
    }
}

#[tokio::test]
async fn test_specialists_run_concurrently() {
    let provider = std::sync::Arc::new(
        MockLLMClient::with_name("mock")
            .with_responder(support::well_formed)
            .with_delay(Duration::from_millis(50)),
    );
    let pipeline = controller(&[provider.clone()], CacheStore::memory().unwrap());
    let candidate = batch().remove(0);

    let record = pipeline.analyze(&candidate, &config(&["mock"])).await;

    assert_eq!(record.placeholder_count(), 0);
    assert_eq!(provider.max_in_flight(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_slow_specialist_is_cut_off_by_deadline() {
    let fast = scripted("fast");
    let slow = std::sync::Arc::new(
        MockLLMClient::with_name("slow")
            .with_responder(support::well_formed)
            .with_delay(Duration::from_secs(120)),
    );
    let pipeline = controller(&[fast.clone(), slow.clone()], CacheStore::memory().unwrap());
    let config = config(&["fast"])
        .with_fallback_chain(Role::Security, ["slow"])
        .with_pipeline_timeout(Duration::from_secs(30))
        .with_request_timeout(Duration::from_secs(600));
    let candidate = batch().remove(0);

    let record = pipeline.analyze(&candidate, &config).await;

    let security = record.result(Role::Security).unwrap();
    assert_eq!(security.placeholder, Some(Placeholder::TimedOut));
    assert_eq!(security.confidence, 0.0);

    for role in [Role::Architecture, Role::Quality, Role::Documentation, Role::Synthesis] {
        assert!(!record.result(role).unwrap().is_placeholder(), "{} should have completed", role);
    }

    let synthesis = fast.requests().into_iter().find(|r| role_of(r) == "synthesis").unwrap();
    assert!(synthesis.last_user_message().unwrap().contains("### security\nunavailable"));
}

#[tokio::test]
async fn test_unrecoverable_specialist_becomes_placeholder() {
    let provider = std::sync::Arc::new(MockLLMClient::with_name("mock").with_responder(|request| {
        if role_of(request) == "quality" {
            MockResponse::error(BackendError::AuthenticationError {
                message: "key revoked".to_string(),
            })
        } else {
            support::well_formed(request)
        }
    }));
    let pipeline = controller(&[provider.clone()], CacheStore::memory().unwrap());
    let candidate = batch().remove(0);

    let record = pipeline.analyze(&candidate, &config(&["mock"])).await;

    match &record.result(Role::Quality).unwrap().placeholder {
        Some(Placeholder::Failed { class, message }) => {
            assert_eq!(*class, ErrorClass::Unrecoverable);
            assert!(message.contains("key revoked"));
        }
        other => panic!("expected failed placeholder, got {:?}", other),
    }
    assert_eq!(record.placeholder_count(), 1);
    assert!(!record.result(Role::Synthesis).unwrap().is_placeholder());
    // Unrecoverable errors are not retried
    assert_eq!(provider.call_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_primary_falls_back_to_backup() {
    let primary = std::sync::Arc::new(MockLLMClient::with_name("primary").with_responder(|_| {
        MockResponse::error(BackendError::RateLimitError { retry_after: None })
    }));
    let backup = scripted("backup");
    let pipeline = controller(&[primary.clone(), backup.clone()], CacheStore::memory().unwrap());
    let config = config(&["primary", "backup"]).with_pipeline_timeout(Duration::from_secs(3600));
    let candidate = batch().remove(0);

    let record = pipeline.analyze(&candidate, &config).await;

    assert_eq!(record.placeholder_count(), 0);
    // Three rate-limited attempts per role before escalating
    assert_eq!(primary.call_count(), 15);
    assert_eq!(backup.call_count(), 5);
    assert_eq!(pipeline.model().stats().escalations, 5);
}

#[tokio::test]
async fn test_empty_batch_produces_no_records() {
    let provider = scripted("mock");
    let pipeline = controller(&[provider.clone()], CacheStore::memory().unwrap());

    let records = pipeline.triage_and_analyze(&[], &config(&["mock"])).await;

    assert!(records.is_empty());
    assert_eq!(provider.call_count(), 0);
}
