//! Prompts for each analysis role

use crate::analysis::{ParsedResult, Role};
use crate::llm::{ChatMessage, LLMRequest};
use crate::triage::CandidateRecord;
use std::collections::BTreeMap;
use std::fmt::Write;

const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 2048;

const RESPONSE_RULES: &str = r#"Respond with exactly one JSON object inside a ```json fenced block.
Use the field names shown. Scores are numbers from 0 to 10. Lists hold short strings.
Leave out optional fields you cannot support with evidence rather than guessing."#;

fn role_brief(role: Role) -> &'static str {
    match role {
        Role::Architecture => {
            "You are a software architect reviewing a project. Describe its structure, \
             the patterns it relies on, its main components and the structural risks \
             that would make it hard to extend."
        }
        Role::Security => {
            "You are a security reviewer. Judge the project's exposure: risky \
             dependencies, unsafe practices, missing hardening. Rate the overall risk \
             level as low, medium, high or critical."
        }
        Role::Quality => {
            "You are a code quality reviewer. Assess maintainability, test coverage \
             signals and engineering hygiene. Name concrete issues and strengths."
        }
        Role::Documentation => {
            "You are a documentation reviewer. Assess how well a newcomer could \
             understand, build and use this project from its written material."
        }
        Role::Synthesis => {
            "You are the lead reviewer. Combine the specialist reports below into one \
             verdict: the key findings, prioritised recommendations, the risks that \
             matter most and an overall score. Reports marked unavailable carry no \
             information; do not invent their content."
        }
    }
}

fn system_prompt(role: Role) -> String {
    format!(
        "{}\n\n{}\n\nSchema:\n{}",
        role_brief(role),
        RESPONSE_RULES,
        role.schema().skeleton()
    )
}

fn join_or_none<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    let joined: Vec<&str> = items.into_iter().collect();
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined.join(", ")
    }
}

fn describe_candidate(candidate: &CandidateRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Candidate: {}", candidate.id);
    let _ = writeln!(out, "Name: {}", candidate.name);
    let _ = writeln!(
        out,
        "Primary language: {}",
        candidate.primary_language.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(
        out,
        "Languages: {}",
        join_or_none(candidate.languages.iter().map(String::as_str))
    );

    let deps: Vec<String> = candidate
        .dependencies
        .iter()
        .map(|d| format!("{}:{}", d.ecosystem, d.name))
        .collect();
    let _ = writeln!(out, "Dependencies: {}", join_or_none(deps.iter().map(String::as_str)));
    let _ = writeln!(
        out,
        "Tags: {}",
        join_or_none(candidate.tags.iter().map(String::as_str))
    );
    let _ = writeln!(
        out,
        "Size: {} bytes in {} files",
        candidate.size_bytes, candidate.file_count
    );
    if let Some(at) = candidate.last_modified {
        let _ = writeln!(out, "Last modified: {}", at.to_rfc3339());
    }

    let flags = candidate.flags;
    let present: Vec<&str> = [
        (flags.has_readme, "readme"),
        (flags.has_tests, "tests"),
        (flags.has_ci, "ci"),
        (flags.has_license, "license"),
        (flags.has_docs, "docs"),
        (flags.has_build_config, "build config"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();
    let _ = writeln!(out, "Present: {}", join_or_none(present));

    if !candidate.source_files.is_empty() {
        let _ = writeln!(out, "Files:");
        for path in candidate.source_files.keys() {
            let _ = writeln!(out, "  {}", path.display());
        }
    }
    out
}

fn describe_specialist(out: &mut String, role: Role, result: Option<&ParsedResult>) {
    match result {
        Some(result) if !result.is_placeholder() && result.confidence > 0.0 => {
            let body = serde_json::to_string_pretty(&result.data)
                .unwrap_or_else(|_| "{}".to_string());
            let _ = writeln!(
                out,
                "### {} (confidence {:.2}, {})\n{}\n",
                role, result.confidence, result.parsing_method, body
            );
        }
        _ => {
            let _ = writeln!(out, "### {}\nunavailable\n", role);
        }
    }
}

/// Request for a specialist role
pub fn specialist_request(role: Role, candidate: &CandidateRecord) -> LLMRequest {
    let user = format!(
        "Role: {}\n\n{}\nReturn the {} report now.",
        role,
        describe_candidate(candidate),
        role
    );
    LLMRequest::new(vec![
        ChatMessage::system(system_prompt(role)),
        ChatMessage::user(user),
    ])
    .with_temperature(TEMPERATURE)
    .with_max_tokens(MAX_TOKENS)
}

/// Request for the aggregator, embedding every specialist outcome
pub fn synthesis_request(
    candidate: &CandidateRecord,
    specialists: &BTreeMap<Role, ParsedResult>,
) -> LLMRequest {
    let mut user = format!(
        "Role: {}\n\n{}\n## Specialist reports\n\n",
        Role::Synthesis,
        describe_candidate(candidate)
    );
    for role in Role::SPECIALISTS {
        describe_specialist(&mut user, role, specialists.get(&role));
    }
    user.push_str("Return the synthesis now.");

    LLMRequest::new(vec![
        ChatMessage::system(system_prompt(Role::Synthesis)),
        ChatMessage::user(user),
    ])
    .with_temperature(TEMPERATURE)
    .with_max_tokens(MAX_TOKENS)
}
