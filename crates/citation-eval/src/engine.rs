use std::path::Path;
use std::sync::Arc;

use chat_core::citations::{Citation, CitationPipeline};
use chat_core::config::ChatServiceConfig;
use chat_core::context_window::ContextWindow;
use chat_core::repos::InMemoryStore;
use chat_core::{ChatProviders, ChatService};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::case::{CitationCaseFixture, ConversationCaseFixture, ExpectedCitation};
use crate::cli::CliOptions;
use crate::fixture_io::{
    FixtureIoError, golden_path, load_citation_cases, load_conversation_cases, read_json_value,
    write_pretty_json,
};
use crate::scripted::FixtureProvider;

#[derive(Debug)]
pub struct EvalSummary {
    update_goldens: bool,
    results: Vec<CaseResult>,
}

impl EvalSummary {
    pub fn has_failures(&self) -> bool {
        self.results
            .iter()
            .any(|result| !result.failures.is_empty())
    }

    pub fn print(&self) {
        println!(
            "Citation Eval Harness ({})",
            if self.update_goldens {
                "update-goldens"
            } else {
                "fixtures"
            }
        );

        let mut passed = 0usize;
        for result in &self.results {
            if result.failures.is_empty() {
                passed += 1;
                println!("[PASS] {}: {}", result.case_id, result.description);
            } else {
                println!("[FAIL] {}: {}", result.case_id, result.description);
                for failure in &result.failures {
                    println!("  - {failure}");
                }
            }

            for note in &result.notes {
                println!("  * {note}");
            }
        }

        let total = self.results.len();
        let failed = total.saturating_sub(passed);
        println!("Summary: {total} total, {passed} passed, {failed} failed");
    }
}

#[derive(Debug)]
struct CaseResult {
    case_id: String,
    description: String,
    failures: Vec<String>,
    notes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Fixtures(#[from] FixtureIoError),
    #[error("no fixture matches case filter {0}")]
    NoMatchingCases(String),
}

pub async fn run_eval(options: &CliOptions) -> Result<EvalSummary, EvalError> {
    let mut citation_cases = load_citation_cases()?;
    citation_cases.retain(|case| options.selects(&case.case_id));
    citation_cases.sort_by(|left, right| left.case_id.cmp(&right.case_id));

    let mut conversation_cases = load_conversation_cases()?;
    conversation_cases.retain(|case| options.selects(&case.case_id));
    conversation_cases.sort_by(|left, right| left.case_id.cmp(&right.case_id));

    if citation_cases.is_empty() && conversation_cases.is_empty() {
        if let Some(filter) = &options.case_filter {
            return Err(EvalError::NoMatchingCases(filter.clone()));
        }
    }

    let pipeline = CitationPipeline::default();
    let mut results = Vec::with_capacity(citation_cases.len() + conversation_cases.len());
    for case in &citation_cases {
        results.push(run_citation_case(case, &pipeline, options));
    }
    for case in &conversation_cases {
        results.push(run_conversation_case(case, options).await);
    }

    Ok(EvalSummary {
        update_goldens: options.update_goldens,
        results,
    })
}

fn run_citation_case(
    case: &CitationCaseFixture,
    pipeline: &CitationPipeline,
    options: &CliOptions,
) -> CaseResult {
    let mut failures = Vec::new();
    let mut notes = Vec::new();

    let extracted = pipeline.extract(&case.response_text);
    let validated = pipeline.validate(extracted.clone());
    if pipeline.validate(validated.clone()) != validated {
        failures.push("validate: second pass changed the citation list".to_string());
    }

    let citations = pipeline.process(&case.response_text);
    if pipeline.process(&case.response_text) != citations {
        failures.push("process: repeated run produced a different result".to_string());
    }

    if let Some(expected_count) = case.expected_count {
        if citations.len() != expected_count {
            failures.push(format!(
                "citation_count: expected={expected_count}, actual={}",
                citations.len()
            ));
        }
    }

    for (index, expected) in case.expected.iter().enumerate() {
        match citations.get(index) {
            Some(actual) => check_citation(index, expected, actual, &mut failures),
            None => failures.push(format!("citation[{index}]: missing")),
        }
    }

    debug!(
        case_id = %case.case_id,
        extracted = extracted.len(),
        validated = validated.len(),
        processed = citations.len(),
        "citation case evaluated"
    );

    let snapshot = json!({
        "case_id": case.case_id,
        "extracted_count": extracted.len(),
        "validated_count": validated.len(),
        "citations": citations,
    });
    record_snapshot(&case.case_id, &snapshot, options, &mut failures, &mut notes);

    CaseResult {
        case_id: case.case_id.clone(),
        description: case.description.clone(),
        failures,
        notes,
    }
}

fn check_citation(
    index: usize,
    expected: &ExpectedCitation,
    actual: &Citation,
    failures: &mut Vec<String>,
) {
    if let Some(url) = &expected.url {
        if actual.url != *url {
            failures.push(format!(
                "citation[{index}].url: expected={url}, actual={}",
                actual.url
            ));
        }
    }
    if let Some(source_type) = &expected.source_type {
        if actual.source_type != *source_type {
            failures.push(format!(
                "citation[{index}].source_type: expected={source_type}, actual={}",
                actual.source_type
            ));
        }
    }
    if let Some(fragment) = &expected.citation_contains {
        if !actual.citation.contains(fragment.as_str()) {
            failures.push(format!(
                "citation[{index}].citation: expected to contain {fragment:?}, actual={:?}",
                actual.citation
            ));
        }
    }
    if let Some(website) = &expected.website {
        if actual.website != *website {
            failures.push(format!(
                "citation[{index}].website: expected={website}, actual={}",
                actual.website
            ));
        }
    }
}

async fn run_conversation_case(case: &ConversationCaseFixture, options: &CliOptions) -> CaseResult {
    let mut failures = Vec::new();
    let mut notes = Vec::new();

    let store = Arc::new(InMemoryStore::new());
    let provider = Arc::new(FixtureProvider::new(&case.turns));
    let service = ChatService::new(
        store.clone(),
        ChatProviders::new(provider.clone(), provider.clone()),
        CitationPipeline::default(),
        ChatServiceConfig {
            summarize_in_background: false,
            ..ChatServiceConfig::default()
        },
    );

    let session = match service.create_session(Uuid::new_v4()).await {
        Ok(session) => session,
        Err(err) => {
            failures.push(format!("create_session: {err}"));
            return CaseResult {
                case_id: case.case_id.clone(),
                description: case.description.clone(),
                failures,
                notes,
            };
        }
    };

    let mut turn_snapshots = Vec::with_capacity(case.turns.len());
    let mut citations_per_turn = Vec::with_capacity(case.turns.len());
    for (index, turn) in case.turns.iter().enumerate() {
        match service.send_message(session.id, &turn.prompt).await {
            Ok(response) => {
                citations_per_turn.push(response.sources.len());
                turn_snapshots.push(json!({
                    "sequence_number": response.sequence_number,
                    "citations": response.sources,
                }));
            }
            Err(err) => {
                failures.push(format!("turn[{index}]: {err}"));
                break;
            }
        }
    }

    let summary_count = store.summary_count().await;
    let augmented_turns = provider.augmented_turns();

    let (window, active_summary, legal_topics) = match service.get_session(session.id).await {
        Ok(detail) => {
            let active = service
                .summaries()
                .get_active_summary(&detail.session)
                .await
                .map(|summary| summary.summary_text)
                .ok();
            (
                ContextWindow::parse_or_empty(&detail.session.context_window),
                active,
                detail.session.legal_topics,
            )
        }
        Err(err) => {
            failures.push(format!("get_session: {err}"));
            (ContextWindow::default(), None, String::new())
        }
    };

    let expectations = &case.expectations;
    if let Some(expected) = expectations.summary_count {
        if summary_count != expected {
            failures.push(format!(
                "summary_count: expected={expected}, actual={summary_count}"
            ));
        }
    }
    if let Some(expected) = expectations.previous_summaries {
        let actual = window.previous_summaries.len();
        if actual != expected {
            failures.push(format!(
                "previous_summaries: expected={expected}, actual={actual}"
            ));
        }
    }
    if augmented_turns != expectations.augmented_turns {
        failures.push(format!(
            "augmented_turns: expected={:?}, actual={augmented_turns:?}",
            expectations.augmented_turns
        ));
    }
    if !expectations.citations_per_turn.is_empty()
        && citations_per_turn != expectations.citations_per_turn
    {
        failures.push(format!(
            "citations_per_turn: expected={:?}, actual={citations_per_turn:?}",
            expectations.citations_per_turn
        ));
    }

    let snapshot = json!({
        "case_id": case.case_id,
        "turns": turn_snapshots,
        "summary_count": summary_count,
        "augmented_turns": augmented_turns,
        "context_window": {
            "has_focus": window.current_focus.is_some(),
            "previous_summaries": window.previous_summaries.len(),
            "jurisdiction": window.jurisdiction,
            "legal_topics": window.legal_topics,
        },
        "active_summary": active_summary,
        "legal_topics": legal_topics,
    });
    record_snapshot(&case.case_id, &snapshot, options, &mut failures, &mut notes);

    CaseResult {
        case_id: case.case_id.clone(),
        description: case.description.clone(),
        failures,
        notes,
    }
}

fn record_snapshot(
    case_id: &str,
    snapshot: &Value,
    options: &CliOptions,
    failures: &mut Vec<String>,
    notes: &mut Vec<String>,
) {
    let path = golden_path(case_id);
    if options.update_goldens {
        if let Err(err) = write_pretty_json(&path, snapshot) {
            failures.push(format!("golden_update: {err}"));
        } else {
            notes.push(format!("golden updated: {}", path.display()));
        }
    } else {
        compare_golden_snapshot(&path, snapshot, failures);
    }
}

fn compare_golden_snapshot(path: &Path, actual: &Value, failures: &mut Vec<String>) {
    match read_json_value(path) {
        Ok(expected) => {
            if expected != *actual {
                failures.push(format!(
                    "golden_snapshot: mismatch for {} (rerun with --update-goldens to intentionally refresh)",
                    path.display()
                ));
            }
        }
        Err(FixtureIoError::ReadFile { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            failures.push(format!(
                "golden_snapshot: missing {} (rerun with --update-goldens)",
                path.display()
            ));
        }
        Err(err) => failures.push(format!("golden_snapshot: {err}")),
    }
}
