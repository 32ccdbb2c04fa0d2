//! Documented defaults used when a best-effort provider call fails.

use std::fmt::Display;

use tracing::warn;

pub const DEFAULT_LEGAL_TOPIC: &str = "UK Law";
pub const DEFAULT_SESSION_TITLE: &str = "UK Law Chat Session";

const MAX_TITLE_CHARS: usize = 50;
const TRUNCATED_TITLE_CHARS: usize = 47;

pub fn topics_or_default<E: Display>(result: Result<String, E>) -> String {
    match result {
        Ok(raw) => {
            let topics = normalize_topics(&raw);
            if topics.is_empty() {
                warn!("topic extraction returned no topics, using default");
                DEFAULT_LEGAL_TOPIC.to_string()
            } else {
                topics
            }
        }
        Err(err) => {
            warn!(error = %err, "topic extraction failed, using default");
            DEFAULT_LEGAL_TOPIC.to_string()
        }
    }
}

pub fn title_or_default<E: Display>(result: Result<String, E>) -> String {
    match result {
        Ok(raw) => {
            let title = normalize_title(&raw);
            if title.is_empty() {
                warn!("title generation returned an empty title, using default");
                DEFAULT_SESSION_TITLE.to_string()
            } else {
                title
            }
        }
        Err(err) => {
            warn!(error = %err, "title generation failed, using default");
            DEFAULT_SESSION_TITLE.to_string()
        }
    }
}

/// Keeps only the first line of a classifier reply.
pub fn normalize_topics(raw: &str) -> String {
    first_line(raw).to_string()
}

/// First line, trimmed, cut to 50 characters with an ellipsis.
pub fn normalize_title(raw: &str) -> String {
    let line = first_line(raw);
    if line.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = line.chars().take(TRUNCATED_TITLE_CHARS).collect();
        return format!("{truncated}...");
    }

    line.to_string()
}

/// Splits a stored comma-separated topic string, falling back to the
/// default topic when nothing usable remains.
pub fn parse_legal_topics(raw: &str) -> Vec<String> {
    let topics = raw
        .split(',')
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    if topics.is_empty() {
        vec![DEFAULT_LEGAL_TOPIC.to_string()]
    } else {
        topics
    }
}

fn first_line(raw: &str) -> &str {
    raw.trim().lines().next().unwrap_or_default().trim()
}
