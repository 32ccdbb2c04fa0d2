//! Source citations pulled out of model responses.
//!
//! Three stages run in order over a fixed whitelist of citable domains:
//! [`CitationPipeline::extract`] finds candidate citations in free text,
//! [`CitationPipeline::validate`] drops anything outside the whitelist and
//! [`CitationPipeline::format`] normalizes titles and citation fragments.
//! Each stage is usable on its own; [`CitationPipeline::process`] runs all
//! three and de-duplicates the result by URL.

mod extract;
mod format;
mod policy;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

pub use format::title_from_url;
pub use policy::{CASE_LAW_DOMAIN, CitationPolicy, LEGISLATION_DOMAIN, PathRule, WhitelistDomain};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub title: String,
    pub source_type: String,
    pub citation: String,
    pub website: String,
}

#[derive(Debug, Clone, Default)]
pub struct CitationPipeline {
    policy: CitationPolicy,
}

impl CitationPipeline {
    pub fn new(policy: CitationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CitationPolicy {
        &self.policy
    }

    pub fn extract(&self, response: &str) -> Vec<Citation> {
        extract::extract_citations(&self.policy, response)
    }

    pub fn validate(&self, citations: Vec<Citation>) -> Vec<Citation> {
        citations
            .into_iter()
            .filter(|citation| self.policy.is_whitelisted(&citation.url))
            .collect()
    }

    pub fn format(&self, citations: Vec<Citation>) -> Vec<Citation> {
        format::format_citations(citations)
    }

    pub fn process(&self, response: &str) -> Vec<Citation> {
        let citations = self.format(self.validate(self.extract(response)));
        dedupe_by_url(citations)
    }
}

fn dedupe_by_url(citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|citation| seen.insert(citation.url.clone()))
        .collect()
}

#[derive(Debug, Deserialize)]
struct CitationMetadata {
    #[serde(default)]
    sources: Vec<Citation>,
}

/// Message metadata blob carrying the citations of one turn.
pub fn citations_to_metadata(citations: &[Citation]) -> Value {
    json!({ "sources": citations })
}

/// Reads citations back out of message metadata. Anything unreadable
/// yields an empty list.
pub fn citations_from_metadata(metadata: &Value) -> Vec<Citation> {
    if metadata.is_null() {
        return Vec::new();
    }

    match serde_json::from_value::<CitationMetadata>(metadata.clone()) {
        Ok(parsed) => parsed.sources,
        Err(err) => {
            warn!(error = %err, "message metadata holds malformed citations");
            Vec::new()
        }
    }
}
