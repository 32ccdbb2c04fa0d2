use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use super::Citation;

const MAX_TITLE_CHARS: usize = 100;
const UNKNOWN_TITLE: &str = "Unknown Title";

static FILE_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\w+$").expect("valid regex"));
static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid regex"));

static BARE_CASE_CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s+(\w+)\s+(\d+)").expect("valid regex"));
static SECTION_ABBREVIATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs\.?\s*(\d+)").expect("valid regex"));
static PARAGRAPH_ABBREVIATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpara\.?\s*(\d+)").expect("valid regex"));
static SCHEDULE_ABBREVIATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsch\.?\s*(\d+)").expect("valid regex"));
static LOWERCASE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(section|paragraph|schedule)(\s+\d)").expect("valid regex")
});

pub(super) fn format_citations(mut citations: Vec<Citation>) -> Vec<Citation> {
    for citation in &mut citations {
        if citation.title.trim().is_empty() || citation.title.chars().count() > MAX_TITLE_CHARS {
            citation.title = title_from_url(&citation.url);
        }

        if !citation.citation.trim().is_empty() && !citation.source_type.trim().is_empty() {
            citation.citation = format_fragment(&citation.citation, &citation.source_type);
        }
    }

    citations
}

fn format_fragment(fragment: &str, source_type: &str) -> String {
    if source_type.contains("Case") {
        return BARE_CASE_CITATION
            .replace_all(fragment, "[${1}] ${2} ${3}")
            .into_owned();
    }

    if source_type.contains("Legislation") {
        let expanded = SECTION_ABBREVIATION.replace_all(fragment, "Section ${1}");
        let expanded = PARAGRAPH_ABBREVIATION.replace_all(&expanded, "Paragraph ${1}");
        let expanded = SCHEDULE_ABBREVIATION.replace_all(&expanded, "Schedule ${1}");
        return LOWERCASE_KEYWORD
            .replace_all(&expanded, |captures: &Captures<'_>| {
                format!("{}{}", capitalize(&captures[1]), &captures[2])
            })
            .into_owned();
    }

    fragment.to_string()
}

/// Builds a readable title from the last meaningful path segment of `raw`.
pub fn title_from_url(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return UNKNOWN_TITLE.to_string();
    };

    let path = FILE_EXTENSION.replace(parsed.path(), "");
    let Some(last_part) = path
        .split(['/', '-', '_'])
        .filter(|part| !part.is_empty())
        .last()
    else {
        return parsed
            .host_str()
            .map_or_else(|| UNKNOWN_TITLE.to_string(), ToString::to_string);
    };

    let spaced = CAMEL_BOUNDARY.replace_all(last_part, "${1} ${2}");
    spaced
        .to_lowercase()
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let lowered = word.to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
