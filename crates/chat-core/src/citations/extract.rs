use std::sync::LazyLock;

use regex::Regex;

use super::Citation;
use super::format::title_from_url;
use super::policy::{CitationPolicy, WhitelistDomain};

const SURROUNDING_CHARS: usize = 200;
const TITLE_SEARCH_CHARS: isize = 100;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(www\.)?[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_\+.~#?&/=]*)",
    )
    .expect("valid regex")
});

static TITLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'\[]([^"'\]]+)["'\]]"#).expect("valid regex"));

static REFERENCE_SECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(?:References|Sources|Citations):\s*\n(.*?)(?:\n\n|\z)").expect("valid regex")
});

// Ordered; the first pattern with any match in the text wins.
static CITATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\[(\d{4})\]\s+(\w+)\s+(\d+)",
        r"(?i)\b(\d{4})\s+(\w+)\s+(\d+)",
        r"(?i)\bsection\s+(\d+[A-Za-z]?)",
        r"(?i)\bs\.?\s*(\d+[A-Za-z]?)",
        r"(?i)\bparagraph\s+(\d+[A-Za-z]?)",
        r"(?i)\bpara\.?\s*(\d+[A-Za-z]?)",
        r"(?i)\bschedule\s+(\d+[A-Za-z]?)",
        r"(?i)\bsch\.?\s*(\d+[A-Za-z]?)",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

pub(super) fn extract_citations(policy: &CitationPolicy, response: &str) -> Vec<Citation> {
    let mut citations = Vec::new();

    for url_match in URL_PATTERN.find_iter(response) {
        let url = trim_trailing_punctuation(url_match.as_str());
        let Some(domain) = policy.matching_domain(url) else {
            continue;
        };

        let (context, url_offset) =
            surrounding_text(response, url_match.start(), url.len(), SURROUNDING_CHARS);
        citations.push(build_citation(policy, domain, url, context, url_offset));
    }

    extract_reference_section(policy, response, &mut citations);
    citations
}

fn extract_reference_section(
    policy: &CitationPolicy,
    response: &str,
    citations: &mut Vec<Citation>,
) {
    let Some(section) = REFERENCE_SECTION_PATTERN
        .captures(response)
        .and_then(|captures| captures.get(1))
    else {
        return;
    };

    for line in section.as_str().lines() {
        let Some(url_match) = URL_PATTERN.find(line) else {
            continue;
        };
        let url = trim_trailing_punctuation(url_match.as_str());
        if citations.iter().any(|existing| existing.url == url) {
            continue;
        }
        let Some(domain) = policy.matching_domain(url) else {
            continue;
        };

        citations.push(build_citation(policy, domain, url, line, url_match.start()));
    }
}

fn build_citation(
    policy: &CitationPolicy,
    domain: &WhitelistDomain,
    url: &str,
    context: &str,
    url_offset: usize,
) -> Citation {
    Citation {
        url: url.to_string(),
        title: extract_title(context, url, url_offset),
        source_type: policy.source_type(url),
        citation: extract_citation_fragment(context),
        website: domain.domain.clone(),
    }
}

/// Returns the slice holding up to `char_count` characters either side of
/// the target, plus the target's byte offset within that slice.
fn surrounding_text(text: &str, start: usize, len: usize, char_count: usize) -> (&str, usize) {
    let end = start + len;
    let window_start = text[..start]
        .char_indices()
        .rev()
        .take(char_count)
        .last()
        .map_or(start, |(index, _)| index);
    let window_end = text[end..]
        .char_indices()
        .nth(char_count)
        .map_or(text.len(), |(index, _)| end + index);

    (&text[window_start..window_end], start - window_start)
}

fn extract_title(context: &str, url: &str, url_offset: usize) -> String {
    let url_position = char_position(context, url_offset);
    let url_chars = url.chars().count() as isize;

    TITLE_PATTERN
        .captures_iter(context)
        .find_map(|captures| {
            let whole = captures.get(0)?;
            let position = char_position(context, whole.start());
            let near = position < url_position + url_chars + TITLE_SEARCH_CHARS
                && position > url_position - TITLE_SEARCH_CHARS;
            if !near {
                return None;
            }
            let title = captures.get(1)?.as_str().trim();
            (!title.is_empty()).then(|| title.to_string())
        })
        .unwrap_or_else(|| title_from_url(url))
}

pub(super) fn extract_citation_fragment(text: &str) -> String {
    CITATION_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(text))
        .map(|found| found.as_str().to_string())
        .unwrap_or_default()
}

fn char_position(text: &str, byte_offset: usize) -> isize {
    text[..byte_offset].chars().count() as isize
}

fn trim_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']'])
}
