use serde::Deserialize;

/// One model response run through the citation pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct CitationCaseFixture {
    pub case_id: String,
    pub description: String,
    pub response_text: String,
    #[serde(default)]
    pub expected: Vec<ExpectedCitation>,
    #[serde(default)]
    pub expected_count: Option<usize>,
}

/// Fields left out are not checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpectedCitation {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub citation_contains: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

/// A scripted multi-turn conversation driven through the chat service.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationCaseFixture {
    pub case_id: String,
    pub description: String,
    pub turns: Vec<ScriptedTurn>,
    #[serde(default)]
    pub expectations: ConversationExpectations,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedTurn {
    pub prompt: String,
    pub response: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationExpectations {
    #[serde(default)]
    pub summary_count: Option<usize>,
    #[serde(default)]
    pub previous_summaries: Option<usize>,
    /// Zero-based turn indices whose prompt must reach the model augmented.
    #[serde(default)]
    pub augmented_turns: Vec<usize>,
    #[serde(default)]
    pub citations_per_turn: Vec<usize>,
}
