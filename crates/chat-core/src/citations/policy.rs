pub const LEGISLATION_DOMAIN: &str = "legislation.gov.uk";
pub const CASE_LAW_DOMAIN: &str = "bailii.org";

const FALLBACK_SOURCE_TYPE: &str = "Legal Resource";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    pub fragment: String,
    pub source_type: String,
}

impl PathRule {
    pub fn new(fragment: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            source_type: source_type.into(),
        }
    }
}

/// A citable host. `path_rules` are checked in order; the first fragment
/// contained in the URL decides the source type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistDomain {
    pub domain: String,
    pub default_source_type: String,
    pub path_rules: Vec<PathRule>,
}

impl WhitelistDomain {
    pub fn classify(&self, url: &str) -> &str {
        self.path_rules
            .iter()
            .find(|rule| url.contains(rule.fragment.as_str()))
            .map_or(self.default_source_type.as_str(), |rule| {
                rule.source_type.as_str()
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationPolicy {
    domains: Vec<WhitelistDomain>,
}

impl CitationPolicy {
    pub fn new(domains: Vec<WhitelistDomain>) -> Self {
        Self { domains }
    }

    /// UK legislation registry and case-law registry, in that order.
    pub fn uk_reference() -> Self {
        Self::new(vec![
            WhitelistDomain {
                domain: LEGISLATION_DOMAIN.to_string(),
                default_source_type: "Legislation".to_string(),
                path_rules: vec![
                    PathRule::new("/ukpga/", "Primary Legislation"),
                    PathRule::new("/uksi/", "Secondary Legislation"),
                    PathRule::new("/ukla/", "Local Act"),
                ],
            },
            WhitelistDomain {
                domain: CASE_LAW_DOMAIN.to_string(),
                default_source_type: "Case Law".to_string(),
                path_rules: vec![
                    PathRule::new("/uk/cases/UKSC/", "Supreme Court Case"),
                    PathRule::new("/ew/cases/EWHC/", "High Court Case"),
                    PathRule::new("/ew/cases/EWCA/", "Court of Appeal Case"),
                ],
            },
        ])
    }

    pub fn domains(&self) -> &[WhitelistDomain] {
        &self.domains
    }

    pub fn matching_domain(&self, url: &str) -> Option<&WhitelistDomain> {
        self.domains
            .iter()
            .find(|entry| url.contains(entry.domain.as_str()))
    }

    pub fn is_whitelisted(&self, url: &str) -> bool {
        self.matching_domain(url).is_some()
    }

    pub fn source_type(&self, url: &str) -> String {
        self.matching_domain(url)
            .map_or(FALLBACK_SOURCE_TYPE, |entry| entry.classify(url))
            .to_string()
    }
}

impl Default for CitationPolicy {
    fn default() -> Self {
        Self::uk_reference()
    }
}
