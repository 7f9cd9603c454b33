use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// User-authored regex, matched case-insensitively against the stem.
    Regex,
    /// Structured shorthand: a literal case-insensitive substring.
    Keyword,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regex => "regex",
            Self::Keyword => "keyword",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "regex" => Some(Self::Regex),
            "keyword" => Some(Self::Keyword),
            _ => None,
        }
    }
}

/// A stored matching rule plus its structured filters. Must have passed the
/// safety validator before persistence; re-validated before every evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub owner: String,
    pub pattern: String,
    pub pattern_type: PatternType,
    pub description: String,
    pub min_price: f64,
    pub max_price: Option<f64>,
    pub tld_filter: Option<String>,
    pub min_length: Option<u16>,
    pub max_length: Option<u16>,
    pub min_age: Option<u16>,
    pub max_age: Option<u16>,
    pub enabled: bool,
    pub last_matched_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Create payload, as received from the dashboard.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternDraft {
    pub pattern: String,
    pub pattern_type: PatternType,
    pub description: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub tld_filter: Option<String>,
    pub min_length: Option<u16>,
    pub max_length: Option<u16>,
    pub min_age: Option<u16>,
    pub max_age: Option<u16>,
}

/// Partial edit. Fields left `None` are unchanged. Filter fields are
/// distinguished from cosmetic ones because editing a filter invalidates the
/// pattern's existing alerts (see `PatternService::update`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternUpdate {
    pub pattern: Option<String>,
    pub description: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<Option<f64>>,
    pub tld_filter: Option<Option<String>>,
    pub min_length: Option<Option<u16>>,
    pub max_length: Option<Option<u16>>,
    pub min_age: Option<Option<u16>>,
    pub max_age: Option<Option<u16>>,
    pub enabled: Option<bool>,
}

impl PatternUpdate {
    /// True when the edit changes what the pattern can match, meaning stale
    /// alerts must be cleared so the next run re-evaluates under the new
    /// filters. Description and enabled are cosmetic.
    pub fn touches_filters(&self) -> bool {
        self.pattern.is_some()
            || self.min_price.is_some()
            || self.max_price.is_some()
            || self.tld_filter.is_some()
            || self.min_length.is_some()
            || self.max_length.is_some()
            || self.min_age.is_some()
            || self.max_age.is_some()
    }

    pub fn apply_to(&self, p: &mut Pattern, now_ms: i64) {
        if let Some(v) = &self.pattern {
            p.pattern = v.clone();
        }
        if let Some(v) = &self.description {
            p.description = v.clone();
        }
        if let Some(v) = self.min_price {
            p.min_price = v;
        }
        if let Some(v) = self.max_price {
            p.max_price = v;
        }
        if let Some(v) = &self.tld_filter {
            p.tld_filter = v.clone();
        }
        if let Some(v) = self.min_length {
            p.min_length = v;
        }
        if let Some(v) = self.max_length {
            p.max_length = v;
        }
        if let Some(v) = self.min_age {
            p.min_age = v;
        }
        if let Some(v) = self.max_age {
            p.max_age = v;
        }
        if let Some(v) = self.enabled {
            p.enabled = v;
        }
        p.updated_at_ms = now_ms;
    }
}
