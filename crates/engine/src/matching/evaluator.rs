//! Full evaluation of a pattern against candidate rows.
//!
//! Structured filters are pushed down to the inventory query before rows get
//! here, but they are re-applied anyway: the in-memory source and the
//! pre-filter are superset filters, and the double-check keeps evaluation
//! correct no matter which path produced the candidates.

use regex::{Regex, RegexBuilder};
use std::time::{Duration, Instant};

use super::MatchResult;
use crate::inventory::{normalize_tld, stem, AuctionRow};
use crate::pattern::record::{Pattern, PatternType};
use crate::pattern::validator::{self, RejectReason};

const COMPILED_SIZE_LIMIT: usize = 1 << 20;

pub enum Matcher {
    Regex(Regex),
    Keyword(String),
}

impl Matcher {
    fn matches_stem(&self, stem: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(stem),
            Self::Keyword(kw) => stem.to_lowercase().contains(kw),
        }
    }
}

/// Re-validates (defense in depth against rule changes after storage) and
/// compiles. The regex engine is linear-time, so a pattern that slips past
/// the heuristic validator still cannot backtrack catastrophically.
pub fn compile(pattern: &Pattern) -> Result<Matcher, RejectReason> {
    match pattern.pattern_type {
        PatternType::Keyword => {
            validator::validate_keyword(&pattern.pattern)?;
            Ok(Matcher::Keyword(pattern.pattern.trim().to_lowercase()))
        }
        PatternType::Regex => {
            validator::validate(&pattern.pattern)?;
            RegexBuilder::new(&pattern.pattern)
                .case_insensitive(true)
                .size_limit(COMPILED_SIZE_LIMIT)
                .build()
                .map(Matcher::Regex)
                .map_err(|e| RejectReason::InvalidSyntax(e.to_string()))
        }
    }
}

#[derive(Debug, Default)]
pub struct EvalReport {
    pub matches: Vec<MatchResult>,
    pub rows_scanned: usize,
    /// The per-batch wall-clock budget ran out; remaining rows were skipped.
    pub timed_out: bool,
}

pub fn evaluate(
    pattern: &Pattern,
    matcher: &Matcher,
    rows: &[AuctionRow],
    budget: Duration,
) -> EvalReport {
    let started = Instant::now();
    let mut report = EvalReport::default();

    for row in rows {
        if started.elapsed() > budget {
            report.timed_out = true;
            break;
        }
        report.rows_scanned += 1;
        if row_matches(pattern, matcher, row) {
            report.matches.push(MatchResult {
                auction_id: row.id.clone(),
                domain_name: row.domain_name.clone(),
                price: row.price,
                end_time_ms: row.end_time_ms,
                pattern_id: pattern.id.clone(),
                pattern_description: pattern.description.clone(),
            });
        }
    }

    report
}

fn row_matches(pattern: &Pattern, matcher: &Matcher, row: &AuctionRow) -> bool {
    if row.price < pattern.min_price {
        return false;
    }
    if let Some(max) = pattern.max_price {
        if row.price > max {
            return false;
        }
    }
    if let Some(tld) = &pattern.tld_filter {
        if normalize_tld(&row.tld) != normalize_tld(tld) {
            return false;
        }
    }

    let name_stem = stem(&row.domain_name);
    let stem_len = name_stem.chars().count();
    if let Some(min) = pattern.min_length {
        if stem_len < min as usize {
            return false;
        }
    }
    if let Some(max) = pattern.max_length {
        if stem_len > max as usize {
            return false;
        }
    }

    if pattern.min_age.is_some() || pattern.max_age.is_some() {
        let age = match row.domain_age {
            Some(a) if a > 0 => a,
            // Missing or zero age is unknown, and unknown never satisfies an
            // age-bounded pattern.
            _ => return false,
        };
        if let Some(min) = pattern.min_age {
            if age < min as i32 {
                return false;
            }
        }
        if let Some(max) = pattern.max_age {
            if age > max as i32 {
                return false;
            }
        }
    }

    matcher.matches_stem(name_stem)
}
