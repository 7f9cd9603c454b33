//! Literal pre-filtering, the trick that keeps a million-row corpus scannable.
//!
//! A `LiteralHint` is a named approximation: a set of lowercase literal
//! tokens such that every string the pattern accepts contains at least one
//! token. Rows failing a cheap case-insensitive "contains any token" test can
//! then be skipped without running the regex at all. Derivation is
//! deliberately conservative; whenever soundness cannot be shown it returns
//! `None` and the pipeline falls back to a bounded recency scan.

use crate::pattern::record::PatternType;

pub const MIN_TOKEN_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralHint {
    /// Lowercase tokens, each at least `MIN_TOKEN_LEN` chars.
    pub tokens: Vec<String>,
}

impl LiteralHint {
    /// Derive a sound hint, or `None` when the pattern has no safe literal.
    ///
    /// Soundness rules for regex patterns:
    /// - tokens come only from top-level literal runs (groups, classes,
    ///   escapes and `.` contribute nothing but do not invalidate the rest);
    /// - a char under `?`, `*` or `{0,..}` may be absent from an accepting
    ///   string, so it is excluded and splits its run;
    /// - a char under `+` or `{n>=1,..}` is present at least once, so it ends
    ///   its run but stays in it;
    /// - with top-level alternation, every branch must yield at least one
    ///   token (OR across tokens stays a superset filter); one tokenless
    ///   branch poisons the whole derivation.
    pub fn derive(pattern: &str, pattern_type: PatternType) -> Option<LiteralHint> {
        match pattern_type {
            PatternType::Keyword => {
                let token = pattern.trim().to_lowercase();
                if token.chars().count() >= MIN_TOKEN_LEN {
                    Some(LiteralHint {
                        tokens: vec![token],
                    })
                } else {
                    None
                }
            }
            PatternType::Regex => derive_from_regex(pattern),
        }
    }

    /// True when `domain_name` would survive the pre-filter.
    pub fn admits(&self, domain_name: &str) -> bool {
        let name = domain_name.to_lowercase();
        self.tokens.iter().any(|t| name.contains(t))
    }
}

fn derive_from_regex(pattern: &str) -> Option<LiteralHint> {
    let mut tokens: Vec<String> = Vec::new();
    for branch in split_top_level_branches(pattern) {
        let branch_tokens = branch_literal_runs(&branch);
        if branch_tokens.is_empty() {
            return None;
        }
        for t in branch_tokens {
            if !tokens.contains(&t) {
                tokens.push(t);
            }
        }
    }
    if tokens.is_empty() {
        None
    } else {
        Some(LiteralHint { tokens })
    }
}

/// Split on `|` at nesting depth zero, outside classes and escapes.
fn split_top_level_branches(pattern: &str) -> Vec<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut branches = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                current.push(chars[i]);
                if i + 1 < chars.len() {
                    current.push(chars[i + 1]);
                }
                i += 2;
            }
            '[' => {
                let end = class_end(&chars, i);
                current.extend(&chars[i..end.min(chars.len())]);
                i = end;
            }
            '(' => {
                depth += 1;
                current.push('(');
                i += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(')');
                i += 1;
            }
            '|' if depth == 0 => {
                branches.push(std::mem::take(&mut current));
                i += 1;
            }
            c => {
                current.push(c);
                i += 1;
            }
        }
    }
    branches.push(current);
    branches
}

/// Extract the guaranteed literal runs of a single alternation-free-at-top
/// branch.
fn branch_literal_runs(branch: &str) -> Vec<String> {
    let chars: Vec<char> = branch.chars().collect();
    let mut runs: Vec<String> = Vec::new();
    let mut run = String::new();
    let mut i = 0usize;

    let flush = |run: &mut String, runs: &mut Vec<String>| {
        if run.chars().count() >= MIN_TOKEN_LEN {
            runs.push(run.to_lowercase());
        }
        run.clear();
    };

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                // Escapes may be classes (\d) or literals; treat both as
                // contributing nothing.
                flush(&mut run, &mut runs);
                i += 2;
                i = consume_quantifier(&chars, i).0;
            }
            '[' => {
                flush(&mut run, &mut runs);
                i = class_end(&chars, i);
                i = consume_quantifier(&chars, i).0;
            }
            '(' => {
                flush(&mut run, &mut runs);
                i = group_end(&chars, i);
                i = consume_quantifier(&chars, i).0;
            }
            '^' | '$' | '.' => {
                flush(&mut run, &mut runs);
                i += 1;
                i = consume_quantifier(&chars, i).0;
            }
            '+' | '*' | '?' | '{' => {
                // Stray quantifier with nothing literal before it.
                flush(&mut run, &mut runs);
                let (next, _) = consume_quantifier(&chars, i);
                i = next.max(i + 1);
            }
            c => {
                let (next, quant) = consume_quantifier(&chars, i + 1);
                match quant {
                    Quantifier::None => run.push(c),
                    Quantifier::AtLeastOne => {
                        // Guaranteed present, but what follows is not
                        // adjacent to it.
                        run.push(c);
                        flush(&mut run, &mut runs);
                    }
                    Quantifier::MaybeAbsent => {
                        flush(&mut run, &mut runs);
                    }
                }
                i = next;
            }
        }
    }
    flush(&mut run, &mut runs);
    runs
}

enum Quantifier {
    None,
    /// `+` or `{n,..}` with n >= 1.
    AtLeastOne,
    /// `?`, `*` or `{0,..}`.
    MaybeAbsent,
}

/// If a quantifier starts at `i`, return (index past it, its kind).
fn consume_quantifier(chars: &[char], i: usize) -> (usize, Quantifier) {
    if i >= chars.len() {
        return (i, Quantifier::None);
    }
    match chars[i] {
        '?' | '*' => (skip_lazy(chars, i + 1), Quantifier::MaybeAbsent),
        '+' => (skip_lazy(chars, i + 1), Quantifier::AtLeastOne),
        '{' => {
            let mut j = i + 1;
            let mut digits = String::new();
            while j < chars.len() && chars[j].is_ascii_digit() {
                digits.push(chars[j]);
                j += 1;
            }
            if digits.is_empty() {
                return (i, Quantifier::None);
            }
            if j < chars.len() && chars[j] == ',' {
                j += 1;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
            }
            if j < chars.len() && chars[j] == '}' {
                let min: u32 = digits.parse().unwrap_or(0);
                let kind = if min == 0 {
                    Quantifier::MaybeAbsent
                } else {
                    Quantifier::AtLeastOne
                };
                (skip_lazy(chars, j + 1), kind)
            } else {
                (i, Quantifier::None)
            }
        }
        _ => (i, Quantifier::None),
    }
}

fn skip_lazy(chars: &[char], i: usize) -> usize {
    if i < chars.len() && chars[i] == '?' {
        i + 1
    } else {
        i
    }
}

/// Index just past the `]` closing the class opening at `start`.
fn class_end(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    if i < chars.len() && chars[i] == '^' {
        i += 1;
    }
    if i < chars.len() && chars[i] == ']' {
        i += 1;
    }
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            ']' => return i + 1,
            _ => i += 1,
        }
    }
    i
}

/// Index just past the `)` matching the `(` at `start`.
fn group_end(chars: &[char], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '[' => i = class_end(chars, i),
            '(' => {
                depth += 1;
                i += 1;
            }
            ')' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex_hint(pattern: &str) -> Option<LiteralHint> {
        LiteralHint::derive(pattern, PatternType::Regex)
    }

    fn tokens(pattern: &str) -> Vec<String> {
        regex_hint(pattern).expect("hint expected").tokens
    }

    #[test]
    fn bare_literal_is_its_own_token() {
        assert_eq!(tokens("shop"), vec!["shop"]);
    }

    #[test]
    fn anchors_do_not_block_tokens() {
        assert_eq!(tokens("^ai$"), vec!["ai"]);
    }

    #[test]
    fn classes_split_runs() {
        assert_eq!(tokens("crypto[0-9]hub"), vec!["crypto", "hub"]);
    }

    #[test]
    fn optional_char_is_excluded() {
        // "colou?r" accepts "color", which does not contain "colour".
        assert_eq!(tokens("colou?r"), vec!["colo"]);
    }

    #[test]
    fn star_quantified_char_is_excluded() {
        assert_eq!(tokens("shopx*"), vec!["shop"]);
    }

    #[test]
    fn plus_quantified_char_stays_but_ends_run() {
        // "sho+p" accepts "shooop": "sho" is guaranteed, "shop" is not.
        assert_eq!(tokens("sho+p"), vec!["sho"]);
    }

    #[test]
    fn bounded_repeat_zero_min_is_optional() {
        assert_eq!(tokens("abc{0,3}de"), vec!["ab", "de"]);
    }

    #[test]
    fn bounded_repeat_positive_min_keeps_char() {
        assert_eq!(tokens("abc{2,3}"), vec!["abc"]);
    }

    #[test]
    fn alternation_unions_branch_tokens() {
        let t = tokens("shop|store");
        assert!(t.contains(&"shop".to_string()));
        assert!(t.contains(&"store".to_string()));
    }

    #[test]
    fn tokenless_branch_poisons_derivation() {
        // "x" is below the minimum token length, so the second branch has no
        // guaranteed literal and the whole hint must be abandoned.
        assert_eq!(regex_hint("shop|x"), None);
        assert_eq!(regex_hint("shop|[a-z]"), None);
    }

    #[test]
    fn pure_class_pattern_has_no_hint() {
        assert_eq!(regex_hint("^[a-z]{3}$"), None);
        assert_eq!(regex_hint("..."), None);
    }

    #[test]
    fn groups_contribute_nothing_but_do_not_invalidate() {
        assert_eq!(tokens("(my|the)?shop"), vec!["shop"]);
    }

    #[test]
    fn escapes_split_runs() {
        assert_eq!(tokens(r"web\d+site"), vec!["web", "site"]);
    }

    #[test]
    fn tokens_are_lowercased() {
        assert_eq!(tokens("ShopNow"), vec!["shopnow"]);
    }

    #[test]
    fn keyword_hint_is_the_keyword() {
        let hint = LiteralHint::derive("Shop", PatternType::Keyword).unwrap();
        assert_eq!(hint.tokens, vec!["shop"]);
        assert_eq!(LiteralHint::derive("x", PatternType::Keyword), None);
    }

    #[test]
    fn admits_is_case_insensitive_superset() {
        let hint = regex_hint("shop").unwrap();
        assert!(hint.admits("MyShop.com"));
        assert!(hint.admits("SHOPPING.io"));
        assert!(!hint.admits("store.com"));
    }

    #[test]
    fn soundness_regex_match_implies_admission() {
        // Every accepting string of these patterns must pass the pre-filter.
        let cases = [
            ("^ai", vec!["aidog.com", "aique.io"]),
            ("sho+p", vec!["shooop.com", "shop.net"]),
            ("crypto|nft2x", vec!["mycrypto.com", "nft2x.io"]),
            ("(get)?fit", vec!["getfit.com", "fitnow.com"]),
        ];
        for (pattern, names) in cases {
            let re = regex::RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .unwrap();
            let hint = regex_hint(pattern).unwrap();
            for name in names {
                let stem = name.split('.').next().unwrap();
                assert!(re.is_match(stem), "{pattern} should match {stem}");
                assert!(hint.admits(name), "{pattern} hint must admit {name}");
            }
        }
    }
}
