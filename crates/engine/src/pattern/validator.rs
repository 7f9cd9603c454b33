//! Safety gate for user-submitted patterns.
//!
//! This is the single shared implementation run before a pattern is stored
//! and again before every evaluation. It is a heuristic allow-list (ReDoS
//! detection is undecidable in general), layered on top of the linear-time
//! engine the evaluator uses; it is not a proof of polynomial behavior.

use regex::RegexBuilder;

pub const MAX_PATTERN_LEN: usize = 200;
pub const MAX_NESTING_DEPTH: usize = 3;
pub const MAX_QUANTIFIERS: usize = 5;

const COMPILED_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    TooLong(usize),
    NestedQuantifier,
    QuantifiedAlternation,
    NestingTooDeep(usize),
    TooManyQuantifiers(usize),
    AdjacentQuantifiers,
    InvalidSyntax(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "pattern is empty"),
            Self::TooLong(len) => write!(f, "pattern is {len} chars, max {MAX_PATTERN_LEN}"),
            Self::NestedQuantifier => write!(f, "quantifier wraps a quantified group"),
            Self::QuantifiedAlternation => {
                write!(f, "quantifier wraps an alternation with quantified branches")
            }
            Self::NestingTooDeep(d) => {
                write!(f, "group nesting depth {d} exceeds {MAX_NESTING_DEPTH}")
            }
            Self::TooManyQuantifiers(n) => {
                write!(f, "{n} quantifiers exceed limit of {MAX_QUANTIFIERS}")
            }
            Self::AdjacentQuantifiers => write!(f, "adjacent quantifiers"),
            Self::InvalidSyntax(e) => write!(f, "invalid syntax: {e}"),
        }
    }
}

/// Validate a regex pattern. `Ok(())` means the pattern may be stored and
/// compiled; any `Err` must be reported to the caller and the pattern
/// discarded.
pub fn validate(pattern: &str) -> Result<(), RejectReason> {
    if pattern.trim().is_empty() {
        return Err(RejectReason::Empty);
    }
    let len = pattern.chars().count();
    if len > MAX_PATTERN_LEN {
        return Err(RejectReason::TooLong(len));
    }

    scan_structure(pattern)?;

    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(COMPILED_SIZE_LIMIT)
        .build()
        .map(|_| ())
        .map_err(|e| RejectReason::InvalidSyntax(e.to_string()))
}

/// Keyword patterns are matched as literal substrings and never compiled, so
/// only the size rules apply.
pub fn validate_keyword(keyword: &str) -> Result<(), RejectReason> {
    if keyword.trim().is_empty() {
        return Err(RejectReason::Empty);
    }
    let len = keyword.chars().count();
    if len > MAX_PATTERN_LEN {
        return Err(RejectReason::TooLong(len));
    }
    Ok(())
}

#[derive(Default)]
struct GroupInfo {
    contains_quantifier: bool,
    has_alternation: bool,
}

/// Structural scan: counts quantifier tokens, tracks group nesting and spots
/// the classic catastrophic shapes `(X+)+` / `(a|b+)*`.
fn scan_structure(pattern: &str) -> Result<(), RejectReason> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut stack: Vec<GroupInfo> = Vec::new();
    let mut last_closed: Option<GroupInfo> = None;
    let mut prev_was_quantifier = false;
    let mut quantifier_count = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                // Escaped char is a plain literal, skip it.
                i += 2;
                prev_was_quantifier = false;
                last_closed = None;
                continue;
            }
            '[' => {
                i = skip_char_class(&chars, i);
                prev_was_quantifier = false;
                last_closed = None;
                continue;
            }
            '(' => {
                stack.push(GroupInfo::default());
                if stack.len() > MAX_NESTING_DEPTH {
                    return Err(RejectReason::NestingTooDeep(stack.len()));
                }
                i += 1;
                // Group modifiers like (?: (?i) (?P<name> are not quantifiers.
                if i < chars.len() && chars[i] == '?' {
                    i += 1;
                    if i < chars.len() && (chars[i] == 'P' || chars[i] == '<') {
                        while i < chars.len() && chars[i] != '>' {
                            i += 1;
                        }
                        i += 1;
                    } else {
                        while i < chars.len() && "imsxUuR-:".contains(chars[i]) {
                            let done = chars[i] == ':';
                            i += 1;
                            if done {
                                break;
                            }
                        }
                    }
                }
                prev_was_quantifier = false;
                last_closed = None;
                continue;
            }
            ')' => {
                let closed = stack.pop().unwrap_or_default();
                if let Some(parent) = stack.last_mut() {
                    parent.contains_quantifier |= closed.contains_quantifier;
                }
                last_closed = Some(closed);
                prev_was_quantifier = false;
                i += 1;
                continue;
            }
            '|' => {
                if let Some(g) = stack.last_mut() {
                    g.has_alternation = true;
                }
                prev_was_quantifier = false;
                last_closed = None;
                i += 1;
                continue;
            }
            '+' | '*' | '?' => {
                i += 1;
            }
            '{' => {
                match scan_bounded_repeat(&chars, i) {
                    Some(end) => i = end,
                    None => {
                        // Not a repetition; the engine treats it as a literal.
                        prev_was_quantifier = false;
                        last_closed = None;
                        i += 1;
                        continue;
                    }
                }
            }
            _ => {
                prev_was_quantifier = false;
                last_closed = None;
                i += 1;
                continue;
            }
        }

        // Reached only after consuming a quantifier token.
        if prev_was_quantifier {
            return Err(RejectReason::AdjacentQuantifiers);
        }
        quantifier_count += 1;
        if quantifier_count > MAX_QUANTIFIERS {
            return Err(RejectReason::TooManyQuantifiers(quantifier_count));
        }
        if let Some(closed) = last_closed.take() {
            if closed.contains_quantifier {
                return if closed.has_alternation {
                    Err(RejectReason::QuantifiedAlternation)
                } else {
                    Err(RejectReason::NestedQuantifier)
                };
            }
        }
        if let Some(g) = stack.last_mut() {
            g.contains_quantifier = true;
        }
        prev_was_quantifier = true;
    }

    Ok(())
}

/// Skip `[...]`, honoring escapes and a leading `]` literal. Returns the index
/// just past the closing bracket.
fn skip_char_class(chars: &[char], start: usize) -> usize {
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

/// If `chars[start..]` begins a `{m}` / `{m,}` / `{m,n}` repetition, return
/// the index just past the closing brace.
fn scan_bounded_repeat(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    let mut digits = 0;
    while i < chars.len() && chars[i].is_ascii_digit() {
        digits += 1;
        i += 1;
    }
    if digits == 0 {
        return None;
    }
    if i < chars.len() && chars[i] == ',' {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && chars[i] == '}' {
        Some(i + 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_whitespace() {
        assert_eq!(validate(""), Err(RejectReason::Empty));
        assert_eq!(validate("   "), Err(RejectReason::Empty));
    }

    #[test]
    fn rejects_over_length() {
        let long = "a".repeat(201);
        assert!(matches!(validate(&long), Err(RejectReason::TooLong(201))));
        let ok = "a".repeat(200);
        assert!(validate(&ok).is_ok());
    }

    #[test]
    fn rejects_nested_quantifier_shapes() {
        assert_eq!(validate("(x+)+"), Err(RejectReason::NestedQuantifier));
        assert_eq!(validate("(x*)*"), Err(RejectReason::NestedQuantifier));
        assert_eq!(validate("(x+){2}"), Err(RejectReason::NestedQuantifier));
        assert_eq!(validate("(a(b+))*"), Err(RejectReason::NestedQuantifier));
    }

    #[test]
    fn rejects_quantified_alternation_with_quantified_branch() {
        assert_eq!(validate("(a|b+)*"), Err(RejectReason::QuantifiedAlternation));
        assert_eq!(validate("(x+|y)+"), Err(RejectReason::QuantifiedAlternation));
    }

    #[test]
    fn allows_quantified_alternation_of_plain_branches() {
        assert!(validate("(cat|dog)+").is_ok());
    }

    #[test]
    fn rejects_deep_nesting() {
        assert!(matches!(
            validate("((((a))))"),
            Err(RejectReason::NestingTooDeep(4))
        ));
        assert!(validate("(((a)))").is_ok());
    }

    #[test]
    fn rejects_too_many_quantifiers() {
        assert!(validate("a+b+c+d+e+").is_ok());
        assert_eq!(
            validate("a+b+c+d+e+f+"),
            Err(RejectReason::TooManyQuantifiers(6))
        );
    }

    #[test]
    fn counts_bounded_repeats_as_quantifiers() {
        assert_eq!(
            validate("a{2}b{2}c{2}d{2}e{2}f{2}"),
            Err(RejectReason::TooManyQuantifiers(6))
        );
    }

    #[test]
    fn rejects_adjacent_quantifiers() {
        assert_eq!(validate("a++"), Err(RejectReason::AdjacentQuantifiers));
        assert_eq!(validate("a*?"), Err(RejectReason::AdjacentQuantifiers));
    }

    #[test]
    fn rejects_invalid_syntax() {
        assert!(matches!(
            validate("(unclosed"),
            Err(RejectReason::InvalidSyntax(_))
        ));
    }

    #[test]
    fn accepts_typical_user_patterns() {
        assert!(validate("^ai").is_ok());
        assert!(validate("^[a-z]{3}$").is_ok());
        assert!(validate("shop").is_ok());
        assert!(validate("^(get|try)[a-z]+$").is_ok());
        assert!(validate("crypto|nft").is_ok());
        assert!(validate("(?:pro)?dev").is_ok());
    }

    #[test]
    fn class_metachars_are_not_quantifiers() {
        assert!(validate("[+*?]").is_ok());
        assert!(validate("[a-z+]{2,5}").is_ok());
    }

    #[test]
    fn escaped_metachars_are_literals() {
        assert!(validate(r"a\+b\*c").is_ok());
    }

    #[test]
    fn keyword_rules_are_size_only() {
        assert!(validate_keyword("(x+)+").is_ok());
        assert_eq!(validate_keyword(" "), Err(RejectReason::Empty));
        assert!(matches!(
            validate_keyword(&"k".repeat(201)),
            Err(RejectReason::TooLong(_))
        ));
    }
}
