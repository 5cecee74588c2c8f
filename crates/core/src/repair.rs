//! Best-effort repair of near-JSON completion text.
//!
//! Completions routinely come back with bare keys, single quotes, trailing
//! commas, comments and unquoted clock times. [`RegexRepair`] rewrites those
//! shapes into strict JSON with a fixed sequence of textual passes; it is not a
//! tokenizer and will happily leave hopeless input broken, in which case
//! [`parse_lenient`] reports [`RepairError::RepairFailed`].
//!
//! Passes that match structure (`{`, `,`, `:`) only look at text outside of
//! double-quoted string literals, so values such as `"http://x"` or
//! `"lunch at 12:30"` survive untouched.

use crate::extract::truncate_str;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

/// Upper bound on full pass sequences; later passes can expose work for earlier
/// ones (e.g. a comment hiding a trailing comma).
const MAX_ROUNDS: usize = 4;

const SNIPPET_LEN: usize = 200;
const REPAIRED_CONTEXT_LEN: usize = 600;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RepairError {
    #[error("could not repair completion into structured data: {reason} (near `{snippet}`)")]
    RepairFailed {
        /// Leading part of the offending input.
        snippet: String,
        /// Text after the last repair attempt, for diagnosis.
        repaired: String,
        reason: String,
    },
}

/// A text → strict-JSON rewriting strategy.
pub trait RepairStrategy {
    fn name(&self) -> &'static str;

    /// Rewrite `text` so that a strict parser has a chance to accept it.
    fn repair(&self, text: &str) -> String;

    /// Extra normalisation for input that cannot be assumed to be JSON at all.
    fn normalize_lenient(&self, text: &str) -> String {
        text.to_string()
    }
}

/// The default pass-based strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexRepair;

impl RepairStrategy for RegexRepair {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn repair(&self, text: &str) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_ROUNDS {
            let next = run_passes(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn normalize_lenient(&self, text: &str) -> String {
        collapse_doubled_key_quotes(&single_to_double_quotes(text))
    }
}

/// Repair with the default strategy.
pub fn repair(text: &str) -> String {
    RegexRepair.repair(text)
}

/// Parse with the default strategy. See [`parse_with`].
pub fn parse_lenient(text: &str) -> Result<Value, RepairError> {
    parse_with(&RegexRepair, text)
}

/// Strict parse, then repaired parse, then lenient-normalised repaired parse.
pub fn parse_with(strategy: &dyn RepairStrategy, text: &str) -> Result<Value, RepairError> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let repaired = strategy.repair(text);
    if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
        debug!(strategy = strategy.name(), "completion needed repair");
        return Ok(value);
    }

    let lenient = strategy.repair(&strategy.normalize_lenient(text));
    match serde_json::from_str::<Value>(&lenient) {
        Ok(value) => {
            debug!(
                strategy = strategy.name(),
                "completion needed lenient normalisation"
            );
            Ok(value)
        }
        Err(e) => Err(RepairError::RepairFailed {
            snippet: truncate_str(text.trim(), SNIPPET_LEN),
            repaired: truncate_str(&lenient, REPAIRED_CONTEXT_LEN),
            reason: e.to_string(),
        }),
    }
}

fn run_passes(text: &str) -> String {
    let text = quote_time_tokens(text);
    let text = quote_identifier_keys(&text);
    let text = remove_trailing_commas(&text);
    let text = quote_numeric_keys(&text);
    let text = unescape_slashes(&text);
    strip_comments(&text)
}

// ── Passes ──────────────────────────────────────────────────────────────

static TIME_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{1,2}:\d{2}").unwrap());

static IDENT_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([{,]\s*)([A-Za-z_$][A-Za-z0-9_$]*)(\s*):").unwrap());

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());

static NUMERIC_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([{,]\s*)(\d+)(\s*):").unwrap());

static DOUBLED_KEY_QUOTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"""([A-Za-z0-9_$]+)""(\s*):"#).unwrap());

/// `9:05` → `"9:05"` when the token stands on its own.
fn quote_time_tokens(text: &str) -> String {
    map_outside_strings(text, |segment| {
        let mut out = String::with_capacity(segment.len() + 8);
        let mut last = 0;
        for m in TIME_TOKEN_RE.find_iter(segment) {
            let before = segment[..m.start()].chars().next_back();
            let after = segment[m.end()..].chars().next();
            let glued_before = before.is_some_and(|c| c.is_alphanumeric() || c == '.');
            let glued_after = after.is_some_and(|c| c.is_alphanumeric() || c == ':');

            out.push_str(&segment[last..m.start()]);
            if glued_before || glued_after {
                out.push_str(m.as_str());
            } else {
                out.push('"');
                out.push_str(m.as_str());
                out.push('"');
            }
            last = m.end();
        }
        out.push_str(&segment[last..]);
        out
    })
}

/// `{key: 1}` → `{"key": 1}`; only identifiers right after `{` or `,`.
fn quote_identifier_keys(text: &str) -> String {
    map_outside_strings(text, |segment| {
        IDENT_KEY_RE
            .replace_all(segment, r#"${1}"${2}"${3}:"#)
            .into_owned()
    })
}

fn remove_trailing_commas(text: &str) -> String {
    map_outside_strings(text, |segment| {
        TRAILING_COMMA_RE.replace_all(segment, "$1").into_owned()
    })
}

/// `{2: "x"}` → `{"2": "x"}`.
fn quote_numeric_keys(text: &str) -> String {
    map_outside_strings(text, |segment| {
        NUMERIC_KEY_RE
            .replace_all(segment, r#"${1}"${2}"${3}:"#)
            .into_owned()
    })
}

/// `\/` → `/`, honouring escaped backslashes inside literals.
fn unescape_slashes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('/') => out.push('/'),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Drop `// line` and `/* block */` comments that sit outside string literals.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

// ── Lenient normalisation ───────────────────────────────────────────────

/// Turn `'single'` string delimiters into double quotes.
///
/// A `'` only opens a string where a JSON value or key could start (after
/// `{`, `[`, `,`, `:` or at the beginning), so apostrophes in bare words and in
/// double-quoted strings are left alone.
fn single_to_double_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut last_significant: Option<char> = None;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                while let Some(inner) = chars.next() {
                    out.push(inner);
                    if inner == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if inner == '"' {
                        break;
                    }
                }
                last_significant = Some('"');
            }
            '\'' if matches!(last_significant, None | Some('{' | '[' | ',' | ':')) => {
                out.push('"');
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(escaped) => {
                                out.push('\\');
                                out.push(escaped);
                            }
                            None => {}
                        },
                        '"' => out.push_str("\\\""),
                        '\'' => break,
                        _ => out.push(inner),
                    }
                }
                out.push('"');
                last_significant = Some('"');
            }
            _ => {
                out.push(c);
                if !c.is_whitespace() {
                    last_significant = Some(c);
                }
            }
        }
    }
    out
}

/// `""key"":` → `"key":`, left behind by repeated key-quoting.
fn collapse_doubled_key_quotes(text: &str) -> String {
    DOUBLED_KEY_QUOTES_RE
        .replace_all(text, r#""${1}"${2}:"#)
        .into_owned()
}

// ── Literal-aware segmentation ──────────────────────────────────────────

/// Apply `rewrite` to every run of text outside double-quoted literals,
/// copying the literals through verbatim.
fn map_outside_strings(text: &str, mut rewrite: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;

    while let Some(start) = rest.find('"') {
        out.push_str(&rewrite(&rest[..start]));
        let len = literal_len(&rest[start..]);
        out.push_str(&rest[start..start + len]);
        rest = &rest[start + len..];
    }
    out.push_str(&rewrite(rest));
    out
}

/// Byte length of the literal at the start of `s` (which begins with `"`),
/// including both quotes; runs to the end for an unterminated literal.
fn literal_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    s.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_time_tokens() {
        assert_eq!(
            quote_time_tokens(r#"{"0": 9:05, "1": 12:30}"#),
            r#"{"0": "9:05", "1": "12:30"}"#
        );
    }

    #[test]
    fn test_quote_time_tokens_skips_literals_and_longer_runs() {
        assert_eq!(
            quote_time_tokens(r#"{"0":"at 9:05"}"#),
            r#"{"0":"at 9:05"}"#
        );
        assert_eq!(quote_time_tokens("[12:30:45]"), "[12:30:45]");
        assert_eq!(quote_time_tokens("[123:45]"), "[123:45]");
    }

    #[test]
    fn test_quote_identifier_keys() {
        assert_eq!(
            quote_identifier_keys(r#"{name: "x", role_1 : "y"}"#),
            r#"{"name": "x", "role_1" : "y"}"#
        );
    }

    #[test]
    fn test_quote_identifier_keys_leaves_values_alone() {
        let text = r#"{"a": "b:c", "d": "see, e: f"}"#;
        assert_eq!(quote_identifier_keys(text), text);
    }

    #[test]
    fn test_remove_trailing_commas() {
        assert_eq!(remove_trailing_commas("[1, 2, ]"), "[1, 2 ]");
        assert_eq!(remove_trailing_commas(r#"{"a":1,}"#), r#"{"a":1}"#);
        assert_eq!(remove_trailing_commas(r#"{"a":",}"}"#), r#"{"a":",}"}"#);
    }

    #[test]
    fn test_quote_numeric_keys() {
        assert_eq!(
            quote_numeric_keys(r#"{2: "x", 10: "y"}"#),
            r#"{"2": "x", "10": "y"}"#
        );
    }

    #[test]
    fn test_unescape_slashes() {
        assert_eq!(unescape_slashes(r#""a\/b""#), r#""a/b""#);
        assert_eq!(unescape_slashes(r#""a\\/b""#), r#""a\\/b""#);
    }

    #[test]
    fn test_strip_comments() {
        assert_eq!(
            strip_comments("{\"a\": 1, // note\n \"b\": 2 /* c */}"),
            "{\"a\": 1, \n \"b\": 2 }"
        );
        assert_eq!(
            strip_comments(r#"{"0":"http://x/*y*/"}"#),
            r#"{"0":"http://x/*y*/"}"#
        );
    }

    #[test]
    fn test_single_to_double_quotes() {
        assert_eq!(
            single_to_double_quotes(r#"{'a': 'it\'s "fine"'}"#),
            r#"{"a": "it's \"fine\""}"#
        );
        assert_eq!(
            single_to_double_quotes(r#"{"a": "don't"}"#),
            r#"{"a": "don't"}"#
        );
    }

    #[test]
    fn test_collapse_doubled_key_quotes() {
        assert_eq!(
            collapse_doubled_key_quotes(r#"{""action"": "insert"}"#),
            r#"{"action": "insert"}"#
        );
        assert_eq!(collapse_doubled_key_quotes(r#"["",""]"#), r#"["",""]"#);
    }

    #[test]
    fn test_repair_is_idempotent_on_strict_text() {
        let strict = r#"[{"action":"update","tableIndex":0,"rowIndex":2,"data":{"1":"12:30 pm, http://x"}}]"#;
        let once = repair(strict);
        assert_eq!(once, strict);
        assert_eq!(repair(&once), once);
    }

    #[test]
    fn test_repair_is_idempotent_on_messy_text() {
        let messy = "[{action: \"insert\", tableIndex: 1, data: {0: 9:30,},}, // x\n]";
        let once = repair(messy);
        assert_eq!(repair(&once), once);
        assert!(serde_json::from_str::<Value>(&once).is_ok());
    }

    #[test]
    fn test_parse_lenient_handles_typical_llm_output() {
        let raw = "[\n  {action: 'Insert', tableIndex: 1, data: {0: 'Alice', 1: \"meets at 9:30\"},},  // note\n]";
        let value = parse_lenient(raw).unwrap();
        assert_eq!(
            value,
            json!([{
                "action": "Insert",
                "tableIndex": 1,
                "data": {"0": "Alice", "1": "meets at 9:30"}
            }])
        );
    }

    #[test]
    fn test_parse_lenient_quotes_bare_time_values() {
        let value = parse_lenient(r#"[{"action":"update","tableIndex":0,"rowIndex":0,"data":{"2":7:45}}]"#)
            .unwrap();
        assert_eq!(value[0]["data"]["2"], json!("7:45"));
    }

    #[test]
    fn test_parse_lenient_reports_failure_with_context() {
        let err = parse_lenient("this is not { even close").unwrap_err();
        match err {
            RepairError::RepairFailed {
                snippet, reason, ..
            } => {
                assert!(snippet.starts_with("this is not"));
                assert!(!reason.is_empty());
            }
        }
    }

    #[test]
    fn test_parse_lenient_rejects_empty_payload() {
        assert!(parse_lenient("   ").is_err());
    }

    struct Passthrough;

    impl RepairStrategy for Passthrough {
        fn name(&self) -> &'static str {
            "passthrough"
        }

        fn repair(&self, text: &str) -> String {
            text.to_string()
        }
    }

    #[test]
    fn test_parse_with_custom_strategy() {
        assert!(parse_with(&Passthrough, r#"[{"a":1}]"#).is_ok());
        assert!(parse_with(&Passthrough, "[{a:1}]").is_err());
    }
}
