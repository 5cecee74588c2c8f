//! Pull the action-list payload out of a raw completion, and strip embedded
//! edit/thinking blocks from conversation text.

use regex::Regex;
use std::sync::LazyLock;

static TABLE_EDIT_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tableEdit>(.*?)</tableEdit>").unwrap());

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_-]*[ \t]*$").unwrap());

static EMBEDDED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<tableEdit>.*?</tableEdit>|<think>.*?</think>|<thinking>.*?</thinking>")
        .unwrap()
});

/// Narrow a completion down to the text that should hold the action list.
///
/// Takes the inside of the first `<tableEdit>` block when present, drops HTML
/// comment markers and code fences, then keeps the outermost `[` … `]` span.
pub fn extract_action_payload(raw: &str) -> String {
    let inner = TABLE_EDIT_BLOCK_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or(raw, |m| m.as_str());

    let without_markers = inner.replace("<!--", "").replace("-->", "");
    let unfenced = CODE_FENCE_RE.replace_all(&without_markers, "");
    let trimmed = unfenced.trim();

    match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if end > start => trimmed[start..=end].to_string(),
        _ => trimmed.to_string(),
    }
}

/// Remove `<tableEdit>`, `<think>` and `<thinking>` blocks from a message.
pub fn strip_embedded_blocks(text: &str) -> String {
    EMBEDDED_BLOCK_RE.replace_all(text, "").trim().to_string()
}

/// Truncate to at most `max_len` bytes, appending `...` and never splitting a
/// multi-byte char.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len.saturating_sub(3);
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_table_edit_block() {
        let raw = "Sure!\n<tableEdit>\n<!--\n[{\"action\":\"insert\",\"tableIndex\":0}]\n-->\n</tableEdit>\nDone.";
        assert_eq!(
            extract_action_payload(raw),
            r#"[{"action":"insert","tableIndex":0}]"#
        );
    }

    #[test]
    fn test_extract_strips_code_fences() {
        let raw = "```json\n[{\"action\":\"delete\",\"tableIndex\":1,\"rowIndex\":0}]\n```";
        assert_eq!(
            extract_action_payload(raw),
            r#"[{"action":"delete","tableIndex":1,"rowIndex":0}]"#
        );
    }

    #[test]
    fn test_extract_keeps_text_without_brackets() {
        assert_eq!(extract_action_payload("  nothing to do  "), "nothing to do");
    }

    #[test]
    fn test_extract_narrows_to_outer_brackets() {
        let raw = "Here are the edits: [{\"data\":{\"0\":\"[x]\"}}] hope that helps";
        assert_eq!(extract_action_payload(raw), r#"[{"data":{"0":"[x]"}}]"#);
    }

    #[test]
    fn test_strip_embedded_blocks() {
        let text = "<think>plan it</think>Alice waves.<tableEdit>[...]</tableEdit> Bob nods.";
        assert_eq!(strip_embedded_blocks(text), "Alice waves. Bob nods.");
    }

    #[test]
    fn test_strip_embedded_blocks_is_multiline() {
        let text = "Hello\n<thinking>\nline one\nline two\n</thinking>\nworld";
        assert_eq!(strip_embedded_blocks(text), "Hello\n\nworld");
    }

    #[test]
    fn test_truncate_str_respects_char_boundaries() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("abcdefghij", 8), "abcde...");
        let s = "ééééé";
        let out = truncate_str(s, 6);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 6);
    }
}
