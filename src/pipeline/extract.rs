//! Reply extraction: raw decoded transcript → clean analysis text.
//!
//! A decoded chat transcript repeats the user turn before the generated
//! reply. Everything after the first `Assistant:` marker is the reply; when
//! the marker is missing the whole output is kept (fail-open). The result is
//! then restricted to Latin-1 so the standard PDF fonts can always print it.

use crate::prompts::ASSISTANT_MARKER;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_ASSISTANT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"{}\s*", regex::escape(ASSISTANT_MARKER))).unwrap()
});

/// Isolate the assistant reply and drop characters the report cannot encode.
///
/// Never fails: a missing marker returns the trimmed input, and unsupported
/// characters (emoji, typographic quotes outside Latin-1, CJK…) are removed
/// silently.
pub fn extract(raw_output: &str) -> String {
    sanitize_latin1(isolate_reply(raw_output))
}

/// Return the text after the first role marker, trimmed.
///
/// The marker match is case-sensitive and swallows any whitespace that
/// follows it.
pub fn isolate_reply(raw_output: &str) -> &str {
    match RE_ASSISTANT_MARKER.find(raw_output) {
        Some(m) => raw_output[m.end()..].trim(),
        None => raw_output.trim(),
    }
}

/// Keep only characters in U+0000..=U+00FF.
pub fn sanitize_latin1(text: &str) -> String {
    text.chars().filter(|&c| is_latin1(c)).collect()
}

/// `true` if `c` has a single-byte Latin-1 encoding.
pub fn is_latin1(c: char) -> bool {
    (c as u32) <= 0xFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_text_after_marker() {
        let raw = "User: What does this show?\nAssistant: Sales rose 12% in Q2.";
        assert_eq!(extract(raw), "Sales rose 12% in Q2.");
    }

    #[test]
    fn only_first_marker_splits() {
        let raw = "User: x Assistant: first part. Assistant: second part.";
        assert_eq!(extract(raw), "first part. Assistant: second part.");
    }

    #[test]
    fn marker_followed_by_newlines() {
        let raw = "User:<image>Analyze\nAssistant:\n\n  The line trends upward.  \n";
        assert_eq!(extract(raw), "The line trends upward.");
    }

    #[test]
    fn missing_marker_is_fail_open() {
        assert_eq!(extract("  no markers here \n"), "no markers here");
    }

    #[test]
    fn marker_is_case_sensitive() {
        let raw = "assistant: lower case is not a marker";
        assert_eq!(extract(raw), raw);
    }

    #[test]
    fn strips_non_latin1() {
        let raw = "Assistant: Revenue 📈 up \u{2014} strongly \u{201C}so\u{201D} caf\u{e9}";
        let out = extract(raw);
        assert_eq!(out, "Revenue  up  strongly so caf\u{e9}");
        assert!(out.chars().all(is_latin1));
    }

    #[test]
    fn sanitize_handles_only_unsupported() {
        assert_eq!(sanitize_latin1("🙂🙂"), "");
        assert_eq!(extract("Assistant: 🙂"), "");
    }

    #[test]
    fn isolate_reply_keeps_unicode() {
        assert_eq!(isolate_reply("Assistant: ✓ ok"), "✓ ok");
    }

    #[test]
    fn empty_input() {
        assert_eq!(extract(""), "");
    }
}
