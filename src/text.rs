// src/text.rs
// Cleanup applied to scraped titles and bodies before they reach the
// enrichment prompt: entity decode, tag strip, whitespace collapse, cap.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Upper bound on stored article body length; anything longer adds prompt
/// cost without adding signal.
const MAX_CONTENT_CHARS: usize = 4000;

pub fn clean_fragment(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // Curly quotes to ASCII so downstream JSON prompts stay predictable
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_CONTENT_CHARS {
        out = out.chars().take(MAX_CONTENT_CHARS).collect();
    }
    out
}

/// Title cleanup: same pipeline, but an empty result falls back to a stub
/// so reports never render an anchor with no text.
pub fn clean_title(s: &str) -> String {
    let out = clean_fragment(s);
    if out.is_empty() {
        "(untitled)".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_entities() {
        let s = "<p>Hello&nbsp;&amp; <b>world</b></p>";
        assert_eq!(clean_fragment(s), "Hello & world");
    }

    #[test]
    fn collapses_whitespace_and_normalizes_quotes() {
        let s = "  \u{201C}Rust\u{201D}\n\n 1.80   released ";
        assert_eq!(clean_fragment(s), "\"Rust\" 1.80 released");
    }

    #[test]
    fn caps_very_long_content() {
        let s = "x".repeat(MAX_CONTENT_CHARS + 500);
        assert_eq!(clean_fragment(&s).chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn empty_title_gets_stub() {
        assert_eq!(clean_title("<span></span>"), "(untitled)");
    }
}
