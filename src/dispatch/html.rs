//! Plain-text rendering of HTML message bodies.

use std::sync::LazyLock;

use regex::Regex;

static BREAKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*br\s*/?\s*>|<\s*/\s*(p|div|li|tr|h[1-6])\s*>").expect("valid regex")
});
static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex"));

/// Strips tags from `html`, keeping line structure for block elements.
pub fn strip_html(html: &str) -> String {
    let text = BREAKS.replace_all(html, "\n");
    let text = TAGS.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = BLANK_LINES.replace_all(&text, "\n\n");

    text.trim().to_owned()
}

fn decode_entities(text: &str) -> String {
    // &amp; last, so "&amp;lt;" stays "&lt;"
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_tags() {
        assert_eq!(
            strip_html("<b>Hello</b> <a href=\"https://x.y\">there</a>"),
            "Hello there"
        );
    }

    #[test]
    fn test_block_elements_become_lines() {
        assert_eq!(
            strip_html("<p>Hi Ana,</p><p>Quick question.</p>Line<br/>break"),
            "Hi Ana,\nQuick question.\nLine\nbreak"
        );
    }

    #[test]
    fn test_decodes_entities_once() {
        assert_eq!(strip_html("Tom &amp; Jerry &amp;lt;3"), "Tom & Jerry &lt;3");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(strip_html("  just text \n"), "just text");
    }
}
