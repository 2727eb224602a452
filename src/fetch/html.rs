//! Tolerant HTML-to-text cleaning for post bodies and comment text.
//!
//! Reddit's RSS/Atom feeds carry content as HTML-escaped markup (e.g.
//! `&lt;div&gt;Body text&lt;/div&gt;`). This module unescapes entities,
//! strips tags with `scraper`'s fragment parser (tolerant of malformed
//! HTML the way a naive regex strip is not), and collapses whitespace.

use scraper::Html;

/// Unescape HTML entities, strip tags, and collapse whitespace.
pub fn clean_html(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let text: String = fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    collapse_whitespace(&text)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        let cleaned = clean_html("<div>Test   Body</div>\n\n<p>more</p>");
        assert_eq!(cleaned, "Test Body more");
    }

    #[test]
    fn unescapes_entities() {
        let cleaned = clean_html("<p>Tom &amp; Jerry &lt;3&gt;</p>");
        assert_eq!(cleaned, "Tom & Jerry <3>");
    }

    #[test]
    fn handles_empty_input() {
        assert_eq!(clean_html(""), "");
    }

    #[test]
    fn tolerates_malformed_markup() {
        let cleaned = clean_html("<div>unclosed <span>tags");
        assert_eq!(cleaned, "unclosed tags");
    }
}
