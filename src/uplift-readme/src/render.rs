//! Section body rendering to HTML.

use std::sync::LazyLock;

use pulldown_cmark::{Options, Parser, html};
use regex::{Captures, Regex};

static BODY_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(={1,5}) (.+?) ={1,5}[ \t]*$").expect("Invalid heading regex")
});

/// Block-heading tag for a heading with `depth` markers.
///
/// Three markers is the document title level in this dialect, so it maps to
/// the largest heading a detail view shows.
fn heading_tag(depth: usize) -> &'static str {
    match depth {
        3 => "h2",
        2 => "h3",
        1 => "h4",
        4 => "h5",
        _ => "h6",
    }
}

/// Convert a section body to HTML.
///
/// Headings inside the body become block-heading tags first, then the rest
/// goes through a CommonMark renderer (tables and strikethrough enabled).
pub fn render_section(body: &str) -> String {
    let body = BODY_HEADING.replace_all(body, |caps: &Captures<'_>| {
        let tag = heading_tag(caps[1].len());
        // trailing blank line closes the raw HTML block before the next paragraph
        format!("<{tag}>{}</{tag}>\n", caps[2].trim())
    });

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(&body, options);
    let mut out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_mapping() {
        let html = render_section("== Manual ==\n\nUnzip it.");
        assert!(html.contains("<h3>Manual</h3>"), "{html}");
        assert!(html.contains("<p>Unzip it.</p>"), "{html}");
    }

    #[test]
    fn test_all_levels() {
        assert!(render_section("= Sub =").contains("<h4>Sub</h4>"));
        assert!(render_section("=== Top ===").contains("<h2>Top</h2>"));
        assert!(render_section("==== Deep ====").contains("<h5>Deep</h5>"));
    }

    #[test]
    fn test_heading_followed_by_list() {
        let html = render_section("= 2.1.0 =\n* Fixed things");
        assert!(html.contains("<h4>2.1.0</h4>"), "{html}");
        assert!(html.contains("<li>Fixed things</li>"), "{html}");
    }

    #[test]
    fn test_markdown_list() {
        let html = render_section("* one\n* two");
        assert!(html.contains("<ul>"));
        assert!(html.contains("<li>one</li>"));
    }

    #[test]
    fn test_inline_equals_untouched() {
        let html = render_section("a = b = c");
        assert!(html.contains("<p>a = b = c</p>"), "{html}");
    }
}
