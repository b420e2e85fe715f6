//! Section boundary detection.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

/// `== Title ==` on its own line, exactly two markers on each side.
static SECTION_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^==([^=].*[^=])==[ \t]*$").expect("Invalid section regex")
});

/// `##Title` left behind when the Markdown heading had no space after `##`.
static MARKDOWN_SECTION_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^##([^#\n]+?)#*[ \t]*$").expect("Invalid section regex")
});

/// One detected heading and the text it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Heading<'a> {
    title: &'a str,
    opening: &'static str,
    closing: &'static str,
    body: &'a str,
}

fn detect(text: &str) -> Vec<Heading<'_>> {
    let (re, opening, closing) = if SECTION_HEADING.is_match(text) {
        (&*SECTION_HEADING, "==", "==")
    } else {
        (&*MARKDOWN_SECTION_HEADING, "##", "")
    };

    let spans: Vec<(usize, usize, &str)> = re
        .captures_iter(text)
        .filter_map(|caps| {
            let line = caps.get(0)?;
            let title = caps.get(1)?.as_str().trim();
            (!title.is_empty()).then_some((line.start(), line.end(), title))
        })
        .collect();

    spans
        .iter()
        .enumerate()
        .map(|(i, &(_, line_end, title))| {
            let body_start = (line_end + 1).min(text.len());
            let body_end = spans.get(i + 1).map_or(text.len(), |next| next.0);
            Heading {
                title,
                opening,
                closing,
                body: text.get(body_start..body_end.max(body_start)).unwrap_or(""),
            }
        })
        .collect()
}

/// Split normalized text into `lowercased title -> body` in order of
/// appearance, passing each non-empty body through `finish`.
///
/// A heading with no body stays pending: the next heading's markup is folded
/// into the following body, which is then filed under the pending title.
/// Recurring titles append to the existing body after a blank line.
pub(crate) fn split_sections<F>(text: &str, mut finish: F) -> IndexMap<String, String>
where
    F: FnMut(&str) -> String,
{
    let mut sections: IndexMap<String, String> = IndexMap::new();
    let mut pending: Option<&str> = None;

    for heading in detect(text) {
        let mut title = heading.title;
        let mut content = String::new();

        if let Some(pending_title) = pending.take() {
            let markup = format!("{} {} {}", heading.opening, heading.title, heading.closing);
            content.push_str(markup.trim_end());
            content.push_str("\n\n");
            title = pending_title;
        }
        content.push_str(heading.body.trim());

        let content = content.trim();
        if content.is_empty() {
            pending = Some(title);
            continue;
        }

        let rendered = finish(content);
        let rendered = rendered.trim();
        sections
            .entry(title.to_lowercase())
            .and_modify(|existing| {
                existing.push_str("\n\n");
                existing.push_str(rendered);
            })
            .or_insert_with(|| rendered.to_string());
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(text: &str) -> IndexMap<String, String> {
        split_sections(text, |body| body.to_string())
    }

    #[test]
    fn test_basic_sections() {
        let text = "=== Widget ===\nintro\n\n== Description ==\nFirst.\n\n== Changelog ==\n* 1.0\n";
        let sections = raw(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections["description"], "First.");
        assert_eq!(sections["changelog"], "* 1.0");
    }

    #[test]
    fn test_title_level_is_not_a_section() {
        let sections = raw("=== Widget ===\nonly a title\n");
        assert!(sections.is_empty());
    }

    #[test]
    fn test_consecutive_headings_fold_into_pending() {
        let text = "== Installation ==\n== Manual ==\nUnzip it.\n";
        let sections = raw(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections["installation"], "== Manual ==\n\nUnzip it.");
    }

    #[test]
    fn test_heading_with_body_is_not_folded() {
        let text = "== A ==\nalpha\n== B ==\nbeta\n";
        let sections = raw(text);
        assert_eq!(sections["a"], "alpha");
        assert_eq!(sections["b"], "beta");
    }

    #[test]
    fn test_trailing_empty_heading_dropped() {
        let sections = raw("== A ==\nalpha\n== Empty ==\n");
        assert_eq!(sections.len(), 1);
        assert!(!sections.contains_key("empty"));
    }

    #[test]
    fn test_recurring_titles_concatenate() {
        let text = "== FAQ ==\nfirst\n== Other ==\nx\n== faq ==\nsecond\n";
        let sections = raw(text);
        assert_eq!(sections["faq"], "first\n\nsecond");
        assert_eq!(sections.keys().collect::<Vec<_>>(), vec!["faq", "other"]);
    }

    #[test]
    fn test_markdown_fallback() {
        let text = "##Usage\nrun it\n##Notes##\nnone\n";
        let sections = raw(text);
        assert_eq!(sections["usage"], "run it");
        assert_eq!(sections["notes"], "none");
    }

    #[test]
    fn test_blank_title_ignored() {
        assert!(raw("==   ==\nbody\n").is_empty());
    }

    #[test]
    fn test_headingless_input() {
        assert!(raw("just some text\nwith lines\n").is_empty());
        assert!(raw("").is_empty());
    }
}
