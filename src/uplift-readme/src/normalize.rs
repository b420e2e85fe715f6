//! Line-ending and heading normalization.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,5}) (.*)$").expect("Invalid heading regex"));

/// Normalize line endings to `\n` and rewrite Markdown headings (`#` to
/// `#####`) into the `= Title =` convention with the same nesting depth.
///
/// Already-normalized text passes through unchanged.
pub fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    MARKDOWN_HEADING
        .replace_all(&text, |caps: &Captures<'_>| {
            let marker = "=".repeat(caps[1].len());
            // closing `##` sequences are decoration in Markdown
            let title = caps[2].trim_end().trim_end_matches('#').trim_end();
            format!("{marker} {title} {marker}")
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_line_endings() {
        assert_eq!(normalize("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_markdown_levels() {
        let input = "# One\n## Two\n### Three\n#### Four\n##### Five\n";
        assert_eq!(
            normalize(input),
            "= One =\n== Two ==\n=== Three ===\n==== Four ====\n===== Five =====\n"
        );
    }

    #[test]
    fn test_six_hashes_untouched() {
        assert_eq!(normalize("###### Deep"), "###### Deep");
    }

    #[test]
    fn test_closing_hashes_dropped() {
        assert_eq!(normalize("## Changelog ##"), "== Changelog ==");
    }

    #[test]
    fn test_hash_without_space_untouched() {
        assert_eq!(normalize("#hashtag"), "#hashtag");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize("## FAQ\r\nQ?\r\n");
        assert_eq!(normalize(&once), once);
    }
}
