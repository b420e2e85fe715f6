//! Parsed readme document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::header::{REQUIRES_PLATFORM, REQUIRES_RUNTIME, STABLE_TAG, TESTED_UP_TO, header_field};
use crate::normalize::normalize;
use crate::render::render_section;
use crate::section::split_sections;

/// How section bodies are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionFormat {
    /// Bodies as found in the normalized text
    Raw,
    /// Bodies converted to HTML for display
    #[default]
    Html,
}

/// Structured fields extracted from a readme.
///
/// Built fresh on every parse; absent headers stay `None` rather than being
/// filled with placeholder text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadmeDocument {
    /// `Stable tag` header
    pub version: Option<String>,
    /// `Requires at least` header
    pub requires_platform: Option<String>,
    /// `Requires PHP` header
    pub requires_runtime: Option<String>,
    /// `Tested up to` header
    pub tested_up_to: Option<String>,
    /// Lowercased section name to body, in order of first appearance
    pub sections: IndexMap<String, String>,
}

impl ReadmeDocument {
    /// True when nothing at all could be extracted.
    pub fn is_empty(&self) -> bool {
        self.version.is_none()
            && self.requires_platform.is_none()
            && self.requires_runtime.is_none()
            && self.tested_up_to.is_none()
            && self.sections.is_empty()
    }
}

/// Parse a readme with HTML-rendered sections.
pub fn parse(text: &str) -> ReadmeDocument {
    parse_with(text, SectionFormat::Html)
}

/// Parse a readme keeping section bodies as normalized markup.
pub fn parse_raw(text: &str) -> ReadmeDocument {
    parse_with(text, SectionFormat::Raw)
}

/// Parse a readme, choosing the section body format.
pub fn parse_with(text: &str, format: SectionFormat) -> ReadmeDocument {
    let data = normalize(text);

    let sections = match format {
        SectionFormat::Raw => split_sections(&data, |body| body.to_string()),
        SectionFormat::Html => split_sections(&data, render_section),
    };

    ReadmeDocument {
        version: header_field(&data, STABLE_TAG),
        requires_platform: header_field(&data, REQUIRES_PLATFORM),
        requires_runtime: header_field(&data, REQUIRES_RUNTIME),
        tested_up_to: header_field(&data, TESTED_UP_TO),
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WP_README: &str = "=== Acme Widget ===\r\n\
        Contributors: acme\r\n\
        Requires at least: 6.2\r\n\
        Tested up to: 6.6\r\n\
        Requires PHP: 8.0\r\n\
        Stable tag: 2.1.0\r\n\
        \r\n\
        == Description ==\r\n\
        Adds **widgets**.\r\n\
        \r\n\
        == Installation ==\r\n\
        == From the dashboard ==\r\n\
        1. Search\r\n\
        2. Install\r\n\
        \r\n\
        == Changelog ==\r\n\
        = 2.1.0 =\r\n\
        * Fixed things\r\n";

    const MD_README: &str = "# Acme Widget\n\
        Stable tag: 2.1.0\n\
        Requires PHP: 8.0\n\
        \n\
        ## Description\n\
        Adds widgets.\n\
        \n\
        ## FAQ\n\
        ### Does it work?\n\
        Yes.\n";

    #[test]
    fn test_headers() {
        let doc = parse(WP_README);
        assert_eq!(doc.version.as_deref(), Some("2.1.0"));
        assert_eq!(doc.requires_platform.as_deref(), Some("6.2"));
        assert_eq!(doc.requires_runtime.as_deref(), Some("8.0"));
        assert_eq!(doc.tested_up_to.as_deref(), Some("6.6"));
    }

    #[test]
    fn test_raw_sections() {
        let doc = parse_raw(WP_README);
        assert_eq!(
            doc.sections.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["description", "installation", "changelog"]
        );
        assert_eq!(doc.sections["description"], "Adds **widgets**.");
        assert_eq!(
            doc.sections["installation"],
            "== From the dashboard ==\n\n1. Search\n2. Install"
        );
        assert_eq!(doc.sections["changelog"], "= 2.1.0 =\n* Fixed things");
    }

    #[test]
    fn test_rendered_sections() {
        let doc = parse(WP_README);
        assert!(doc.sections["description"].contains("<strong>widgets</strong>"));
        assert!(doc.sections["installation"].contains("<h3>From the dashboard</h3>"));
        assert!(doc.sections["installation"].contains("<ol>"));
        assert!(doc.sections["changelog"].contains("<h4>2.1.0</h4>"));
    }

    #[test]
    fn test_markdown_dialect_converges() {
        let doc = parse_raw(MD_README);
        assert_eq!(doc.version.as_deref(), Some("2.1.0"));
        assert_eq!(doc.requires_runtime.as_deref(), Some("8.0"));
        assert_eq!(doc.sections["description"], "Adds widgets.");
        assert_eq!(doc.sections["faq"], "=== Does it work? ===\nYes.");

        let html = parse(MD_README);
        assert!(html.sections["faq"].contains("<h2>Does it work?</h2>"));
    }

    #[test]
    fn test_reparse_normalized_is_stable() {
        for text in [WP_README, MD_README] {
            let first = parse_raw(text);
            let again = parse_raw(&normalize(text));
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_garbage_yields_empty_document() {
        let doc = parse("\u{0}\u{1}not a readme at all ==\n= =\n");
        assert!(doc.is_empty());
        assert_eq!(doc, ReadmeDocument::default());
    }

    #[test]
    fn test_serializes_sections_in_order() {
        let doc = parse_raw("== B ==\nb\n== A ==\na\n");
        let json = serde_json::to_string(&doc.sections).unwrap();
        assert_eq!(json, r#"{"b":"b","a":"a"}"#);
    }
}
