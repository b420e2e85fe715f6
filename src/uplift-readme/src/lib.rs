//! Uplift Readme - turns a plugin readme into structured fields.
//!
//! Two lightweight-markup dialects are accepted and converge on one internal
//! representation before anything is extracted:
//! - `=== Title ===` / `== Section ==` / `= Sub =` headings
//! - Markdown `#` through `#####` headings
//!
//! # Example
//!
//! ```rust
//! let doc = uplift_readme::parse("=== Widget ===\nStable tag: 1.2.0\n\n== Description ==\nHello.\n");
//! assert_eq!(doc.version.as_deref(), Some("1.2.0"));
//! assert!(doc.sections["description"].contains("<p>Hello.</p>"));
//! ```
//!
//! Parsing never fails: input without headers or headings yields an empty
//! document.

mod document;
mod header;
mod normalize;
mod render;
mod section;

pub use document::{ReadmeDocument, SectionFormat, parse, parse_raw, parse_with};
pub use header::{
    REQUIRES_PLATFORM, REQUIRES_RUNTIME, STABLE_TAG, TESTED_UP_TO, header_field,
};
pub use normalize::normalize;
pub use render::render_section;
