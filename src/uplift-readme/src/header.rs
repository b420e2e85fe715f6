//! `Key: value` header line extraction.

use regex::RegexBuilder;

/// Header carrying the released version
pub const STABLE_TAG: &str = "Stable tag";

/// Header carrying the minimum host platform version
pub const REQUIRES_PLATFORM: &str = "Requires at least";

/// Header carrying the minimum runtime version
pub const REQUIRES_RUNTIME: &str = "Requires PHP";

/// Header carrying the newest platform version the component was tested with
pub const TESTED_UP_TO: &str = "Tested up to";

/// Return the value of the first line containing `key:`, case-insensitively.
///
/// The key may be preceded by decoration on the same line (` * Version:` in a
/// source file header). Blank values count as absent.
pub fn header_field(text: &str, key: &str) -> Option<String> {
    let pattern = format!(r"^.*?{}:(.*)$", regex::escape(key));
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .ok()?;

    let value = re.captures(text)?.get(1)?.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
