//! Version validation and comparison.

use std::cmp::Ordering;

/// Result of comparing two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComparison {
    /// Current is older than target
    Older,
    /// Current equals target
    Equal,
    /// Current is newer than target
    Newer,
}

impl From<Ordering> for VersionComparison {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => Self::Older,
            Ordering::Equal => Self::Equal,
            Ordering::Greater => Self::Newer,
        }
    }
}

/// Compare two dotted version strings.
///
/// Numeric components compare numerically, missing components count as zero
/// (`1.2` equals `1.2.0`), a leading `v` and `+build` metadata are ignored. A
/// prerelease (`1.0.0-beta.2`) sorts before its release.
pub fn compare_versions(current: &str, target: &str) -> VersionComparison {
    let current = ParsedVersion::parse(current);
    let target = ParsedVersion::parse(target);
    current.cmp(&target).into()
}

/// Check whether `remote` would be an upgrade from `local`.
pub fn is_newer(local: &str, remote: &str) -> bool {
    compare_versions(local, remote) == VersionComparison::Older
}

/// Check that a string is a comparable version: numeric dotted release part
/// with no empty components, optionally followed by `-prerelease`.
pub fn is_valid_version(version: &str) -> bool {
    let version = strip_prefix(version.trim());
    let version = version.split_once('+').map_or(version, |(v, _)| v);
    let (release, prerelease) = match version.split_once('-') {
        Some((release, pre)) => (release, Some(pre)),
        None => (version, None),
    };

    let release_ok = !release.is_empty()
        && release
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));

    let prerelease_ok = prerelease.is_none_or(|pre| {
        pre.split('.').all(|ident| {
            !ident.is_empty() && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
    });

    release_ok && prerelease_ok
}

fn strip_prefix(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

#[derive(Debug, PartialEq, Eq)]
enum Identifier {
    Numeric(u64),
    Alpha(String),
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Numeric(_), Self::Alpha(_)) => Ordering::Less,
            (Self::Alpha(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Alpha(a), Self::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedVersion {
    release: Vec<u64>,
    prerelease: Vec<Identifier>,
}

impl ParsedVersion {
    fn parse(version: &str) -> Self {
        let version = strip_prefix(version.trim());
        let version = version.split_once('+').map_or(version, |(v, _)| v);
        let (release, prerelease) = version.split_once('-').unwrap_or((version, ""));

        let mut release: Vec<u64> = release
            .split('.')
            .map(|part| {
                // keep the leading digits of loose parts like "2rc1"
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().unwrap_or(0)
            })
            .collect();
        while release.len() > 1 && release.last() == Some(&0) {
            release.pop();
        }

        let prerelease = prerelease
            .split('.')
            .filter(|ident| !ident.is_empty())
            .map(|ident| match ident.parse::<u64>() {
                Ok(n) => Identifier::Numeric(n),
                Err(_) => Identifier::Alpha(ident.to_ascii_lowercase()),
            })
            .collect();

        Self { release, prerelease }
    }
}

impl Ord for ParsedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }

        match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.prerelease.cmp(&other.prerelease),
        }
    }
}

impl PartialOrd for ParsedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
