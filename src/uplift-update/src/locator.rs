//! Repository locator (`owner/name`).

use std::fmt;
use std::str::FromStr;

use crate::error::UpdateError;

/// Owner/repository pair identifying a hosting-provider project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoLocator {
    owner: String,
    name: String,
}

impl RepoLocator {
    /// Build a locator from its two halves.
    pub fn new(owner: &str, name: &str) -> Result<Self, UpdateError> {
        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };

        let (owner, name) = (owner.trim(), name.trim());
        if !valid(owner) || !valid(name) {
            return Err(UpdateError::InvalidLocator {
                locator: format!("{owner}/{name}"),
            });
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased `owner-name`, the prefix the hosting provider gives the
    /// top-level folder of a generated source archive.
    pub fn archive_prefix(&self) -> String {
        format!("{}-{}", self.owner, self.name).to_lowercase()
    }
}

impl FromStr for RepoLocator {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_matches('/');
        match s.split_once('/') {
            Some((owner, name)) if !name.contains('/') => Self::new(owner, name),
            _ => Err(UpdateError::InvalidLocator {
                locator: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RepoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
