//! Protocol version tags.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;

/// A `(major, minor, patch)` version tag for an implementation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self { major, minor, patch }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = InvariantViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || InvariantViolation::InvalidInput(format!("not a major.minor.patch version: {s:?}"));
        let mut parts = s.trim().split('.').map(|p| p.parse::<u8>().map_err(|_| bad()));
        let major = parts.next().ok_or_else(bad)??;
        let minor = parts.next().ok_or_else(bad)??;
        let patch = parts.next().ok_or_else(bad)??;
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(Self { major, minor, patch })
    }
}
