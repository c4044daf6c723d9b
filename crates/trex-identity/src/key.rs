//! Purpose-scoped keys (ERC-734).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use trex_core::KeyHash;

/// What a key is allowed to do on an identity.
///
/// MANAGEMENT implies every other purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPurpose {
    /// Manage keys and approve executions targeting the identity itself.
    Management,
    /// Act on behalf of the identity toward other contracts.
    Action,
    /// Sign and manage claims.
    Claim,
    /// Encrypt data for the identity.
    Encryption,
}

impl KeyPurpose {
    /// The ERC-734 numeric purpose.
    pub fn code(self) -> u64 {
        match self {
            Self::Management => 1,
            Self::Action => 2,
            Self::Claim => 3,
            Self::Encryption => 4,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::Management),
            2 => Some(Self::Action),
            3 => Some(Self::Claim),
            4 => Some(Self::Encryption),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Management => "MANAGEMENT",
            Self::Action => "ACTION",
            Self::Claim => "CLAIM",
            Self::Encryption => "ENCRYPTION",
        }
    }
}

impl std::fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signature scheme of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Ecdsa,
    Rsa,
    Ed25519,
}

impl KeyType {
    pub fn code(self) -> u64 {
        match self {
            Self::Ecdsa => 1,
            Self::Rsa => 2,
            Self::Ed25519 => 3,
        }
    }
}

/// A key stored on an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub key: KeyHash,
    pub purposes: BTreeSet<KeyPurpose>,
    pub key_type: KeyType,
}

impl Key {
    pub fn new(key: KeyHash, purpose: KeyPurpose, key_type: KeyType) -> Self {
        Self {
            key,
            purposes: BTreeSet::from([purpose]),
            key_type,
        }
    }

    /// Holds `purpose` directly or through MANAGEMENT.
    pub fn has_purpose(&self, purpose: KeyPurpose) -> bool {
        self.purposes.contains(&KeyPurpose::Management) || self.purposes.contains(&purpose)
    }
}
