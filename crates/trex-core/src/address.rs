//! # Addresses and Key Hashes
//!
//! `Address` identifies every principal the protocol deals with: wallets,
//! identities, and the contracts of a token suite. `KeyHash` is the form in
//! which a key is stored on an identity; a wallet's key hash is the digest
//! of its address, so a wallet can be checked against an identity's key
//! table without the identity ever storing the wallet itself.
//!
//! Contract addresses are derived, never chosen:
//!
//! - [`Address::derive`]: from the deployer and its deployment nonce.
//! - [`Address::derive_salted`]: from the deployer, a human-chosen salt and
//!   a component label, so a factory can predict a whole suite's addresses.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::canonical::CanonicalBytes;
use crate::digest::{from_hex, sha256_digest, to_hex};
use crate::error::{CanonicalizationError, InvariantViolation};

/// A 20-byte principal address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Used as the counterparty of mints and burns.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Whether this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Derive a contract address from its deployer and deployment nonce.
    pub fn derive(deployer: &Address, nonce: u64) -> Result<Self, CanonicalizationError> {
        let seed = serde_json::json!({
            "deployer": deployer.to_string(),
            "nonce": nonce,
        });
        Ok(Self::from_digest_bytes(&CanonicalBytes::new(&seed)?))
    }

    /// Derive a contract address from its deployer, a salt and a label.
    ///
    /// The same `(deployer, salt, label)` always yields the same address.
    pub fn derive_salted(
        deployer: &Address,
        salt: &str,
        label: &str,
    ) -> Result<Self, CanonicalizationError> {
        let seed = serde_json::json!({
            "deployer": deployer.to_string(),
            "salt": salt,
            "label": label,
        });
        Ok(Self::from_digest_bytes(&CanonicalBytes::new(&seed)?))
    }

    /// A stable address for a named principal. Handy for wallets in tooling
    /// and tests, where the name is all the caller has.
    pub fn from_label(label: &str) -> Self {
        match CanonicalBytes::new(&label) {
            Ok(cb) => Self::from_digest_bytes(&cb),
            Err(_) => Self::ZERO,
        }
    }

    fn from_digest_bytes(cb: &CanonicalBytes) -> Self {
        let digest = sha256_digest(cb);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest.as_bytes()[12..]);
        Self(out)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", to_hex(&self.0))
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address(0x{}..)", to_hex(&self.0[..4]))
    }
}

impl FromStr for Address {
    type Err = InvariantViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = from_hex(s)
            .filter(|b| b.len() == 20)
            .ok_or_else(|| InvariantViolation::InvalidInput(format!("not a 20-byte address: {s:?}")))?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The hash under which a key is stored on an identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyHash(pub [u8; 32]);

impl KeyHash {
    /// The key hash of a wallet address.
    pub fn of_address(address: &Address) -> Self {
        match CanonicalBytes::new(&serde_json::json!({ "address": address.to_string() })) {
            Ok(cb) => Self(*sha256_digest(&cb).as_bytes()),
            Err(_) => Self([0u8; 32]),
        }
    }

    /// The key hash of a raw public key (used for claim signing keys).
    pub fn of_public_key(public_key: &[u8; 32]) -> Self {
        match CanonicalBytes::new(&serde_json::json!({ "public_key": to_hex(public_key) })) {
            Ok(cb) => Self(*sha256_digest(&cb).as_bytes()),
            Err(_) => Self([0u8; 32]),
        }
    }

    /// Render as lowercase hex.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl std::fmt::Display for KeyHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl std::fmt::Debug for KeyHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyHash(0x{}..)", to_hex(&self.0[..4]))
    }
}

impl Serialize for KeyHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for KeyHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = from_hex(&s)
            .filter(|b| b.len() == 32)
            .ok_or_else(|| serde::de::Error::custom(format!("not a 32-byte key hash: {s:?}")))?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}
