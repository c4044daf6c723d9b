//! Claim topics and claim identifiers.
//!
//! A claim topic is an opaque number (KYC, accreditation, residency...).
//! A claim id is derived from the issuer and the topic, so an identity holds
//! at most one claim per issuer per topic and a verifier can look a claim up
//! directly instead of scanning.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::Address;
use crate::canonical::CanonicalBytes;
use crate::digest::{from_hex, sha256_digest, to_hex};

/// An opaque claim topic id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimTopic(pub u64);

impl std::fmt::Display for ClaimTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The id of a claim on an identity: `sha256(jcs({issuer, topic}))`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClaimId(pub [u8; 32]);

impl ClaimId {
    pub fn derive(issuer: &Address, topic: ClaimTopic) -> Self {
        let seed = serde_json::json!({ "issuer": issuer.to_string(), "topic": topic.0 });
        match CanonicalBytes::new(&seed) {
            Ok(cb) => Self(*sha256_digest(&cb).as_bytes()),
            Err(_) => Self([0u8; 32]),
        }
    }
}

impl std::fmt::Display for ClaimId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", to_hex(&self.0))
    }
}

impl std::fmt::Debug for ClaimId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClaimId(0x{}..)", to_hex(&self.0[..4]))
    }
}

impl Serialize for ClaimId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ClaimId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = from_hex(&s)
            .filter(|b| b.len() == 32)
            .ok_or_else(|| serde::de::Error::custom(format!("not a 32-byte claim id: {s:?}")))?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}
