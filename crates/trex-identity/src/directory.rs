//! Read-only lookups across all identities.
//!
//! Registries and managers never hold identities; they query them through
//! this trait at the moment they need an answer.

use std::collections::BTreeMap;

use trex_core::{Address, ClaimId, ClaimTopic, KeyHash};

use crate::claim::Claim;
use crate::identity::Identity;
use crate::key::KeyPurpose;

pub trait IdentityDirectory {
    fn contains(&self, identity: &Address) -> bool;

    fn key_has_purpose(&self, identity: &Address, key: &KeyHash, purpose: KeyPurpose) -> bool;

    fn claim(&self, identity: &Address, claim_id: &ClaimId) -> Option<Claim>;

    /// Whether `issuer` vouches for a claim about `subject`.
    fn is_claim_valid(
        &self,
        issuer: &Address,
        subject: &Address,
        topic: ClaimTopic,
        signature: &[u8],
        data: &[u8],
    ) -> bool;

    /// Whether `wallet` holds `purpose` on `identity`.
    fn wallet_has_purpose(&self, identity: &Address, wallet: &Address, purpose: KeyPurpose) -> bool {
        self.key_has_purpose(identity, &KeyHash::of_address(wallet), purpose)
    }
}

impl<P: Clone> IdentityDirectory for BTreeMap<Address, Identity<P>> {
    fn contains(&self, identity: &Address) -> bool {
        self.contains_key(identity)
    }

    fn key_has_purpose(&self, identity: &Address, key: &KeyHash, purpose: KeyPurpose) -> bool {
        self.get(identity).is_some_and(|id| id.key_has_purpose(key, purpose))
    }

    fn claim(&self, identity: &Address, claim_id: &ClaimId) -> Option<Claim> {
        self.get(identity).and_then(|id| id.get_claim(claim_id)).cloned()
    }

    fn is_claim_valid(
        &self,
        issuer: &Address,
        subject: &Address,
        topic: ClaimTopic,
        signature: &[u8],
        data: &[u8],
    ) -> bool {
        self.get(issuer)
            .is_some_and(|id| id.is_claim_valid(subject, topic, signature, data))
    }
}
