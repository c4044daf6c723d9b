//! # Eligibility
//!
//! A wallet is verified when it is linked to an identity and, for every
//! required claim topic, that identity holds a claim from an issuer that is
//! trusted for the topic *now* and that the issuer still vouches for (its
//! signing key still holds CLAIM and the signature is not revoked).
//!
//! Nothing is cached. Removing an issuer, a topic trust, a claim or an
//! issuer key takes effect on the very next check.

use trex_core::{Address, ClaimId, EligibilityError, EligibilityOracle};
use trex_identity::IdentityDirectory;

use crate::issuers::TrustedIssuersRegistry;
use crate::storage::IdentityRegistryStorage;
use crate::topics::ClaimTopicsRegistry;

/// The collaborators of one identity registry, borrowed for one query.
#[derive(Clone, Copy)]
pub struct Verifier<'a> {
    pub storage: &'a IdentityRegistryStorage,
    pub topics: &'a ClaimTopicsRegistry,
    pub issuers: &'a TrustedIssuersRegistry,
    pub identities: &'a dyn IdentityDirectory,
}

impl std::fmt::Debug for Verifier<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("storage", &self.storage.address())
            .field("topics", &self.topics.ownable().contract())
            .field("issuers", &self.issuers.ownable().contract())
            .finish()
    }
}

impl Verifier<'_> {
    pub fn contains(&self, wallet: &Address) -> bool {
        self.storage.stored(wallet).is_some()
    }
}

impl EligibilityOracle for Verifier<'_> {
    fn verify(&self, wallet: &Address) -> Result<(), EligibilityError> {
        let identity = self
            .storage
            .stored_identity(wallet)
            .ok_or(EligibilityError::NotLinked { wallet: *wallet })?;

        for &topic in self.topics.get_claim_topics() {
            let satisfied = self
                .issuers
                .get_trusted_issuers_for_claim_topic(topic)
                .iter()
                .any(|issuer| {
                    let claim_id = ClaimId::derive(issuer, topic);
                    self.identities
                        .claim(&identity, &claim_id)
                        .is_some_and(|claim| {
                            claim.issuer == *issuer
                                && claim.topic == topic
                                && self.identities.is_claim_valid(
                                    issuer,
                                    &identity,
                                    topic,
                                    &claim.signature,
                                    &claim.data,
                                )
                        })
                });
            if !satisfied {
                return Err(EligibilityError::MissingClaim {
                    wallet: *wallet,
                    identity,
                    topic: topic.0,
                });
            }
        }
        Ok(())
    }

    fn identity_of(&self, wallet: &Address) -> Option<Address> {
        self.storage.stored_identity(wallet)
    }

    fn country_of(&self, wallet: &Address) -> Option<u16> {
        self.storage.stored_investor_country(wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use trex_core::{AgentRole, ClaimTopic, EventBuffer, KeyHash, Ownable};
    use trex_identity::signing::SCHEME_ED25519;
    use trex_identity::{Claim, ClaimSigner, Identity, KeyPurpose, KeyType};

    const KYC: ClaimTopic = ClaimTopic(1);

    struct World {
        storage: IdentityRegistryStorage,
        topics: ClaimTopicsRegistry,
        issuers: TrustedIssuersRegistry,
        identities: BTreeMap<Address, Identity<()>>,
        owner: Address,
        issuer_id: Address,
        issuer_owner: Address,
        signer: ClaimSigner,
        investor: Address,
        investor_id: Address,
    }

    fn world() -> World {
        let owner = Address::from_label("owner");
        let ir = Address::from_label("ir");
        let mut ev = EventBuffer::new();

        let mut storage = IdentityRegistryStorage::new(AgentRole::new(Address::from_label("irs"), owner));
        storage.bind_identity_registry(&owner, ir, &mut ev).unwrap();
        let mut topics = ClaimTopicsRegistry::new(Ownable::new(Address::from_label("ctr"), owner));
        topics.add_claim_topic(&owner, KYC, &mut ev).unwrap();
        let mut issuers = TrustedIssuersRegistry::new(Ownable::new(Address::from_label("tir"), owner));

        let issuer_owner = Address::from_label("issuer-owner");
        let issuer_id = Address::from_label("issuer-identity");
        let signer = ClaimSigner::from_seed(&[5u8; 32]);
        let mut issuer: Identity<()> = Identity::new(issuer_id, KeyHash::of_address(&issuer_owner), &mut ev);
        issuer
            .add_key(&issuer_owner, signer.key_hash(), KeyPurpose::Claim, KeyType::Ed25519, &mut ev)
            .unwrap();
        issuers.add_trusted_issuer(&owner, issuer_id, vec![KYC], &mut ev).unwrap();

        let investor = Address::from_label("investor");
        let investor_id = Address::from_label("investor-identity");
        let mut inv: Identity<()> = Identity::new(investor_id, KeyHash::of_address(&investor), &mut ev);
        let sig = signer.sign_claim(&investor_id, KYC, b"passed").unwrap();
        inv.add_claim(
            &investor,
            Claim {
                topic: KYC,
                scheme: SCHEME_ED25519,
                issuer: issuer_id,
                signature: sig,
                data: b"passed".to_vec(),
                uri: String::new(),
            },
            &mut ev,
        )
        .unwrap();
        storage
            .add_identity_to_storage(&ir, investor, investor_id, 250, &mut ev)
            .unwrap();

        let mut identities = BTreeMap::new();
        identities.insert(issuer_id, issuer);
        identities.insert(investor_id, inv);
        World {
            storage,
            topics,
            issuers,
            identities,
            owner,
            issuer_id,
            issuer_owner,
            signer,
            investor,
            investor_id,
        }
    }

    fn verifier(w: &World) -> Verifier<'_> {
        Verifier {
            storage: &w.storage,
            topics: &w.topics,
            issuers: &w.issuers,
            identities: &w.identities,
        }
    }

    #[test]
    fn test_verified_with_trusted_claim() {
        let w = world();
        let v = verifier(&w);
        assert!(v.verify(&w.investor).is_ok());
        assert_eq!(v.identity_of(&w.investor), Some(w.investor_id));
        assert_eq!(v.country_of(&w.investor), Some(250));
    }

    #[test]
    fn test_unlinked_wallet() {
        let w = world();
        let stranger = Address::from_label("stranger");
        assert_eq!(
            verifier(&w).verify(&stranger),
            Err(EligibilityError::NotLinked { wallet: stranger })
        );
    }

    #[test]
    fn test_issuer_trust_removal_invalidates() {
        let mut w = world();
        let (owner, issuer) = (w.owner, w.issuer_id);
        w.issuers
            .remove_trusted_issuer(&owner, issuer, &mut EventBuffer::new())
            .unwrap();
        assert!(matches!(
            verifier(&w).verify(&w.investor),
            Err(EligibilityError::MissingClaim { topic: 1, .. })
        ));
    }

    #[test]
    fn test_signing_key_removal_invalidates() {
        let mut w = world();
        let (issuer_owner, key) = (w.issuer_owner, w.signer.key_hash());
        w.identities
            .get_mut(&w.issuer_id)
            .unwrap()
            .remove_key(&issuer_owner, key, KeyPurpose::Claim, &mut EventBuffer::new())
            .unwrap();
        assert!(!verifier(&w).is_verified(&w.investor));
    }

    #[test]
    fn test_new_required_topic_unmet() {
        let mut w = world();
        let owner = w.owner;
        w.topics
            .add_claim_topic(&owner, ClaimTopic(2), &mut EventBuffer::new())
            .unwrap();
        assert!(matches!(
            verifier(&w).verify(&w.investor),
            Err(EligibilityError::MissingClaim { topic: 2, .. })
        ));
    }

    #[test]
    fn test_no_required_topics_means_linked_is_enough() {
        let mut w = world();
        let owner = w.owner;
        w.topics
            .remove_claim_topic(&owner, KYC, &mut EventBuffer::new())
            .unwrap();
        w.issuers
            .remove_trusted_issuer(&owner, w.issuer_id, &mut EventBuffer::new())
            .unwrap();
        assert!(verifier(&w).is_verified(&w.investor));
    }
}
