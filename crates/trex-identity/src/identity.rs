//! # Identity
//!
//! A self-governing key and claim holder (ONCHAINID: ERC-734 keys, ERC-735
//! claims). Every identity can also act as a claim issuer: claims it signs
//! for other identities are checked against its own CLAIM keys and its
//! revocation set.
//!
//! ## Authorization
//!
//! Callers are wallets. A wallet is authorized for a purpose when its key
//! hash ([`KeyHash::of_address`]) holds that purpose, MANAGEMENT implying
//! all others. The identity itself is always authorized; that is how an
//! approved execution request manages the identity's own keys.
//!
//! ## Executions
//!
//! `execute` records a request for the identity to call `to` with a payload.
//! It is approved immediately when the requester holds MANAGEMENT, or holds
//! ACTION and the target is another contract. Otherwise it stays pending
//! until `approve`. The identity does not dispatch anything itself: an
//! approval hands the payload back to the host, which reports the outcome
//! through [`Identity::record_execution_result`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use trex_core::{
    Address, AuthorizationError, ClaimId, ClaimTopic, ContentDigest, Event, EventBuffer,
    InvariantViolation, KeyHash, StateError, TrexError,
};

use crate::claim::Claim;
use crate::key::{Key, KeyPurpose, KeyType};
use crate::signing::{recover_signer, signature_digest};

/// A recorded execution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution<P> {
    pub to: Address,
    pub value: u128,
    pub payload: P,
    pub approved: bool,
    pub executed: bool,
}

/// An approved request the host must now dispatch with the identity as
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch<P> {
    pub execution_id: u64,
    pub to: Address,
    pub value: u128,
    pub payload: P,
}

/// Result of [`Identity::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTicket<P> {
    pub execution_id: u64,
    /// Present when the request was approved on submission.
    pub dispatch: Option<Dispatch<P>>,
}

/// An identity parameterized by the payload its execution requests carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity<P> {
    address: Address,
    keys: BTreeMap<KeyHash, Key>,
    claims: BTreeMap<ClaimId, Claim>,
    claims_by_topic: BTreeMap<ClaimTopic, Vec<ClaimId>>,
    executions: Vec<Execution<P>>,
    revoked_signatures: BTreeSet<ContentDigest>,
}

impl<P: Clone> Identity<P> {
    /// A new identity whose only key is `management_key` with MANAGEMENT.
    pub fn new(address: Address, management_key: KeyHash, events: &mut EventBuffer) -> Self {
        let mut keys = BTreeMap::new();
        keys.insert(
            management_key,
            Key::new(management_key, KeyPurpose::Management, KeyType::Ecdsa),
        );
        events.emit(
            address,
            Event::KeyAdded {
                key: management_key,
                purpose: KeyPurpose::Management.code(),
                key_type: KeyType::Ecdsa.code(),
            },
        );
        Self {
            address,
            keys,
            claims: BTreeMap::new(),
            claims_by_topic: BTreeMap::new(),
            executions: Vec::new(),
            revoked_signatures: BTreeSet::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Require `caller` to be the identity itself or a wallet holding
    /// `purpose`.
    pub fn authorize(&self, caller: &Address, purpose: KeyPurpose) -> Result<(), AuthorizationError> {
        if caller == &self.address || self.key_has_purpose(&KeyHash::of_address(caller), purpose) {
            Ok(())
        } else {
            Err(AuthorizationError::MissingKeyPurpose {
                identity: self.address,
                purpose: purpose.to_string(),
            })
        }
    }

    // ── keys ─────────────────────────────────────────────────────────

    pub fn get_key(&self, key: &KeyHash) -> Option<&Key> {
        self.keys.get(key)
    }

    pub fn get_key_purposes(&self, key: &KeyHash) -> Vec<KeyPurpose> {
        self.keys
            .get(key)
            .map(|k| k.purposes.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Keys holding exactly `purpose` (MANAGEMENT keys are not listed under
    /// other purposes).
    pub fn get_keys_by_purpose(&self, purpose: KeyPurpose) -> Vec<KeyHash> {
        self.keys
            .values()
            .filter(|k| k.purposes.contains(&purpose))
            .map(|k| k.key)
            .collect()
    }

    pub fn key_has_purpose(&self, key: &KeyHash, purpose: KeyPurpose) -> bool {
        self.keys.get(key).is_some_and(|k| k.has_purpose(purpose))
    }

    /// Add `purpose` to `key`, creating the key if absent.
    pub fn add_key(
        &mut self,
        caller: &Address,
        key: KeyHash,
        purpose: KeyPurpose,
        key_type: KeyType,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.authorize(caller, KeyPurpose::Management)?;
        match self.keys.get_mut(&key) {
            Some(existing) => {
                if !existing.purposes.insert(purpose) {
                    return Err(InvariantViolation::Duplicate {
                        what: format!("key {key} with purpose {purpose}"),
                    }
                    .into());
                }
            }
            None => {
                self.keys.insert(key, Key::new(key, purpose, key_type));
            }
        }
        let key_type = self.keys.get(&key).map_or(key_type, |k| k.key_type);
        events.emit(
            self.address,
            Event::KeyAdded {
                key,
                purpose: purpose.code(),
                key_type: key_type.code(),
            },
        );
        Ok(())
    }

    /// Remove `purpose` from `key`; the key is deleted when no purpose
    /// remains. The last MANAGEMENT key cannot be removed.
    pub fn remove_key(
        &mut self,
        caller: &Address,
        key: KeyHash,
        purpose: KeyPurpose,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.authorize(caller, KeyPurpose::Management)?;
        let holds = self.keys.get(&key).is_some_and(|k| k.purposes.contains(&purpose));
        if !holds {
            return Err(InvariantViolation::NotFound {
                what: format!("key {key} with purpose {purpose}"),
            }
            .into());
        }
        if purpose == KeyPurpose::Management && self.get_keys_by_purpose(KeyPurpose::Management).len() == 1 {
            return Err(InvariantViolation::LastManagementKey {
                identity: self.address,
            }
            .into());
        }

        let mut key_type = KeyType::Ecdsa;
        let mut now_empty = false;
        if let Some(k) = self.keys.get_mut(&key) {
            k.purposes.remove(&purpose);
            key_type = k.key_type;
            now_empty = k.purposes.is_empty();
        }
        if now_empty {
            self.keys.remove(&key);
        }
        events.emit(
            self.address,
            Event::KeyRemoved {
                key,
                purpose: purpose.code(),
                key_type: key_type.code(),
            },
        );
        Ok(())
    }

    // ── claims ───────────────────────────────────────────────────────

    pub fn get_claim(&self, claim_id: &ClaimId) -> Option<&Claim> {
        self.claims.get(claim_id)
    }

    pub fn get_claim_ids_by_topic(&self, topic: ClaimTopic) -> Vec<ClaimId> {
        self.claims_by_topic.get(&topic).cloned().unwrap_or_default()
    }

    /// Store a claim, replacing any claim from the same issuer on the same
    /// topic. The caller has already checked the issuer's signature when the
    /// issuer is another identity.
    pub fn add_claim(&mut self, caller: &Address, claim: Claim, events: &mut EventBuffer) -> Result<ClaimId, TrexError> {
        self.authorize(caller, KeyPurpose::Claim)?;
        let claim_id = claim.id();
        let (topic, issuer) = (claim.topic, claim.issuer);
        let replaced = self.claims.insert(claim_id, claim).is_some();
        if replaced {
            events.emit(self.address, Event::ClaimChanged { claim_id, topic, issuer });
        } else {
            self.claims_by_topic.entry(topic).or_default().push(claim_id);
            events.emit(self.address, Event::ClaimAdded { claim_id, topic, issuer });
        }
        Ok(claim_id)
    }

    pub fn remove_claim(&mut self, caller: &Address, claim_id: ClaimId, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.authorize(caller, KeyPurpose::Claim)?;
        let claim = self.claims.remove(&claim_id).ok_or_else(|| InvariantViolation::NotFound {
            what: format!("claim {claim_id}"),
        })?;
        if let Some(ids) = self.claims_by_topic.get_mut(&claim.topic) {
            ids.retain(|id| id != &claim_id);
            if ids.is_empty() {
                self.claims_by_topic.remove(&claim.topic);
            }
        }
        events.emit(
            self.address,
            Event::ClaimRemoved {
                claim_id,
                topic: claim.topic,
                issuer: claim.issuer,
            },
        );
        Ok(())
    }

    // ── claim issuer ─────────────────────────────────────────────────

    /// Whether `signature` is this identity's valid, unrevoked signature of
    /// a claim about `subject`.
    pub fn is_claim_valid(&self, subject: &Address, topic: ClaimTopic, signature: &[u8], data: &[u8]) -> bool {
        if self.is_claim_revoked(signature) {
            return false;
        }
        match recover_signer(signature, subject, topic, data) {
            Ok(signer) => self.key_has_purpose(&signer, KeyPurpose::Claim),
            Err(e) => {
                tracing::debug!(issuer = %self.address, error = %e, "claim signature rejected");
                false
            }
        }
    }

    pub fn is_claim_revoked(&self, signature: &[u8]) -> bool {
        self.revoked_signatures.contains(&signature_digest(signature))
    }

    pub fn revoke_claim_by_signature(
        &mut self,
        caller: &Address,
        signature: &[u8],
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.authorize(caller, KeyPurpose::Management)?;
        let digest = signature_digest(signature);
        if !self.revoked_signatures.insert(digest) {
            return Err(InvariantViolation::Duplicate {
                what: format!("revocation of signature {digest}"),
            }
            .into());
        }
        events.emit(self.address, Event::ClaimSignatureRevoked { signature: digest });
        Ok(())
    }

    // ── executions ───────────────────────────────────────────────────

    pub fn get_execution(&self, execution_id: u64) -> Option<&Execution<P>> {
        usize::try_from(execution_id).ok().and_then(|i| self.executions.get(i))
    }

    pub fn execution_count(&self) -> u64 {
        self.executions.len() as u64
    }

    fn required_purpose(&self, to: &Address) -> KeyPurpose {
        if to == &self.address {
            KeyPurpose::Management
        } else {
            KeyPurpose::Action
        }
    }

    /// Record a request. Anyone may submit; only an approval by a key with
    /// the matching purpose releases it.
    pub fn execute(
        &mut self,
        caller: &Address,
        to: Address,
        value: u128,
        payload: P,
        events: &mut EventBuffer,
    ) -> ExecutionTicket<P> {
        let execution_id = self.execution_count();
        self.executions.push(Execution {
            to,
            value,
            payload,
            approved: false,
            executed: false,
        });
        events.emit(self.address, Event::ExecutionRequested { execution_id, to, value });

        let purpose = self.required_purpose(&to);
        let dispatch = if self.authorize(caller, purpose).is_ok() {
            self.mark_approved(execution_id, true, events)
        } else {
            None
        };
        ExecutionTicket { execution_id, dispatch }
    }

    /// Approve or reject a pending request. Returns the dispatch when
    /// approved.
    pub fn approve(
        &mut self,
        caller: &Address,
        execution_id: u64,
        approve: bool,
        events: &mut EventBuffer,
    ) -> Result<Option<Dispatch<P>>, TrexError> {
        let execution = self
            .get_execution(execution_id)
            .ok_or(StateError::ExecutionNotFound { id: execution_id })?;
        if execution.executed {
            return Err(StateError::AlreadyExecuted { id: execution_id }.into());
        }
        let purpose = self.required_purpose(&execution.to);
        self.authorize(caller, purpose)?;
        Ok(self.mark_approved(execution_id, approve, events))
    }

    fn mark_approved(&mut self, execution_id: u64, approve: bool, events: &mut EventBuffer) -> Option<Dispatch<P>> {
        let address = self.address;
        let execution = usize::try_from(execution_id)
            .ok()
            .and_then(|i| self.executions.get_mut(i))?;
        execution.approved = approve;
        events.emit(address, Event::Approved { execution_id, approved: approve });
        approve.then(|| Dispatch {
            execution_id,
            to: execution.to,
            value: execution.value,
            payload: execution.payload.clone(),
        })
    }

    /// Record the host's dispatch outcome. A failed dispatch leaves the
    /// request approved but unexecuted, so it can be approved again.
    pub fn record_execution_result(&mut self, execution_id: u64, outcome: Result<(), String>, events: &mut EventBuffer) {
        let address = self.address;
        let Some(execution) = usize::try_from(execution_id)
            .ok()
            .and_then(|i| self.executions.get_mut(i))
        else {
            return;
        };
        let (to, value) = (execution.to, execution.value);
        match outcome {
            Ok(()) => {
                execution.executed = true;
                events.emit(address, Event::Executed { execution_id, to, value });
            }
            Err(reason) => {
                tracing::debug!(identity = %address, execution_id, %reason, "execution failed");
                events.emit(
                    address,
                    Event::ExecutionFailed {
                        execution_id,
                        to,
                        value,
                        reason,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{ClaimSigner, SCHEME_ED25519};

    fn wallet(label: &str) -> Address {
        Address::from_label(label)
    }

    fn setup() -> (Identity<&'static str>, Address) {
        let owner = wallet("alice");
        let id = Identity::new(
            Address::from_label("alice-identity"),
            KeyHash::of_address(&owner),
            &mut EventBuffer::new(),
        );
        (id, owner)
    }

    // ── keys ─────────────────────────────────────────────────────────

    #[test]
    fn test_new_identity_has_one_management_key() {
        let (id, owner) = setup();
        let key = KeyHash::of_address(&owner);
        assert_eq!(id.get_keys_by_purpose(KeyPurpose::Management), vec![key]);
        assert!(id.key_has_purpose(&key, KeyPurpose::Action));
    }

    #[test]
    fn test_add_key_adds_purpose_to_existing() {
        let (mut id, owner) = setup();
        let bob = KeyHash::of_address(&wallet("bob"));
        let mut ev = EventBuffer::new();
        id.add_key(&owner, bob, KeyPurpose::Action, KeyType::Ecdsa, &mut ev).unwrap();
        id.add_key(&owner, bob, KeyPurpose::Claim, KeyType::Ecdsa, &mut ev).unwrap();
        assert_eq!(id.get_key_purposes(&bob), vec![KeyPurpose::Action, KeyPurpose::Claim]);
        let err = id.add_key(&owner, bob, KeyPurpose::Claim, KeyType::Ecdsa, &mut ev).unwrap_err();
        assert!(matches!(err, TrexError::Invariant(InvariantViolation::Duplicate { .. })));
    }

    #[test]
    fn test_action_key_cannot_manage_keys() {
        let (mut id, owner) = setup();
        let bob = wallet("bob");
        let mut ev = EventBuffer::new();
        id.add_key(&owner, KeyHash::of_address(&bob), KeyPurpose::Action, KeyType::Ecdsa, &mut ev)
            .unwrap();
        let err = id
            .add_key(&bob, KeyHash::of_address(&bob), KeyPurpose::Management, KeyType::Ecdsa, &mut ev)
            .unwrap_err();
        assert!(matches!(
            err,
            TrexError::Authorization(AuthorizationError::MissingKeyPurpose { .. })
        ));
    }

    #[test]
    fn test_remove_last_management_key_rejected() {
        let (mut id, owner) = setup();
        let err = id
            .remove_key(&owner, KeyHash::of_address(&owner), KeyPurpose::Management, &mut EventBuffer::new())
            .unwrap_err();
        assert!(matches!(
            err,
            TrexError::Invariant(InvariantViolation::LastManagementKey { .. })
        ));
        assert!(id.key_has_purpose(&KeyHash::of_address(&owner), KeyPurpose::Management));
    }

    #[test]
    fn test_remove_management_key_when_another_exists() {
        let (mut id, owner) = setup();
        let bob = wallet("bob");
        let mut ev = EventBuffer::new();
        id.add_key(&owner, KeyHash::of_address(&bob), KeyPurpose::Management, KeyType::Ecdsa, &mut ev)
            .unwrap();
        id.remove_key(&bob, KeyHash::of_address(&owner), KeyPurpose::Management, &mut ev)
            .unwrap();
        assert!(id.get_key(&KeyHash::of_address(&owner)).is_none());
        assert!(id.authorize(&owner, KeyPurpose::Action).is_err());
    }

    #[test]
    fn test_remove_one_purpose_keeps_key() {
        let (mut id, owner) = setup();
        let bob = KeyHash::of_address(&wallet("bob"));
        let mut ev = EventBuffer::new();
        id.add_key(&owner, bob, KeyPurpose::Action, KeyType::Ecdsa, &mut ev).unwrap();
        id.add_key(&owner, bob, KeyPurpose::Claim, KeyType::Ecdsa, &mut ev).unwrap();
        id.remove_key(&owner, bob, KeyPurpose::Action, &mut ev).unwrap();
        assert!(!id.key_has_purpose(&bob, KeyPurpose::Action));
        assert!(id.key_has_purpose(&bob, KeyPurpose::Claim));
        let err = id.remove_key(&owner, bob, KeyPurpose::Action, &mut ev).unwrap_err();
        assert!(matches!(err, TrexError::Invariant(InvariantViolation::NotFound { .. })));
    }

    #[test]
    fn test_identity_itself_is_authorized() {
        let (id, _) = setup();
        assert!(id.authorize(&id.address(), KeyPurpose::Management).is_ok());
    }

    // ── claims ───────────────────────────────────────────────────────

    fn claim(issuer: Address, topic: u64, data: &[u8]) -> Claim {
        Claim {
            topic: ClaimTopic(topic),
            scheme: SCHEME_ED25519,
            issuer,
            signature: vec![],
            data: data.to_vec(),
            uri: String::new(),
        }
    }

    #[test]
    fn test_add_claim_then_replace() {
        let (mut id, owner) = setup();
        let issuer = wallet("issuer-identity");
        let mut ev = EventBuffer::new();
        let cid = id.add_claim(&owner, claim(issuer, 1, b"v1"), &mut ev).unwrap();
        let again = id.add_claim(&owner, claim(issuer, 1, b"v2"), &mut ev).unwrap();
        assert_eq!(cid, again);
        assert_eq!(id.get_claim_ids_by_topic(ClaimTopic(1)), vec![cid]);
        assert_eq!(id.get_claim(&cid).unwrap().data, b"v2".to_vec());
        assert!(matches!(ev.events().last(), Some(Event::ClaimChanged { .. })));
    }

    #[test]
    fn test_remove_claim_clears_topic_index() {
        let (mut id, owner) = setup();
        let mut ev = EventBuffer::new();
        let cid = id.add_claim(&owner, claim(wallet("i"), 7, b""), &mut ev).unwrap();
        id.remove_claim(&owner, cid, &mut ev).unwrap();
        assert!(id.get_claim_ids_by_topic(ClaimTopic(7)).is_empty());
        assert!(id.remove_claim(&owner, cid, &mut ev).is_err());
    }

    #[test]
    fn test_add_claim_requires_claim_purpose() {
        let (mut id, _) = setup();
        let err = id
            .add_claim(&wallet("mallory"), claim(wallet("i"), 1, b""), &mut EventBuffer::new())
            .unwrap_err();
        assert!(matches!(err, TrexError::Authorization(_)));
    }

    // ── claim issuer ─────────────────────────────────────────────────

    #[test]
    fn test_claim_validity_and_revocation() {
        let (mut issuer, owner) = setup();
        let signer = ClaimSigner::from_seed(&[9u8; 32]);
        let mut ev = EventBuffer::new();
        issuer
            .add_key(&owner, signer.key_hash(), KeyPurpose::Claim, KeyType::Ed25519, &mut ev)
            .unwrap();

        let subject = wallet("bob-identity");
        let sig = signer.sign_claim(&subject, ClaimTopic(1), b"kyc").unwrap();
        assert!(issuer.is_claim_valid(&subject, ClaimTopic(1), &sig, b"kyc"));
        assert!(!issuer.is_claim_valid(&subject, ClaimTopic(1), &sig, b"tampered"));

        issuer.revoke_claim_by_signature(&owner, &sig, &mut ev).unwrap();
        assert!(issuer.is_claim_revoked(&sig));
        assert!(!issuer.is_claim_valid(&subject, ClaimTopic(1), &sig, b"kyc"));
    }

    #[test]
    fn test_claim_invalid_once_signing_key_removed() {
        let (mut issuer, owner) = setup();
        let signer = ClaimSigner::generate();
        let mut ev = EventBuffer::new();
        issuer
            .add_key(&owner, signer.key_hash(), KeyPurpose::Claim, KeyType::Ed25519, &mut ev)
            .unwrap();
        let subject = wallet("bob-identity");
        let sig = signer.sign_claim(&subject, ClaimTopic(2), b"").unwrap();
        assert!(issuer.is_claim_valid(&subject, ClaimTopic(2), &sig, b""));
        issuer.remove_key(&owner, signer.key_hash(), KeyPurpose::Claim, &mut ev).unwrap();
        assert!(!issuer.is_claim_valid(&subject, ClaimTopic(2), &sig, b""));
    }

    // ── executions ───────────────────────────────────────────────────

    #[test]
    fn test_execute_auto_approves_for_management() {
        let (mut id, owner) = setup();
        let ticket = id.execute(&owner, id.address(), 0, "add-key", &mut EventBuffer::new());
        let dispatch = ticket.dispatch.unwrap();
        assert_eq!(dispatch.payload, "add-key");
        assert!(id.get_execution(ticket.execution_id).unwrap().approved);
    }

    #[test]
    fn test_action_key_cannot_self_execute_without_approval() {
        let (mut id, owner) = setup();
        let bob = wallet("bob");
        let mut ev = EventBuffer::new();
        id.add_key(&owner, KeyHash::of_address(&bob), KeyPurpose::Action, KeyType::Ecdsa, &mut ev)
            .unwrap();

        let to_self = id.execute(&bob, id.address(), 0, "self", &mut ev);
        assert!(to_self.dispatch.is_none());
        let outward = id.execute(&bob, wallet("token"), 0, "mint", &mut ev);
        assert!(outward.dispatch.is_some());

        assert!(id.approve(&bob, to_self.execution_id, true, &mut ev).is_err());
        let d = id.approve(&owner, to_self.execution_id, true, &mut ev).unwrap();
        assert!(d.is_some());
    }

    #[test]
    fn test_executed_request_cannot_be_approved_again() {
        let (mut id, owner) = setup();
        let mut ev = EventBuffer::new();
        let ticket = id.execute(&owner, wallet("x"), 5, "call", &mut ev);
        id.record_execution_result(ticket.execution_id, Ok(()), &mut ev);
        let err = id.approve(&owner, ticket.execution_id, true, &mut ev).unwrap_err();
        assert!(matches!(err, TrexError::State(StateError::AlreadyExecuted { id: 0 })));
    }

    #[test]
    fn test_failed_execution_stays_approvable() {
        let (mut id, owner) = setup();
        let mut ev = EventBuffer::new();
        let ticket = id.execute(&owner, wallet("x"), 0, "call", &mut ev);
        id.record_execution_result(ticket.execution_id, Err("reverted".into()), &mut ev);
        assert!(!id.get_execution(0).unwrap().executed);
        assert!(id.approve(&owner, 0, true, &mut ev).unwrap().is_some());
    }

    #[test]
    fn test_approve_unknown_execution() {
        let (mut id, owner) = setup();
        let err = id.approve(&owner, 3, true, &mut EventBuffer::new()).unwrap_err();
        assert!(matches!(err, TrexError::State(StateError::ExecutionNotFound { id: 3 })));
    }
}
