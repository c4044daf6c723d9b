//! # Protocol Events
//!
//! Components never write to the log directly. Each state-changing method
//! takes an [`EventBuffer`] and emits into it under its own address; the
//! runtime stamps the buffer with the block number and a UTC timestamp and
//! appends it to the [`EventLog`] only if the whole call succeeds. A reverted
//! call therefore leaves no events behind, which is what makes the log a
//! reliable discovery mechanism for off-chain tooling (wallet links, suite
//! deployments, capability grants).
//!
//! The log keeps at most `max_entries` records and trims the oldest 10% when
//! that is exceeded. Discovery records (suite deployments, wallet links and
//! unlinks, capability grants and revokes) are also indexed separately and
//! that index is never trimmed.

use serde::{Deserialize, Serialize};

use crate::address::{Address, KeyHash};
use crate::claim::{ClaimId, ClaimTopic};
use crate::digest::ContentDigest;
use crate::temporal::Timestamp;
use crate::version::Version;

// ---------------------------------------------------------------------------
// SuiteRecord
// ---------------------------------------------------------------------------

/// Every address of a deployed token suite, keyed by the deployment salt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteRecord {
    pub salt: String,
    pub token: Address,
    pub identity_registry: Address,
    pub identity_registry_storage: Address,
    pub trusted_issuers_registry: Address,
    pub claim_topics_registry: Address,
    pub modular_compliance: Address,
    pub version: Version,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Everything a component can emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    // ── ownership and agents ────────────────────────────────────────
    OwnershipTransferred { previous: Address, new: Address },
    AgentAdded { agent: Address },
    AgentRemoved { agent: Address },

    // ── identity ─────────────────────────────────────────────────────
    KeyAdded { key: KeyHash, purpose: u64, key_type: u64 },
    KeyRemoved { key: KeyHash, purpose: u64, key_type: u64 },
    ClaimAdded { claim_id: ClaimId, topic: ClaimTopic, issuer: Address },
    ClaimChanged { claim_id: ClaimId, topic: ClaimTopic, issuer: Address },
    ClaimRemoved { claim_id: ClaimId, topic: ClaimTopic, issuer: Address },
    ClaimSignatureRevoked { signature: ContentDigest },
    ExecutionRequested { execution_id: u64, to: Address, value: u128 },
    Approved { execution_id: u64, approved: bool },
    Executed { execution_id: u64, to: Address, value: u128 },
    ExecutionFailed { execution_id: u64, to: Address, value: u128, reason: String },

    // ── identity factory ─────────────────────────────────────────────
    IdentityDeployed { identity: Address },
    WalletLinked { wallet: Address, identity: Address },
    WalletUnlinked { wallet: Address, identity: Address },
    TokenLinked { token: Address, identity: Address },
    TokenFactoryAdded { factory: Address },
    TokenFactoryRemoved { factory: Address },

    // ── registries ───────────────────────────────────────────────────
    ClaimTopicAdded { topic: ClaimTopic },
    ClaimTopicRemoved { topic: ClaimTopic },
    TrustedIssuerAdded { issuer: Address, topics: Vec<ClaimTopic> },
    TrustedIssuerRemoved { issuer: Address },
    IssuerClaimTopicsUpdated { issuer: Address, topics: Vec<ClaimTopic> },
    IdentityStored { wallet: Address, identity: Address },
    IdentityUnstored { wallet: Address, identity: Address },
    StoredIdentityModified { old: Address, new: Address },
    StoredCountryModified { wallet: Address, country: u16 },
    IdentityRegistryBound { registry: Address },
    IdentityRegistryUnbound { registry: Address },
    IdentityRegistered { wallet: Address, identity: Address },
    IdentityRemoved { wallet: Address, identity: Address },
    IdentityUpdated { old: Address, new: Address },
    CountryUpdated { wallet: Address, country: u16 },
    IdentityStorageSet { storage: Address },
    ClaimTopicsRegistrySet { registry: Address },
    TrustedIssuersRegistrySet { registry: Address },

    // ── compliance ───────────────────────────────────────────────────
    TokenBound { token: Address },
    TokenUnbound { token: Address },
    ModuleAdded { module: String },
    ModuleRemoved { module: String },
    ModuleInteraction { module: String, function: String },
    ModuleNotificationFailed { module: String, reason: String },

    // ── token ────────────────────────────────────────────────────────
    Transfer { from: Address, to: Address, value: u128 },
    Approval { owner: Address, spender: Address, value: u128 },
    UpdatedTokenInformation {
        name: String,
        symbol: String,
        decimals: u8,
        version: Version,
        onchain_id: Address,
    },
    IdentityRegistryAdded { registry: Address },
    ComplianceAdded { compliance: Address },
    RecoverySuccess { lost_wallet: Address, new_wallet: Address, investor_identity: Address },
    AddressFrozen { wallet: Address, frozen: bool, by: Address },
    TokensFrozen { wallet: Address, amount: u128 },
    TokensUnfrozen { wallet: Address, amount: u128 },
    Paused { by: Address },
    Unpaused { by: Address },

    // ── agent and owner managers ─────────────────────────────────────
    CapabilityGranted { capability: String, identity: Address, granter: Address },
    CapabilityRevoked { capability: String, identity: Address, granter: Address },

    // ── implementation authority and factories ───────────────────────
    TrexVersionAdded { version: Version },
    VersionUpdated { version: Version },
    TrexFactorySet { factory: Address },
    IaFactorySet { factory: Address },
    ImplementationAuthorityChanged { token: Address, authority: Address },
    ImplementationAuthorityDeployed { authority: Address },
    ImplementationAuthoritySet { authority: Address },
    IdFactorySet { factory: Address },
    ContractDeployed { address: Address, kind: String },
    TrexSuiteDeployed(SuiteRecord),
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// Events emitted during one call, not yet committed.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer(Vec<(Address, Event)>);

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event` as emitted by `emitter`.
    pub fn emit(&mut self, emitter: Address, event: Event) {
        self.0.push((emitter, event));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.0.iter().map(|(_, e)| e)
    }

    /// Drop everything emitted after `mark`. Used when a nested call fails
    /// but its caller continues.
    pub fn truncate(&mut self, mark: usize) {
        self.0.truncate(mark);
    }

    pub fn into_inner(self) -> Vec<(Address, Event)> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// EventRecord
// ---------------------------------------------------------------------------

/// A committed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log since the runtime started. Never reused.
    pub seq: u64,
    pub block: u64,
    pub timestamp: Timestamp,
    pub emitter: Address,
    pub event: Event,
}

impl EventRecord {
    /// Whether off-chain tooling discovers state through this record, so
    /// it must outlive capacity trimming.
    pub fn is_discovery(&self) -> bool {
        matches!(
            self.event,
            Event::TrexSuiteDeployed(_)
                | Event::WalletLinked { .. }
                | Event::WalletUnlinked { .. }
                | Event::CapabilityGranted { .. }
                | Event::CapabilityRevoked { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Append-only log of committed events with a bounded capacity.
#[derive(Debug, Clone)]
pub struct EventLog {
    records: Vec<EventRecord>,
    discovery: Vec<EventRecord>,
    max_entries: usize,
    next_seq: u64,
}

impl EventLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            records: Vec::new(),
            discovery: Vec::new(),
            max_entries: max_entries.max(1),
            next_seq: 0,
        }
    }

    /// Commit a buffer of events under one block.
    pub fn commit(&mut self, block: u64, timestamp: Timestamp, buffer: EventBuffer) {
        for (emitter, event) in buffer.into_inner() {
            let record = EventRecord {
                seq: self.next_seq,
                block,
                timestamp,
                emitter,
                event,
            };
            if record.is_discovery() {
                self.discovery.push(record.clone());
            }
            self.records.push(record);
            self.next_seq += 1;
        }
        if self.records.len() > self.max_entries {
            let trim = (self.max_entries / 10).max(1).max(self.records.len() - self.max_entries);
            self.records.drain(..trim);
        }
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn by_emitter(&self, emitter: &Address) -> Vec<&EventRecord> {
        self.records.iter().filter(|r| &r.emitter == emitter).collect()
    }

    /// The identity most recently linked to `wallet`, unless an unlink
    /// followed it.
    pub fn wallet_linked(&self, wallet: &Address) -> Option<Address> {
        self.discovery.iter().rev().find_map(|r| match &r.event {
            Event::WalletLinked { wallet: w, identity } if w == wallet => Some(Some(*identity)),
            Event::WalletUnlinked { wallet: w, .. } if w == wallet => Some(None),
            _ => None,
        })?
    }

    /// The deployment record of the suite deployed under `salt`.
    pub fn suite_deployed(&self, salt: &str) -> Option<&SuiteRecord> {
        self.discovery.iter().rev().find_map(|r| match &r.event {
            Event::TrexSuiteDeployed(record) if record.salt == salt => Some(record),
            _ => None,
        })
    }

    /// Grant and revoke records emitted by `manager`, oldest first.
    pub fn capability_history(&self, manager: &Address) -> Vec<&EventRecord> {
        self.discovery
            .iter()
            .filter(|r| &r.emitter == manager)
            .filter(|r| {
                matches!(
                    r.event,
                    Event::CapabilityGranted { .. } | Event::CapabilityRevoked { .. }
                )
            })
            .collect()
    }
}
