//! # Identity Registry Storage
//!
//! The wallet → (identity, country) table. One storage can back several
//! identity registries, so investors onboarded for one token are eligible
//! for every token sharing the storage. Only bound registries (kept as the
//! storage's agents) may mutate it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trex_core::{AgentRole, Address, Event, EventBuffer, InvariantViolation, TrexError};

pub const MAX_BOUND_REGISTRIES: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub identity: Address,
    pub country: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRegistryStorage {
    roles: AgentRole,
    entries: BTreeMap<Address, StoredIdentity>,
    bound: Vec<Address>,
}

impl IdentityRegistryStorage {
    pub fn new(roles: AgentRole) -> Self {
        Self {
            roles,
            entries: BTreeMap::new(),
            bound: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.roles.contract()
    }

    pub fn roles(&self) -> &AgentRole {
        &self.roles
    }

    pub fn roles_mut(&mut self) -> &mut AgentRole {
        &mut self.roles
    }

    fn entry_mut(&mut self, wallet: &Address) -> Result<&mut StoredIdentity, InvariantViolation> {
        self.entries.get_mut(wallet).ok_or_else(|| InvariantViolation::NotFound {
            what: format!("stored identity of {wallet}"),
        })
    }

    // ── mutations (bound registries only) ────────────────────────────

    pub fn add_identity_to_storage(
        &mut self,
        caller: &Address,
        wallet: Address,
        identity: Address,
        country: u16,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        if wallet.is_zero() {
            return Err(InvariantViolation::ZeroAddress("wallet".into()).into());
        }
        if identity.is_zero() {
            return Err(InvariantViolation::ZeroAddress("identity".into()).into());
        }
        if self.entries.contains_key(&wallet) {
            return Err(InvariantViolation::AlreadyRegistered { wallet }.into());
        }
        self.entries.insert(wallet, StoredIdentity { identity, country });
        events.emit(self.address(), Event::IdentityStored { wallet, identity });
        Ok(())
    }

    pub fn modify_stored_identity(
        &mut self,
        caller: &Address,
        wallet: Address,
        identity: Address,
        events: &mut EventBuffer,
    ) -> Result<Address, TrexError> {
        self.roles.only_agent(caller)?;
        if identity.is_zero() {
            return Err(InvariantViolation::ZeroAddress("identity".into()).into());
        }
        let entry = self.entry_mut(&wallet)?;
        let old = std::mem::replace(&mut entry.identity, identity);
        events.emit(self.address(), Event::StoredIdentityModified { old, new: identity });
        Ok(old)
    }

    pub fn modify_stored_investor_country(
        &mut self,
        caller: &Address,
        wallet: Address,
        country: u16,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        self.entry_mut(&wallet)?.country = country;
        events.emit(self.address(), Event::StoredCountryModified { wallet, country });
        Ok(())
    }

    pub fn remove_identity_from_storage(
        &mut self,
        caller: &Address,
        wallet: Address,
        events: &mut EventBuffer,
    ) -> Result<Address, TrexError> {
        self.roles.only_agent(caller)?;
        let removed = self.entries.remove(&wallet).ok_or_else(|| InvariantViolation::NotFound {
            what: format!("stored identity of {wallet}"),
        })?;
        events.emit(
            self.address(),
            Event::IdentityUnstored {
                wallet,
                identity: removed.identity,
            },
        );
        Ok(removed.identity)
    }

    // ── registry binding (owner only) ────────────────────────────────

    pub fn bind_identity_registry(&mut self, caller: &Address, registry: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_owner(caller)?;
        if self.bound.len() >= MAX_BOUND_REGISTRIES {
            return Err(InvariantViolation::LimitExceeded {
                what: "identity registries bound to one storage".into(),
                max: MAX_BOUND_REGISTRIES,
            }
            .into());
        }
        self.roles.insert_agent(registry, events)?;
        self.bound.push(registry);
        events.emit(self.address(), Event::IdentityRegistryBound { registry });
        Ok(())
    }

    pub fn unbind_identity_registry(&mut self, caller: &Address, registry: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_owner(caller)?;
        self.roles.take_agent(registry, events)?;
        self.bound.retain(|r| r != &registry);
        events.emit(self.address(), Event::IdentityRegistryUnbound { registry });
        Ok(())
    }

    // ── queries ──────────────────────────────────────────────────────

    pub fn linked_identity_registries(&self) -> &[Address] {
        &self.bound
    }

    pub fn stored(&self, wallet: &Address) -> Option<&StoredIdentity> {
        self.entries.get(wallet)
    }

    pub fn stored_identity(&self, wallet: &Address) -> Option<Address> {
        self.entries.get(wallet).map(|e| e.identity)
    }

    pub fn stored_investor_country(&self, wallet: &Address) -> Option<u16> {
        self.entries.get(wallet).map(|e| e.country)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
