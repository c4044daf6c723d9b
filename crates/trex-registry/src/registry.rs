//! # Identity Registry
//!
//! The agent-gated front of an [`IdentityRegistryStorage`] plus the wiring
//! to the claim topics and trusted issuers registries that define
//! eligibility for one token. The registry holds addresses only; the host
//! resolves them and passes the storage in for mutations, or builds a
//! [`Verifier`](crate::Verifier) for eligibility queries.

use serde::{Deserialize, Serialize};
use trex_core::{AgentRole, Address, Event, EventBuffer, InvariantViolation, TrexError};

use crate::storage::IdentityRegistryStorage;

/// One row of a batch registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub wallet: Address,
    pub identity: Address,
    pub country: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRegistry {
    roles: AgentRole,
    storage: Address,
    claim_topics_registry: Address,
    trusted_issuers_registry: Address,
}

impl IdentityRegistry {
    pub fn new(
        roles: AgentRole,
        trusted_issuers_registry: Address,
        claim_topics_registry: Address,
        storage: Address,
    ) -> Self {
        Self {
            roles,
            storage,
            claim_topics_registry,
            trusted_issuers_registry,
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

    pub fn identity_storage(&self) -> Address {
        self.storage
    }

    pub fn topics_registry(&self) -> Address {
        self.claim_topics_registry
    }

    pub fn issuers_registry(&self) -> Address {
        self.trusted_issuers_registry
    }

    fn check_storage(&self, storage: &IdentityRegistryStorage) -> Result<(), InvariantViolation> {
        if storage.address() == self.storage {
            Ok(())
        } else {
            Err(InvariantViolation::InvalidInput(format!(
                "storage {} is not the storage of registry {}",
                storage.address(),
                self.address()
            )))
        }
    }

    // ── agent operations ─────────────────────────────────────────────

    pub fn register_identity(
        &self,
        caller: &Address,
        storage: &mut IdentityRegistryStorage,
        wallet: Address,
        identity: Address,
        country: u16,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        self.check_storage(storage)?;
        storage.add_identity_to_storage(&self.address(), wallet, identity, country, events)?;
        events.emit(self.address(), Event::IdentityRegistered { wallet, identity });
        tracing::debug!(registry = %self.address(), %wallet, %identity, country, "identity registered");
        Ok(())
    }

    pub fn batch_register_identity(
        &self,
        caller: &Address,
        storage: &mut IdentityRegistryStorage,
        rows: &[Registration],
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        for row in rows {
            self.register_identity(caller, storage, row.wallet, row.identity, row.country, events)?;
        }
        Ok(())
    }

    pub fn update_identity(
        &self,
        caller: &Address,
        storage: &mut IdentityRegistryStorage,
        wallet: Address,
        identity: Address,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        self.check_storage(storage)?;
        let old = storage.modify_stored_identity(&self.address(), wallet, identity, events)?;
        events.emit(self.address(), Event::IdentityUpdated { old, new: identity });
        Ok(())
    }

    pub fn update_country(
        &self,
        caller: &Address,
        storage: &mut IdentityRegistryStorage,
        wallet: Address,
        country: u16,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        self.check_storage(storage)?;
        storage.modify_stored_investor_country(&self.address(), wallet, country, events)?;
        events.emit(self.address(), Event::CountryUpdated { wallet, country });
        Ok(())
    }

    pub fn delete_identity(
        &self,
        caller: &Address,
        storage: &mut IdentityRegistryStorage,
        wallet: Address,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        self.check_storage(storage)?;
        let identity = storage.remove_identity_from_storage(&self.address(), wallet, events)?;
        events.emit(self.address(), Event::IdentityRemoved { wallet, identity });
        Ok(())
    }

    // ── owner wiring ─────────────────────────────────────────────────

    pub fn set_identity_registry_storage(&mut self, caller: &Address, storage: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_owner(caller)?;
        self.storage = storage;
        events.emit(self.address(), Event::IdentityStorageSet { storage });
        Ok(())
    }

    pub fn set_claim_topics_registry(&mut self, caller: &Address, registry: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_owner(caller)?;
        self.claim_topics_registry = registry;
        events.emit(self.address(), Event::ClaimTopicsRegistrySet { registry });
        Ok(())
    }

    pub fn set_trusted_issuers_registry(&mut self, caller: &Address, registry: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_owner(caller)?;
        self.trusted_issuers_registry = registry;
        events.emit(self.address(), Event::TrustedIssuersRegistrySet { registry });
        Ok(())
    }
}
