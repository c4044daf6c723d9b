//! # Capability Managers
//!
//! A manager is an agent (or the owner) of the contracts it fronts. It
//! forwards an operation only when the invoking wallet proves two things:
//!
//! 1. the identity it names holds the capability the operation needs, and
//! 2. the wallet holds an ACTION key (or MANAGEMENT, which implies it) on
//!    that identity.
//!
//! Grants are keyed by identity, not wallet. Removing a compromised key
//! from the identity revokes every capability exercised through it with no
//! change to the grant sets.
//!
//! Admin capabilities are granted and revoked by the manager owner only.
//! The others may also be managed by an admin identity, exercised through
//! a MANAGEMENT key.

use std::collections::{BTreeMap, BTreeSet};

use trex_core::{Address, AuthorizationError, Event, EventBuffer, InvariantViolation, Ownable, TrexError};
use trex_identity::{IdentityDirectory, KeyPurpose};

use crate::capability::{AgentCapability, Capability, OwnerCapability};

#[derive(Debug, Clone)]
pub struct Manager<C: Capability> {
    ownable: Ownable,
    token: Address,
    grants: BTreeMap<C, BTreeSet<Address>>,
}

pub type AgentManager = Manager<AgentCapability>;
pub type OwnerManager = Manager<OwnerCapability>;

impl<C: Capability> Manager<C> {
    pub fn new(ownable: Ownable, token: Address) -> Self {
        Self {
            ownable,
            token,
            grants: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.ownable.contract()
    }

    /// The token whose suite this manager fronts.
    pub fn token(&self) -> Address {
        self.token
    }

    pub fn ownable(&self) -> &Ownable {
        &self.ownable
    }

    pub fn ownable_mut(&mut self) -> &mut Ownable {
        &mut self.ownable
    }

    pub fn has_capability(&self, capability: C, identity: &Address) -> bool {
        self.grants
            .get(&capability)
            .is_some_and(|holders| holders.contains(identity))
    }

    pub fn holders(&self, capability: C) -> impl Iterator<Item = &Address> {
        self.grants.get(&capability).into_iter().flatten()
    }

    /// Require `wallet` to act for `identity` and `identity` to hold
    /// `capability`. Consults the identity's keys as they are now.
    pub fn check_capability(
        &self,
        capability: C,
        wallet: &Address,
        identity: &Address,
        directory: &dyn IdentityDirectory,
    ) -> Result<(), AuthorizationError> {
        if !self.has_capability(capability, identity) {
            return Err(AuthorizationError::MissingCapability {
                capability: capability.name().to_string(),
                identity: *identity,
            });
        }
        if !directory.wallet_has_purpose(identity, wallet, KeyPurpose::Action) {
            return Err(AuthorizationError::MissingKeyPurpose {
                identity: *identity,
                purpose: KeyPurpose::Action.as_str().to_string(),
            });
        }
        Ok(())
    }

    fn authorize_admin(
        &self,
        capability: C,
        caller: &Address,
        admin_identity: Option<&Address>,
        directory: &dyn IdentityDirectory,
    ) -> Result<(), AuthorizationError> {
        if self.ownable.is_owner(caller) {
            return Ok(());
        }
        if capability.is_admin() {
            return self.ownable.only_owner(caller);
        }
        let admin = admin_identity.ok_or(AuthorizationError::NotOwner {
            contract: self.address(),
            caller: *caller,
        })?;
        if !self.has_capability(C::ADMIN, admin) {
            return Err(AuthorizationError::MissingCapability {
                capability: C::ADMIN.name().to_string(),
                identity: *admin,
            });
        }
        if !directory.wallet_has_purpose(admin, caller, KeyPurpose::Management) {
            return Err(AuthorizationError::MissingKeyPurpose {
                identity: *admin,
                purpose: KeyPurpose::Management.as_str().to_string(),
            });
        }
        Ok(())
    }

    pub fn grant(
        &mut self,
        caller: &Address,
        capability: C,
        identity: Address,
        admin_identity: Option<&Address>,
        directory: &dyn IdentityDirectory,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.authorize_admin(capability, caller, admin_identity, directory)?;
        if identity.is_zero() {
            return Err(InvariantViolation::ZeroAddress("identity".into()).into());
        }
        if !self.grants.entry(capability).or_default().insert(identity) {
            return Err(InvariantViolation::Duplicate {
                what: format!("{capability} grant to {identity}"),
            }
            .into());
        }
        events.emit(
            self.address(),
            Event::CapabilityGranted {
                capability: capability.name().to_string(),
                identity,
                granter: *caller,
            },
        );
        tracing::debug!(manager = %self.address(), %capability, %identity, "capability granted");
        Ok(())
    }

    pub fn revoke(
        &mut self,
        caller: &Address,
        capability: C,
        identity: Address,
        admin_identity: Option<&Address>,
        directory: &dyn IdentityDirectory,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.authorize_admin(capability, caller, admin_identity, directory)?;
        let removed = self
            .grants
            .get_mut(&capability)
            .is_some_and(|holders| holders.remove(&identity));
        if !removed {
            return Err(InvariantViolation::NotFound {
                what: format!("{capability} grant to {identity}"),
            }
            .into());
        }
        events.emit(
            self.address(),
            Event::CapabilityRevoked {
                capability: capability.name().to_string(),
                identity,
                granter: *caller,
            },
        );
        Ok(())
    }
}
