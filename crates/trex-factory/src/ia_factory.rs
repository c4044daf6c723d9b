//! Deploys per-token implementation authorities.

use std::collections::{BTreeMap, BTreeSet};

use trex_core::{Address, Event, EventBuffer, InvariantViolation, Ownable, TrexError};

use crate::authority::ImplementationAuthority;

#[derive(Debug, Clone)]
pub struct IAFactory {
    address: Address,
    trex_factory: Address,
    deployed_for_token: BTreeMap<Address, Address>,
    deployed: BTreeSet<Address>,
}

impl IAFactory {
    pub fn new(address: Address, trex_factory: Address) -> Self {
        Self {
            address,
            trex_factory,
            deployed_for_token: BTreeMap::new(),
            deployed: BTreeSet::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn trex_factory(&self) -> Address {
        self.trex_factory
    }

    pub fn deployed_by_factory(&self, authority: &Address) -> bool {
        self.deployed.contains(authority)
    }

    pub fn authority_for_token(&self, token: &Address) -> Option<Address> {
        self.deployed_for_token.get(token).copied()
    }

    /// A non-reference authority at `address`, owned by `owner`, holding and
    /// using the reference's current version. One per token.
    pub fn deploy_ia(
        &mut self,
        token: Address,
        address: Address,
        owner: Address,
        reference: &ImplementationAuthority,
        events: &mut EventBuffer,
    ) -> Result<ImplementationAuthority, TrexError> {
        if self.deployed_for_token.contains_key(&token) {
            return Err(InvariantViolation::Duplicate {
                what: format!("implementation authority for token {token}"),
            }
            .into());
        }
        let version = reference.get_current_version().ok_or(trex_core::StateError::NoCurrentVersion {
            authority: reference.address(),
        })?;

        // Built under the factory's ownership, then handed to `owner`.
        let mut authority = ImplementationAuthority::new(Ownable::new(address, self.address), false);
        authority.fetch_version(reference, version, events)?;
        authority.use_trex_version(&self.address, version, events)?;
        authority.ownable_mut().transfer_ownership(&self.address, owner, events)?;

        self.deployed_for_token.insert(token, address);
        self.deployed.insert(address);
        events.emit(self.address, Event::ImplementationAuthorityDeployed { authority: address });
        Ok(authority)
    }
}
