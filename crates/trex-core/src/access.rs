//! # Ownership and Agent Roles
//!
//! Every contract in a suite is ownable; the token, the identity registry
//! and the identity registry storage additionally keep a set of agents.
//! Both structs know the address of the contract they guard so the errors
//! and events they produce name it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{AuthorizationError, InvariantViolation, TrexError};
use crate::event::{Event, EventBuffer};

/// Single-owner access control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownable {
    contract: Address,
    owner: Address,
}

impl Ownable {
    pub fn new(contract: Address, owner: Address) -> Self {
        Self { contract, owner }
    }

    /// The guarded contract.
    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_owner(&self, caller: &Address) -> bool {
        &self.owner == caller
    }

    pub fn only_owner(&self, caller: &Address) -> Result<(), AuthorizationError> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(AuthorizationError::NotOwner {
                contract: self.contract,
                caller: *caller,
            })
        }
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.only_owner(caller)?;
        if new_owner.is_zero() {
            return Err(InvariantViolation::ZeroAddress("new owner".into()).into());
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        events.emit(
            self.contract,
            Event::OwnershipTransferred {
                previous,
                new: new_owner,
            },
        );
        Ok(())
    }
}

/// Ownable plus a set of agents managed by the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRole {
    ownable: Ownable,
    agents: BTreeSet<Address>,
}

impl AgentRole {
    pub fn new(contract: Address, owner: Address) -> Self {
        Self {
            ownable: Ownable::new(contract, owner),
            agents: BTreeSet::new(),
        }
    }

    pub fn ownable(&self) -> &Ownable {
        &self.ownable
    }

    pub fn contract(&self) -> Address {
        self.ownable.contract()
    }

    pub fn owner(&self) -> Address {
        self.ownable.owner()
    }

    pub fn only_owner(&self, caller: &Address) -> Result<(), AuthorizationError> {
        self.ownable.only_owner(caller)
    }

    pub fn is_agent(&self, who: &Address) -> bool {
        self.agents.contains(who)
    }

    pub fn only_agent(&self, caller: &Address) -> Result<(), AuthorizationError> {
        if self.is_agent(caller) {
            Ok(())
        } else {
            Err(AuthorizationError::NotAgent {
                contract: self.contract(),
                caller: *caller,
            })
        }
    }

    pub fn agents(&self) -> impl Iterator<Item = &Address> {
        self.agents.iter()
    }

    pub fn add_agent(
        &mut self,
        caller: &Address,
        agent: Address,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.only_owner(caller)?;
        self.insert_agent(agent, events)
    }

    /// Add an agent without an ownership check. For the owning contract's own
    /// wiring (a storage binding a registry, a factory seeding a suite).
    pub fn insert_agent(&mut self, agent: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        if agent.is_zero() {
            return Err(InvariantViolation::ZeroAddress("agent".into()).into());
        }
        if !self.agents.insert(agent) {
            return Err(InvariantViolation::Duplicate {
                what: format!("agent {agent} on {}", self.contract()),
            }
            .into());
        }
        events.emit(self.contract(), Event::AgentAdded { agent });
        Ok(())
    }

    pub fn remove_agent(
        &mut self,
        caller: &Address,
        agent: Address,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.only_owner(caller)?;
        self.take_agent(agent, events)
    }

    /// Counterpart of [`AgentRole::insert_agent`].
    pub fn take_agent(&mut self, agent: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        if !self.agents.remove(&agent) {
            return Err(InvariantViolation::NotFound {
                what: format!("agent {agent} on {}", self.contract()),
            }
            .into());
        }
        events.emit(self.contract(), Event::AgentRemoved { agent });
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.ownable.transfer_ownership(caller, new_owner, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Address, Address, AgentRole) {
        let contract = Address::from_label("token");
        let owner = Address::from_label("owner");
        (contract, owner, AgentRole::new(contract, owner))
    }

    // ── ownership ────────────────────────────────────────────────────

    #[test]
    fn test_only_owner_rejects_others() {
        let (contract, owner, roles) = setup();
        assert!(roles.only_owner(&owner).is_ok());
        let stranger = Address::from_label("stranger");
        assert_eq!(
            roles.only_owner(&stranger),
            Err(AuthorizationError::NotOwner { contract, caller: stranger })
        );
    }

    #[test]
    fn test_transfer_ownership_emits_and_moves() {
        let (_, owner, mut roles) = setup();
        let next = Address::from_label("next");
        let mut events = EventBuffer::new();
        roles.transfer_ownership(&owner, next, &mut events).unwrap();
        assert_eq!(roles.owner(), next);
        assert_eq!(events.len(), 1);
        assert!(roles.transfer_ownership(&owner, owner, &mut events).is_err());
    }

    #[test]
    fn test_transfer_ownership_to_zero_rejected() {
        let (_, owner, mut roles) = setup();
        let err = roles
            .transfer_ownership(&owner, Address::ZERO, &mut EventBuffer::new())
            .unwrap_err();
        assert!(matches!(err, TrexError::Invariant(InvariantViolation::ZeroAddress(_))));
    }

    // ── agents ───────────────────────────────────────────────────────

    #[test]
    fn test_agent_lifecycle() {
        let (_, owner, mut roles) = setup();
        let agent = Address::from_label("agent");
        let mut events = EventBuffer::new();
        roles.add_agent(&owner, agent, &mut events).unwrap();
        assert!(roles.is_agent(&agent));
        assert!(roles.only_agent(&agent).is_ok());
        roles.remove_agent(&owner, agent, &mut events).unwrap();
        assert!(!roles.is_agent(&agent));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_duplicate_agent_rejected() {
        let (_, owner, mut roles) = setup();
        let agent = Address::from_label("agent");
        let mut events = EventBuffer::new();
        roles.add_agent(&owner, agent, &mut events).unwrap();
        let err = roles.add_agent(&owner, agent, &mut events).unwrap_err();
        assert!(matches!(err, TrexError::Invariant(InvariantViolation::Duplicate { .. })));
    }

    #[test]
    fn test_non_owner_cannot_add_agent() {
        let (_, _, mut roles) = setup();
        let stranger = Address::from_label("stranger");
        let err = roles
            .add_agent(&stranger, stranger, &mut EventBuffer::new())
            .unwrap_err();
        assert!(matches!(err, TrexError::Authorization(AuthorizationError::NotOwner { .. })));
    }
}
