//! # trex-roles: Agent and Owner Managers
//!
//! Splits the coarse owner and agent roles of a suite into independently
//! revocable capabilities granted to identities.
//!
//! - [`AgentManager`] holds [`AgentCapability`] grants and is an agent of
//!   the token and the identity registry.
//! - [`OwnerManager`] holds [`OwnerCapability`] grants and owns the suite
//!   contracts.
//! - [`AgentAction`] / [`OwnerAction`] name the forwarded operations, the
//!   capability each requires and the contract each lands on.
//!
//! The managers decide *whether* a call is forwarded; the host performs
//! the forwarded call with the manager's address as caller.

pub mod action;
pub mod capability;
pub mod manager;

pub use action::{AgentAction, ManagedContract, OwnerAction};
pub use capability::{AgentCapability, Capability, OwnerCapability};
pub use manager::{AgentManager, Manager, OwnerManager};
