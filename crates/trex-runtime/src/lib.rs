//! # trex-runtime: Host Model
//!
//! Owns the state of every deployed contract and is the only way to change
//! it:
//!
//! - [`Runtime::call`] sends a [`Call`] from a principal to a contract and
//!   either commits all of its effects and events or none of them.
//! - [`World`] holds contract state by address; suite contracts sit behind a
//!   proxy naming the implementation authority they resolve through.
//! - Cross-contract calls (identity execution, manager forwarding, token
//!   recovery, compliance rebinding) run under a non-reentrancy guard and a
//!   call depth bound from [`RuntimeConfig`].
//! - The committed [`EventLog`](trex_core::EventLog) answers the queries
//!   off-chain tooling relies on: wallet links, suite records, capability
//!   history.
//!
//! ## Crate Policy
//!
//! - One writer. Callers hold a `&mut Runtime`; nothing is shared across
//!   threads.
//! - No `unsafe` code. No `.unwrap()` outside tests.

pub mod call;
pub mod config;
mod dispatch;
pub mod runtime;
pub mod world;

pub use call::{
    AuthorityCall, Call, ClaimTopicsCall, ComplianceCall, GatewayCall, IdFactoryCall, IdentityCall, ManagerCall,
    OwnershipCall, RegistryCall, StorageCall, TokenCall, TrexFactoryCall, TrustedIssuersCall,
};
pub use config::{ConfigError, RuntimeConfig};
pub use runtime::{Deployment, Output, Receipt, Runtime, REFERENCE_VERSION};
pub use world::{IdentityState, World};
