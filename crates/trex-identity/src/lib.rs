//! # trex-identity: On-chain Identities
//!
//! - [`Identity`]: purpose-scoped keys, claims, execution requests and the
//!   claim-issuer role.
//! - [`signing`]: Ed25519 claim signatures over canonical payloads.
//! - [`IdentityDirectory`]: read-only lookups used by registries and
//!   managers.
//! - [`IdFactory`] and [`Gateway`]: salted deployment and the wallet →
//!   identity index.
//!
//! ## Crate Policy
//!
//! - Depends only on `trex-core`.
//! - No `unsafe` code. No `.unwrap()` outside tests.

pub mod claim;
pub mod directory;
pub mod factory;
pub mod gateway;
pub mod identity;
pub mod key;
pub mod signing;

pub use claim::Claim;
pub use directory::IdentityDirectory;
pub use factory::{IdFactory, NewIdentity, MAX_WALLETS_PER_IDENTITY};
pub use gateway::Gateway;
pub use identity::{Dispatch, Execution, ExecutionTicket, Identity};
pub use key::{Key, KeyPurpose, KeyType};
pub use signing::{ClaimSigner, SignatureError};
