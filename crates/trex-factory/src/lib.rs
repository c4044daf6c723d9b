//! # trex-factory: Versioned Deployment
//!
//! Implements the upgrade and deployment layer:
//!
//! - [`ImplementationSet`] / [`Implementation`]: one implementation per
//!   suite contract kind, tagged with a version.
//! - [`ImplementationAuthority`]: an immutable version table plus the
//!   current version. Suites follow it through their [`Proxy`].
//! - [`IAFactory`]: deploys a dedicated authority for a token that wants to
//!   leave the shared upgrade path.
//! - [`TrexFactory`]: deploys a fully wired suite from [`TokenDetails`] and
//!   [`ClaimDetails`] in one step.
//!
//! ## Crate Policy
//!
//! - Components are plain state; the host resolves cross-contract
//!   references and restores its checkpoint when a deployment fails.
//! - No `unsafe` code. No `.unwrap()` outside tests.

pub mod authority;
pub mod details;
pub mod ia_factory;
pub mod implementation;
pub mod proxy;
pub mod trex_factory;

pub use authority::ImplementationAuthority;
pub use details::{
    ClaimDetails, TokenDetails, MAX_CLAIM_TOPICS, MAX_COMPLIANCE_MODULES, MAX_IR_AGENTS, MAX_ISSUERS,
    MAX_TOKEN_AGENTS,
};
pub use ia_factory::IAFactory;
pub use implementation::{ContractKind, Implementation, ImplementationSet, ReferenceImplementation};
pub use proxy::Proxy;
pub use trex_factory::{Suite, SuiteAddresses, TrexFactory};
