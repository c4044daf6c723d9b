//! # trex-registry: Eligibility Registries
//!
//! - [`ClaimTopicsRegistry`]: topics every holder must carry.
//! - [`TrustedIssuersRegistry`]: issuers trusted per topic.
//! - [`IdentityRegistryStorage`]: the shareable wallet → identity table.
//! - [`IdentityRegistry`]: agent-gated registration front and wiring.
//! - [`Verifier`]: the live eligibility check, an `EligibilityOracle`.

pub mod issuers;
pub mod registry;
pub mod storage;
pub mod topics;
pub mod verifier;

pub use issuers::{TrustedIssuersRegistry, MAX_TOPICS_PER_ISSUER, MAX_TRUSTED_ISSUERS};
pub use registry::{IdentityRegistry, Registration};
pub use storage::{IdentityRegistryStorage, StoredIdentity, MAX_BOUND_REGISTRIES};
pub use topics::{ClaimTopicsRegistry, MAX_CLAIM_TOPICS};
pub use verifier::Verifier;
