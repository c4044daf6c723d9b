//! # trex-core: Foundational Types for the T-REX Protocol
//!
//! Every other crate in the workspace depends on `trex-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtypes for identifiers.** `Address`, `KeyHash`, `ClaimTopic`,
//!    `ClaimId`, `Version`. No bare strings or byte arrays.
//!
//! 2. **`CanonicalBytes` newtype.** Every derived identifier (contract
//!    addresses, key hashes, claim ids, claim signing payloads) is a SHA-256
//!    over JCS canonical bytes. `sha256_digest()` accepts nothing else.
//!
//! 3. **One error taxonomy.** `TrexError` has exactly one variant per
//!    rejection family, so callers branch on `kind()` rather than messages.
//!
//! 4. **Events are buffered per call.** Components emit into an
//!    `EventBuffer`; only a committed call reaches the `EventLog`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `trex-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - Public data types derive `Debug` and `Clone`; those crossing a config
//!   or event boundary implement `Serialize`/`Deserialize`.

pub mod access;
pub mod address;
pub mod canonical;
pub mod claim;
pub mod digest;
pub mod error;
pub mod event;
pub mod ledger;
pub mod temporal;
pub mod version;

// Re-export primary types for ergonomic imports.
pub use access::{AgentRole, Ownable};
pub use address::{Address, KeyHash};
pub use canonical::CanonicalBytes;
pub use claim::{ClaimId, ClaimTopic};
pub use digest::{sha256_digest, ContentDigest};
pub use error::{
    AuthorizationError, CanonicalizationError, ComplianceRejection, EligibilityError, ErrorKind,
    InvariantViolation, StateError, TrexError,
};
pub use event::{Event, EventBuffer, EventLog, EventRecord, SuiteRecord};
pub use ledger::{ComplianceContext, ComplianceGate, EligibilityOracle, LedgerView};
pub use temporal::Timestamp;
pub use version::Version;
