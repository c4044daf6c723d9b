//! # Error Taxonomy
//!
//! Every rejection in the protocol belongs to exactly one of five families,
//! so off-chain tooling can tell "needs a claim" from "needs a different
//! key" from "compliance limit reached" without parsing messages:
//!
//! | Family | Meaning |
//! |--------|---------|
//! | [`AuthorizationError`] | caller lacks the role, capability or key purpose |
//! | [`EligibilityError`] | wallet not verified: no identity or unmet claim topic |
//! | [`ComplianceRejection`] | a bound compliance module vetoed the operation |
//! | [`InvariantViolation`] | the operation would break a ledger or registry invariant |
//! | [`StateError`] | the target is in the wrong state (paused, unbound, unknown) |
//!
//! All of them are fail-closed: the runtime restores its checkpoint on any
//! error, so a rejected call leaves no partial state behind.

use thiserror::Error;

use crate::address::Address;

/// Top-level error type for the protocol.
#[derive(Error, Debug)]
pub enum TrexError {
    /// Caller lacks the required role, capability or key purpose.
    #[error("authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    /// Wallet is not eligible to hold or receive the token.
    #[error("eligibility error: {0}")]
    Eligibility(#[from] EligibilityError),

    /// A compliance module vetoed the operation.
    #[error("compliance rejection: {0}")]
    Compliance(#[from] ComplianceRejection),

    /// The operation would violate a protocol invariant.
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// The target is not in a state that admits the operation.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Deriving an identifier failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// The family a [`TrexError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authorization,
    Eligibility,
    Compliance,
    Invariant,
    State,
    Internal,
}

impl TrexError {
    /// The error family, for callers that react per family.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::Eligibility(_) => ErrorKind::Eligibility,
            Self::Compliance(_) => ErrorKind::Compliance,
            Self::Invariant(_) => ErrorKind::Invariant,
            Self::State(_) => ErrorKind::State,
            Self::Canonicalization(_) => ErrorKind::Internal,
        }
    }
}

/// Caller lacks the required privilege.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("{caller} is not the owner of {contract}")]
    NotOwner { contract: Address, caller: Address },

    #[error("{caller} is not an agent of {contract}")]
    NotAgent { contract: Address, caller: Address },

    /// The caller's key on `identity` does not carry `purpose`.
    #[error("caller key lacks {purpose} purpose on identity {identity}")]
    MissingKeyPurpose { identity: Address, purpose: String },

    /// `identity` is not in the grant set of `capability`.
    #[error("identity {identity} does not hold capability {capability}")]
    MissingCapability { capability: String, identity: Address },

    #[error("{caller} is not the token bound to compliance {compliance}")]
    NotBoundToken { compliance: Address, caller: Address },

    #[error("{caller} is neither the identity factory owner nor a registered token factory")]
    NotTokenFactory { caller: Address },

    #[error("{caller} may not deploy an identity for wallet {wallet}")]
    UnsignedDeployment { caller: Address, wallet: Address },

    #[error("{caller} is not a wallet of the identity linked to {wallet}")]
    NotLinkedWallet { caller: Address, wallet: Address },
}

/// Wallet is not eligible to hold or receive the token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EligibilityError {
    #[error("wallet {wallet} has no identity in the registry")]
    NotLinked { wallet: Address },

    #[error("identity {identity} of wallet {wallet} has no valid claim for topic {topic} from a trusted issuer")]
    MissingClaim {
        wallet: Address,
        identity: Address,
        topic: u64,
    },
}

/// A compliance module vetoed the operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComplianceRejection {
    #[error("module {module} rejected the operation: {reason}")]
    ModuleVeto { module: String, reason: String },
}

/// The operation would break a ledger or registry invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("wallet {wallet} holds {balance}, cannot move {requested}")]
    InsufficientBalance {
        wallet: Address,
        balance: u128,
        requested: u128,
    },

    #[error("wallet {wallet} has {free} unfrozen tokens, cannot move {requested}")]
    InsufficientFreeBalance {
        wallet: Address,
        free: u128,
        requested: u128,
    },

    #[error("wallet {wallet} has {frozen} frozen tokens, cannot unfreeze {requested}")]
    InsufficientFrozenTokens {
        wallet: Address,
        frozen: u128,
        requested: u128,
    },

    #[error("spender {spender} allowance from {owner} is {allowance}, cannot spend {requested}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: u128,
        requested: u128,
    },

    #[error("arithmetic overflow in {0}")]
    Overflow(String),

    #[error("wallet {wallet} is already linked to an identity")]
    AlreadyRegistered { wallet: Address },

    #[error("wallet {wallet} is linked to {linked:?}, not to identity {expected}")]
    IdentityMismatch {
        wallet: Address,
        expected: Address,
        linked: Option<Address>,
    },

    #[error("cannot remove the last management key of identity {identity}")]
    LastManagementKey { identity: Address },

    #[error("{what} already exists")]
    Duplicate { what: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{what} exceeds the limit of {max}")]
    LimitExceeded { what: String, max: usize },

    #[error("version {version} is already registered and immutable")]
    VersionImmutable { version: String },

    #[error("{0} must not be the zero address")]
    ZeroAddress(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// The target is not in a state that admits the operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("token {token} is paused")]
    Paused { token: Address },

    #[error("token {token} is not paused")]
    NotPaused { token: Address },

    #[error("wallet {wallet} is frozen on token {token}")]
    WalletFrozen { token: Address, wallet: Address },

    #[error("compliance {compliance} is already bound to token {token}")]
    ComplianceAlreadyBound { compliance: Address, token: Address },

    #[error("compliance {compliance} has no bound token")]
    NoTokenBound { compliance: Address },

    #[error("no contract at {address}")]
    UnknownContract { address: Address },

    #[error("contract at {address} is not a {expected}")]
    WrongContractKind { address: Address, expected: String },

    #[error("reentrant call into {address}")]
    Reentrancy { address: Address },

    #[error("call depth exceeded the maximum of {max}")]
    CallDepthExceeded { max: usize },

    #[error("version {version} is not registered")]
    VersionNotFound { version: String },

    #[error("version {version} is already the current version")]
    VersionAlreadyCurrent { version: String },

    #[error("implementation authority {authority} has no current version")]
    NoCurrentVersion { authority: Address },

    #[error("implementation authority {authority} is not the reference authority")]
    NotReferenceAuthority { authority: Address },

    #[error("execution {id} does not exist")]
    ExecutionNotFound { id: u64 },

    #[error("execution {id} was already executed")]
    AlreadyExecuted { id: u64 },
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Amounts must be integers in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
