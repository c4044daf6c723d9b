//! Implementation sets.
//!
//! A suite contract's state lives behind a [`Proxy`](crate::Proxy); its
//! behavior is whatever implementation the proxy's authority currently
//! resolves for its kind. Implementations here carry the version tag and
//! the version-level policy the host applies when it dispatches a call.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trex_core::{InvariantViolation, Version};
use trex_token::{ImplementationInfo, PausePolicy};

/// The six proxied contract kinds of a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    Token,
    IdentityRegistry,
    IdentityRegistryStorage,
    TrustedIssuersRegistry,
    ClaimTopicsRegistry,
    ModularCompliance,
}

impl ContractKind {
    pub const ALL: [ContractKind; 6] = [
        Self::Token,
        Self::IdentityRegistry,
        Self::IdentityRegistryStorage,
        Self::TrustedIssuersRegistry,
        Self::ClaimTopicsRegistry,
        Self::ModularCompliance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::IdentityRegistry => "identity_registry",
            Self::IdentityRegistryStorage => "identity_registry_storage",
            Self::TrustedIssuersRegistry => "trusted_issuers_registry",
            Self::ClaimTopicsRegistry => "claim_topics_registry",
            Self::ModularCompliance => "modular_compliance",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contract implementation registered under a version.
pub trait Implementation: Send + Sync + fmt::Debug {
    fn kind(&self) -> ContractKind;

    fn version(&self) -> Version;

    /// Remediation paths left open while paused. Only meaningful for
    /// token implementations.
    fn pause_policy(&self) -> PausePolicy {
        PausePolicy::default()
    }
}

/// The implementation shipped with this workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceImplementation {
    pub kind: ContractKind,
    pub version: Version,
    pub pause_policy: PausePolicy,
}

impl Implementation for ReferenceImplementation {
    fn kind(&self) -> ContractKind {
        self.kind
    }

    fn version(&self) -> Version {
        self.version
    }

    fn pause_policy(&self) -> PausePolicy {
        self.pause_policy
    }
}

/// The six implementations a version consists of.
#[derive(Debug, Clone)]
pub struct ImplementationSet {
    pub token: Arc<dyn Implementation>,
    pub identity_registry: Arc<dyn Implementation>,
    pub identity_registry_storage: Arc<dyn Implementation>,
    pub trusted_issuers_registry: Arc<dyn Implementation>,
    pub claim_topics_registry: Arc<dyn Implementation>,
    pub modular_compliance: Arc<dyn Implementation>,
}

impl ImplementationSet {
    /// The reference implementations at `version`.
    pub fn reference(version: Version, pause_policy: PausePolicy) -> Self {
        let make = |kind| -> Arc<dyn Implementation> {
            Arc::new(ReferenceImplementation {
                kind,
                version,
                pause_policy,
            })
        };
        Self {
            token: make(ContractKind::Token),
            identity_registry: make(ContractKind::IdentityRegistry),
            identity_registry_storage: make(ContractKind::IdentityRegistryStorage),
            trusted_issuers_registry: make(ContractKind::TrustedIssuersRegistry),
            claim_topics_registry: make(ContractKind::ClaimTopicsRegistry),
            modular_compliance: make(ContractKind::ModularCompliance),
        }
    }

    pub fn get(&self, kind: ContractKind) -> &Arc<dyn Implementation> {
        match kind {
            ContractKind::Token => &self.token,
            ContractKind::IdentityRegistry => &self.identity_registry,
            ContractKind::IdentityRegistryStorage => &self.identity_registry_storage,
            ContractKind::TrustedIssuersRegistry => &self.trusted_issuers_registry,
            ContractKind::ClaimTopicsRegistry => &self.claim_topics_registry,
            ContractKind::ModularCompliance => &self.modular_compliance,
        }
    }

    /// Every slot must hold an implementation of its own kind tagged with
    /// `version`.
    pub fn validate(&self, version: Version) -> Result<(), InvariantViolation> {
        for kind in ContractKind::ALL {
            let implementation = self.get(kind);
            if implementation.kind() != kind {
                return Err(InvariantViolation::InvalidInput(format!(
                    "{kind} slot holds a {} implementation",
                    implementation.kind()
                )));
            }
            if implementation.version() != version {
                return Err(InvariantViolation::InvalidInput(format!(
                    "{kind} implementation is tagged {}, expected {version}",
                    implementation.version()
                )));
            }
        }
        Ok(())
    }

    pub fn token_info(&self) -> ImplementationInfo {
        ImplementationInfo {
            version: self.token.version(),
            pause_policy: self.token.pause_policy(),
        }
    }
}
