//! Capability vocabularies of the two managers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A grantable capability.
pub trait Capability: Copy + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// The capability that administers the others.
    const ADMIN: Self;

    fn name(&self) -> &'static str;

    fn is_admin(&self) -> bool {
        *self == Self::ADMIN
    }
}

/// Operational capabilities on the token and its identity registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCapability {
    /// Mint and burn.
    SupplyModifier,
    /// Address and partial freezes, pause and unpause.
    Freezer,
    /// Forced transfers.
    TransferManager,
    /// Wallet recovery.
    RecoveryAgent,
    /// Held for off-chain policy; no operation is forwarded for it.
    ComplianceAgent,
    /// Identity registration and maintenance.
    WhiteListManager,
    AgentAdmin,
}

impl Capability for AgentCapability {
    const ADMIN: Self = Self::AgentAdmin;

    fn name(&self) -> &'static str {
        match self {
            Self::SupplyModifier => "SupplyModifier",
            Self::Freezer => "Freezer",
            Self::TransferManager => "TransferManager",
            Self::RecoveryAgent => "RecoveryAgent",
            Self::ComplianceAgent => "ComplianceAgent",
            Self::WhiteListManager => "WhiteListManager",
            Self::AgentAdmin => "AgentAdmin",
        }
    }
}

impl fmt::Display for AgentCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration capabilities over every contract of a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerCapability {
    RegistryAddressSetter,
    ComplianceSetter,
    ComplianceManager,
    TokenInfoManager,
    ClaimRegistryManager,
    IssuersRegistryManager,
    OwnerAdmin,
}

impl Capability for OwnerCapability {
    const ADMIN: Self = Self::OwnerAdmin;

    fn name(&self) -> &'static str {
        match self {
            Self::RegistryAddressSetter => "RegistryAddressSetter",
            Self::ComplianceSetter => "ComplianceSetter",
            Self::ComplianceManager => "ComplianceManager",
            Self::TokenInfoManager => "TokenInfoManager",
            Self::ClaimRegistryManager => "ClaimRegistryManager",
            Self::IssuersRegistryManager => "IssuersRegistryManager",
            Self::OwnerAdmin => "OwnerAdmin",
        }
    }
}

impl fmt::Display for OwnerCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
