//! Operations a manager forwards, each tied to the capability it needs and
//! the suite contract it lands on.

use serde::{Deserialize, Serialize};
use trex_compliance::{ModuleCall, ModuleConfig};
use trex_core::{Address, ClaimTopic};

use crate::capability::{AgentCapability, OwnerCapability};

/// The suite contract an action is forwarded to. The host resolves the
/// address from the manager's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagedContract {
    Token,
    IdentityRegistry,
    ModularCompliance,
    ClaimTopicsRegistry,
    TrustedIssuersRegistry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    Mint { to: Address, amount: u128 },
    BatchMint { mints: Vec<(Address, u128)> },
    Burn { from: Address, amount: u128 },
    BatchBurn { burns: Vec<(Address, u128)> },
    SetAddressFrozen { wallet: Address, freeze: bool },
    BatchSetAddressFrozen { updates: Vec<(Address, bool)> },
    FreezePartialTokens { wallet: Address, amount: u128 },
    BatchFreezePartialTokens { updates: Vec<(Address, u128)> },
    UnfreezePartialTokens { wallet: Address, amount: u128 },
    BatchUnfreezePartialTokens { updates: Vec<(Address, u128)> },
    Pause,
    Unpause,
    ForcedTransfer { from: Address, to: Address, amount: u128 },
    BatchForcedTransfer { transfers: Vec<(Address, Address, u128)> },
    RecoveryAddress { lost_wallet: Address, new_wallet: Address, investor_identity: Address },
    RegisterIdentity { wallet: Address, identity: Address, country: u16 },
    UpdateIdentity { wallet: Address, identity: Address },
    UpdateCountry { wallet: Address, country: u16 },
    DeleteIdentity { wallet: Address },
}

impl AgentAction {
    pub fn capability(&self) -> AgentCapability {
        match self {
            Self::Mint { .. } | Self::BatchMint { .. } | Self::Burn { .. } | Self::BatchBurn { .. } => {
                AgentCapability::SupplyModifier
            }
            Self::SetAddressFrozen { .. }
            | Self::BatchSetAddressFrozen { .. }
            | Self::FreezePartialTokens { .. }
            | Self::BatchFreezePartialTokens { .. }
            | Self::UnfreezePartialTokens { .. }
            | Self::BatchUnfreezePartialTokens { .. }
            | Self::Pause
            | Self::Unpause => AgentCapability::Freezer,
            Self::ForcedTransfer { .. } | Self::BatchForcedTransfer { .. } => AgentCapability::TransferManager,
            Self::RecoveryAddress { .. } => AgentCapability::RecoveryAgent,
            Self::RegisterIdentity { .. }
            | Self::UpdateIdentity { .. }
            | Self::UpdateCountry { .. }
            | Self::DeleteIdentity { .. } => AgentCapability::WhiteListManager,
        }
    }

    pub fn target(&self) -> ManagedContract {
        match self.capability() {
            AgentCapability::WhiteListManager => ManagedContract::IdentityRegistry,
            _ => ManagedContract::Token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerAction {
    SetIdentityRegistry { registry: Address },
    SetClaimTopicsRegistry { registry: Address },
    SetTrustedIssuersRegistry { registry: Address },
    SetCompliance { compliance: Address },
    AddModule { module: ModuleConfig },
    RemoveModule { name: String },
    CallModuleFunction { module: String, call: ModuleCall },
    SetName { name: String },
    SetSymbol { symbol: String },
    SetOnchainId { onchain_id: Address },
    AddClaimTopic { topic: ClaimTopic },
    RemoveClaimTopic { topic: ClaimTopic },
    AddTrustedIssuer { issuer: Address, topics: Vec<ClaimTopic> },
    RemoveTrustedIssuer { issuer: Address },
    UpdateIssuerClaimTopics { issuer: Address, topics: Vec<ClaimTopic> },
    AddAgent { contract: ManagedContract, agent: Address },
    RemoveAgent { contract: ManagedContract, agent: Address },
    TransferOwnership { contract: ManagedContract, new_owner: Address },
}

impl OwnerAction {
    pub fn capability(&self) -> OwnerCapability {
        match self {
            Self::SetIdentityRegistry { .. }
            | Self::SetClaimTopicsRegistry { .. }
            | Self::SetTrustedIssuersRegistry { .. } => OwnerCapability::RegistryAddressSetter,
            Self::SetCompliance { .. } => OwnerCapability::ComplianceSetter,
            Self::AddModule { .. } | Self::RemoveModule { .. } | Self::CallModuleFunction { .. } => {
                OwnerCapability::ComplianceManager
            }
            Self::SetName { .. } | Self::SetSymbol { .. } | Self::SetOnchainId { .. } => {
                OwnerCapability::TokenInfoManager
            }
            Self::AddClaimTopic { .. } | Self::RemoveClaimTopic { .. } => OwnerCapability::ClaimRegistryManager,
            Self::AddTrustedIssuer { .. } | Self::RemoveTrustedIssuer { .. } | Self::UpdateIssuerClaimTopics { .. } => {
                OwnerCapability::IssuersRegistryManager
            }
            Self::AddAgent { .. } | Self::RemoveAgent { .. } | Self::TransferOwnership { .. } => {
                OwnerCapability::OwnerAdmin
            }
        }
    }

    pub fn target(&self) -> ManagedContract {
        match self {
            Self::SetIdentityRegistry { .. }
            | Self::SetCompliance { .. }
            | Self::SetName { .. }
            | Self::SetSymbol { .. }
            | Self::SetOnchainId { .. } => ManagedContract::Token,
            Self::SetClaimTopicsRegistry { .. } | Self::SetTrustedIssuersRegistry { .. } => {
                ManagedContract::IdentityRegistry
            }
            Self::AddModule { .. } | Self::RemoveModule { .. } | Self::CallModuleFunction { .. } => {
                ManagedContract::ModularCompliance
            }
            Self::AddClaimTopic { .. } | Self::RemoveClaimTopic { .. } => ManagedContract::ClaimTopicsRegistry,
            Self::AddTrustedIssuer { .. } | Self::RemoveTrustedIssuer { .. } | Self::UpdateIssuerClaimTopics { .. } => {
                ManagedContract::TrustedIssuersRegistry
            }
            Self::AddAgent { contract, .. } | Self::RemoveAgent { contract, .. } | Self::TransferOwnership { contract, .. } => {
                *contract
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_action_routing() {
        let mint = AgentAction::Mint {
            to: Address::from_label("a"),
            amount: 1,
        };
        assert_eq!(mint.capability(), AgentCapability::SupplyModifier);
        assert_eq!(mint.target(), ManagedContract::Token);
        let register = AgentAction::DeleteIdentity {
            wallet: Address::from_label("a"),
        };
        assert_eq!(register.capability(), AgentCapability::WhiteListManager);
        assert_eq!(register.target(), ManagedContract::IdentityRegistry);
        assert_eq!(AgentAction::Pause.capability(), AgentCapability::Freezer);
    }

    #[test]
    fn test_owner_action_routing() {
        let add = OwnerAction::AddClaimTopic { topic: ClaimTopic(7) };
        assert_eq!(add.capability(), OwnerCapability::ClaimRegistryManager);
        assert_eq!(add.target(), ManagedContract::ClaimTopicsRegistry);
        let agent = OwnerAction::AddAgent {
            contract: ManagedContract::IdentityRegistry,
            agent: Address::from_label("a"),
        };
        assert_eq!(agent.capability(), OwnerCapability::OwnerAdmin);
        assert_eq!(agent.target(), ManagedContract::IdentityRegistry);
    }

    #[test]
    fn test_action_serde_shape() {
        let json = serde_json::to_value(AgentAction::Pause).unwrap();
        assert_eq!(json, serde_json::json!("pause"));
        let call = OwnerAction::SetName { name: "X".into() };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json, serde_json::json!({"set_name": {"name": "X"}}));
    }
}
