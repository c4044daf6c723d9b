//! # Calls
//!
//! Everything a principal can ask a contract to do, as data. A [`Call`] is
//! what [`Runtime::call`](crate::Runtime::call) dispatches, what an
//! identity stores in its execution requests and what managers forward.
//! Each family names the contract kind it must land on; sending it
//! anywhere else is a `WrongContractKind` state error.

use serde::{Deserialize, Serialize};
use trex_compliance::{ModuleCall, ModuleConfig};
use trex_core::{Address, ClaimId, ClaimTopic, KeyHash, Version};
use trex_factory::{ClaimDetails, ContractKind, TokenDetails};
use trex_identity::{Claim, KeyPurpose, KeyType};
use trex_registry::Registration;
use trex_roles::{AgentAction, AgentCapability, OwnerAction, OwnerCapability};
use trex_token::PausePolicy;

use crate::world::kind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Call {
    Identity(IdentityCall),
    IdFactory(IdFactoryCall),
    Gateway(GatewayCall),
    ClaimTopics(ClaimTopicsCall),
    TrustedIssuers(TrustedIssuersCall),
    Storage(StorageCall),
    Registry(RegistryCall),
    Compliance(ComplianceCall),
    Token(TokenCall),
    AgentManager(ManagerCall<AgentCapability, AgentAction>),
    OwnerManager(ManagerCall<OwnerCapability, OwnerAction>),
    Authority(AuthorityCall),
    TrexFactory(TrexFactoryCall),
    /// Ownership and agent management, valid on any contract that has them.
    Ownership(OwnershipCall),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityCall {
    AddKey { key: KeyHash, purpose: KeyPurpose, key_type: KeyType },
    RemoveKey { key: KeyHash, purpose: KeyPurpose },
    AddClaim { claim: Claim },
    RemoveClaim { claim_id: ClaimId },
    RevokeClaimBySignature { signature: Vec<u8> },
    /// Ask the identity to call `to` with itself as the caller.
    Execute { to: Address, value: u128, call: Box<Call> },
    Approve { execution_id: u64, approve: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFactoryCall {
    CreateIdentity { wallet: Address, salt: String },
    CreateTokenIdentity { token: Address, token_owner: Address, salt: String },
    LinkWallet { wallet: Address },
    UnlinkWallet { wallet: Address },
    AddTokenFactory { factory: Address },
    RemoveTokenFactory { factory: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayCall {
    DeployIdentityForWallet { wallet: Address },
    DeployIdentityWithSalt { wallet: Address, salt: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimTopicsCall {
    AddClaimTopic { topic: ClaimTopic },
    RemoveClaimTopic { topic: ClaimTopic },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustedIssuersCall {
    AddTrustedIssuer { issuer: Address, topics: Vec<ClaimTopic> },
    RemoveTrustedIssuer { issuer: Address },
    UpdateIssuerClaimTopics { issuer: Address, topics: Vec<ClaimTopic> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageCall {
    BindIdentityRegistry { registry: Address },
    UnbindIdentityRegistry { registry: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryCall {
    RegisterIdentity { wallet: Address, identity: Address, country: u16 },
    BatchRegisterIdentity { rows: Vec<Registration> },
    UpdateIdentity { wallet: Address, identity: Address },
    UpdateCountry { wallet: Address, country: u16 },
    DeleteIdentity { wallet: Address },
    SetIdentityRegistryStorage { storage: Address },
    SetClaimTopicsRegistry { registry: Address },
    SetTrustedIssuersRegistry { registry: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceCall {
    BindToken { token: Address },
    UnbindToken { token: Address },
    AddModule { module: ModuleConfig },
    RemoveModule { name: String },
    CallModuleFunction { module: String, call: ModuleCall },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCall {
    Transfer { to: Address, amount: u128 },
    BatchTransfer { transfers: Vec<(Address, u128)> },
    TransferFrom { from: Address, to: Address, amount: u128 },
    Approve { spender: Address, amount: u128 },
    IncreaseAllowance { spender: Address, added: u128 },
    DecreaseAllowance { spender: Address, subtracted: u128 },
    Mint { to: Address, amount: u128 },
    BatchMint { mints: Vec<(Address, u128)> },
    Burn { from: Address, amount: u128 },
    BatchBurn { burns: Vec<(Address, u128)> },
    ForcedTransfer { from: Address, to: Address, amount: u128 },
    BatchForcedTransfer { transfers: Vec<(Address, Address, u128)> },
    RecoveryAddress { lost_wallet: Address, new_wallet: Address, investor_identity: Address },
    SetAddressFrozen { wallet: Address, freeze: bool },
    BatchSetAddressFrozen { updates: Vec<(Address, bool)> },
    FreezePartialTokens { wallet: Address, amount: u128 },
    BatchFreezePartialTokens { updates: Vec<(Address, u128)> },
    UnfreezePartialTokens { wallet: Address, amount: u128 },
    BatchUnfreezePartialTokens { updates: Vec<(Address, u128)> },
    Pause,
    Unpause,
    SetName { name: String },
    SetSymbol { symbol: String },
    SetOnchainId { onchain_id: Address },
    SetIdentityRegistry { registry: Address },
    SetCompliance { compliance: Address },
}

/// Calls on an agent or owner manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerCall<C, A> {
    Grant {
        capability: C,
        identity: Address,
        /// Admin identity the caller acts for when it is not the owner.
        #[serde(default)]
        admin_identity: Option<Address>,
    },
    Revoke {
        capability: C,
        identity: Address,
        #[serde(default)]
        admin_identity: Option<Address>,
    },
    /// Forward `action` on behalf of `identity`, which must hold the
    /// action's capability and have the caller as an ACTION key.
    Execute { identity: Address, action: A },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityCall {
    /// Register the reference implementation set of `version`.
    AddTrexVersion {
        version: Version,
        #[serde(default)]
        pause_policy: Option<PausePolicy>,
    },
    UseTrexVersion { version: Version },
    AddAndUseTrexVersion {
        version: Version,
        #[serde(default)]
        pause_policy: Option<PausePolicy>,
    },
    FetchVersion { version: Version },
    SetTrexFactory { factory: Address },
    SetIaFactory { factory: Address },
    /// Point every proxy of `token`'s suite at `new_authority`, or at a
    /// freshly deployed authority when `None`.
    ChangeImplementationAuthority {
        token: Address,
        #[serde(default)]
        new_authority: Option<Address>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrexFactoryCall {
    DeployTrexSuite {
        salt: String,
        token: TokenDetails,
        #[serde(default)]
        claims: ClaimDetails,
    },
    SetImplementationAuthority { authority: Address },
    SetIdFactory { factory: Address },
    RecoverContractOwnership { contract: Address, new_owner: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipCall {
    TransferOwnership { new_owner: Address },
    AddAgent { agent: Address },
    RemoveAgent { agent: Address },
}

impl Call {
    /// The contract kind this call must land on. `None` for ownership
    /// calls, which any owned contract accepts.
    pub fn target_kind(&self) -> Option<&'static str> {
        Some(match self {
            Self::Identity(_) => kind::IDENTITY,
            Self::IdFactory(_) => kind::ID_FACTORY,
            Self::Gateway(_) => kind::GATEWAY,
            Self::ClaimTopics(_) => ContractKind::ClaimTopicsRegistry.as_str(),
            Self::TrustedIssuers(_) => ContractKind::TrustedIssuersRegistry.as_str(),
            Self::Storage(_) => ContractKind::IdentityRegistryStorage.as_str(),
            Self::Registry(_) => ContractKind::IdentityRegistry.as_str(),
            Self::Compliance(_) => ContractKind::ModularCompliance.as_str(),
            Self::Token(_) => ContractKind::Token.as_str(),
            Self::AgentManager(_) => kind::AGENT_MANAGER,
            Self::OwnerManager(_) => kind::OWNER_MANAGER,
            Self::Authority(_) => kind::IMPLEMENTATION_AUTHORITY,
            Self::TrexFactory(_) => kind::TREX_FACTORY,
            Self::Ownership(_) => return None,
        })
    }
}

impl From<TokenCall> for Call {
    fn from(call: TokenCall) -> Self {
        Self::Token(call)
    }
}

impl From<RegistryCall> for Call {
    fn from(call: RegistryCall) -> Self {
        Self::Registry(call)
    }
}

impl From<ComplianceCall> for Call {
    fn from(call: ComplianceCall) -> Self {
        Self::Compliance(call)
    }
}

impl From<IdentityCall> for Call {
    fn from(call: IdentityCall) -> Self {
        Self::Identity(call)
    }
}

impl From<OwnershipCall> for Call {
    fn from(call: OwnershipCall) -> Self {
        Self::Ownership(call)
    }
}

/// The call an agent action forwards to its suite contract.
pub(crate) fn agent_action_call(action: AgentAction) -> Call {
    match action {
        AgentAction::Mint { to, amount } => TokenCall::Mint { to, amount }.into(),
        AgentAction::BatchMint { mints } => TokenCall::BatchMint { mints }.into(),
        AgentAction::Burn { from, amount } => TokenCall::Burn { from, amount }.into(),
        AgentAction::BatchBurn { burns } => TokenCall::BatchBurn { burns }.into(),
        AgentAction::SetAddressFrozen { wallet, freeze } => TokenCall::SetAddressFrozen { wallet, freeze }.into(),
        AgentAction::BatchSetAddressFrozen { updates } => TokenCall::BatchSetAddressFrozen { updates }.into(),
        AgentAction::FreezePartialTokens { wallet, amount } => TokenCall::FreezePartialTokens { wallet, amount }.into(),
        AgentAction::BatchFreezePartialTokens { updates } => TokenCall::BatchFreezePartialTokens { updates }.into(),
        AgentAction::UnfreezePartialTokens { wallet, amount } => {
            TokenCall::UnfreezePartialTokens { wallet, amount }.into()
        }
        AgentAction::BatchUnfreezePartialTokens { updates } => TokenCall::BatchUnfreezePartialTokens { updates }.into(),
        AgentAction::Pause => TokenCall::Pause.into(),
        AgentAction::Unpause => TokenCall::Unpause.into(),
        AgentAction::ForcedTransfer { from, to, amount } => TokenCall::ForcedTransfer { from, to, amount }.into(),
        AgentAction::BatchForcedTransfer { transfers } => TokenCall::BatchForcedTransfer { transfers }.into(),
        AgentAction::RecoveryAddress {
            lost_wallet,
            new_wallet,
            investor_identity,
        } => TokenCall::RecoveryAddress {
            lost_wallet,
            new_wallet,
            investor_identity,
        }
        .into(),
        AgentAction::RegisterIdentity {
            wallet,
            identity,
            country,
        } => RegistryCall::RegisterIdentity {
            wallet,
            identity,
            country,
        }
        .into(),
        AgentAction::UpdateIdentity { wallet, identity } => RegistryCall::UpdateIdentity { wallet, identity }.into(),
        AgentAction::UpdateCountry { wallet, country } => RegistryCall::UpdateCountry { wallet, country }.into(),
        AgentAction::DeleteIdentity { wallet } => RegistryCall::DeleteIdentity { wallet }.into(),
    }
}

pub(crate) fn owner_action_call(action: OwnerAction) -> Call {
    match action {
        OwnerAction::SetIdentityRegistry { registry } => TokenCall::SetIdentityRegistry { registry }.into(),
        OwnerAction::SetClaimTopicsRegistry { registry } => RegistryCall::SetClaimTopicsRegistry { registry }.into(),
        OwnerAction::SetTrustedIssuersRegistry { registry } => {
            RegistryCall::SetTrustedIssuersRegistry { registry }.into()
        }
        OwnerAction::SetCompliance { compliance } => TokenCall::SetCompliance { compliance }.into(),
        OwnerAction::AddModule { module } => ComplianceCall::AddModule { module }.into(),
        OwnerAction::RemoveModule { name } => ComplianceCall::RemoveModule { name }.into(),
        OwnerAction::CallModuleFunction { module, call } => ComplianceCall::CallModuleFunction { module, call }.into(),
        OwnerAction::SetName { name } => TokenCall::SetName { name }.into(),
        OwnerAction::SetSymbol { symbol } => TokenCall::SetSymbol { symbol }.into(),
        OwnerAction::SetOnchainId { onchain_id } => TokenCall::SetOnchainId { onchain_id }.into(),
        OwnerAction::AddClaimTopic { topic } => Call::ClaimTopics(ClaimTopicsCall::AddClaimTopic { topic }),
        OwnerAction::RemoveClaimTopic { topic } => Call::ClaimTopics(ClaimTopicsCall::RemoveClaimTopic { topic }),
        OwnerAction::AddTrustedIssuer { issuer, topics } => {
            Call::TrustedIssuers(TrustedIssuersCall::AddTrustedIssuer { issuer, topics })
        }
        OwnerAction::RemoveTrustedIssuer { issuer } => {
            Call::TrustedIssuers(TrustedIssuersCall::RemoveTrustedIssuer { issuer })
        }
        OwnerAction::UpdateIssuerClaimTopics { issuer, topics } => {
            Call::TrustedIssuers(TrustedIssuersCall::UpdateIssuerClaimTopics { issuer, topics })
        }
        OwnerAction::AddAgent { agent, .. } => OwnershipCall::AddAgent { agent }.into(),
        OwnerAction::RemoveAgent { agent, .. } => OwnershipCall::RemoveAgent { agent }.into(),
        OwnerAction::TransferOwnership { new_owner, .. } => OwnershipCall::TransferOwnership { new_owner }.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_json_shape() {
        let call = Call::Token(TokenCall::Mint {
            to: Address::ZERO,
            amount: 50,
        });
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["token"]["mint"]["amount"], 50);
        let back: Call = serde_json::from_value(json).unwrap();
        assert_eq!(back, call);
    }

    #[test]
    fn test_manager_grant_admin_identity_defaults() {
        let identity = Address::from_label("ops-id");
        let json = serde_json::json!({
            "agent_manager": {"grant": {"capability": "supply_modifier", "identity": identity.to_string()}}
        });
        let call: Call = serde_json::from_value(json).unwrap();
        assert_eq!(
            call,
            Call::AgentManager(ManagerCall::Grant {
                capability: AgentCapability::SupplyModifier,
                identity,
                admin_identity: None,
            })
        );
    }

    #[test]
    fn test_agent_actions_land_where_their_target_says() {
        let wallet = Address::from_label("w");
        assert!(matches!(agent_action_call(AgentAction::Pause), Call::Token(TokenCall::Pause)));
        assert!(matches!(
            agent_action_call(AgentAction::DeleteIdentity { wallet }),
            Call::Registry(RegistryCall::DeleteIdentity { .. })
        ));
        assert!(matches!(
            owner_action_call(OwnerAction::AddClaimTopic { topic: ClaimTopic(1) }),
            Call::ClaimTopics(_)
        ));
    }

    #[test]
    fn test_target_kind_names_the_receiving_contract() {
        assert_eq!(Call::Token(TokenCall::Pause).target_kind(), Some("token"));
        assert_eq!(
            Call::Storage(StorageCall::BindIdentityRegistry { registry: Address::ZERO }).target_kind(),
            Some("identity_registry_storage")
        );
        let ownership: Call = OwnershipCall::AddAgent { agent: Address::ZERO }.into();
        assert_eq!(ownership.target_kind(), None);
    }
}
