//! # World State
//!
//! Every contract's state, keyed by address and grouped by kind. Suite
//! contracts sit behind a [`Proxy`] naming the implementation authority
//! they resolve through.
//!
//! The world is `Clone`; the runtime's checkpoint is a clone taken before a
//! call and restored when the call fails.

use std::collections::BTreeMap;

use trex_compliance::ModularCompliance;
use trex_core::{AgentRole, Address, CanonicalizationError, Ownable, StateError, TrexError};
use trex_factory::{ContractKind, IAFactory, ImplementationAuthority, Proxy, TrexFactory};
use trex_identity::{Gateway, IdFactory, Identity, IdentityDirectory};
use trex_registry::{ClaimTopicsRegistry, IdentityRegistry, IdentityRegistryStorage, TrustedIssuersRegistry, Verifier};
use trex_roles::{AgentManager, OwnerManager};
use trex_token::{ImplementationInfo, Token, TokenEnv};

use crate::call::Call;

/// Names of the contract kinds that are not suite contracts.
pub mod kind {
    pub const IDENTITY: &str = "identity";
    pub const ID_FACTORY: &str = "id_factory";
    pub const GATEWAY: &str = "gateway";
    pub const AGENT_MANAGER: &str = "agent_manager";
    pub const OWNER_MANAGER: &str = "owner_manager";
    pub const IMPLEMENTATION_AUTHORITY: &str = "implementation_authority";
    pub const IA_FACTORY: &str = "ia_factory";
    pub const TREX_FACTORY: &str = "trex_factory";
}

/// Identities store [`Call`]s in their execution requests.
pub type IdentityState = Identity<Call>;

#[derive(Debug, Clone, Default)]
pub struct World {
    pub(crate) identities: BTreeMap<Address, IdentityState>,
    pub(crate) id_factories: BTreeMap<Address, IdFactory>,
    pub(crate) gateways: BTreeMap<Address, Gateway>,
    pub(crate) topics: BTreeMap<Address, Proxy<ClaimTopicsRegistry>>,
    pub(crate) issuers: BTreeMap<Address, Proxy<TrustedIssuersRegistry>>,
    pub(crate) storages: BTreeMap<Address, Proxy<IdentityRegistryStorage>>,
    pub(crate) registries: BTreeMap<Address, Proxy<IdentityRegistry>>,
    pub(crate) compliances: BTreeMap<Address, Proxy<ModularCompliance>>,
    pub(crate) tokens: BTreeMap<Address, Proxy<Token>>,
    pub(crate) agent_managers: BTreeMap<Address, AgentManager>,
    pub(crate) owner_managers: BTreeMap<Address, OwnerManager>,
    pub(crate) authorities: BTreeMap<Address, ImplementationAuthority>,
    pub(crate) ia_factories: BTreeMap<Address, IAFactory>,
    pub(crate) trex_factories: BTreeMap<Address, TrexFactory>,
    nonces: BTreeMap<Address, u64>,
}

impl World {
    /// The kind of contract at `address`.
    pub fn kind_of(&self, address: &Address) -> Option<&'static str> {
        let kind = if self.identities.contains_key(address) {
            kind::IDENTITY
        } else if self.id_factories.contains_key(address) {
            kind::ID_FACTORY
        } else if self.gateways.contains_key(address) {
            kind::GATEWAY
        } else if self.topics.contains_key(address) {
            ContractKind::ClaimTopicsRegistry.as_str()
        } else if self.issuers.contains_key(address) {
            ContractKind::TrustedIssuersRegistry.as_str()
        } else if self.storages.contains_key(address) {
            ContractKind::IdentityRegistryStorage.as_str()
        } else if self.registries.contains_key(address) {
            ContractKind::IdentityRegistry.as_str()
        } else if self.compliances.contains_key(address) {
            ContractKind::ModularCompliance.as_str()
        } else if self.tokens.contains_key(address) {
            ContractKind::Token.as_str()
        } else if self.agent_managers.contains_key(address) {
            kind::AGENT_MANAGER
        } else if self.owner_managers.contains_key(address) {
            kind::OWNER_MANAGER
        } else if self.authorities.contains_key(address) {
            kind::IMPLEMENTATION_AUTHORITY
        } else if self.ia_factories.contains_key(address) {
            kind::IA_FACTORY
        } else if self.trex_factories.contains_key(address) {
            kind::TREX_FACTORY
        } else {
            return None;
        };
        Some(kind)
    }

    pub fn exists(&self, address: &Address) -> bool {
        self.kind_of(address).is_some()
    }

    /// The error for a call that expected `expected` at `address`.
    pub(crate) fn missing(&self, address: &Address, expected: &str) -> StateError {
        if self.exists(address) {
            StateError::WrongContractKind {
                address: *address,
                expected: expected.to_string(),
            }
        } else {
            StateError::UnknownContract { address: *address }
        }
    }

    /// The ownership and agent set of a token, registry, storage or
    /// compliance.
    pub(crate) fn roles_mut(&mut self, address: &Address) -> Option<&mut AgentRole> {
        if let Some(p) = self.tokens.get_mut(address) {
            return Some(p.state_mut().roles_mut());
        }
        if let Some(p) = self.registries.get_mut(address) {
            return Some(p.state_mut().roles_mut());
        }
        if let Some(p) = self.storages.get_mut(address) {
            return Some(p.state_mut().roles_mut());
        }
        self.compliances.get_mut(address).map(|p| p.state_mut().roles_mut())
    }

    /// The ownership of a contract that has an owner but no agents.
    pub(crate) fn ownable_mut(&mut self, address: &Address) -> Option<&mut Ownable> {
        if let Some(p) = self.topics.get_mut(address) {
            return Some(p.state_mut().ownable_mut());
        }
        if let Some(p) = self.issuers.get_mut(address) {
            return Some(p.state_mut().ownable_mut());
        }
        if let Some(f) = self.id_factories.get_mut(address) {
            return Some(f.ownable_mut());
        }
        if let Some(g) = self.gateways.get_mut(address) {
            return Some(g.ownable_mut());
        }
        if let Some(m) = self.agent_managers.get_mut(address) {
            return Some(m.ownable_mut());
        }
        if let Some(m) = self.owner_managers.get_mut(address) {
            return Some(m.ownable_mut());
        }
        if let Some(a) = self.authorities.get_mut(address) {
            return Some(a.ownable_mut());
        }
        self.trex_factories.get_mut(address).map(TrexFactory::ownable_mut)
    }

    /// Next CREATE-style address for `deployer`.
    pub(crate) fn next_address(&mut self, deployer: &Address) -> Result<Address, CanonicalizationError> {
        let nonce = self.nonces.entry(*deployer).or_insert(0);
        let address = Address::derive(deployer, *nonce)?;
        *nonce += 1;
        Ok(address)
    }

    // ── lookups ──────────────────────────────────────────────────────

    pub fn identity(&self, address: &Address) -> Option<&IdentityState> {
        self.identities.get(address)
    }

    pub fn identities(&self) -> &dyn IdentityDirectory {
        &self.identities
    }

    pub fn id_factory(&self, address: &Address) -> Option<&IdFactory> {
        self.id_factories.get(address)
    }

    pub fn gateway(&self, address: &Address) -> Option<&Gateway> {
        self.gateways.get(address)
    }

    pub fn claim_topics_registry(&self, address: &Address) -> Option<&ClaimTopicsRegistry> {
        self.topics.get(address).map(Proxy::state)
    }

    pub fn trusted_issuers_registry(&self, address: &Address) -> Option<&TrustedIssuersRegistry> {
        self.issuers.get(address).map(Proxy::state)
    }

    pub fn identity_registry_storage(&self, address: &Address) -> Option<&IdentityRegistryStorage> {
        self.storages.get(address).map(Proxy::state)
    }

    pub fn identity_registry(&self, address: &Address) -> Option<&IdentityRegistry> {
        self.registries.get(address).map(Proxy::state)
    }

    pub fn compliance(&self, address: &Address) -> Option<&ModularCompliance> {
        self.compliances.get(address).map(Proxy::state)
    }

    pub fn token(&self, address: &Address) -> Option<&Token> {
        self.tokens.get(address).map(Proxy::state)
    }

    pub fn agent_manager(&self, address: &Address) -> Option<&AgentManager> {
        self.agent_managers.get(address)
    }

    pub fn owner_manager(&self, address: &Address) -> Option<&OwnerManager> {
        self.owner_managers.get(address)
    }

    pub fn authority(&self, address: &Address) -> Option<&ImplementationAuthority> {
        self.authorities.get(address)
    }

    pub fn ia_factory(&self, address: &Address) -> Option<&IAFactory> {
        self.ia_factories.get(address)
    }

    pub fn trex_factory(&self, address: &Address) -> Option<&TrexFactory> {
        self.trex_factories.get(address)
    }

    /// The authority the proxy at `address` resolves through.
    pub fn proxy_authority(&self, address: &Address) -> Option<Address> {
        self.tokens
            .get(address)
            .map(Proxy::authority)
            .or_else(|| self.registries.get(address).map(Proxy::authority))
            .or_else(|| self.storages.get(address).map(Proxy::authority))
            .or_else(|| self.compliances.get(address).map(Proxy::authority))
            .or_else(|| self.topics.get(address).map(Proxy::authority))
            .or_else(|| self.issuers.get(address).map(Proxy::authority))
    }

    /// The single reference authority, if one is deployed.
    pub fn reference_authority(&self) -> Option<&ImplementationAuthority> {
        self.authorities.values().find(|a| a.is_reference())
    }

    // ── resolution ───────────────────────────────────────────────────

    /// The implementation info `token` currently resolves to.
    pub fn token_info(&self, token: &Address) -> Result<ImplementationInfo, StateError> {
        let proxy = self
            .tokens
            .get(token)
            .ok_or_else(|| self.missing(token, ContractKind::Token.as_str()))?;
        let authority = self
            .authorities
            .get(&proxy.authority())
            .ok_or(StateError::UnknownContract {
                address: proxy.authority(),
            })?;
        Ok(authority.current_set()?.token_info())
    }

    /// The eligibility view of identity registry `registry`.
    pub fn verifier(&self, registry: &Address) -> Result<Verifier<'_>, StateError> {
        let ir = self
            .identity_registry(registry)
            .ok_or_else(|| self.missing(registry, ContractKind::IdentityRegistry.as_str()))?;
        resolve_verifier(ir, &self.storages, &self.topics, &self.issuers, &self.identities)
    }

    /// Run `f` with the token at `token` and the collaborators it needs:
    /// the eligibility oracle of its registry, its bound compliance and the
    /// identity directory.
    pub(crate) fn with_token<R>(
        &mut self,
        token: &Address,
        f: impl FnOnce(&mut Token, &mut TokenEnv<'_>, &dyn IdentityDirectory) -> Result<R, TrexError>,
    ) -> Result<R, TrexError> {
        let info = self.token_info(token)?;
        let World {
            tokens,
            compliances,
            registries,
            storages,
            topics,
            issuers,
            identities,
            ..
        } = self;
        let token_state = tokens
            .get_mut(token)
            .map(Proxy::state_mut)
            .ok_or(StateError::UnknownContract { address: *token })?;
        let registry_address = token_state.identity_registry();
        let registry = registries
            .get(&registry_address)
            .map(Proxy::state)
            .ok_or(StateError::UnknownContract {
                address: registry_address,
            })?;
        let verifier = resolve_verifier(registry, storages, topics, issuers, identities)?;
        let compliance_address = token_state.compliance();
        let compliance = compliances
            .get_mut(&compliance_address)
            .map(Proxy::state_mut)
            .ok_or(StateError::UnknownContract {
                address: compliance_address,
            })?;
        let mut env = TokenEnv {
            info,
            registry: &verifier,
            compliance,
        };
        f(token_state, &mut env, &*identities)
    }

    /// Run `f` with the identity registry at `registry` and its storage.
    pub(crate) fn with_registry<R>(
        &mut self,
        registry: &Address,
        f: impl FnOnce(&mut IdentityRegistry, &mut IdentityRegistryStorage) -> Result<R, TrexError>,
    ) -> Result<R, TrexError> {
        let missing = self.missing(registry, ContractKind::IdentityRegistry.as_str());
        let World {
            registries, storages, ..
        } = self;
        let ir = registries.get_mut(registry).map(Proxy::state_mut).ok_or(missing)?;
        let storage_address = ir.identity_storage();
        let storage = storages
            .get_mut(&storage_address)
            .map(Proxy::state_mut)
            .ok_or(StateError::UnknownContract {
                address: storage_address,
            })?;
        f(ir, storage)
    }
}

fn resolve_verifier<'a>(
    registry: &IdentityRegistry,
    storages: &'a BTreeMap<Address, Proxy<IdentityRegistryStorage>>,
    topics: &'a BTreeMap<Address, Proxy<ClaimTopicsRegistry>>,
    issuers: &'a BTreeMap<Address, Proxy<TrustedIssuersRegistry>>,
    identities: &'a BTreeMap<Address, IdentityState>,
) -> Result<Verifier<'a>, StateError> {
    let unknown = |address: Address| StateError::UnknownContract { address };
    Ok(Verifier {
        storage: storages
            .get(&registry.identity_storage())
            .map(Proxy::state)
            .ok_or_else(|| unknown(registry.identity_storage()))?,
        topics: topics
            .get(&registry.topics_registry())
            .map(Proxy::state)
            .ok_or_else(|| unknown(registry.topics_registry()))?,
        issuers: issuers
            .get(&registry.issuers_registry())
            .map(Proxy::state)
            .ok_or_else(|| unknown(registry.issuers_registry()))?,
        identities,
    })
}
