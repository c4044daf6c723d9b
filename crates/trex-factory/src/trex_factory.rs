//! # TREX Factory
//!
//! Deploys a complete token suite in one step. Every contract is created
//! under the factory's ownership so the factory can wire it, and ownership
//! is handed to the suite owner as the last step. The suite record is
//! emitted only after wiring has finished, so an aborted deployment never
//! leaves a discoverable record; the host discards the partial state.
//!
//! Addresses are derived from `(factory, salt, kind)`, which makes them
//! predictable before deployment and makes a salt single-use.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trex_compliance::ModularCompliance;
use trex_core::{
    AgentRole, Address, CanonicalizationError, Event, EventBuffer, InvariantViolation, Ownable, SuiteRecord,
    TrexError, Version,
};
use trex_registry::{ClaimTopicsRegistry, IdentityRegistry, IdentityRegistryStorage, TrustedIssuersRegistry};
use trex_token::{Token, TokenInfo};

use crate::details::{ClaimDetails, TokenDetails};
use crate::implementation::ContractKind;

/// Addresses of the contracts of one suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteAddresses {
    pub token: Address,
    pub identity_registry: Address,
    pub identity_registry_storage: Address,
    pub trusted_issuers_registry: Address,
    pub claim_topics_registry: Address,
    pub modular_compliance: Address,
}

impl SuiteAddresses {
    /// Deterministic addresses for a suite deployed by `factory` under
    /// `salt`. A non-zero `irs` is used as is.
    pub fn derive(factory: &Address, salt: &str, irs: Address) -> Result<Self, CanonicalizationError> {
        let at = |kind: ContractKind| Address::derive_salted(factory, salt, kind.as_str());
        Ok(Self {
            token: at(ContractKind::Token)?,
            identity_registry: at(ContractKind::IdentityRegistry)?,
            identity_registry_storage: if irs.is_zero() {
                at(ContractKind::IdentityRegistryStorage)?
            } else {
                irs
            },
            trusted_issuers_registry: at(ContractKind::TrustedIssuersRegistry)?,
            claim_topics_registry: at(ContractKind::ClaimTopicsRegistry)?,
            modular_compliance: at(ContractKind::ModularCompliance)?,
        })
    }

    pub fn record(&self, salt: &str, version: Version) -> SuiteRecord {
        SuiteRecord {
            salt: salt.to_string(),
            token: self.token,
            identity_registry: self.identity_registry,
            identity_registry_storage: self.identity_registry_storage,
            trusted_issuers_registry: self.trusted_issuers_registry,
            claim_topics_registry: self.claim_topics_registry,
            modular_compliance: self.modular_compliance,
            version,
        }
    }
}

/// The freshly built state of a suite, ready for the host to install.
#[derive(Debug, Clone)]
pub struct Suite {
    pub addresses: SuiteAddresses,
    pub token: Token,
    pub identity_registry: IdentityRegistry,
    /// `None` when an existing storage was reused; the host keeps that one.
    pub identity_registry_storage: Option<IdentityRegistryStorage>,
    pub trusted_issuers_registry: TrustedIssuersRegistry,
    pub claim_topics_registry: ClaimTopicsRegistry,
    pub modular_compliance: ModularCompliance,
    pub record: SuiteRecord,
}

#[derive(Debug, Clone)]
pub struct TrexFactory {
    ownable: Ownable,
    implementation_authority: Address,
    id_factory: Address,
    tokens: BTreeMap<String, Address>,
}

impl TrexFactory {
    pub fn new(ownable: Ownable, implementation_authority: Address, id_factory: Address) -> Self {
        Self {
            ownable,
            implementation_authority,
            id_factory,
            tokens: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.ownable.contract()
    }

    pub fn ownable(&self) -> &Ownable {
        &self.ownable
    }

    pub fn ownable_mut(&mut self) -> &mut Ownable {
        &mut self.ownable
    }

    pub fn implementation_authority(&self) -> Address {
        self.implementation_authority
    }

    /// Zero when no identity factory is wired.
    pub fn id_factory(&self) -> Address {
        self.id_factory
    }

    /// Token deployed under `salt`.
    pub fn get_token(&self, salt: &str) -> Option<Address> {
        self.tokens.get(salt).copied()
    }

    pub fn tokens(&self) -> impl Iterator<Item = (&String, &Address)> {
        self.tokens.iter()
    }

    // ── wiring ───────────────────────────────────────────────────────

    pub fn set_implementation_authority(
        &mut self,
        caller: &Address,
        authority: Address,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        if authority.is_zero() {
            return Err(InvariantViolation::ZeroAddress("implementation authority".into()).into());
        }
        self.implementation_authority = authority;
        events.emit(self.address(), Event::ImplementationAuthoritySet { authority });
        Ok(())
    }

    pub fn set_id_factory(&mut self, caller: &Address, factory: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        if factory.is_zero() {
            return Err(InvariantViolation::ZeroAddress("identity factory".into()).into());
        }
        self.id_factory = factory;
        events.emit(self.address(), Event::IdFactorySet { factory });
        Ok(())
    }

    /// Authorize handing a contract the factory still owns to `new_owner`.
    /// The host performs the transfer with the factory as caller.
    pub fn recover_contract_ownership(&self, caller: &Address, contract: &Address, new_owner: &Address) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        if new_owner.is_zero() {
            return Err(InvariantViolation::ZeroAddress("new owner".into()).into());
        }
        tracing::info!(factory = %self.address(), %contract, %new_owner, "contract ownership recovered");
        Ok(())
    }

    // ── deployment ───────────────────────────────────────────────────

    /// Everything that can be checked before any contract is created.
    pub fn preflight(
        &self,
        caller: &Address,
        salt: &str,
        details: &TokenDetails,
        claims: &ClaimDetails,
    ) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        if salt.is_empty() {
            return Err(InvariantViolation::InvalidInput("salt must not be empty".into()).into());
        }
        if self.tokens.contains_key(salt) {
            return Err(InvariantViolation::Duplicate {
                what: format!("suite with salt {salt:?}"),
            }
            .into());
        }
        details.validate()?;
        claims.validate()?;
        Ok(())
    }

    /// Build and wire a suite.
    ///
    /// `onchain_id` is the token identity the host resolved (possibly
    /// freshly created); `existing_storage` must be passed exactly when
    /// `details.irs` is non-zero, and must be owned by the factory for the
    /// registry binding to succeed.
    #[allow(clippy::too_many_arguments)]
    pub fn deploy_trex_suite(
        &mut self,
        caller: &Address,
        salt: &str,
        details: &TokenDetails,
        claims: &ClaimDetails,
        onchain_id: Address,
        existing_storage: Option<&mut IdentityRegistryStorage>,
        version: Version,
        events: &mut EventBuffer,
    ) -> Result<Suite, TrexError> {
        self.preflight(caller, salt, details, claims)?;
        let factory = self.address();
        let addresses = SuiteAddresses::derive(&factory, salt, details.irs)?;
        let deployed = |events: &mut EventBuffer, address: Address, kind: ContractKind| {
            events.emit(
                factory,
                Event::ContractDeployed {
                    address,
                    kind: kind.as_str().to_string(),
                },
            );
        };

        // 1. claim requirements
        let mut topics = ClaimTopicsRegistry::new(Ownable::new(addresses.claim_topics_registry, factory));
        deployed(events, addresses.claim_topics_registry, ContractKind::ClaimTopicsRegistry);
        for topic in &claims.claim_topics {
            topics.add_claim_topic(&factory, *topic, events)?;
        }
        let mut issuers = TrustedIssuersRegistry::new(Ownable::new(addresses.trusted_issuers_registry, factory));
        deployed(events, addresses.trusted_issuers_registry, ContractKind::TrustedIssuersRegistry);
        for (issuer, issuer_topics) in claims.issuers.iter().zip(&claims.issuer_claims) {
            issuers.add_trusted_issuer(&factory, *issuer, issuer_topics.clone(), events)?;
        }

        // 2. identity registry over a new or reused storage
        let mut new_storage = match (details.irs.is_zero(), existing_storage) {
            (true, None) => {
                deployed(events, addresses.identity_registry_storage, ContractKind::IdentityRegistryStorage);
                Some(IdentityRegistryStorage::new(AgentRole::new(
                    addresses.identity_registry_storage,
                    factory,
                )))
            }
            (false, Some(storage)) if storage.address() == details.irs => {
                storage.bind_identity_registry(&factory, addresses.identity_registry, events)?;
                None
            }
            _ => {
                return Err(InvariantViolation::InvalidInput(format!(
                    "identity registry storage {} was not supplied",
                    details.irs
                ))
                .into())
            }
        };
        if let Some(storage) = new_storage.as_mut() {
            storage.bind_identity_registry(&factory, addresses.identity_registry, events)?;
        }
        let mut registry = IdentityRegistry::new(
            AgentRole::new(addresses.identity_registry, factory),
            addresses.trusted_issuers_registry,
            addresses.claim_topics_registry,
            addresses.identity_registry_storage,
        );
        deployed(events, addresses.identity_registry, ContractKind::IdentityRegistry);
        for agent in &details.ir_agents {
            registry.roles_mut().add_agent(&factory, *agent, events)?;
        }
        // Recovery re-registers wallets through the token.
        registry.roles_mut().add_agent(&factory, addresses.token, events)?;

        // 3. compliance
        let mut compliance = ModularCompliance::new(AgentRole::new(addresses.modular_compliance, factory));
        deployed(events, addresses.modular_compliance, ContractKind::ModularCompliance);
        for module in &details.compliance_modules {
            compliance.add_module(&factory, module, events)?;
        }
        for call in &details.compliance_settings {
            compliance.call_module_function(&factory, call.module_name(), call, events)?;
        }

        // 4. token
        let info = TokenInfo {
            name: details.name.clone(),
            symbol: details.symbol.clone(),
            decimals: details.decimals,
            onchain_id,
        };
        let mut token = Token::new(
            AgentRole::new(addresses.token, factory),
            info,
            addresses.identity_registry,
            addresses.modular_compliance,
        )?;
        deployed(events, addresses.token, ContractKind::Token);
        for agent in &details.token_agents {
            token.roles_mut().add_agent(&factory, *agent, events)?;
        }
        compliance.bind_token(&factory, addresses.token, events)?;

        // 5. hand over
        let owner = details.owner;
        token.roles_mut().transfer_ownership(&factory, owner, events)?;
        registry.roles_mut().transfer_ownership(&factory, owner, events)?;
        compliance.roles_mut().transfer_ownership(&factory, owner, events)?;
        topics.ownable_mut().transfer_ownership(&factory, owner, events)?;
        issuers.ownable_mut().transfer_ownership(&factory, owner, events)?;
        if let Some(storage) = new_storage.as_mut() {
            storage.roles_mut().transfer_ownership(&factory, owner, events)?;
        }

        let record = addresses.record(salt, version);
        self.tokens.insert(salt.to_string(), addresses.token);
        events.emit(factory, Event::TrexSuiteDeployed(record.clone()));
        tracing::info!(factory = %factory, salt, token = %addresses.token, %version, "token suite deployed");

        Ok(Suite {
            addresses,
            token,
            identity_registry: registry,
            identity_registry_storage: new_storage,
            trusted_issuers_registry: issuers,
            claim_topics_registry: topics,
            modular_compliance: compliance,
            record,
        })
    }
}
