//! Routing of a [`Call`] to the contract state it targets.
//!
//! Handlers borrow one contract at a time. A handler that needs another
//! contract to act (a gateway creating an identity, a manager forwarding an
//! action, a token updating its registry during recovery) releases its
//! borrow and re-enters through [`Runtime::dispatch`] with itself as the
//! caller, so the reentrancy and depth guards see every hop.

use trex_core::{Address, EligibilityError, EligibilityOracle, EventBuffer, Event, InvariantViolation, StateError, TrexError};
use trex_factory::{ContractKind, ImplementationSet, Proxy, SuiteAddresses};
use trex_identity::{Dispatch, Identity, IdentityDirectory, NewIdentity};
use trex_roles::{Capability, ManagedContract, Manager};

use crate::call::{
    agent_action_call, owner_action_call, AuthorityCall, Call, ClaimTopicsCall, ComplianceCall, GatewayCall,
    IdFactoryCall, IdentityCall, ManagerCall, OwnershipCall, RegistryCall, StorageCall, TokenCall,
    TrexFactoryCall, TrustedIssuersCall,
};
use crate::runtime::{Output, Runtime};
use crate::world::{kind, World};

fn unknown(address: Address) -> StateError {
    StateError::UnknownContract { address }
}

impl Runtime {
    pub(crate) fn route(
        &mut self,
        caller: &Address,
        target: Address,
        call: Call,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        if let Some(expected) = call.target_kind() {
            if self.world.kind_of(&target) != Some(expected) {
                return Err(self.world.missing(&target, expected).into());
            }
        }
        match call {
            Call::Identity(call) => self.identity_call(caller, target, call, events),
            Call::IdFactory(call) => self.id_factory_call(caller, target, call, events),
            Call::Gateway(call) => self.gateway_call(caller, target, call, events),
            Call::ClaimTopics(call) => self.claim_topics_call(caller, target, call, events),
            Call::TrustedIssuers(call) => self.trusted_issuers_call(caller, target, call, events),
            Call::Storage(call) => self.storage_call(caller, target, call, events),
            Call::Registry(call) => self.registry_call(caller, target, call, events),
            Call::Compliance(call) => self.compliance_call(caller, target, call, events),
            Call::Token(call) => self.token_call(caller, target, call, events),
            Call::AgentManager(call) => self.agent_manager_call(caller, target, call, events),
            Call::OwnerManager(call) => self.owner_manager_call(caller, target, call, events),
            Call::Authority(call) => self.authority_call(caller, target, call, events),
            Call::TrexFactory(call) => self.trex_factory_call(caller, target, call, events),
            Call::Ownership(call) => self.ownership_call(caller, target, call, events),
        }
    }

    // ── identities ───────────────────────────────────────────────────

    fn identity_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: IdentityCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        if let IdentityCall::AddClaim { claim } = &call {
            let vouched = claim.issuer == target
                || IdentityDirectory::is_claim_valid(
                    &self.world.identities,
                    &claim.issuer,
                    &target,
                    claim.topic,
                    &claim.signature,
                    &claim.data,
                );
            if !vouched {
                return Err(InvariantViolation::InvalidInput(format!(
                    "issuer {} does not vouch for a topic {} claim about {target}",
                    claim.issuer, claim.topic
                ))
                .into());
            }
        }
        let identity = self.world.identities.get_mut(&target).ok_or(unknown(target))?;
        match call {
            IdentityCall::AddKey { key, purpose, key_type } => {
                identity.add_key(caller, key, purpose, key_type, events)?;
            }
            IdentityCall::RemoveKey { key, purpose } => identity.remove_key(caller, key, purpose, events)?,
            IdentityCall::AddClaim { claim } => {
                return Ok(Output::ClaimId(identity.add_claim(caller, claim, events)?));
            }
            IdentityCall::RemoveClaim { claim_id } => identity.remove_claim(caller, claim_id, events)?,
            IdentityCall::RevokeClaimBySignature { signature } => {
                identity.revoke_claim_by_signature(caller, &signature, events)?;
            }
            IdentityCall::Execute { to, value, call } => {
                let ticket = identity.execute(caller, to, value, *call, events);
                if let Some(dispatch) = ticket.dispatch {
                    self.run_execution(target, dispatch, events);
                }
                return Ok(Output::ExecutionId(ticket.execution_id));
            }
            IdentityCall::Approve { execution_id, approve } => {
                if let Some(dispatch) = identity.approve(caller, execution_id, approve, events)? {
                    self.run_execution(target, dispatch, events);
                }
            }
        }
        Ok(Output::Unit)
    }

    /// Perform an approved request with the identity as caller. A failing
    /// request is undone on its own and recorded as failed; it does not fail
    /// the approving call.
    fn run_execution(&mut self, identity: Address, dispatch: Dispatch<Call>, events: &mut EventBuffer) {
        let checkpoint = self.world.clone();
        let mark = events.len();
        let execution_id = dispatch.execution_id;
        let outcome = match self.dispatch(&identity, dispatch.to, dispatch.payload, events) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.world = checkpoint;
                events.truncate(mark);
                tracing::debug!(%identity, execution_id, error = %e, "identity execution failed");
                Err(e.to_string())
            }
        };
        if let Some(state) = self.world.identities.get_mut(&identity) {
            state.record_execution_result(execution_id, outcome, events);
        }
    }

    fn install_identity(&mut self, new: NewIdentity, events: &mut EventBuffer) -> Result<Output, TrexError> {
        if self.world.exists(&new.address) {
            return Err(InvariantViolation::Duplicate {
                what: format!("contract at {}", new.address),
            }
            .into());
        }
        let identity = Identity::new(new.address, new.management_key, events);
        self.world.identities.insert(new.address, identity);
        Ok(Output::Address(new.address))
    }

    fn id_factory_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: IdFactoryCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        let factory = self.world.id_factories.get_mut(&target).ok_or(unknown(target))?;
        match call {
            IdFactoryCall::CreateIdentity { wallet, salt } => {
                let new = factory.create_identity(caller, wallet, &salt, events)?;
                return self.install_identity(new, events);
            }
            IdFactoryCall::CreateTokenIdentity {
                token,
                token_owner,
                salt,
            } => {
                let new = factory.create_token_identity(caller, token, token_owner, &salt, events)?;
                return self.install_identity(new, events);
            }
            IdFactoryCall::LinkWallet { wallet } => factory.link_wallet(caller, wallet, events)?,
            IdFactoryCall::UnlinkWallet { wallet } => factory.unlink_wallet(caller, wallet, events)?,
            IdFactoryCall::AddTokenFactory { factory: added } => factory.add_token_factory(caller, added, events)?,
            IdFactoryCall::RemoveTokenFactory { factory: removed } => {
                factory.remove_token_factory(caller, removed, events)?;
            }
        }
        Ok(Output::Unit)
    }

    fn gateway_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: GatewayCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        let gateway = self.world.gateways.get(&target).ok_or(unknown(target))?;
        let (wallet, salt) = match call {
            GatewayCall::DeployIdentityForWallet { wallet } => (wallet, gateway.deploy_identity_for_wallet(caller, wallet)?),
            GatewayCall::DeployIdentityWithSalt { wallet, salt } => {
                (wallet, gateway.deploy_identity_with_salt(caller, wallet, &salt)?)
            }
        };
        let id_factory = gateway.id_factory();
        self.dispatch(
            &target,
            id_factory,
            Call::IdFactory(IdFactoryCall::CreateIdentity { wallet, salt }),
            events,
        )
    }

    // ── registries ───────────────────────────────────────────────────

    fn claim_topics_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: ClaimTopicsCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        let topics = self.world.topics.get_mut(&target).map(Proxy::state_mut).ok_or(unknown(target))?;
        match call {
            ClaimTopicsCall::AddClaimTopic { topic } => topics.add_claim_topic(caller, topic, events)?,
            ClaimTopicsCall::RemoveClaimTopic { topic } => topics.remove_claim_topic(caller, topic, events)?,
        }
        Ok(Output::Unit)
    }

    fn trusted_issuers_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: TrustedIssuersCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        let issuers = self.world.issuers.get_mut(&target).map(Proxy::state_mut).ok_or(unknown(target))?;
        match call {
            TrustedIssuersCall::AddTrustedIssuer { issuer, topics } => {
                issuers.add_trusted_issuer(caller, issuer, topics, events)?;
            }
            TrustedIssuersCall::RemoveTrustedIssuer { issuer } => issuers.remove_trusted_issuer(caller, issuer, events)?,
            TrustedIssuersCall::UpdateIssuerClaimTopics { issuer, topics } => {
                issuers.update_issuer_claim_topics(caller, issuer, topics, events)?;
            }
        }
        Ok(Output::Unit)
    }

    fn storage_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: StorageCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        let storage = self.world.storages.get_mut(&target).map(Proxy::state_mut).ok_or(unknown(target))?;
        match call {
            StorageCall::BindIdentityRegistry { registry } => storage.bind_identity_registry(caller, registry, events)?,
            StorageCall::UnbindIdentityRegistry { registry } => {
                storage.unbind_identity_registry(caller, registry, events)?;
            }
        }
        Ok(Output::Unit)
    }

    fn registry_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: RegistryCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        match call {
            RegistryCall::RegisterIdentity {
                wallet,
                identity,
                country,
            } => self.world.with_registry(&target, |ir, storage| {
                ir.register_identity(caller, storage, wallet, identity, country, events)
            })?,
            RegistryCall::BatchRegisterIdentity { rows } => self.world.with_registry(&target, |ir, storage| {
                ir.batch_register_identity(caller, storage, &rows, events)
            })?,
            RegistryCall::UpdateIdentity { wallet, identity } => self
                .world
                .with_registry(&target, |ir, storage| ir.update_identity(caller, storage, wallet, identity, events))?,
            RegistryCall::UpdateCountry { wallet, country } => self
                .world
                .with_registry(&target, |ir, storage| ir.update_country(caller, storage, wallet, country, events))?,
            RegistryCall::DeleteIdentity { wallet } => self
                .world
                .with_registry(&target, |ir, storage| ir.delete_identity(caller, storage, wallet, events))?,
            RegistryCall::SetIdentityRegistryStorage { storage } => {
                self.require_kind(&storage, ContractKind::IdentityRegistryStorage.as_str())?;
                self.registry_mut(&target)?
                    .set_identity_registry_storage(caller, storage, events)?;
            }
            RegistryCall::SetClaimTopicsRegistry { registry } => {
                self.require_kind(&registry, ContractKind::ClaimTopicsRegistry.as_str())?;
                self.registry_mut(&target)?
                    .set_claim_topics_registry(caller, registry, events)?;
            }
            RegistryCall::SetTrustedIssuersRegistry { registry } => {
                self.require_kind(&registry, ContractKind::TrustedIssuersRegistry.as_str())?;
                self.registry_mut(&target)?
                    .set_trusted_issuers_registry(caller, registry, events)?;
            }
        }
        Ok(Output::Unit)
    }

    fn registry_mut(&mut self, registry: &Address) -> Result<&mut trex_registry::IdentityRegistry, StateError> {
        self.world
            .registries
            .get_mut(registry)
            .map(Proxy::state_mut)
            .ok_or(unknown(*registry))
    }

    fn require_kind(&self, address: &Address, expected: &str) -> Result<(), StateError> {
        if self.world.kind_of(address) == Some(expected) {
            Ok(())
        } else {
            Err(self.world.missing(address, expected))
        }
    }

    // ── compliance ───────────────────────────────────────────────────

    fn compliance_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: ComplianceCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        let compliance = self
            .world
            .compliances
            .get_mut(&target)
            .map(Proxy::state_mut)
            .ok_or(unknown(target))?;
        match call {
            ComplianceCall::BindToken { token } => compliance.bind_token(caller, token, events)?,
            ComplianceCall::UnbindToken { token } => compliance.unbind_token(caller, token, events)?,
            ComplianceCall::AddModule { module } => compliance.add_module(caller, &module, events)?,
            ComplianceCall::RemoveModule { name } => compliance.remove_module(caller, &name, events)?,
            ComplianceCall::CallModuleFunction { module, call } => {
                compliance.call_module_function(caller, &module, &call, events)?;
            }
        }
        Ok(Output::Unit)
    }

    // ── tokens ───────────────────────────────────────────────────────

    fn token_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: TokenCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        match call {
            TokenCall::Transfer { to, amount } => self
                .world
                .with_token(&target, |t, env, _| t.transfer(caller, env, to, amount, events))?,
            TokenCall::BatchTransfer { transfers } => self
                .world
                .with_token(&target, |t, env, _| t.batch_transfer(caller, env, &transfers, events))?,
            TokenCall::TransferFrom { from, to, amount } => self
                .world
                .with_token(&target, |t, env, _| t.transfer_from(caller, env, from, to, amount, events))?,
            TokenCall::Approve { spender, amount } => self.token_mut(&target)?.approve(caller, spender, amount, events)?,
            TokenCall::IncreaseAllowance { spender, added } => {
                self.token_mut(&target)?.increase_allowance(caller, spender, added, events)?;
            }
            TokenCall::DecreaseAllowance { spender, subtracted } => {
                self.token_mut(&target)?
                    .decrease_allowance(caller, spender, subtracted, events)?;
            }
            TokenCall::Mint { to, amount } => self
                .world
                .with_token(&target, |t, env, _| t.mint(caller, env, to, amount, events))?,
            TokenCall::BatchMint { mints } => self
                .world
                .with_token(&target, |t, env, _| t.batch_mint(caller, env, &mints, events))?,
            TokenCall::Burn { from, amount } => self
                .world
                .with_token(&target, |t, env, _| t.burn(caller, env, from, amount, events))?,
            TokenCall::BatchBurn { burns } => self
                .world
                .with_token(&target, |t, env, _| t.batch_burn(caller, env, &burns, events))?,
            TokenCall::ForcedTransfer { from, to, amount } => self
                .world
                .with_token(&target, |t, env, _| t.forced_transfer(caller, env, from, to, amount, events))?,
            TokenCall::BatchForcedTransfer { transfers } => self
                .world
                .with_token(&target, |t, env, _| t.batch_forced_transfer(caller, env, &transfers, events))?,
            TokenCall::RecoveryAddress {
                lost_wallet,
                new_wallet,
                investor_identity,
            } => self.recover_wallet(caller, target, lost_wallet, new_wallet, investor_identity, events)?,
            TokenCall::SetAddressFrozen { wallet, freeze } => {
                self.token_mut(&target)?.set_address_frozen(caller, wallet, freeze, events)?;
            }
            TokenCall::BatchSetAddressFrozen { updates } => {
                self.token_mut(&target)?.batch_set_address_frozen(caller, &updates, events)?;
            }
            TokenCall::FreezePartialTokens { wallet, amount } => {
                self.token_mut(&target)?.freeze_partial_tokens(caller, wallet, amount, events)?;
            }
            TokenCall::BatchFreezePartialTokens { updates } => {
                self.token_mut(&target)?
                    .batch_freeze_partial_tokens(caller, &updates, events)?;
            }
            TokenCall::UnfreezePartialTokens { wallet, amount } => {
                self.token_mut(&target)?
                    .unfreeze_partial_tokens(caller, wallet, amount, events)?;
            }
            TokenCall::BatchUnfreezePartialTokens { updates } => {
                self.token_mut(&target)?
                    .batch_unfreeze_partial_tokens(caller, &updates, events)?;
            }
            TokenCall::Pause => self.token_mut(&target)?.pause(caller, events)?,
            TokenCall::Unpause => self.token_mut(&target)?.unpause(caller, events)?,
            TokenCall::SetName { name } => {
                let version = self.world.token_info(&target)?.version;
                self.token_mut(&target)?.set_name(caller, name, version, events)?;
            }
            TokenCall::SetSymbol { symbol } => {
                let version = self.world.token_info(&target)?.version;
                self.token_mut(&target)?.set_symbol(caller, symbol, version, events)?;
            }
            TokenCall::SetOnchainId { onchain_id } => {
                let version = self.world.token_info(&target)?.version;
                self.token_mut(&target)?.set_onchain_id(caller, onchain_id, version, events)?;
            }
            TokenCall::SetIdentityRegistry { registry } => {
                self.require_kind(&registry, ContractKind::IdentityRegistry.as_str())?;
                self.token_mut(&target)?.set_identity_registry(caller, registry, events)?;
            }
            TokenCall::SetCompliance { compliance } => self.set_token_compliance(caller, target, compliance, events)?,
        }
        Ok(Output::Unit)
    }

    fn token_mut(&mut self, token: &Address) -> Result<&mut trex_token::Token, StateError> {
        self.world.tokens.get_mut(token).map(Proxy::state_mut).ok_or(unknown(*token))
    }

    /// Move a lost wallet's position to a new wallet of the same investor:
    /// register the new wallet, move the tokens and freezes, then forget
    /// the lost wallet. The token acts on its registry as an agent.
    ///
    /// Both wallets must resolve to `investor_identity` in the registry; an
    /// unregistered new wallet is registered to it first.
    fn recover_wallet(
        &mut self,
        caller: &Address,
        token: Address,
        lost_wallet: Address,
        new_wallet: Address,
        investor_identity: Address,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        let info = self.world.token_info(&token)?;
        let state = self.world.token(&token).ok_or(unknown(token))?;
        state.recovery_preflight(
            caller,
            info.pause_policy,
            lost_wallet,
            new_wallet,
            investor_identity,
            self.world.identities(),
        )?;
        let registry = state.identity_registry();
        let verifier = self.world.verifier(&registry)?;
        let country = verifier
            .country_of(&lost_wallet)
            .ok_or(EligibilityError::NotLinked { wallet: lost_wallet })?;
        let lost_identity = verifier.identity_of(&lost_wallet);
        if lost_identity != Some(investor_identity) {
            return Err(InvariantViolation::IdentityMismatch {
                wallet: lost_wallet,
                expected: investor_identity,
                linked: lost_identity,
            }
            .into());
        }
        let new_is_registered = verifier.contains(&new_wallet);
        if new_is_registered {
            let new_identity = verifier.identity_of(&new_wallet);
            if new_identity != Some(investor_identity) {
                return Err(InvariantViolation::IdentityMismatch {
                    wallet: new_wallet,
                    expected: investor_identity,
                    linked: new_identity,
                }
                .into());
            }
        }

        if !new_is_registered {
            self.dispatch(
                &token,
                registry,
                RegistryCall::RegisterIdentity {
                    wallet: new_wallet,
                    identity: investor_identity,
                    country,
                }
                .into(),
                events,
            )?;
        }
        self.world.with_token(&token, |t, env, identities| {
            t.recovery_address(caller, env, lost_wallet, new_wallet, investor_identity, identities, events)
        })?;
        self.dispatch(
            &token,
            registry,
            RegistryCall::DeleteIdentity { wallet: lost_wallet }.into(),
            events,
        )?;
        Ok(())
    }

    /// Repoint the token at `compliance`: the token unbinds itself from the
    /// compliance it leaves and binds itself to the new one.
    fn set_token_compliance(
        &mut self,
        caller: &Address,
        token: Address,
        compliance: Address,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.require_kind(&compliance, ContractKind::ModularCompliance.as_str())?;
        let previous = self.token_mut(&token)?.set_compliance(caller, compliance, events)?;
        let previous_bound = self.world.compliance(&previous).and_then(|c| c.get_token_bound());
        if previous_bound == Some(token) {
            self.dispatch(&token, previous, ComplianceCall::UnbindToken { token }.into(), events)?;
        }
        self.dispatch(&token, compliance, ComplianceCall::BindToken { token }.into(), events)?;
        Ok(())
    }

    // ── managers ─────────────────────────────────────────────────────

    fn agent_manager_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: ManagerCall<trex_roles::AgentCapability, trex_roles::AgentAction>,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        let World {
            agent_managers,
            identities,
            ..
        } = &mut self.world;
        let manager = agent_managers.get_mut(&target).ok_or(unknown(target))?;
        let Some((identity, action)) = administer(manager, &*identities, caller, call, events)? else {
            return Ok(Output::Unit);
        };
        manager.check_capability(action.capability(), caller, &identity, &*identities)?;
        let token = manager.token();
        let contract = self.managed_contract(token, action.target())?;
        tracing::debug!(manager = %target, %identity, %contract, capability = %action.capability(), "agent action forwarded");
        self.dispatch(&target, contract, agent_action_call(action), events)
    }

    fn owner_manager_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: ManagerCall<trex_roles::OwnerCapability, trex_roles::OwnerAction>,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        let World {
            owner_managers,
            identities,
            ..
        } = &mut self.world;
        let manager = owner_managers.get_mut(&target).ok_or(unknown(target))?;
        let Some((identity, action)) = administer(manager, &*identities, caller, call, events)? else {
            return Ok(Output::Unit);
        };
        manager.check_capability(action.capability(), caller, &identity, &*identities)?;
        let token = manager.token();
        let contract = self.managed_contract(token, action.target())?;
        tracing::debug!(manager = %target, %identity, %contract, capability = %action.capability(), "owner action forwarded");
        self.dispatch(&target, contract, owner_action_call(action), events)
    }

    /// Address of `contract` within the suite of `token`.
    fn managed_contract(&self, token: Address, contract: ManagedContract) -> Result<Address, StateError> {
        let state = self
            .world
            .token(&token)
            .ok_or_else(|| self.world.missing(&token, ContractKind::Token.as_str()))?;
        let registry = || {
            let address = state.identity_registry();
            self.world
                .identity_registry(&address)
                .ok_or_else(|| self.world.missing(&address, ContractKind::IdentityRegistry.as_str()))
        };
        Ok(match contract {
            ManagedContract::Token => token,
            ManagedContract::IdentityRegistry => state.identity_registry(),
            ManagedContract::ModularCompliance => state.compliance(),
            ManagedContract::ClaimTopicsRegistry => registry()?.topics_registry(),
            ManagedContract::TrustedIssuersRegistry => registry()?.issuers_registry(),
        })
    }

    // ── implementation authorities ───────────────────────────────────

    fn authority_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: AuthorityCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        let default_policy = self.config().pause_policy;
        let reference = match &call {
            AuthorityCall::FetchVersion { .. } => Some(self.world.reference_authority().cloned().ok_or_else(|| {
                InvariantViolation::NotFound {
                    what: "reference implementation authority".into(),
                }
            })?),
            _ => None,
        };
        let authority = self.world.authorities.get_mut(&target).ok_or(unknown(target))?;
        match call {
            AuthorityCall::AddTrexVersion { version, pause_policy } => {
                let set = ImplementationSet::reference(version, pause_policy.unwrap_or(default_policy));
                authority.add_trex_version(caller, version, set, events)?;
            }
            AuthorityCall::UseTrexVersion { version } => authority.use_trex_version(caller, version, events)?,
            AuthorityCall::AddAndUseTrexVersion { version, pause_policy } => {
                let set = ImplementationSet::reference(version, pause_policy.unwrap_or(default_policy));
                authority.add_and_use_trex_version(caller, version, set, events)?;
            }
            AuthorityCall::FetchVersion { version } => {
                if let Some(reference) = &reference {
                    authority.fetch_version(reference, version, events)?;
                }
            }
            AuthorityCall::SetTrexFactory { factory } => authority.set_trex_factory(caller, factory, events)?,
            AuthorityCall::SetIaFactory { factory } => authority.set_ia_factory(caller, factory, events)?,
            AuthorityCall::ChangeImplementationAuthority { token, new_authority } => {
                let changed = self.change_implementation_authority(caller, target, token, new_authority, events)?;
                return Ok(Output::Address(changed));
            }
        }
        Ok(Output::Unit)
    }

    /// Move every proxy of `token`'s suite from `target` to another
    /// authority. The caller must own the token, its registry, compliance
    /// and both claim registries; the storage moves only if the caller owns
    /// it too, since it may be shared with other suites.
    fn change_implementation_authority(
        &mut self,
        caller: &Address,
        target: Address,
        token: Address,
        new_authority: Option<Address>,
        events: &mut EventBuffer,
    ) -> Result<Address, TrexError> {
        let suite = self.suite_of(&token)?;
        let owners = [
            (suite.token, self.world.token(&suite.token).map(|c| c.roles().owner())),
            (
                suite.identity_registry,
                self.world.identity_registry(&suite.identity_registry).map(|c| c.roles().owner()),
            ),
            (
                suite.modular_compliance,
                self.world.compliance(&suite.modular_compliance).map(|c| c.roles().owner()),
            ),
            (
                suite.claim_topics_registry,
                self.world
                    .claim_topics_registry(&suite.claim_topics_registry)
                    .map(|c| c.ownable().owner()),
            ),
            (
                suite.trusted_issuers_registry,
                self.world
                    .trusted_issuers_registry(&suite.trusted_issuers_registry)
                    .map(|c| c.ownable().owner()),
            ),
        ];
        for (contract, owner) in owners {
            if owner != Some(*caller) {
                return Err(trex_core::AuthorizationError::NotOwner {
                    contract,
                    caller: *caller,
                }
                .into());
            }
        }
        if self.world.proxy_authority(&token) != Some(target) {
            return Err(InvariantViolation::InvalidInput(format!(
                "token {token} does not resolve through implementation authority {target}"
            ))
            .into());
        }
        let current = self.world.authority(&target).ok_or(unknown(target))?;
        let version = current
            .get_current_version()
            .ok_or(StateError::NoCurrentVersion { authority: target })?;

        let new = match new_authority {
            Some(new) => {
                let candidate = self
                    .world
                    .authority(&new)
                    .ok_or_else(|| self.world.missing(&new, kind::IMPLEMENTATION_AUTHORITY))?;
                let known = candidate.is_reference() || self.world.ia_factories.values().any(|f| f.deployed_by_factory(&new));
                if !known {
                    return Err(InvariantViolation::InvalidInput(format!(
                        "implementation authority {new} was not deployed by the authority factory"
                    ))
                    .into());
                }
                if candidate.get_current_version() != Some(version) {
                    return Err(InvariantViolation::InvalidInput(format!(
                        "implementation authority {new} is not on version {version}"
                    ))
                    .into());
                }
                new
            }
            None => {
                if !current.is_reference() {
                    return Err(StateError::NotReferenceAuthority { authority: target }.into());
                }
                let ia_factory = current.ia_factory();
                let address = self.world.next_address(&ia_factory)?;
                let World {
                    authorities,
                    ia_factories,
                    ..
                } = &mut self.world;
                let reference = authorities.get(&target).ok_or(unknown(target))?;
                let deployed = ia_factories
                    .get_mut(&ia_factory)
                    .ok_or(unknown(ia_factory))?
                    .deploy_ia(token, address, *caller, reference, events)?;
                authorities.insert(address, deployed);
                address
            }
        };

        let world = &mut self.world;
        let repointed = [
            world.tokens.get_mut(&suite.token).map(|p| p.set_authority(new)),
            world
                .registries
                .get_mut(&suite.identity_registry)
                .map(|p| p.set_authority(new)),
            world
                .compliances
                .get_mut(&suite.modular_compliance)
                .map(|p| p.set_authority(new)),
            world
                .topics
                .get_mut(&suite.claim_topics_registry)
                .map(|p| p.set_authority(new)),
            world
                .issuers
                .get_mut(&suite.trusted_issuers_registry)
                .map(|p| p.set_authority(new)),
        ];
        if repointed.iter().any(Option::is_none) {
            return Err(InvariantViolation::NotFound {
                what: format!("suite contract of token {token}"),
            }
            .into());
        }
        if let Some(storage) = world.storages.get_mut(&suite.identity_registry_storage) {
            if storage.state().roles().owner() == *caller {
                storage.set_authority(new);
            }
        }
        events.emit(target, Event::ImplementationAuthorityChanged { token, authority: new });
        tracing::info!(%token, from = %target, to = %new, "implementation authority changed");
        Ok(new)
    }

    /// The suite contracts `token` is wired to.
    fn suite_of(&self, token: &Address) -> Result<SuiteAddresses, StateError> {
        let state = self
            .world
            .token(token)
            .ok_or_else(|| self.world.missing(token, ContractKind::Token.as_str()))?;
        let registry_address = state.identity_registry();
        let registry = self
            .world
            .identity_registry(&registry_address)
            .ok_or_else(|| self.world.missing(&registry_address, ContractKind::IdentityRegistry.as_str()))?;
        Ok(SuiteAddresses {
            token: *token,
            identity_registry: registry_address,
            identity_registry_storage: registry.identity_storage(),
            trusted_issuers_registry: registry.issuers_registry(),
            claim_topics_registry: registry.topics_registry(),
            modular_compliance: state.compliance(),
        })
    }

    // ── suite factory ────────────────────────────────────────────────

    fn trex_factory_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: TrexFactoryCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        match call {
            TrexFactoryCall::DeployTrexSuite { salt, token, claims } => {
                self.deploy_suite(caller, target, &salt, &token, &claims, events)
            }
            TrexFactoryCall::SetImplementationAuthority { authority } => {
                self.require_kind(&authority, kind::IMPLEMENTATION_AUTHORITY)?;
                self.trex_factory_mut(&target)?
                    .set_implementation_authority(caller, authority, events)?;
                Ok(Output::Unit)
            }
            TrexFactoryCall::SetIdFactory { factory } => {
                self.require_kind(&factory, kind::ID_FACTORY)?;
                self.trex_factory_mut(&target)?.set_id_factory(caller, factory, events)?;
                Ok(Output::Unit)
            }
            TrexFactoryCall::RecoverContractOwnership { contract, new_owner } => {
                self.trex_factory_mut(&target)?
                    .recover_contract_ownership(caller, &contract, &new_owner)?;
                self.dispatch(
                    &target,
                    contract,
                    OwnershipCall::TransferOwnership { new_owner }.into(),
                    events,
                )
            }
        }
    }

    fn trex_factory_mut(&mut self, factory: &Address) -> Result<&mut trex_factory::TrexFactory, StateError> {
        self.world.trex_factories.get_mut(factory).ok_or(unknown(*factory))
    }

    fn deploy_suite(
        &mut self,
        caller: &Address,
        target: Address,
        salt: &str,
        details: &trex_factory::TokenDetails,
        claims: &trex_factory::ClaimDetails,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        let factory = self.world.trex_factory(&target).ok_or(unknown(target))?;
        factory.preflight(caller, salt, details, claims)?;
        let authority = factory.implementation_authority();
        let id_factory = factory.id_factory();
        let version = self
            .world
            .authority(&authority)
            .ok_or_else(|| self.world.missing(&authority, kind::IMPLEMENTATION_AUTHORITY))?
            .get_current_version()
            .ok_or(StateError::NoCurrentVersion { authority })?;
        let addresses = SuiteAddresses::derive(&target, salt, details.irs)?;

        let onchain_id = if details.onchain_id.is_zero() && !id_factory.is_zero() {
            let new = self
                .world
                .id_factories
                .get_mut(&id_factory)
                .ok_or(unknown(id_factory))?
                .create_token_identity(&target, addresses.token, details.owner, salt, events)?;
            self.install_identity(new, events)?;
            new.address
        } else {
            details.onchain_id
        };

        let World {
            trex_factories,
            storages,
            ..
        } = &mut self.world;
        let existing_storage = if details.irs.is_zero() {
            None
        } else {
            Some(
                storages
                    .get_mut(&details.irs)
                    .map(Proxy::state_mut)
                    .ok_or(unknown(details.irs))?,
            )
        };
        let suite = trex_factories.get_mut(&target).ok_or(unknown(target))?.deploy_trex_suite(
            caller,
            salt,
            details,
            claims,
            onchain_id,
            existing_storage,
            version,
            events,
        )?;

        let a = suite.addresses;
        let world = &mut self.world;
        world.tokens.insert(a.token, Proxy::new(authority, suite.token));
        world
            .registries
            .insert(a.identity_registry, Proxy::new(authority, suite.identity_registry));
        if let Some(storage) = suite.identity_registry_storage {
            world
                .storages
                .insert(a.identity_registry_storage, Proxy::new(authority, storage));
        }
        world
            .issuers
            .insert(a.trusted_issuers_registry, Proxy::new(authority, suite.trusted_issuers_registry));
        world
            .topics
            .insert(a.claim_topics_registry, Proxy::new(authority, suite.claim_topics_registry));
        world
            .compliances
            .insert(a.modular_compliance, Proxy::new(authority, suite.modular_compliance));
        Ok(Output::Suite(suite.record))
    }

    // ── ownership ────────────────────────────────────────────────────

    fn ownership_call(
        &mut self,
        caller: &Address,
        target: Address,
        call: OwnershipCall,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        let Some(label) = self.world.kind_of(&target) else {
            return Err(unknown(target).into());
        };
        match call {
            OwnershipCall::TransferOwnership { new_owner } => {
                if let Some(roles) = self.world.roles_mut(&target) {
                    roles.transfer_ownership(caller, new_owner, events)?;
                } else if let Some(ownable) = self.world.ownable_mut(&target) {
                    ownable.transfer_ownership(caller, new_owner, events)?;
                } else {
                    return Err(InvariantViolation::InvalidInput(format!("{label} at {target} has no owner")).into());
                }
            }
            OwnershipCall::AddAgent { agent } => self
                .world
                .roles_mut(&target)
                .ok_or_else(|| no_agents(label, target))?
                .add_agent(caller, agent, events)?,
            OwnershipCall::RemoveAgent { agent } => self
                .world
                .roles_mut(&target)
                .ok_or_else(|| no_agents(label, target))?
                .remove_agent(caller, agent, events)?,
        }
        Ok(Output::Unit)
    }
}

/// Grant or revoke on `manager`; an `Execute` is handed back for the
/// caller to check and forward.
fn administer<C: Capability, A>(
    manager: &mut Manager<C>,
    directory: &dyn IdentityDirectory,
    caller: &Address,
    call: ManagerCall<C, A>,
    events: &mut EventBuffer,
) -> Result<Option<(Address, A)>, TrexError> {
    match call {
        ManagerCall::Grant {
            capability,
            identity,
            admin_identity,
        } => manager.grant(caller, capability, identity, admin_identity.as_ref(), directory, events)?,
        ManagerCall::Revoke {
            capability,
            identity,
            admin_identity,
        } => manager.revoke(caller, capability, identity, admin_identity.as_ref(), directory, events)?,
        ManagerCall::Execute { identity, action } => return Ok(Some((identity, action))),
    }
    Ok(None)
}

fn no_agents(label: &str, target: Address) -> InvariantViolation {
    InvariantViolation::InvalidInput(format!("{label} at {target} has no agents"))
}
