//! # Runtime
//!
//! The single writer over a [`World`]. Every state change is a transaction:
//!
//! 1. clone the world as a checkpoint;
//! 2. dispatch into a fresh [`EventBuffer`];
//! 3. on success, commit the buffer to the [`EventLog`] under the next block;
//!    on any error, restore the checkpoint and drop the buffer.
//!
//! Cross-contract calls made while dispatching (a manager forwarding an
//! action, an identity executing a request, a token binding its compliance)
//! go through the same [`Runtime::dispatch`], which keeps the active call
//! stack for the reentrancy and depth guards.

use serde::Serialize;
use trex_core::{
    Address, AgentRole, ClaimId, EligibilityOracle, Event, EventBuffer, EventLog, EventRecord, LedgerView, Ownable,
    StateError, SuiteRecord, Timestamp, TrexError, Version,
};
use trex_factory::{ContractKind, IAFactory, ImplementationAuthority, ImplementationSet, Proxy, TrexFactory};
use trex_identity::{Gateway, IdFactory};
use trex_registry::IdentityRegistryStorage;
use trex_roles::{AgentManager, OwnerManager};

use crate::call::Call;
use crate::config::RuntimeConfig;
use crate::world::{kind, World};

/// Version registered and made current on the reference authority at
/// bootstrap.
pub const REFERENCE_VERSION: Version = Version::new(4, 0, 1);

/// What a call returns besides its events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Output {
    Unit,
    /// A contract or identity created by the call.
    Address(Address),
    ClaimId(ClaimId),
    /// The request id of an identity execution.
    ExecutionId(u64),
    Suite(SuiteRecord),
}

/// A committed transaction.
#[derive(Debug, Clone)]
pub struct Receipt<T = Output> {
    pub block: u64,
    pub output: T,
    /// Emitted events with their emitters, in order.
    pub events: Vec<(Address, Event)>,
}

impl<T> Receipt<T> {
    /// Whether `emitter` emitted `event` in this transaction.
    pub fn emitted(&self, emitter: &Address, event: &Event) -> bool {
        self.events.iter().any(|(e, ev)| e == emitter && ev == event)
    }
}

/// Addresses of the protocol-wide contracts created by [`Runtime::bootstrap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub admin: Address,
    /// The reference implementation authority.
    pub authority: Address,
    pub id_factory: Address,
    pub gateway: Address,
    pub trex_factory: Address,
    pub ia_factory: Address,
    pub version: Version,
}

#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    pub(crate) world: World,
    log: EventLog,
    block: u64,
    pub(crate) stack: Vec<Address>,
}

impl Runtime {
    /// An empty runtime with no contracts.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            world: World::default(),
            log: EventLog::new(config.event_log_capacity),
            block: 0,
            stack: Vec::new(),
        }
    }

    /// A runtime with the protocol-wide contracts deployed and owned by
    /// `admin`: the reference authority at [`REFERENCE_VERSION`], the
    /// identity factory and its gateway, the suite factory and the
    /// authority factory, all wired to each other.
    pub fn bootstrap(config: RuntimeConfig, admin: Address) -> Result<(Self, Deployment), TrexError> {
        let mut runtime = Self::new(config);
        let receipt = runtime.transact(|rt, events| {
            let world = &mut rt.world;
            let authority = world.next_address(&admin)?;
            let id_factory = world.next_address(&admin)?;
            let gateway = world.next_address(&admin)?;
            let trex_factory = world.next_address(&admin)?;
            let ia_factory = world.next_address(&admin)?;

            let mut reference = ImplementationAuthority::new(Ownable::new(authority, admin), true);
            reference.add_and_use_trex_version(
                &admin,
                REFERENCE_VERSION,
                ImplementationSet::reference(REFERENCE_VERSION, rt.config.pause_policy),
                events,
            )?;
            reference.set_trex_factory(&admin, trex_factory, events)?;
            reference.set_ia_factory(&admin, ia_factory, events)?;

            let mut identities = IdFactory::new(id_factory, admin);
            identities.add_token_factory(&admin, gateway, events)?;
            identities.add_token_factory(&admin, trex_factory, events)?;

            world.authorities.insert(authority, reference);
            world.id_factories.insert(id_factory, identities);
            world.gateways.insert(gateway, Gateway::new(gateway, admin, id_factory));
            world.trex_factories.insert(
                trex_factory,
                TrexFactory::new(Ownable::new(trex_factory, admin), authority, id_factory),
            );
            world.ia_factories.insert(ia_factory, IAFactory::new(ia_factory, trex_factory));

            for (address, name) in [
                (authority, kind::IMPLEMENTATION_AUTHORITY),
                (id_factory, kind::ID_FACTORY),
                (gateway, kind::GATEWAY),
                (trex_factory, kind::TREX_FACTORY),
                (ia_factory, kind::IA_FACTORY),
            ] {
                events.emit(
                    address,
                    Event::ContractDeployed {
                        address,
                        kind: name.to_string(),
                    },
                );
            }
            Ok(Deployment {
                admin,
                authority,
                id_factory,
                gateway,
                trex_factory,
                ia_factory,
                version: REFERENCE_VERSION,
            })
        })?;
        tracing::info!(admin = %admin, trex_factory = %receipt.output.trex_factory, "protocol bootstrapped");
        Ok((runtime, receipt.output))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// The last committed block.
    pub fn block(&self) -> u64 {
        self.block
    }

    // ── transactions ─────────────────────────────────────────────────

    /// Send `call` from `caller` to the contract at `target`.
    pub fn call(&mut self, caller: Address, target: Address, call: Call) -> Result<Receipt, TrexError> {
        self.transact(|rt, events| rt.dispatch(&caller, target, call, events))
    }

    /// Run `f` as one transaction: all of its effects commit, or none do.
    pub(crate) fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Self, &mut EventBuffer) -> Result<T, TrexError>,
    ) -> Result<Receipt<T>, TrexError> {
        let checkpoint = self.world.clone();
        let mut events = EventBuffer::new();
        match f(self, &mut events) {
            Ok(output) => {
                self.block += 1;
                let emitted = events.clone().into_inner();
                let at = Timestamp::now();
                tracing::debug!(block = self.block, at = %at, events = emitted.len(), "transaction committed");
                self.log.commit(self.block, at, events);
                Ok(Receipt {
                    block: self.block,
                    output,
                    events: emitted,
                })
            }
            Err(e) => {
                self.world = checkpoint;
                self.stack.clear();
                tracing::debug!(error = %e, kind = ?e.kind(), "transaction reverted");
                Err(e)
            }
        }
    }

    /// Enter `target` with `caller` as the immediate sender.
    pub(crate) fn dispatch(
        &mut self,
        caller: &Address,
        target: Address,
        call: Call,
        events: &mut EventBuffer,
    ) -> Result<Output, TrexError> {
        if self.stack.len() >= self.config.max_call_depth {
            return Err(StateError::CallDepthExceeded {
                max: self.config.max_call_depth,
            }
            .into());
        }
        if self.stack.contains(&target) && !self.world.identities.contains_key(&target) {
            return Err(StateError::Reentrancy { address: target }.into());
        }
        self.stack.push(target);
        let result = self.route(caller, target, call, events);
        self.stack.pop();
        result
    }

    // ── deployment ───────────────────────────────────────────────────

    /// Deploy an agent manager for `token`, owned by `deployer`.
    pub fn deploy_agent_manager(&mut self, deployer: Address, token: Address) -> Result<Receipt<Address>, TrexError> {
        self.transact(|rt, events| {
            rt.require_token(&token)?;
            let address = rt.world.next_address(&deployer)?;
            rt.world
                .agent_managers
                .insert(address, AgentManager::new(Ownable::new(address, deployer), token));
            emit_deployed(events, address, kind::AGENT_MANAGER);
            Ok(address)
        })
    }

    /// Deploy an owner manager for `token`, owned by `deployer`.
    pub fn deploy_owner_manager(&mut self, deployer: Address, token: Address) -> Result<Receipt<Address>, TrexError> {
        self.transact(|rt, events| {
            rt.require_token(&token)?;
            let address = rt.world.next_address(&deployer)?;
            rt.world
                .owner_managers
                .insert(address, OwnerManager::new(Ownable::new(address, deployer), token));
            emit_deployed(events, address, kind::OWNER_MANAGER);
            Ok(address)
        })
    }

    /// Deploy a standalone identity registry storage behind `authority`,
    /// owned by `deployer`, for suites that share investors.
    pub fn deploy_identity_registry_storage(
        &mut self,
        deployer: Address,
        authority: Address,
    ) -> Result<Receipt<Address>, TrexError> {
        self.transact(|rt, events| {
            if rt.world.authority(&authority).is_none() {
                return Err(rt.world.missing(&authority, kind::IMPLEMENTATION_AUTHORITY).into());
            }
            let address = rt.world.next_address(&deployer)?;
            let storage = IdentityRegistryStorage::new(AgentRole::new(address, deployer));
            rt.world.storages.insert(address, Proxy::new(authority, storage));
            emit_deployed(events, address, ContractKind::IdentityRegistryStorage.as_str());
            Ok(address)
        })
    }

    /// Register a version with a custom implementation set on the reference
    /// authority at `authority`.
    pub fn add_trex_version_with(
        &mut self,
        caller: Address,
        authority: Address,
        version: Version,
        set: ImplementationSet,
    ) -> Result<Receipt<()>, TrexError> {
        self.transact(|rt, events| {
            let missing = rt.world.missing(&authority, kind::IMPLEMENTATION_AUTHORITY);
            rt.world
                .authorities
                .get_mut(&authority)
                .ok_or(missing)?
                .add_trex_version(&caller, version, set, events)
        })
    }

    fn require_token(&self, token: &Address) -> Result<(), StateError> {
        match self.world.token(token) {
            Some(_) => Ok(()),
            None => Err(self.world.missing(token, ContractKind::Token.as_str())),
        }
    }

    // ── queries ──────────────────────────────────────────────────────

    /// Whether `wallet` may currently hold `token`.
    pub fn is_verified(&self, token: &Address, wallet: &Address) -> Result<bool, StateError> {
        let registry = self
            .world
            .token(token)
            .ok_or_else(|| self.world.missing(token, ContractKind::Token.as_str()))?
            .identity_registry();
        Ok(self.world.verifier(&registry)?.is_verified(wallet))
    }

    pub fn balance_of(&self, token: &Address, wallet: &Address) -> u128 {
        self.world.token(token).map_or(0, |t| t.balance_of(wallet))
    }

    pub fn total_supply(&self, token: &Address) -> u128 {
        self.world.token(token).map_or(0, LedgerView::total_supply)
    }

    /// The version `token` currently resolves to.
    pub fn token_version(&self, token: &Address) -> Result<Version, StateError> {
        Ok(self.world.token_info(token)?.version)
    }

    pub fn events_by(&self, emitter: &Address) -> Vec<&EventRecord> {
        self.log.by_emitter(emitter)
    }

    /// The identity most recently linked to `wallet`, from the event log.
    pub fn wallet_linked(&self, wallet: &Address) -> Option<Address> {
        self.log.wallet_linked(wallet)
    }

    pub fn suite_deployed(&self, salt: &str) -> Option<&SuiteRecord> {
        self.log.suite_deployed(salt)
    }

    pub fn capability_history(&self, manager: &Address) -> Vec<&EventRecord> {
        self.log.capability_history(manager)
    }
}

fn emit_deployed(events: &mut EventBuffer, address: Address, kind: &str) {
    events.emit(
        address,
        Event::ContractDeployed {
            address,
            kind: kind.to_string(),
        },
    );
}
