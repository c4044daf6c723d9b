//! A token wired to a real modular compliance and a map-backed registry.

use std::collections::BTreeMap;

use trex_compliance::{ModularCompliance, ModuleConfig};
use trex_core::{AgentRole, Address, EligibilityError, EligibilityOracle, EventBuffer, TrexError, Version};

use crate::policy::{ImplementationInfo, PausePolicy};
use crate::token::{Token, TokenEnv, TokenInfo};

pub fn addr(label: &str) -> Address {
    Address::from_label(label)
}

#[derive(Debug, Default)]
pub struct FakeRegistry(pub BTreeMap<Address, (Address, u16)>);

impl EligibilityOracle for FakeRegistry {
    fn verify(&self, wallet: &Address) -> Result<(), EligibilityError> {
        self.0
            .get(wallet)
            .map(|_| ())
            .ok_or(EligibilityError::NotLinked { wallet: *wallet })
    }

    fn identity_of(&self, wallet: &Address) -> Option<Address> {
        self.0.get(wallet).map(|(id, _)| *id)
    }

    fn country_of(&self, wallet: &Address) -> Option<u16> {
        self.0.get(wallet).map(|(_, c)| *c)
    }
}

pub struct Harness {
    pub token: Token,
    pub compliance: ModularCompliance,
    pub registry: FakeRegistry,
    pub policy: PausePolicy,
    pub events: EventBuffer,
}

impl Harness {
    pub fn new() -> Self {
        let owner = addr("owner");
        let token_addr = addr("token");
        let mut events = EventBuffer::new();

        let mut token = Token::new(
            AgentRole::new(token_addr, owner),
            TokenInfo {
                name: "Test Token".into(),
                symbol: "TT".into(),
                decimals: 18,
                onchain_id: Address::ZERO,
            },
            addr("ir"),
            addr("compliance"),
        )
        .unwrap();
        token.roles_mut().add_agent(&owner, addr("agent"), &mut events).unwrap();

        let mut compliance = ModularCompliance::new(AgentRole::new(addr("compliance"), owner));
        compliance.bind_token(&token_addr, token_addr, &mut events).unwrap();

        let mut registry = FakeRegistry::default();
        for name in ["alice", "bob", "carol"] {
            registry.0.insert(addr(name), (addr(&format!("{name}-id")), 250));
        }

        Self {
            token,
            compliance,
            registry,
            policy: PausePolicy::default(),
            events,
        }
    }

    pub fn with_env<R>(
        &mut self,
        f: impl FnOnce(&mut Token, &mut TokenEnv<'_>, &mut EventBuffer) -> Result<R, TrexError>,
    ) -> Result<R, TrexError> {
        let mut env = TokenEnv {
            info: ImplementationInfo {
                version: Version::new(4, 0, 1),
                pause_policy: self.policy,
            },
            registry: &self.registry,
            compliance: &mut self.compliance,
        };
        f(&mut self.token, &mut env, &mut self.events)
    }

    pub fn with_agent<R>(
        &mut self,
        f: impl FnOnce(&mut Token, &Address, &mut EventBuffer) -> Result<R, TrexError>,
    ) -> Result<R, TrexError> {
        f(&mut self.token, &addr("agent"), &mut self.events)
    }

    pub fn mint(&mut self, wallet: &str, amount: u128) -> Result<(), TrexError> {
        let agent = addr("agent");
        self.with_env(|t, env, ev| t.mint(&agent, env, addr(wallet), amount, ev))
    }

    pub fn burn(&mut self, wallet: &str, amount: u128) -> Result<(), TrexError> {
        let agent = addr("agent");
        self.with_env(|t, env, ev| t.burn(&agent, env, addr(wallet), amount, ev))
    }

    pub fn transfer(&mut self, from: &str, to: &str, amount: u128) -> Result<(), TrexError> {
        self.with_env(|t, env, ev| t.transfer(&addr(from), env, addr(to), amount, ev))
    }

    pub fn add_module(&mut self, config: ModuleConfig) {
        self.compliance
            .add_module(&addr("owner"), &config, &mut EventBuffer::new())
            .unwrap();
    }
}
