//! # Modular Compliance
//!
//! One compliance instance serves exactly one token. Its verdict is the
//! logical AND of every bound module's check, evaluated in registration
//! order and short-circuiting on the first veto. Notifications reach every
//! module in the same order regardless of earlier failures.
//!
//! ## Access
//!
//! - `bind_token`: the owner, or the token itself while nothing is bound.
//!   An owner rebind detaches the previous token first.
//! - `unbind_token`: the owner or the bound token.
//! - `add_module` / `remove_module`: the owner or an agent.
//! - `call_module_function`: the owner only.
//! - `transferred` / `created` / `destroyed`: the bound token. The runtime
//!   enforces this before calling through [`ComplianceGate`].

use trex_core::{
    AgentRole, Address, AuthorizationError, ComplianceContext, ComplianceGate, ComplianceRejection, Event,
    EventBuffer, InvariantViolation, StateError, TrexError,
};

use crate::config::{ModuleCall, ModuleConfig};
use crate::module::ComplianceModule;

pub const MAX_MODULES: usize = 25;

#[derive(Debug, Clone)]
pub struct ModularCompliance {
    roles: AgentRole,
    token_bound: Option<Address>,
    modules: Vec<Box<dyn ComplianceModule>>,
}

impl ModularCompliance {
    pub fn new(roles: AgentRole) -> Self {
        Self {
            roles,
            token_bound: None,
            modules: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.roles.contract()
    }

    pub fn roles(&self) -> &AgentRole {
        &self.roles
    }

    pub fn roles_mut(&mut self) -> &mut AgentRole {
        &mut self.roles
    }

    fn only_owner_or_agent(&self, caller: &Address) -> Result<(), AuthorizationError> {
        if self.roles.ownable().is_owner(caller) || self.roles.is_agent(caller) {
            Ok(())
        } else {
            Err(AuthorizationError::NotAgent {
                contract: self.address(),
                caller: *caller,
            })
        }
    }

    // ── token binding ────────────────────────────────────────────────

    pub fn bind_token(&mut self, caller: &Address, token: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        let is_owner = self.roles.ownable().is_owner(caller);
        if !is_owner && !(self.token_bound.is_none() && *caller == token) {
            return Err(AuthorizationError::NotOwner {
                contract: self.address(),
                caller: *caller,
            }
            .into());
        }
        if token.is_zero() {
            return Err(InvariantViolation::ZeroAddress("token".into()).into());
        }
        if let Some(bound) = self.token_bound {
            if bound == token {
                return Err(StateError::ComplianceAlreadyBound {
                    compliance: self.address(),
                    token: bound,
                }
                .into());
            }
            events.emit(self.address(), Event::TokenUnbound { token: bound });
        }
        self.token_bound = Some(token);
        events.emit(self.address(), Event::TokenBound { token });
        tracing::debug!(compliance = %self.address(), %token, "token bound");
        Ok(())
    }

    pub fn unbind_token(&mut self, caller: &Address, token: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        let bound = self.token_bound.ok_or(StateError::NoTokenBound {
            compliance: self.address(),
        })?;
        if !self.roles.ownable().is_owner(caller) && *caller != bound {
            return Err(AuthorizationError::NotOwner {
                contract: self.address(),
                caller: *caller,
            }
            .into());
        }
        if bound != token {
            return Err(InvariantViolation::InvalidInput(format!(
                "{token} is not the token bound to {}",
                self.address()
            ))
            .into());
        }
        self.token_bound = None;
        events.emit(self.address(), Event::TokenUnbound { token });
        Ok(())
    }

    pub fn get_token_bound(&self) -> Option<Address> {
        self.token_bound
    }

    // ── modules ──────────────────────────────────────────────────────

    pub fn add_module(&mut self, caller: &Address, config: &ModuleConfig, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.only_owner_or_agent(caller)?;
        let module = config.instantiate()?;
        self.add_module_instance(caller, module, events)
    }

    /// Bind an already constructed module, e.g. one not described by
    /// [`ModuleConfig`].
    pub fn add_module_instance(
        &mut self,
        caller: &Address,
        module: Box<dyn ComplianceModule>,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.only_owner_or_agent(caller)?;
        if self.modules.len() >= MAX_MODULES {
            return Err(InvariantViolation::LimitExceeded {
                what: "modules per compliance".into(),
                max: MAX_MODULES,
            }
            .into());
        }
        let name = module.name();
        if self.is_module_bound(name) {
            return Err(InvariantViolation::Duplicate {
                what: format!("module {name}"),
            }
            .into());
        }
        self.modules.push(module);
        events.emit(self.address(), Event::ModuleAdded { module: name.to_string() });
        Ok(())
    }

    pub fn remove_module(&mut self, caller: &Address, name: &str, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.only_owner_or_agent(caller)?;
        let index = self.position(name)?;
        let removed = self.modules.remove(index);
        events.emit(
            self.address(),
            Event::ModuleRemoved {
                module: removed.name().to_string(),
            },
        );
        Ok(())
    }

    pub fn call_module_function(
        &mut self,
        caller: &Address,
        name: &str,
        call: &ModuleCall,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.roles.only_owner(caller)?;
        let index = self.position(name)?;
        self.modules[index].configure(call)?;
        events.emit(
            self.address(),
            Event::ModuleInteraction {
                module: name.to_string(),
                function: call.function_name().to_string(),
            },
        );
        Ok(())
    }

    pub fn is_module_bound(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name() == name)
    }

    pub fn get_modules(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn module(&self, name: &str) -> Option<&dyn ComplianceModule> {
        self.modules.iter().find(|m| m.name() == name).map(|m| &**m)
    }

    fn position(&self, name: &str) -> Result<usize, InvariantViolation> {
        self.modules
            .iter()
            .position(|m| m.name() == name)
            .ok_or_else(|| InvariantViolation::NotFound {
                what: format!("module {name}"),
            })
    }

    fn report(&self, module: &'static str, reason: String, events: &mut EventBuffer) {
        tracing::warn!(compliance = %self.address(), module, %reason, "compliance notification failed");
        events.emit(
            self.address(),
            Event::ModuleNotificationFailed {
                module: module.to_string(),
                reason,
            },
        );
    }

    fn notify_each<F>(&mut self, events: &mut EventBuffer, mut notify: F)
    where
        F: FnMut(&mut dyn ComplianceModule) -> Result<(), String>,
    {
        let mut failures = Vec::new();
        for module in &mut self.modules {
            if let Err(reason) = notify(module.as_mut()) {
                failures.push((module.name(), reason));
            }
        }
        for (module, reason) in failures {
            self.report(module, reason, events);
        }
    }
}

impl ComplianceGate for ModularCompliance {
    fn bound_token(&self) -> Option<Address> {
        self.token_bound
    }

    fn can_transfer(
        &self,
        ctx: ComplianceContext<'_>,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), ComplianceRejection> {
        for module in &self.modules {
            module
                .check(ctx, from, to, amount)
                .map_err(|reason| ComplianceRejection::ModuleVeto {
                    module: module.name().to_string(),
                    reason,
                })?;
        }
        Ok(())
    }

    fn transferred(
        &mut self,
        ctx: ComplianceContext<'_>,
        from: &Address,
        to: &Address,
        amount: u128,
        events: &mut EventBuffer,
    ) {
        self.notify_each(events, |m| m.transferred(ctx, from, to, amount));
    }

    fn created(&mut self, ctx: ComplianceContext<'_>, to: &Address, amount: u128, events: &mut EventBuffer) {
        self.notify_each(events, |m| m.created(ctx, to, amount));
    }

    fn destroyed(&mut self, ctx: ComplianceContext<'_>, from: &Address, amount: u128, events: &mut EventBuffer) {
        self.notify_each(events, |m| m.destroyed(ctx, from, amount));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{MaxBalanceModule, SupplyLimitModule};
    use crate::test_support::{addr, Fixture};

    fn compliance() -> ModularCompliance {
        ModularCompliance::new(AgentRole::new(addr("compliance"), addr("owner")))
    }

    // ── binding ──────────────────────────────────────────────────────

    #[test]
    fn test_token_binds_itself_once() {
        let mut mc = compliance();
        let token = addr("token");
        let mut ev = EventBuffer::new();
        mc.bind_token(&token, token, &mut ev).unwrap();
        assert_eq!(mc.get_token_bound(), Some(token));

        let other = addr("other-token");
        let err = mc.bind_token(&other, other, &mut ev).unwrap_err();
        assert!(matches!(err, TrexError::Authorization(AuthorizationError::NotOwner { .. })));
    }

    #[test]
    fn test_double_bind_rejected() {
        let mut mc = compliance();
        let owner = addr("owner");
        let token = addr("token");
        let mut ev = EventBuffer::new();
        mc.bind_token(&owner, token, &mut ev).unwrap();
        let err = mc.bind_token(&owner, token, &mut ev).unwrap_err();
        assert!(matches!(err, TrexError::State(StateError::ComplianceAlreadyBound { .. })));
    }

    #[test]
    fn test_owner_rebind_detaches_previous() {
        let mut mc = compliance();
        let owner = addr("owner");
        let mut ev = EventBuffer::new();
        mc.bind_token(&owner, addr("t1"), &mut ev).unwrap();
        mc.bind_token(&owner, addr("t2"), &mut ev).unwrap();
        assert_eq!(mc.get_token_bound(), Some(addr("t2")));
        let unbound: Vec<_> = ev
            .events()
            .filter(|e| matches!(e, Event::TokenUnbound { token } if *token == addr("t1")))
            .collect();
        assert_eq!(unbound.len(), 1);
    }

    #[test]
    fn test_unbind_by_bound_token() {
        let mut mc = compliance();
        let token = addr("token");
        let mut ev = EventBuffer::new();
        mc.bind_token(&token, token, &mut ev).unwrap();
        assert!(mc.unbind_token(&addr("stranger"), token, &mut ev).is_err());
        mc.unbind_token(&token, token, &mut ev).unwrap();
        assert_eq!(mc.get_token_bound(), None);
        assert!(matches!(
            mc.unbind_token(&token, token, &mut ev),
            Err(TrexError::State(StateError::NoTokenBound { .. }))
        ));
    }

    // ── modules ──────────────────────────────────────────────────────

    #[test]
    fn test_add_module_gated_and_unique() {
        let mut mc = compliance();
        let owner = addr("owner");
        let mut ev = EventBuffer::new();
        let config = ModuleConfig::SupplyLimit { limit: 10 };
        assert!(mc.add_module(&addr("stranger"), &config, &mut ev).is_err());
        mc.add_module(&owner, &config, &mut ev).unwrap();
        assert!(mc.is_module_bound(SupplyLimitModule::NAME));
        let err = mc.add_module(&owner, &config, &mut ev).unwrap_err();
        assert!(matches!(err, TrexError::Invariant(InvariantViolation::Duplicate { .. })));
    }

    #[test]
    fn test_agent_may_manage_modules() {
        let mut mc = compliance();
        let owner = addr("owner");
        let agent = addr("agent");
        let mut ev = EventBuffer::new();
        mc.roles_mut().add_agent(&owner, agent, &mut ev).unwrap();
        mc.add_module(&agent, &ModuleConfig::HolderLimit { max_holders: 5 }, &mut ev)
            .unwrap();
        mc.remove_module(&agent, "HolderLimitModule", &mut ev).unwrap();
        assert!(mc.get_modules().is_empty());
    }

    #[test]
    fn test_modules_kept_in_registration_order() {
        let mut mc = compliance();
        let owner = addr("owner");
        let mut ev = EventBuffer::new();
        mc.add_module(&owner, &ModuleConfig::MaxBalance { max_balance: 1 }, &mut ev)
            .unwrap();
        mc.add_module(&owner, &ModuleConfig::SupplyLimit { limit: 1 }, &mut ev)
            .unwrap();
        assert_eq!(mc.get_modules(), vec!["MaxBalanceModule", "SupplyLimitModule"]);
    }

    #[test]
    fn test_call_module_function() {
        let mut mc = compliance();
        let owner = addr("owner");
        let mut ev = EventBuffer::new();
        let call = ModuleCall::SetSupplyLimit { limit: 99 };
        assert!(matches!(
            mc.call_module_function(&owner, SupplyLimitModule::NAME, &call, &mut ev),
            Err(TrexError::Invariant(InvariantViolation::NotFound { .. }))
        ));
        mc.add_module(&owner, &ModuleConfig::SupplyLimit { limit: 1 }, &mut ev)
            .unwrap();
        mc.call_module_function(&owner, SupplyLimitModule::NAME, &call, &mut ev)
            .unwrap();
        assert!(ev
            .events()
            .any(|e| matches!(e, Event::ModuleInteraction { function, .. } if function == "set_supply_limit")));
    }

    // ── evaluation and notification ──────────────────────────────────

    #[test]
    fn test_can_transfer_names_vetoing_module() {
        let mut mc = compliance();
        let owner = addr("owner");
        let mut ev = EventBuffer::new();
        mc.add_module(&owner, &ModuleConfig::SupplyLimit { limit: 10 }, &mut ev)
            .unwrap();
        let mut fx = Fixture::new();
        fx.link("alice", "alice-id", 250);
        assert!(mc.can_transfer(fx.ctx(), &Address::ZERO, &addr("alice"), 10).is_ok());
        let err = mc
            .can_transfer(fx.ctx(), &Address::ZERO, &addr("alice"), 11)
            .unwrap_err();
        assert!(matches!(err, ComplianceRejection::ModuleVeto { module, .. } if module == "SupplyLimitModule"));
    }

    #[test]
    fn test_no_modules_allows_everything() {
        let mc = compliance();
        let fx = Fixture::new();
        assert!(mc.can_transfer(fx.ctx(), &addr("a"), &addr("b"), u128::MAX).is_ok());
    }

    #[test]
    fn test_notification_failure_is_reported_not_raised() {
        let mut mc = compliance();
        let owner = addr("owner");
        let mut ev = EventBuffer::new();
        mc.add_module(&owner, &ModuleConfig::MaxBalance { max_balance: 100 }, &mut ev)
            .unwrap();
        mc.add_module(&owner, &ModuleConfig::HolderLimit { max_holders: 10 }, &mut ev)
            .unwrap();
        let mut fx = Fixture::new();
        // The receiver has no identity, so MaxBalance cannot attribute the mint.
        fx.set_balance("ghost", 5);
        let mut ev = EventBuffer::new();
        mc.created(fx.ctx(), &addr("ghost"), 5, &mut ev);
        let failed: Vec<_> = ev
            .events()
            .filter(|e| matches!(e, Event::ModuleNotificationFailed { module, .. } if module == MaxBalanceModule::NAME))
            .collect();
        assert_eq!(failed.len(), 1);
    }

    #[test]
    fn test_module_limit() {
        #[derive(Debug, Clone)]
        struct Named(&'static str);
        impl ComplianceModule for Named {
            fn name(&self) -> &'static str {
                self.0
            }
            fn check(&self, _: ComplianceContext<'_>, _: &Address, _: &Address, _: u128) -> Result<(), String> {
                Ok(())
            }
            fn configure(&mut self, _: &ModuleCall) -> Result<(), InvariantViolation> {
                Ok(())
            }
            fn clone_box(&self) -> Box<dyn ComplianceModule> {
                Box::new(self.clone())
            }
        }
        const NAMES: [&str; 26] = [
            "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u",
            "v", "w", "x", "y", "z",
        ];
        let mut mc = compliance();
        let owner = addr("owner");
        let mut ev = EventBuffer::new();
        for name in &NAMES[..MAX_MODULES] {
            mc.add_module_instance(&owner, Box::new(Named(*name)), &mut ev).unwrap();
        }
        let err = mc
            .add_module_instance(&owner, Box::new(Named(NAMES[MAX_MODULES])), &mut ev)
            .unwrap_err();
        assert!(matches!(err, TrexError::Invariant(InvariantViolation::LimitExceeded { max: 25, .. })));
    }
}
