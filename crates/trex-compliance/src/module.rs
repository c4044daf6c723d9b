//! # Compliance Modules
//!
//! A module is a stateful rule bound to one compliance contract (and so to
//! one token). It vetoes operations in [`ComplianceModule::check`] and keeps
//! its own counters up to date through the post-commit notifications.
//!
//! Notifications return `Err` to report drift, never to refuse: the token
//! has already committed by the time they run. The compliance contract logs
//! the failure and moves on, so a module must tolerate its counters being
//! stale and correct them the next time it sees real ledger state.

use trex_core::{Address, ComplianceContext, InvariantViolation};

use crate::config::ModuleCall;

pub trait ComplianceModule: Send + Sync + std::fmt::Debug {
    /// Unique name; a compliance holds at most one module per name.
    fn name(&self) -> &'static str;

    /// Approve or veto moving `amount` from `from` to `to`. Mints come from
    /// the zero address.
    fn check(&self, ctx: ComplianceContext<'_>, from: &Address, to: &Address, amount: u128) -> Result<(), String>;

    fn transferred(
        &mut self,
        _ctx: ComplianceContext<'_>,
        _from: &Address,
        _to: &Address,
        _amount: u128,
    ) -> Result<(), String> {
        Ok(())
    }

    fn created(&mut self, _ctx: ComplianceContext<'_>, _to: &Address, _amount: u128) -> Result<(), String> {
        Ok(())
    }

    fn destroyed(&mut self, _ctx: ComplianceContext<'_>, _from: &Address, _amount: u128) -> Result<(), String> {
        Ok(())
    }

    /// Apply an owner configuration call addressed to this module.
    fn configure(&mut self, call: &ModuleCall) -> Result<(), InvariantViolation>;

    fn clone_box(&self) -> Box<dyn ComplianceModule>;
}

impl Clone for Box<dyn ComplianceModule> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The error a module returns for a call meant for another module.
pub(crate) fn wrong_module(module: &str, call: &ModuleCall) -> InvariantViolation {
    InvariantViolation::InvalidInput(format!(
        "{} is not a function of {module}",
        call.function_name()
    ))
}
