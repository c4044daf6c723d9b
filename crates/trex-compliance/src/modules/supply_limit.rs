//! Caps total supply. Only mints are checked.

use trex_core::{Address, ComplianceContext, InvariantViolation};

use crate::config::ModuleCall;
use crate::module::{wrong_module, ComplianceModule};

#[derive(Debug, Clone)]
pub struct SupplyLimitModule {
    limit: u128,
}

impl SupplyLimitModule {
    pub const NAME: &'static str = "SupplyLimitModule";

    pub fn new(limit: u128) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> u128 {
        self.limit
    }
}

impl ComplianceModule for SupplyLimitModule {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, ctx: ComplianceContext<'_>, from: &Address, _to: &Address, amount: u128) -> Result<(), String> {
        if !from.is_zero() {
            return Ok(());
        }
        let supply = ctx.ledger.total_supply();
        match supply.checked_add(amount) {
            Some(next) if next <= self.limit => Ok(()),
            _ => Err(format!(
                "minting {amount} on supply {supply} exceeds limit {}",
                self.limit
            )),
        }
    }

    fn configure(&mut self, call: &ModuleCall) -> Result<(), InvariantViolation> {
        match call {
            ModuleCall::SetSupplyLimit { limit } => {
                self.limit = *limit;
                Ok(())
            }
            other => Err(wrong_module(Self::NAME, other)),
        }
    }

    fn clone_box(&self) -> Box<dyn ComplianceModule> {
        Box::new(self.clone())
    }
}
