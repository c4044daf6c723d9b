//! Caps the number of wallets holding a non-zero balance.
//!
//! The holder set is refreshed from the ledger on every notification, and
//! `check` only counts members whose balance is still non-zero.

use std::collections::BTreeSet;

use trex_core::{Address, ComplianceContext, InvariantViolation};

use crate::config::ModuleCall;
use crate::module::{wrong_module, ComplianceModule};

#[derive(Debug, Clone)]
pub struct HolderLimitModule {
    max_holders: usize,
    holders: BTreeSet<Address>,
}

impl HolderLimitModule {
    pub const NAME: &'static str = "HolderLimitModule";

    pub fn new(max_holders: usize) -> Self {
        Self {
            max_holders,
            holders: BTreeSet::new(),
        }
    }

    pub fn max_holders(&self) -> usize {
        self.max_holders
    }

    pub fn holder_count(&self, ctx: ComplianceContext<'_>) -> usize {
        self.holders
            .iter()
            .filter(|h| ctx.ledger.balance_of(h) > 0)
            .count()
    }

    fn refresh(&mut self, ctx: ComplianceContext<'_>, wallet: &Address) {
        if wallet.is_zero() {
            return;
        }
        if ctx.ledger.balance_of(wallet) > 0 {
            self.holders.insert(*wallet);
        } else {
            self.holders.remove(wallet);
        }
    }
}

impl ComplianceModule for HolderLimitModule {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, ctx: ComplianceContext<'_>, from: &Address, to: &Address, amount: u128) -> Result<(), String> {
        if to.is_zero() || amount == 0 || ctx.ledger.balance_of(to) > 0 {
            return Ok(());
        }
        // Moving a whole balance swaps one holder for another.
        if !from.is_zero() && ctx.ledger.balance_of(from) == amount {
            return Ok(());
        }
        let count = self.holder_count(ctx);
        if count >= self.max_holders {
            return Err(format!("holder limit {} reached", self.max_holders));
        }
        Ok(())
    }

    fn transferred(&mut self, ctx: ComplianceContext<'_>, from: &Address, to: &Address, _amount: u128) -> Result<(), String> {
        self.refresh(ctx, from);
        self.refresh(ctx, to);
        Ok(())
    }

    fn created(&mut self, ctx: ComplianceContext<'_>, to: &Address, _amount: u128) -> Result<(), String> {
        self.refresh(ctx, to);
        Ok(())
    }

    fn destroyed(&mut self, ctx: ComplianceContext<'_>, from: &Address, _amount: u128) -> Result<(), String> {
        self.refresh(ctx, from);
        Ok(())
    }

    fn configure(&mut self, call: &ModuleCall) -> Result<(), InvariantViolation> {
        match call {
            ModuleCall::SetHolderLimit { max_holders } => {
                self.max_holders = *max_holders;
                Ok(())
            }
            other => Err(wrong_module(Self::NAME, other)),
        }
    }

    fn clone_box(&self) -> Box<dyn ComplianceModule> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{addr, Fixture};

    #[test]
    fn test_new_holder_blocked_at_limit() {
        let mut fx = Fixture::new();
        let mut module = HolderLimitModule::new(2);
        for name in ["a", "b"] {
            fx.set_balance(name, 10);
            module.created(fx.ctx(), &addr(name), 10).unwrap();
        }
        assert_eq!(module.holder_count(fx.ctx()), 2);
        assert!(module.check(fx.ctx(), &Address::ZERO, &addr("c"), 1).is_err());
        assert!(module.check(fx.ctx(), &Address::ZERO, &addr("a"), 1).is_ok());
    }

    #[test]
    fn test_whole_balance_transfer_allowed() {
        let mut fx = Fixture::new();
        let mut module = HolderLimitModule::new(2);
        for name in ["a", "b"] {
            fx.set_balance(name, 10);
            module.created(fx.ctx(), &addr(name), 10).unwrap();
        }
        assert!(module.check(fx.ctx(), &addr("a"), &addr("c"), 10).is_ok());
        assert!(module.check(fx.ctx(), &addr("a"), &addr("c"), 9).is_err());
    }

    #[test]
    fn test_emptied_holder_frees_a_slot() {
        let mut fx = Fixture::new();
        let mut module = HolderLimitModule::new(1);
        fx.set_balance("a", 10);
        module.created(fx.ctx(), &addr("a"), 10).unwrap();
        fx.set_balance("a", 0);
        module.destroyed(fx.ctx(), &addr("a"), 10).unwrap();
        assert_eq!(module.holder_count(fx.ctx()), 0);
        assert!(module.check(fx.ctx(), &Address::ZERO, &addr("b"), 1).is_ok());
    }

    #[test]
    fn test_stale_member_not_counted() {
        let mut fx = Fixture::new();
        let mut module = HolderLimitModule::new(1);
        fx.set_balance("a", 10);
        module.created(fx.ctx(), &addr("a"), 10).unwrap();
        // Balance drained without a notification.
        fx.set_balance("a", 0);
        assert!(module.check(fx.ctx(), &Address::ZERO, &addr("b"), 1).is_ok());
    }
}
