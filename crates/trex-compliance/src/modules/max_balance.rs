//! Caps how much one investor identity may hold across all of its wallets.
//!
//! The module keeps its own per-identity tally, updated from notifications.
//! When a notification cannot be applied (unknown identity, underflow) the
//! tally drifts; `check` never trusts it below the receiving wallet's real
//! balance, and the owner can reseed it with `PresetIdentityBalance`.

use std::collections::BTreeMap;

use trex_core::{Address, ComplianceContext, InvariantViolation};

use crate::config::ModuleCall;
use crate::module::{wrong_module, ComplianceModule};

#[derive(Debug, Clone)]
pub struct MaxBalanceModule {
    max_balance: u128,
    balances: BTreeMap<Address, u128>,
}

impl MaxBalanceModule {
    pub const NAME: &'static str = "MaxBalanceModule";

    pub fn new(max_balance: u128) -> Self {
        Self {
            max_balance,
            balances: BTreeMap::new(),
        }
    }

    pub fn max_balance(&self) -> u128 {
        self.max_balance
    }

    /// Tracked holdings of an investor identity.
    pub fn identity_balance(&self, identity: &Address) -> u128 {
        self.balances.get(identity).copied().unwrap_or(0)
    }

    fn identity(ctx: ComplianceContext<'_>, wallet: &Address) -> Result<Address, String> {
        ctx.registry
            .identity_of(wallet)
            .ok_or_else(|| format!("wallet {wallet} has no identity"))
    }

    fn credit(&mut self, identity: Address, amount: u128) -> Result<(), String> {
        let entry = self.balances.entry(identity).or_insert(0);
        match entry.checked_add(amount) {
            Some(next) => {
                *entry = next;
                Ok(())
            }
            None => {
                *entry = u128::MAX;
                Err(format!("tally of {identity} overflowed"))
            }
        }
    }

    fn debit(&mut self, identity: Address, amount: u128) -> Result<(), String> {
        let entry = self.balances.entry(identity).or_insert(0);
        match entry.checked_sub(amount) {
            Some(next) => {
                *entry = next;
                Ok(())
            }
            None => {
                let had = std::mem::take(entry);
                Err(format!("tally of {identity} was {had}, below debit of {amount}"))
            }
        }
    }
}

impl ComplianceModule for MaxBalanceModule {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, ctx: ComplianceContext<'_>, from: &Address, to: &Address, amount: u128) -> Result<(), String> {
        if to.is_zero() {
            return Ok(());
        }
        if amount > self.max_balance {
            return Err(format!("amount {amount} exceeds max balance {}", self.max_balance));
        }
        let receiver = Self::identity(ctx, to)?;
        if !from.is_zero() && ctx.registry.identity_of(from) == Some(receiver) {
            return Ok(());
        }
        let held = self.identity_balance(&receiver).max(ctx.ledger.balance_of(to));
        match held.checked_add(amount) {
            Some(next) if next <= self.max_balance => Ok(()),
            _ => Err(format!(
                "identity {receiver} would hold more than {}",
                self.max_balance
            )),
        }
    }

    fn transferred(&mut self, ctx: ComplianceContext<'_>, from: &Address, to: &Address, amount: u128) -> Result<(), String> {
        let sender = Self::identity(ctx, from)?;
        let receiver = Self::identity(ctx, to)?;
        if sender == receiver {
            return Ok(());
        }
        let debited = self.debit(sender, amount);
        let credited = self.credit(receiver, amount);
        debited.and(credited)
    }

    fn created(&mut self, ctx: ComplianceContext<'_>, to: &Address, amount: u128) -> Result<(), String> {
        let receiver = Self::identity(ctx, to)?;
        self.credit(receiver, amount)
    }

    fn destroyed(&mut self, ctx: ComplianceContext<'_>, from: &Address, amount: u128) -> Result<(), String> {
        let sender = Self::identity(ctx, from)?;
        self.debit(sender, amount)
    }

    fn configure(&mut self, call: &ModuleCall) -> Result<(), InvariantViolation> {
        match call {
            ModuleCall::SetMaxBalance { max_balance } => {
                self.max_balance = *max_balance;
                Ok(())
            }
            ModuleCall::PresetIdentityBalance { identity, balance } => {
                if identity.is_zero() {
                    return Err(InvariantViolation::ZeroAddress("identity".into()));
                }
                self.balances.insert(*identity, *balance);
                Ok(())
            }
            other => Err(wrong_module(Self::NAME, other)),
        }
    }

    fn clone_box(&self) -> Box<dyn ComplianceModule> {
        Box::new(self.clone())
    }
}
