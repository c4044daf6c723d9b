//! # Cross-Component Seams
//!
//! The token never holds its identity registry or its compliance directly.
//! It sees them through these traits, which keeps each crate testable with
//! a hand-written double and lets the runtime assemble the real collaborators
//! from separate contract states at call time.
//!
//! Control flow of a balance-changing call:
//!
//! 1. check: [`EligibilityOracle::verify`] for every party, then
//!    [`ComplianceGate::can_transfer`];
//! 2. commit: the token mutates its own balances;
//! 3. notify: [`ComplianceGate::transferred`] / `created` / `destroyed`.
//!
//! Notifications cannot fail the operation. A module whose bookkeeping
//! drifts must resynchronize on its next check.

use crate::address::Address;
use crate::error::{ComplianceRejection, EligibilityError};
use crate::event::EventBuffer;

/// Read-only view of a token's balances.
pub trait LedgerView {
    fn balance_of(&self, wallet: &Address) -> u128;
    fn total_supply(&self) -> u128;
}

/// Answers whether a wallet may hold or receive the token.
///
/// Implementations must be side-effect free and must re-derive the answer on
/// every call; nothing here is cached across calls.
pub trait EligibilityOracle {
    fn verify(&self, wallet: &Address) -> Result<(), EligibilityError>;

    fn is_verified(&self, wallet: &Address) -> bool {
        self.verify(wallet).is_ok()
    }

    /// The identity linked to `wallet`, if any.
    fn identity_of(&self, wallet: &Address) -> Option<Address>;

    /// The country recorded for `wallet`, if linked.
    fn country_of(&self, wallet: &Address) -> Option<u16>;
}

/// What a compliance module can see while evaluating or being notified.
#[derive(Clone, Copy)]
pub struct ComplianceContext<'a> {
    pub token: Address,
    pub ledger: &'a dyn LedgerView,
    pub registry: &'a dyn EligibilityOracle,
}

impl std::fmt::Debug for ComplianceContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplianceContext")
            .field("token", &self.token)
            .field("total_supply", &self.ledger.total_supply())
            .finish()
    }
}

/// The compliance engine as the token sees it.
pub trait ComplianceGate {
    /// The token this compliance serves, if bound.
    fn bound_token(&self) -> Option<Address>;

    /// Whether every module approves moving `amount` from `from` to `to`.
    /// Mints are checked with `from == Address::ZERO`.
    fn can_transfer(
        &self,
        ctx: ComplianceContext<'_>,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), ComplianceRejection>;

    fn transferred(
        &mut self,
        ctx: ComplianceContext<'_>,
        from: &Address,
        to: &Address,
        amount: u128,
        events: &mut EventBuffer,
    );

    fn created(&mut self, ctx: ComplianceContext<'_>, to: &Address, amount: u128, events: &mut EventBuffer);

    fn destroyed(&mut self, ctx: ComplianceContext<'_>, from: &Address, amount: u128, events: &mut EventBuffer);
}
