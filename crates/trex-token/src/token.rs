//! # Token State Machine
//!
//! Every balance-changing operation runs in three phases:
//!
//! 1. **check**: role, pause state, compliance binding, eligibility of the
//!    parties, frozen flags, free balance and the compliance verdict, all
//!    evaluated against current state;
//! 2. **commit**: balances, supply and freeze amounts are written;
//! 3. **notify**: the bound compliance is told what happened.
//!
//! Nothing is written before the last check passes, so a single operation
//! is all-or-nothing on its own. Batches stop at the first failing item and
//! rely on the host's checkpoint to discard the items already applied.
//!
//! ## Pause
//!
//! | operation | while paused |
//! |-----------|--------------|
//! | mint, burn, transfer, transfer_from | rejected |
//! | forced_transfer | [`PausePolicy::forced_transfer_when_paused`] |
//! | recovery_address | [`PausePolicy::recovery_when_paused`] |
//! | freezing, allowances, owner setters | allowed |

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use trex_core::{
    AgentRole, Address, AuthorizationError, ComplianceContext, ComplianceGate, EligibilityOracle, Event,
    EventBuffer, InvariantViolation, LedgerView, StateError, TrexError, Version,
};
use trex_identity::{IdentityDirectory, KeyPurpose};

use crate::policy::{ImplementationInfo, PausePolicy};

pub const MAX_DECIMALS: u8 = 18;

/// Descriptive token information set at deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub onchain_id: Address,
}

impl TokenInfo {
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.name.is_empty() || self.symbol.is_empty() {
            return Err(InvariantViolation::InvalidInput("token name and symbol must not be empty".into()));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(InvariantViolation::InvalidInput(format!(
                "decimals {} exceed {MAX_DECIMALS}",
                self.decimals
            )));
        }
        Ok(())
    }
}

/// The collaborators a balance-changing call needs, resolved by the host
/// for the duration of one call.
pub struct TokenEnv<'a> {
    pub info: ImplementationInfo,
    pub registry: &'a dyn EligibilityOracle,
    pub compliance: &'a mut dyn ComplianceGate,
}

impl std::fmt::Debug for TokenEnv<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEnv")
            .field("info", &self.info)
            .field("compliance_bound_to", &self.compliance.bound_token())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    roles: AgentRole,
    info: TokenInfo,
    identity_registry: Address,
    compliance: Address,
    balances: BTreeMap<Address, u128>,
    allowances: BTreeMap<Address, BTreeMap<Address, u128>>,
    frozen: BTreeSet<Address>,
    frozen_tokens: BTreeMap<Address, u128>,
    total_supply: u128,
    paused: bool,
}

impl LedgerView for Token {
    fn balance_of(&self, wallet: &Address) -> u128 {
        self.balances.get(wallet).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> u128 {
        self.total_supply
    }
}

impl Token {
    pub fn new(
        roles: AgentRole,
        info: TokenInfo,
        identity_registry: Address,
        compliance: Address,
    ) -> Result<Self, InvariantViolation> {
        info.validate()?;
        if identity_registry.is_zero() {
            return Err(InvariantViolation::ZeroAddress("identity registry".into()));
        }
        if compliance.is_zero() {
            return Err(InvariantViolation::ZeroAddress("compliance".into()));
        }
        Ok(Self {
            roles,
            info,
            identity_registry,
            compliance,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            frozen: BTreeSet::new(),
            frozen_tokens: BTreeMap::new(),
            total_supply: 0,
            paused: false,
        })
    }

    // ── queries ──────────────────────────────────────────────────────

    pub fn address(&self) -> Address {
        self.roles.contract()
    }

    pub fn roles(&self) -> &AgentRole {
        &self.roles
    }

    pub fn roles_mut(&mut self) -> &mut AgentRole {
        &mut self.roles
    }

    pub fn info(&self) -> &TokenInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn symbol(&self) -> &str {
        &self.info.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.info.decimals
    }

    pub fn onchain_id(&self) -> Address {
        self.info.onchain_id
    }

    pub fn identity_registry(&self) -> Address {
        self.identity_registry
    }

    pub fn compliance(&self) -> Address {
        self.compliance
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|s| s.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_frozen(&self, wallet: &Address) -> bool {
        self.frozen.contains(wallet)
    }

    pub fn get_frozen_tokens(&self, wallet: &Address) -> u128 {
        self.frozen_tokens.get(wallet).copied().unwrap_or(0)
    }

    /// Balance minus partially frozen tokens.
    pub fn free_balance(&self, wallet: &Address) -> u128 {
        self.balance_of(wallet).saturating_sub(self.get_frozen_tokens(wallet))
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Wallets with a non-zero balance.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.balances.iter().filter(|(_, b)| **b > 0)
    }

    // ── guards ───────────────────────────────────────────────────────

    fn when_not_paused(&self) -> Result<(), StateError> {
        if self.paused {
            Err(StateError::Paused { token: self.address() })
        } else {
            Ok(())
        }
    }

    fn when_paused_allows(&self, allowed: bool) -> Result<(), StateError> {
        if allowed {
            Ok(())
        } else {
            self.when_not_paused()
        }
    }

    fn check_binding(&self, env: &TokenEnv<'_>) -> Result<(), AuthorizationError> {
        if env.compliance.bound_token() == Some(self.address()) {
            Ok(())
        } else {
            Err(AuthorizationError::NotBoundToken {
                compliance: self.compliance,
                caller: self.address(),
            })
        }
    }

    fn check_not_frozen(&self, wallet: &Address) -> Result<(), StateError> {
        if self.is_frozen(wallet) {
            Err(StateError::WalletFrozen {
                token: self.address(),
                wallet: *wallet,
            })
        } else {
            Ok(())
        }
    }

    fn check_free_balance(&self, wallet: &Address, amount: u128) -> Result<(), InvariantViolation> {
        let balance = self.balance_of(wallet);
        if amount > balance {
            return Err(InvariantViolation::InsufficientBalance {
                wallet: *wallet,
                balance,
                requested: amount,
            });
        }
        let free = self.free_balance(wallet);
        if amount > free {
            return Err(InvariantViolation::InsufficientFreeBalance {
                wallet: *wallet,
                free,
                requested: amount,
            });
        }
        Ok(())
    }

    fn ctx<'b>(&'b self, registry: &'b dyn EligibilityOracle) -> ComplianceContext<'b> {
        ComplianceContext {
            token: self.address(),
            ledger: self,
            registry,
        }
    }

    /// Eligibility of both parties, freeze flags, free balance and the
    /// compliance verdict for a holder-initiated transfer.
    fn check_transfer(&self, env: &TokenEnv<'_>, from: &Address, to: &Address, amount: u128) -> Result<(), TrexError> {
        self.check_binding(env)?;
        if to.is_zero() {
            return Err(InvariantViolation::ZeroAddress("recipient".into()).into());
        }
        env.registry.verify(from)?;
        env.registry.verify(to)?;
        self.check_not_frozen(from)?;
        self.check_not_frozen(to)?;
        self.check_free_balance(from, amount)?;
        env.compliance.can_transfer(self.ctx(env.registry), from, to, amount)?;
        Ok(())
    }

    // ── commit helpers ───────────────────────────────────────────────

    fn move_balance(&mut self, from: Address, to: Address, amount: u128, events: &mut EventBuffer) -> Result<(), InvariantViolation> {
        if from != to {
            let balance = self.balance_of(&from);
            let debited = balance.checked_sub(amount).ok_or(InvariantViolation::InsufficientBalance {
                wallet: from,
                balance,
                requested: amount,
            })?;
            let credited = self
                .balance_of(&to)
                .checked_add(amount)
                .ok_or_else(|| InvariantViolation::Overflow(format!("balance of {to}")))?;
            self.balances.insert(from, debited);
            self.balances.insert(to, credited);
        }
        events.emit(self.address(), Event::Transfer { from, to, value: amount });
        Ok(())
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, value: u128, events: &mut EventBuffer) {
        self.allowances.entry(owner).or_default().insert(spender, value);
        events.emit(self.address(), Event::Approval { owner, spender, value });
    }

    fn emit_info(&self, version: Version, events: &mut EventBuffer) {
        events.emit(
            self.address(),
            Event::UpdatedTokenInformation {
                name: self.info.name.clone(),
                symbol: self.info.symbol.clone(),
                decimals: self.info.decimals,
                version,
                onchain_id: self.info.onchain_id,
            },
        );
    }

    // ── holder operations ────────────────────────────────────────────

    pub fn transfer(
        &mut self,
        caller: &Address,
        env: &mut TokenEnv<'_>,
        to: Address,
        amount: u128,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.when_not_paused()?;
        self.check_transfer(env, caller, &to, amount)?;
        self.move_balance(*caller, to, amount, events)?;
        env.compliance
            .transferred(self.ctx(env.registry), caller, &to, amount, events);
        tracing::debug!(token = %self.address(), from = %caller, %to, amount, "transfer");
        Ok(())
    }

    pub fn batch_transfer(
        &mut self,
        caller: &Address,
        env: &mut TokenEnv<'_>,
        transfers: &[(Address, u128)],
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        for &(to, amount) in transfers {
            self.transfer(caller, env, to, amount, events)?;
        }
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        caller: &Address,
        env: &mut TokenEnv<'_>,
        from: Address,
        to: Address,
        amount: u128,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.when_not_paused()?;
        let allowance = self.allowance(&from, caller);
        if amount > allowance {
            return Err(InvariantViolation::InsufficientAllowance {
                owner: from,
                spender: *caller,
                allowance,
                requested: amount,
            }
            .into());
        }
        self.check_transfer(env, &from, &to, amount)?;
        self.set_allowance(from, *caller, allowance - amount, events);
        self.move_balance(from, to, amount, events)?;
        env.compliance
            .transferred(self.ctx(env.registry), &from, &to, amount, events);
        Ok(())
    }

    pub fn approve(&mut self, caller: &Address, spender: Address, amount: u128, events: &mut EventBuffer) -> Result<(), TrexError> {
        if spender.is_zero() {
            return Err(InvariantViolation::ZeroAddress("spender".into()).into());
        }
        self.set_allowance(*caller, spender, amount, events);
        Ok(())
    }

    pub fn increase_allowance(
        &mut self,
        caller: &Address,
        spender: Address,
        added: u128,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        let next = self
            .allowance(caller, &spender)
            .checked_add(added)
            .ok_or_else(|| InvariantViolation::Overflow("allowance".into()))?;
        self.approve(caller, spender, next, events)
    }

    pub fn decrease_allowance(
        &mut self,
        caller: &Address,
        spender: Address,
        subtracted: u128,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        let allowance = self.allowance(caller, &spender);
        let next = allowance
            .checked_sub(subtracted)
            .ok_or(InvariantViolation::InsufficientAllowance {
                owner: *caller,
                spender,
                allowance,
                requested: subtracted,
            })?;
        self.approve(caller, spender, next, events)
    }

    // ── supply ───────────────────────────────────────────────────────

    pub fn mint(
        &mut self,
        caller: &Address,
        env: &mut TokenEnv<'_>,
        to: Address,
        amount: u128,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        self.when_not_paused()?;
        self.check_binding(env)?;
        if to.is_zero() {
            return Err(InvariantViolation::ZeroAddress("mint recipient".into()).into());
        }
        env.registry.verify(&to)?;
        env.compliance
            .can_transfer(self.ctx(env.registry), &Address::ZERO, &to, amount)?;

        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| InvariantViolation::Overflow("total supply".into()))?;
        let balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or_else(|| InvariantViolation::Overflow(format!("balance of {to}")))?;
        self.total_supply = supply;
        self.balances.insert(to, balance);
        events.emit(
            self.address(),
            Event::Transfer {
                from: Address::ZERO,
                to,
                value: amount,
            },
        );
        env.compliance.created(self.ctx(env.registry), &to, amount, events);
        tracing::debug!(token = %self.address(), %to, amount, supply, "minted");
        Ok(())
    }

    pub fn batch_mint(
        &mut self,
        caller: &Address,
        env: &mut TokenEnv<'_>,
        mints: &[(Address, u128)],
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        for &(to, amount) in mints {
            self.mint(caller, env, to, amount, events)?;
        }
        Ok(())
    }

    pub fn burn(
        &mut self,
        caller: &Address,
        env: &mut TokenEnv<'_>,
        from: Address,
        amount: u128,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        self.when_not_paused()?;
        self.check_binding(env)?;
        self.check_free_balance(&from, amount)?;

        let balance = self.balance_of(&from) - amount;
        let supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or_else(|| InvariantViolation::Overflow("total supply underflow".into()))?;
        self.balances.insert(from, balance);
        self.total_supply = supply;
        events.emit(
            self.address(),
            Event::Transfer {
                from,
                to: Address::ZERO,
                value: amount,
            },
        );
        env.compliance.destroyed(self.ctx(env.registry), &from, amount, events);
        tracing::debug!(token = %self.address(), %from, amount, supply, "burned");
        Ok(())
    }

    pub fn batch_burn(
        &mut self,
        caller: &Address,
        env: &mut TokenEnv<'_>,
        burns: &[(Address, u128)],
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        for &(from, amount) in burns {
            self.burn(caller, env, from, amount, events)?;
        }
        Ok(())
    }

    // ── administrative transfers ─────────────────────────────────────

    /// Moves `amount` regardless of the sender's freeze state, drawing on
    /// partially frozen tokens when the free balance falls short. The
    /// recipient must still be eligible and compliance must still approve.
    pub fn forced_transfer(
        &mut self,
        caller: &Address,
        env: &mut TokenEnv<'_>,
        from: Address,
        to: Address,
        amount: u128,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        self.when_paused_allows(env.info.pause_policy.forced_transfer_when_paused)?;
        self.forced_move(env, from, to, amount, events)
    }

    fn forced_move(
        &mut self,
        env: &mut TokenEnv<'_>,
        from: Address,
        to: Address,
        amount: u128,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.check_binding(env)?;
        if to.is_zero() {
            return Err(InvariantViolation::ZeroAddress("recipient".into()).into());
        }
        let balance = self.balance_of(&from);
        if amount > balance {
            return Err(InvariantViolation::InsufficientBalance {
                wallet: from,
                balance,
                requested: amount,
            }
            .into());
        }
        env.registry.verify(&to)?;
        env.compliance
            .can_transfer(self.ctx(env.registry), &from, &to, amount)?;

        let free = self.free_balance(&from);
        if amount > free {
            let unfreeze = amount - free;
            let frozen = self.get_frozen_tokens(&from) - unfreeze;
            self.frozen_tokens.insert(from, frozen);
            events.emit(self.address(), Event::TokensUnfrozen { wallet: from, amount: unfreeze });
        }
        self.move_balance(from, to, amount, events)?;
        env.compliance
            .transferred(self.ctx(env.registry), &from, &to, amount, events);
        Ok(())
    }

    pub fn batch_forced_transfer(
        &mut self,
        caller: &Address,
        env: &mut TokenEnv<'_>,
        transfers: &[(Address, Address, u128)],
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        for &(from, to, amount) in transfers {
            self.forced_transfer(caller, env, from, to, amount, events)?;
        }
        Ok(())
    }

    /// Checks everything recovery needs before the host relinks the
    /// registry: the lost wallet holds tokens and `new_wallet` is a
    /// MANAGEMENT key of the investor identity.
    pub fn recovery_preflight(
        &self,
        caller: &Address,
        policy: PausePolicy,
        lost_wallet: Address,
        new_wallet: Address,
        investor_identity: Address,
        identities: &dyn IdentityDirectory,
    ) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        self.when_paused_allows(policy.recovery_when_paused)?;
        if new_wallet.is_zero() {
            return Err(InvariantViolation::ZeroAddress("new wallet".into()).into());
        }
        if new_wallet == lost_wallet {
            return Err(InvariantViolation::InvalidInput("new wallet equals the lost wallet".into()).into());
        }
        if self.balance_of(&lost_wallet) == 0 {
            return Err(InvariantViolation::NotFound {
                what: format!("tokens to recover on {lost_wallet}"),
            }
            .into());
        }
        if !identities.wallet_has_purpose(&investor_identity, &new_wallet, KeyPurpose::Management) {
            return Err(AuthorizationError::MissingKeyPurpose {
                identity: investor_identity,
                purpose: KeyPurpose::Management.as_str().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Moves the whole balance, the partial-freeze amount and the frozen
    /// flag from `lost_wallet` to `new_wallet`. The host registers
    /// `new_wallet` before and deletes `lost_wallet` after this call.
    #[allow(clippy::too_many_arguments)]
    pub fn recovery_address(
        &mut self,
        caller: &Address,
        env: &mut TokenEnv<'_>,
        lost_wallet: Address,
        new_wallet: Address,
        investor_identity: Address,
        identities: &dyn IdentityDirectory,
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        self.recovery_preflight(
            caller,
            env.info.pause_policy,
            lost_wallet,
            new_wallet,
            investor_identity,
            identities,
        )?;
        let balance = self.balance_of(&lost_wallet);
        let frozen_amount = self.get_frozen_tokens(&lost_wallet);
        let was_frozen = self.is_frozen(&lost_wallet);
        let new_frozen_amount = self
            .get_frozen_tokens(&new_wallet)
            .checked_add(frozen_amount)
            .ok_or_else(|| InvariantViolation::Overflow(format!("frozen tokens of {new_wallet}")))?;

        self.forced_move(env, lost_wallet, new_wallet, balance, events)?;

        if frozen_amount > 0 {
            self.frozen_tokens.insert(new_wallet, new_frozen_amount);
            events.emit(
                self.address(),
                Event::TokensFrozen {
                    wallet: new_wallet,
                    amount: frozen_amount,
                },
            );
        }
        if was_frozen {
            self.frozen.insert(new_wallet);
            events.emit(
                self.address(),
                Event::AddressFrozen {
                    wallet: new_wallet,
                    frozen: true,
                    by: *caller,
                },
            );
        }
        events.emit(
            self.address(),
            Event::RecoverySuccess {
                lost_wallet,
                new_wallet,
                investor_identity,
            },
        );
        tracing::info!(token = %self.address(), %lost_wallet, %new_wallet, balance, "wallet recovered");
        Ok(())
    }

    // ── freezing ─────────────────────────────────────────────────────

    pub fn set_address_frozen(&mut self, caller: &Address, wallet: Address, freeze: bool, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        if wallet.is_zero() {
            return Err(InvariantViolation::ZeroAddress("wallet".into()).into());
        }
        if freeze {
            self.frozen.insert(wallet);
        } else {
            self.frozen.remove(&wallet);
        }
        events.emit(
            self.address(),
            Event::AddressFrozen {
                wallet,
                frozen: freeze,
                by: *caller,
            },
        );
        Ok(())
    }

    pub fn batch_set_address_frozen(
        &mut self,
        caller: &Address,
        updates: &[(Address, bool)],
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        for &(wallet, freeze) in updates {
            self.set_address_frozen(caller, wallet, freeze, events)?;
        }
        Ok(())
    }

    pub fn freeze_partial_tokens(&mut self, caller: &Address, wallet: Address, amount: u128, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        let free = self.free_balance(&wallet);
        if amount > free {
            return Err(InvariantViolation::InsufficientFreeBalance {
                wallet,
                free,
                requested: amount,
            }
            .into());
        }
        let frozen = self.get_frozen_tokens(&wallet) + amount;
        self.frozen_tokens.insert(wallet, frozen);
        events.emit(self.address(), Event::TokensFrozen { wallet, amount });
        Ok(())
    }

    pub fn unfreeze_partial_tokens(&mut self, caller: &Address, wallet: Address, amount: u128, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        let frozen = self.get_frozen_tokens(&wallet);
        if amount > frozen {
            return Err(InvariantViolation::InsufficientFrozenTokens {
                wallet,
                frozen,
                requested: amount,
            }
            .into());
        }
        self.frozen_tokens.insert(wallet, frozen - amount);
        events.emit(self.address(), Event::TokensUnfrozen { wallet, amount });
        Ok(())
    }

    pub fn batch_freeze_partial_tokens(
        &mut self,
        caller: &Address,
        updates: &[(Address, u128)],
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        for &(wallet, amount) in updates {
            self.freeze_partial_tokens(caller, wallet, amount, events)?;
        }
        Ok(())
    }

    pub fn batch_unfreeze_partial_tokens(
        &mut self,
        caller: &Address,
        updates: &[(Address, u128)],
        events: &mut EventBuffer,
    ) -> Result<(), TrexError> {
        for &(wallet, amount) in updates {
            self.unfreeze_partial_tokens(caller, wallet, amount, events)?;
        }
        Ok(())
    }

    // ── pause ────────────────────────────────────────────────────────

    pub fn pause(&mut self, caller: &Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        self.when_not_paused()?;
        self.paused = true;
        events.emit(self.address(), Event::Paused { by: *caller });
        tracing::info!(token = %self.address(), by = %caller, "token paused");
        Ok(())
    }

    pub fn unpause(&mut self, caller: &Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_agent(caller)?;
        if !self.paused {
            return Err(StateError::NotPaused { token: self.address() }.into());
        }
        self.paused = false;
        events.emit(self.address(), Event::Unpaused { by: *caller });
        tracing::info!(token = %self.address(), by = %caller, "token unpaused");
        Ok(())
    }

    // ── owner setters ────────────────────────────────────────────────

    pub fn set_name(&mut self, caller: &Address, name: String, version: Version, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_owner(caller)?;
        if name.is_empty() {
            return Err(InvariantViolation::InvalidInput("token name must not be empty".into()).into());
        }
        self.info.name = name;
        self.emit_info(version, events);
        Ok(())
    }

    pub fn set_symbol(&mut self, caller: &Address, symbol: String, version: Version, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_owner(caller)?;
        if symbol.is_empty() {
            return Err(InvariantViolation::InvalidInput("token symbol must not be empty".into()).into());
        }
        self.info.symbol = symbol;
        self.emit_info(version, events);
        Ok(())
    }

    pub fn set_onchain_id(&mut self, caller: &Address, onchain_id: Address, version: Version, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_owner(caller)?;
        self.info.onchain_id = onchain_id;
        self.emit_info(version, events);
        Ok(())
    }

    pub fn set_identity_registry(&mut self, caller: &Address, registry: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.roles.only_owner(caller)?;
        if registry.is_zero() {
            return Err(InvariantViolation::ZeroAddress("identity registry".into()).into());
        }
        self.identity_registry = registry;
        events.emit(self.address(), Event::IdentityRegistryAdded { registry });
        Ok(())
    }

    /// Points the token at another compliance and returns the previous one.
    /// The host unbinds the old compliance and binds the new one.
    pub fn set_compliance(&mut self, caller: &Address, compliance: Address, events: &mut EventBuffer) -> Result<Address, TrexError> {
        self.roles.only_owner(caller)?;
        if compliance.is_zero() {
            return Err(InvariantViolation::ZeroAddress("compliance".into()).into());
        }
        let previous = std::mem::replace(&mut self.compliance, compliance);
        events.emit(self.address(), Event::ComplianceAdded { compliance });
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{addr, Harness};
    use proptest::prelude::*;
    use trex_core::{ComplianceRejection, EligibilityError};
    use trex_compliance::ModuleConfig;

    // ── transfers ────────────────────────────────────────────────────

    #[test]
    fn test_mint_then_burn_restores_supply() {
        let mut h = Harness::new();
        h.mint("alice", 50).unwrap();
        assert_eq!(h.token.balance_of(&addr("alice")), 50);
        assert_eq!(h.token.total_supply(), 50);
        h.burn("alice", 50).unwrap();
        assert_eq!(h.token.balance_of(&addr("alice")), 0);
        assert_eq!(h.token.total_supply(), 0);
    }

    #[test]
    fn test_transfer_between_verified_wallets() {
        let mut h = Harness::new();
        h.mint("alice", 100).unwrap();
        h.transfer("alice", "bob", 40).unwrap();
        assert_eq!(h.token.balance_of(&addr("alice")), 60);
        assert_eq!(h.token.balance_of(&addr("bob")), 40);
        assert_eq!(h.token.total_supply(), 100);
    }

    #[test]
    fn test_transfer_to_unverified_rejected() {
        let mut h = Harness::new();
        h.mint("alice", 100).unwrap();
        let err = h.transfer("alice", "mallory", 1).unwrap_err();
        assert!(matches!(err, TrexError::Eligibility(EligibilityError::NotLinked { .. })));
        assert_eq!(h.token.balance_of(&addr("alice")), 100);
    }

    #[test]
    fn test_frozen_tokens_not_transferable() {
        let mut h = Harness::new();
        h.mint("alice", 30).unwrap();
        h.with_agent(|t, agent, ev| t.freeze_partial_tokens(agent, addr("alice"), 20, ev))
            .unwrap();
        let err = h.transfer("alice", "bob", 30).unwrap_err();
        assert!(matches!(
            err,
            TrexError::Invariant(InvariantViolation::InsufficientFreeBalance { free: 10, requested: 30, .. })
        ));
        h.transfer("alice", "bob", 10).unwrap();
    }

    #[test]
    fn test_frozen_wallet_cannot_send_or_receive() {
        let mut h = Harness::new();
        h.mint("alice", 30).unwrap();
        h.with_agent(|t, agent, ev| t.set_address_frozen(agent, addr("bob"), true, ev))
            .unwrap();
        let err = h.transfer("alice", "bob", 1).unwrap_err();
        assert!(matches!(err, TrexError::State(StateError::WalletFrozen { .. })));
    }

    #[test]
    fn test_compliance_veto_surfaces_module() {
        let mut h = Harness::new();
        h.add_module(ModuleConfig::SupplyLimit { limit: 10 });
        let err = h.mint("alice", 11).unwrap_err();
        assert!(matches!(
            err,
            TrexError::Compliance(ComplianceRejection::ModuleVeto { ref module, .. }) if module == "SupplyLimitModule"
        ));
        assert_eq!(h.token.total_supply(), 0);
    }

    #[test]
    fn test_unbound_compliance_rejected() {
        let mut h = Harness::new();
        let owner = addr("owner");
        h.compliance
            .unbind_token(&owner, h.token.address(), &mut EventBuffer::new())
            .unwrap();
        let err = h.mint("alice", 1).unwrap_err();
        assert!(matches!(err, TrexError::Authorization(AuthorizationError::NotBoundToken { .. })));
    }

    // ── allowances ───────────────────────────────────────────────────

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut h = Harness::new();
        h.mint("alice", 100).unwrap();
        let mut ev = EventBuffer::new();
        h.token.approve(&addr("alice"), addr("bob"), 30, &mut ev).unwrap();
        h.token
            .increase_allowance(&addr("alice"), addr("bob"), 10, &mut ev)
            .unwrap();
        h.with_env(|t, env, ev| t.transfer_from(&addr("bob"), env, addr("alice"), addr("carol"), 35, ev))
            .unwrap();
        assert_eq!(h.token.allowance(&addr("alice"), &addr("bob")), 5);
        assert_eq!(h.token.balance_of(&addr("carol")), 35);
        let err = h
            .with_env(|t, env, ev| t.transfer_from(&addr("bob"), env, addr("alice"), addr("carol"), 6, ev))
            .unwrap_err();
        assert!(matches!(err, TrexError::Invariant(InvariantViolation::InsufficientAllowance { .. })));
    }

    #[test]
    fn test_decrease_allowance_below_zero_rejected() {
        let mut h = Harness::new();
        let mut ev = EventBuffer::new();
        h.token.approve(&addr("alice"), addr("bob"), 5, &mut ev).unwrap();
        assert!(h
            .token
            .decrease_allowance(&addr("alice"), addr("bob"), 6, &mut ev)
            .is_err());
        h.token
            .decrease_allowance(&addr("alice"), addr("bob"), 5, &mut ev)
            .unwrap();
        assert_eq!(h.token.allowance(&addr("alice"), &addr("bob")), 0);
    }

    // ── administrative ───────────────────────────────────────────────

    #[test]
    fn test_forced_transfer_draws_on_frozen_tokens() {
        let mut h = Harness::new();
        h.mint("alice", 100).unwrap();
        h.with_agent(|t, agent, ev| t.freeze_partial_tokens(agent, addr("alice"), 80, ev))
            .unwrap();
        h.with_agent(|t, agent, ev| t.set_address_frozen(agent, addr("alice"), true, ev))
            .unwrap();
        let agent = addr("agent");
        h.with_env(|t, env, ev| t.forced_transfer(&agent, env, addr("alice"), addr("bob"), 50, ev))
            .unwrap();
        assert_eq!(h.token.balance_of(&addr("alice")), 50);
        assert_eq!(h.token.get_frozen_tokens(&addr("alice")), 50);
        assert_eq!(h.token.balance_of(&addr("bob")), 50);
    }

    #[test]
    fn test_forced_transfer_still_needs_eligible_recipient() {
        let mut h = Harness::new();
        h.mint("alice", 10).unwrap();
        let agent = addr("agent");
        let err = h
            .with_env(|t, env, ev| t.forced_transfer(&agent, env, addr("alice"), addr("mallory"), 5, ev))
            .unwrap_err();
        assert!(matches!(err, TrexError::Eligibility(_)));
    }

    #[test]
    fn test_agent_operations_require_agent() {
        let mut h = Harness::new();
        let stranger = addr("stranger");
        let err = h
            .with_env(|t, env, ev| t.mint(&stranger, env, addr("alice"), 1, ev))
            .unwrap_err();
        assert!(matches!(err, TrexError::Authorization(AuthorizationError::NotAgent { .. })));
    }

    #[test]
    fn test_burn_respects_frozen_tokens() {
        let mut h = Harness::new();
        h.mint("alice", 10).unwrap();
        h.with_agent(|t, agent, ev| t.freeze_partial_tokens(agent, addr("alice"), 5, ev))
            .unwrap();
        assert!(matches!(
            h.burn("alice", 6),
            Err(TrexError::Invariant(InvariantViolation::InsufficientFreeBalance { .. }))
        ));
        h.burn("alice", 5).unwrap();
    }

    #[test]
    fn test_unfreeze_more_than_frozen_rejected() {
        let mut h = Harness::new();
        h.mint("alice", 10).unwrap();
        let err = h
            .with_agent(|t, agent, ev| t.unfreeze_partial_tokens(agent, addr("alice"), 1, ev))
            .unwrap_err();
        assert!(matches!(err, TrexError::Invariant(InvariantViolation::InsufficientFrozenTokens { .. })));
    }

    // ── recovery ─────────────────────────────────────────────────────

    fn investor_identities(extra_management_wallet: Option<&str>) -> BTreeMap<Address, trex_identity::Identity<()>> {
        use trex_core::KeyHash;
        use trex_identity::{Identity, KeyType};
        let mut ev = EventBuffer::new();
        let mut id: Identity<()> = Identity::new(addr("alice-id"), KeyHash::of_address(&addr("alice")), &mut ev);
        if let Some(wallet) = extra_management_wallet {
            id.add_key(
                &addr("alice"),
                KeyHash::of_address(&addr(wallet)),
                KeyPurpose::Management,
                KeyType::Ecdsa,
                &mut ev,
            )
            .unwrap();
        }
        BTreeMap::from([(addr("alice-id"), id)])
    }

    #[test]
    fn test_recovery_moves_balance_and_freeze_state() {
        let mut h = Harness::new();
        h.mint("alice", 100).unwrap();
        h.with_agent(|t, agent, ev| t.freeze_partial_tokens(agent, addr("alice"), 30, ev))
            .unwrap();
        h.with_agent(|t, agent, ev| t.set_address_frozen(agent, addr("alice"), true, ev))
            .unwrap();
        // The host registers the new wallet before moving the balance.
        h.registry.0.insert(addr("alice-new"), (addr("alice-id"), 250));
        let identities = investor_identities(Some("alice-new"));
        let agent = addr("agent");
        h.with_env(|t, env, ev| {
            t.recovery_address(&agent, env, addr("alice"), addr("alice-new"), addr("alice-id"), &identities, ev)
        })
        .unwrap();
        assert_eq!(h.token.balance_of(&addr("alice")), 0);
        assert_eq!(h.token.balance_of(&addr("alice-new")), 100);
        assert_eq!(h.token.get_frozen_tokens(&addr("alice-new")), 30);
        assert!(h.token.is_frozen(&addr("alice-new")));
        assert_eq!(h.token.total_supply(), 100);
    }

    #[test]
    fn test_recovery_requires_management_key() {
        let mut h = Harness::new();
        h.mint("alice", 100).unwrap();
        h.registry.0.insert(addr("alice-new"), (addr("alice-id"), 250));
        let identities = investor_identities(None);
        let agent = addr("agent");
        let err = h
            .with_env(|t, env, ev| {
                t.recovery_address(&agent, env, addr("alice"), addr("alice-new"), addr("alice-id"), &identities, ev)
            })
            .unwrap_err();
        assert!(matches!(err, TrexError::Authorization(AuthorizationError::MissingKeyPurpose { .. })));
        assert_eq!(h.token.balance_of(&addr("alice")), 100);
    }

    #[test]
    fn test_recovery_of_empty_wallet_rejected() {
        let h = Harness::new();
        let identities = investor_identities(Some("alice-new"));
        let err = h
            .token
            .recovery_preflight(
                &addr("agent"),
                PausePolicy::default(),
                addr("alice"),
                addr("alice-new"),
                addr("alice-id"),
                &identities,
            )
            .unwrap_err();
        assert!(matches!(err, TrexError::Invariant(InvariantViolation::NotFound { .. })));
    }

    // ── pause ────────────────────────────────────────────────────────

    #[test]
    fn test_pause_blocks_holder_operations() {
        let mut h = Harness::new();
        h.mint("alice", 10).unwrap();
        h.with_agent(|t, agent, ev| t.pause(agent, ev)).unwrap();
        assert!(matches!(h.transfer("alice", "bob", 1), Err(TrexError::State(StateError::Paused { .. }))));
        assert!(matches!(h.mint("alice", 1), Err(TrexError::State(StateError::Paused { .. }))));
        assert!(matches!(
            h.with_agent(|t, agent, ev| t.pause(agent, ev)),
            Err(TrexError::State(StateError::Paused { .. }))
        ));
        // Freezing stays available during an incident.
        h.with_agent(|t, agent, ev| t.set_address_frozen(agent, addr("alice"), true, ev))
            .unwrap();
        h.with_agent(|t, agent, ev| t.unpause(agent, ev)).unwrap();
        assert!(matches!(
            h.with_agent(|t, agent, ev| t.unpause(agent, ev)),
            Err(TrexError::State(StateError::NotPaused { .. }))
        ));
    }

    #[test]
    fn test_pause_policy_governs_forced_transfer() {
        let mut h = Harness::new();
        h.mint("alice", 10).unwrap();
        h.with_agent(|t, agent, ev| t.pause(agent, ev)).unwrap();
        let agent = addr("agent");
        h.with_env(|t, env, ev| t.forced_transfer(&agent, env, addr("alice"), addr("bob"), 5, ev))
            .unwrap();

        h.policy.forced_transfer_when_paused = false;
        let err = h
            .with_env(|t, env, ev| t.forced_transfer(&agent, env, addr("alice"), addr("bob"), 5, ev))
            .unwrap_err();
        assert!(matches!(err, TrexError::State(StateError::Paused { .. })));
    }

    // ── owner setters ────────────────────────────────────────────────

    #[test]
    fn test_set_name_emits_information() {
        let mut h = Harness::new();
        let mut ev = EventBuffer::new();
        h.token
            .set_name(&addr("owner"), "Renamed".into(), Version::new(4, 0, 1), &mut ev)
            .unwrap();
        assert_eq!(h.token.name(), "Renamed");
        assert!(ev.events().any(|e| matches!(
            e,
            Event::UpdatedTokenInformation { name, version, .. } if name == "Renamed" && *version == Version::new(4, 0, 1)
        )));
        assert!(h
            .token
            .set_symbol(&addr("agent"), "X".into(), Version::new(4, 0, 1), &mut ev)
            .is_err());
    }

    #[test]
    fn test_set_compliance_returns_previous() {
        let mut h = Harness::new();
        let previous = h.token.compliance();
        let replaced = h
            .token
            .set_compliance(&addr("owner"), addr("new-compliance"), &mut EventBuffer::new())
            .unwrap();
        assert_eq!(replaced, previous);
        assert_eq!(h.token.compliance(), addr("new-compliance"));
    }

    #[test]
    fn test_token_info_validation() {
        let info = TokenInfo {
            name: "T".into(),
            symbol: "T".into(),
            decimals: 19,
            onchain_id: Address::ZERO,
        };
        assert!(info.validate().is_err());
    }

    // ── supply invariant ─────────────────────────────────────────────

    #[derive(Debug, Clone)]
    enum Op {
        Mint(usize, u128),
        Burn(usize, u128),
        Transfer(usize, usize, u128),
        Forced(usize, usize, u128),
        Freeze(usize, u128),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, 0..1_000u128).prop_map(|(w, a)| Op::Mint(w, a)),
            (0..3usize, 0..1_000u128).prop_map(|(w, a)| Op::Burn(w, a)),
            (0..3usize, 0..3usize, 0..1_000u128).prop_map(|(f, t, a)| Op::Transfer(f, t, a)),
            (0..3usize, 0..3usize, 0..1_000u128).prop_map(|(f, t, a)| Op::Forced(f, t, a)),
            (0..3usize, 0..500u128).prop_map(|(w, a)| Op::Freeze(w, a)),
        ]
    }

    const WALLETS: [&str; 3] = ["alice", "bob", "carol"];

    proptest! {
        #[test]
        fn test_supply_equals_sum_of_balances(ops in proptest::collection::vec(op(), 1..40)) {
            let mut h = Harness::new();
            let agent = addr("agent");
            for op in ops {
                // Rejections are expected; only the invariant matters.
                let _ = match op {
                    Op::Mint(w, a) => h.mint(WALLETS[w], a),
                    Op::Burn(w, a) => h.burn(WALLETS[w], a),
                    Op::Transfer(f, t, a) => h.transfer(WALLETS[f], WALLETS[t], a),
                    Op::Forced(f, t, a) => h.with_env(|tk, env, ev| {
                        tk.forced_transfer(&agent, env, addr(WALLETS[f]), addr(WALLETS[t]), a, ev)
                    }),
                    Op::Freeze(w, a) => h.with_agent(|tk, ag, ev| tk.freeze_partial_tokens(ag, addr(WALLETS[w]), a, ev)),
                };
                let sum: u128 = h.token.holders().map(|(_, b)| *b).sum();
                prop_assert_eq!(sum, h.token.total_supply());
                for w in WALLETS {
                    prop_assert!(h.token.get_frozen_tokens(&addr(w)) <= h.token.balance_of(&addr(w)));
                }
            }
        }
    }
}
