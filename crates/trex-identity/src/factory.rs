//! # Identity Factory
//!
//! Deploys identities at salted addresses and keeps the wallet → identity
//! index that off-chain tooling resolves through the `WalletLinked` event.
//!
//! The factory decides *where* an identity lives and who its first
//! management key is; the host constructs the [`Identity`](crate::Identity)
//! from the returned [`NewIdentity`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use trex_core::{
    Address, AuthorizationError, Event, EventBuffer, InvariantViolation, KeyHash, Ownable, TrexError,
};

/// A wallet can share its identity with at most this many wallets.
pub const MAX_WALLETS_PER_IDENTITY: usize = 101;

/// Where to construct a freshly deployed identity and its first key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewIdentity {
    pub address: Address,
    pub management_key: KeyHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdFactory {
    ownable: Ownable,
    token_factories: BTreeSet<Address>,
    used_salts: BTreeSet<String>,
    user_identity: BTreeMap<Address, Address>,
    wallets: BTreeMap<Address, Vec<Address>>,
    token_identity: BTreeMap<Address, Address>,
    token_address: BTreeMap<Address, Address>,
}

impl IdFactory {
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            ownable: Ownable::new(address, owner),
            token_factories: BTreeSet::new(),
            used_salts: BTreeSet::new(),
            user_identity: BTreeMap::new(),
            wallets: BTreeMap::new(),
            token_identity: BTreeMap::new(),
            token_address: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.ownable.contract()
    }

    pub fn ownable(&self) -> &Ownable {
        &self.ownable
    }

    pub fn ownable_mut(&mut self) -> &mut Ownable {
        &mut self.ownable
    }

    fn only_owner_or_token_factory(&self, caller: &Address) -> Result<(), AuthorizationError> {
        if self.ownable.is_owner(caller) || self.token_factories.contains(caller) {
            Ok(())
        } else {
            Err(AuthorizationError::NotTokenFactory { caller: *caller })
        }
    }

    fn claim_salt(&mut self, salt: String) -> Result<(), InvariantViolation> {
        if self.used_salts.contains(&salt) {
            return Err(InvariantViolation::Duplicate {
                what: format!("salt {salt:?}"),
            });
        }
        self.used_salts.insert(salt);
        Ok(())
    }

    // ── deployment ───────────────────────────────────────────────────

    /// Deploy an identity for `wallet`, managed by that wallet.
    pub fn create_identity(
        &mut self,
        caller: &Address,
        wallet: Address,
        salt: &str,
        events: &mut EventBuffer,
    ) -> Result<NewIdentity, TrexError> {
        self.only_owner_or_token_factory(caller)?;
        if wallet.is_zero() {
            return Err(InvariantViolation::ZeroAddress("wallet".into()).into());
        }
        if salt.is_empty() {
            return Err(InvariantViolation::InvalidInput("salt cannot be empty".into()).into());
        }
        if self.user_identity.contains_key(&wallet) {
            return Err(InvariantViolation::AlreadyRegistered { wallet }.into());
        }
        let salted = format!("OID{salt}");
        self.claim_salt(salted.clone())?;

        let identity = Address::derive_salted(&self.address(), &salted, "identity")?;
        self.user_identity.insert(wallet, identity);
        self.wallets.insert(identity, vec![wallet]);

        let emitter = self.address();
        events.emit(emitter, Event::IdentityDeployed { identity });
        events.emit(emitter, Event::WalletLinked { wallet, identity });
        tracing::debug!(%wallet, %identity, "identity deployed");
        Ok(NewIdentity {
            address: identity,
            management_key: KeyHash::of_address(&wallet),
        })
    }

    /// Deploy the identity of a token, managed by `token_owner`.
    pub fn create_token_identity(
        &mut self,
        caller: &Address,
        token: Address,
        token_owner: Address,
        salt: &str,
        events: &mut EventBuffer,
    ) -> Result<NewIdentity, TrexError> {
        self.only_owner_or_token_factory(caller)?;
        if token.is_zero() {
            return Err(InvariantViolation::ZeroAddress("token".into()).into());
        }
        if token_owner.is_zero() {
            return Err(InvariantViolation::ZeroAddress("token owner".into()).into());
        }
        if salt.is_empty() {
            return Err(InvariantViolation::InvalidInput("salt cannot be empty".into()).into());
        }
        if self.token_identity.contains_key(&token) {
            return Err(InvariantViolation::Duplicate {
                what: format!("identity for token {token}"),
            }
            .into());
        }
        let salted = format!("Token{salt}");
        self.claim_salt(salted.clone())?;

        let identity = Address::derive_salted(&self.address(), &salted, "token-identity")?;
        self.token_identity.insert(token, identity);
        self.token_address.insert(identity, token);

        let emitter = self.address();
        events.emit(emitter, Event::IdentityDeployed { identity });
        events.emit(emitter, Event::TokenLinked { token, identity });
        Ok(NewIdentity {
            address: identity,
            management_key: KeyHash::of_address(&token_owner),
        })
    }

    // ── wallet links ─────────────────────────────────────────────────

    /// Link `new_wallet` to the identity of the calling wallet.
    pub fn link_wallet(&mut self, caller: &Address, new_wallet: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        if new_wallet.is_zero() {
            return Err(InvariantViolation::ZeroAddress("wallet".into()).into());
        }
        let identity = *self.user_identity.get(caller).ok_or_else(|| InvariantViolation::NotFound {
            what: format!("identity linked to {caller}"),
        })?;
        if self.user_identity.contains_key(&new_wallet) {
            return Err(InvariantViolation::AlreadyRegistered { wallet: new_wallet }.into());
        }
        if self.token_identity.contains_key(&new_wallet) {
            return Err(InvariantViolation::InvalidInput(format!("{new_wallet} is a token")).into());
        }
        let wallets = self.wallets.entry(identity).or_default();
        if wallets.len() >= MAX_WALLETS_PER_IDENTITY {
            return Err(InvariantViolation::LimitExceeded {
                what: format!("wallets linked to {identity}"),
                max: MAX_WALLETS_PER_IDENTITY,
            }
            .into());
        }
        wallets.push(new_wallet);
        self.user_identity.insert(new_wallet, identity);
        events.emit(self.address(), Event::WalletLinked { wallet: new_wallet, identity });
        Ok(())
    }

    /// Unlink `old_wallet`. The caller must be another wallet of the same
    /// identity.
    pub fn unlink_wallet(&mut self, caller: &Address, old_wallet: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        if old_wallet.is_zero() {
            return Err(InvariantViolation::ZeroAddress("wallet".into()).into());
        }
        if caller == &old_wallet {
            return Err(InvariantViolation::InvalidInput("a wallet cannot unlink itself".into()).into());
        }
        let identity = self.user_identity.get(&old_wallet).copied();
        match identity {
            Some(identity) if self.user_identity.get(caller) == Some(&identity) => {
                self.user_identity.remove(&old_wallet);
                if let Some(wallets) = self.wallets.get_mut(&identity) {
                    wallets.retain(|w| w != &old_wallet);
                }
                events.emit(self.address(), Event::WalletUnlinked { wallet: old_wallet, identity });
                Ok(())
            }
            _ => Err(AuthorizationError::NotLinkedWallet {
                caller: *caller,
                wallet: old_wallet,
            }
            .into()),
        }
    }

    // ── token factories ──────────────────────────────────────────────

    pub fn add_token_factory(&mut self, caller: &Address, factory: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        if factory.is_zero() {
            return Err(InvariantViolation::ZeroAddress("token factory".into()).into());
        }
        if !self.token_factories.insert(factory) {
            return Err(InvariantViolation::Duplicate {
                what: format!("token factory {factory}"),
            }
            .into());
        }
        events.emit(self.address(), Event::TokenFactoryAdded { factory });
        Ok(())
    }

    pub fn remove_token_factory(&mut self, caller: &Address, factory: Address, events: &mut EventBuffer) -> Result<(), TrexError> {
        self.ownable.only_owner(caller)?;
        if !self.token_factories.remove(&factory) {
            return Err(InvariantViolation::NotFound {
                what: format!("token factory {factory}"),
            }
            .into());
        }
        events.emit(self.address(), Event::TokenFactoryRemoved { factory });
        Ok(())
    }

    // ── queries ──────────────────────────────────────────────────────

    /// The identity of a wallet or of a token.
    pub fn get_identity(&self, wallet: &Address) -> Option<Address> {
        self.user_identity
            .get(wallet)
            .or_else(|| self.token_identity.get(wallet))
            .copied()
    }

    pub fn get_wallets(&self, identity: &Address) -> &[Address] {
        self.wallets.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_token(&self, identity: &Address) -> Option<Address> {
        self.token_address.get(identity).copied()
    }

    pub fn is_token_factory(&self, factory: &Address) -> bool {
        self.token_factories.contains(factory)
    }

    /// Whether `salt` was used for a wallet identity or a token identity.
    pub fn is_salt_taken(&self, salt: &str) -> bool {
        self.used_salts.contains(&format!("OID{salt}")) || self.used_salts.contains(&format!("Token{salt}"))
    }
}
