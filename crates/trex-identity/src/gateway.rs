//! Identity deployment gateway.
//!
//! Owns the identity factory and lets wallets deploy their own identity
//! without going through the factory owner. The gateway only authorizes and
//! picks the salt; the host then calls the factory with the gateway as
//! caller.

use serde::{Deserialize, Serialize};
use trex_core::{Address, AuthorizationError, InvariantViolation, Ownable, TrexError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    ownable: Ownable,
    id_factory: Address,
}

impl Gateway {
    pub fn new(address: Address, owner: Address, id_factory: Address) -> Self {
        Self {
            ownable: Ownable::new(address, owner),
            id_factory,
        }
    }

    pub fn address(&self) -> Address {
        self.ownable.contract()
    }

    pub fn id_factory(&self) -> Address {
        self.id_factory
    }

    pub fn ownable(&self) -> &Ownable {
        &self.ownable
    }

    pub fn ownable_mut(&mut self) -> &mut Ownable {
        &mut self.ownable
    }

    /// Authorize a deployment for `wallet` salted by the wallet itself.
    /// The wallet or the gateway owner may ask.
    pub fn deploy_identity_for_wallet(&self, caller: &Address, wallet: Address) -> Result<String, TrexError> {
        if wallet.is_zero() {
            return Err(InvariantViolation::ZeroAddress("wallet".into()).into());
        }
        if caller != &wallet && !self.ownable.is_owner(caller) {
            return Err(AuthorizationError::UnsignedDeployment {
                caller: *caller,
                wallet,
            }
            .into());
        }
        Ok(wallet.to_string())
    }

    /// Authorize a deployment under a caller-chosen salt. Only the wallet
    /// itself may ask.
    pub fn deploy_identity_with_salt(&self, caller: &Address, wallet: Address, salt: &str) -> Result<String, TrexError> {
        if wallet.is_zero() {
            return Err(InvariantViolation::ZeroAddress("wallet".into()).into());
        }
        if caller != &wallet {
            return Err(AuthorizationError::UnsignedDeployment {
                caller: *caller,
                wallet,
            }
            .into());
        }
        Ok(salt.to_string())
    }
}
