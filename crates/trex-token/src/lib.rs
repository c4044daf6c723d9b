//! # trex-token: The Permissioned Token
//!
//! [`Token`] holds balances, allowances, freeze state and the pause flag.
//! It never owns its identity registry or compliance: the host resolves
//! both for each call and hands them over in a [`TokenEnv`], together with
//! the [`ImplementationInfo`] of the version the token's proxy resolves to.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code; no `.unwrap()` outside tests.
//! - Every check runs before the first write.
//! - Amounts are `u128` with checked arithmetic throughout.

pub mod policy;
pub mod token;

#[cfg(test)]
mod test_support;

pub use policy::{ImplementationInfo, PausePolicy};
pub use token::{Token, TokenEnv, TokenInfo, MAX_DECIMALS};
