//! # trex-compliance: Modular Compliance
//!
//! The rule engine every balance-changing token operation passes through.
//!
//! - [`ComplianceModule`]: one stateful rule with a veto check and
//!   post-commit notifications.
//! - [`modules`]: the shipped rules.
//! - [`ModuleConfig`] / [`ModuleCall`]: declarative construction and owner
//!   configuration, deserializable from suite files.
//! - [`ModularCompliance`]: binds to one token, holds the ordered module
//!   list and implements `trex_core::ComplianceGate`.
//!
//! ## Crate Policy
//!
//! - Depends on `trex-core` only.
//! - No `unsafe` code; no `.unwrap()` outside tests.
//! - A notification never fails the token operation that triggered it.

pub mod config;
pub mod modular;
pub mod module;
pub mod modules;

#[cfg(test)]
mod test_support;

pub use config::{ModuleCall, ModuleConfig};
pub use modular::{ModularCompliance, MAX_MODULES};
pub use module::ComplianceModule;
pub use modules::{CountryRestrictModule, HolderLimitModule, MaxBalanceModule, SupplyLimitModule};
