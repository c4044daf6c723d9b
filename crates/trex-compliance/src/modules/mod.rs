//! The rule modules shipped with the compliance engine.

mod country_restrict;
mod holder_limit;
mod max_balance;
mod supply_limit;

pub use country_restrict::{CountryRestrictModule, MAX_COUNTRIES_PER_BATCH};
pub use holder_limit::HolderLimitModule;
pub use max_balance::MaxBalanceModule;
pub use supply_limit::SupplyLimitModule;
