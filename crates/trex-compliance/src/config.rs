//! Declarative module construction and configuration calls.
//!
//! Both enums are externally tagged so they read naturally from a suite
//! file:
//!
//! ```yaml
//! modules:
//!   - supply_limit: { limit: 1000000 }
//!   - country_restrict: { countries: [408] }
//! settings:
//!   - add_country_restriction: { country: 760 }
//! ```

use serde::{Deserialize, Serialize};
use trex_core::InvariantViolation;

use crate::module::ComplianceModule;
use crate::modules::{CountryRestrictModule, HolderLimitModule, MaxBalanceModule, SupplyLimitModule};

/// A module to instantiate and bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleConfig {
    CountryRestrict {
        #[serde(default)]
        countries: Vec<u16>,
    },
    MaxBalance {
        max_balance: u128,
    },
    SupplyLimit {
        limit: u128,
    },
    HolderLimit {
        max_holders: usize,
    },
}

impl ModuleConfig {
    /// Name of the module this config builds.
    pub fn module_name(&self) -> &'static str {
        match self {
            Self::CountryRestrict { .. } => CountryRestrictModule::NAME,
            Self::MaxBalance { .. } => MaxBalanceModule::NAME,
            Self::SupplyLimit { .. } => SupplyLimitModule::NAME,
            Self::HolderLimit { .. } => HolderLimitModule::NAME,
        }
    }

    pub fn instantiate(&self) -> Result<Box<dyn ComplianceModule>, InvariantViolation> {
        Ok(match self {
            Self::CountryRestrict { countries } => Box::new(CountryRestrictModule::with_countries(countries)?),
            Self::MaxBalance { max_balance } => Box::new(MaxBalanceModule::new(*max_balance)),
            Self::SupplyLimit { limit } => Box::new(SupplyLimitModule::new(*limit)),
            Self::HolderLimit { max_holders } => Box::new(HolderLimitModule::new(*max_holders)),
        })
    }
}

/// An owner call routed to one bound module through the compliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleCall {
    AddCountryRestriction { country: u16 },
    RemoveCountryRestriction { country: u16 },
    BatchRestrictCountries { countries: Vec<u16> },
    BatchUnrestrictCountries { countries: Vec<u16> },
    SetMaxBalance { max_balance: u128 },
    /// Seed the tracked balance of an identity, for binding to a token
    /// that already has holders.
    PresetIdentityBalance { identity: trex_core::Address, balance: u128 },
    SetSupplyLimit { limit: u128 },
    SetHolderLimit { max_holders: usize },
}

impl ModuleCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::AddCountryRestriction { .. } => "add_country_restriction",
            Self::RemoveCountryRestriction { .. } => "remove_country_restriction",
            Self::BatchRestrictCountries { .. } => "batch_restrict_countries",
            Self::BatchUnrestrictCountries { .. } => "batch_unrestrict_countries",
            Self::SetMaxBalance { .. } => "set_max_balance",
            Self::PresetIdentityBalance { .. } => "preset_identity_balance",
            Self::SetSupplyLimit { .. } => "set_supply_limit",
            Self::SetHolderLimit { .. } => "set_holder_limit",
        }
    }

    /// The module this call is addressed to.
    pub fn module_name(&self) -> &'static str {
        match self {
            Self::AddCountryRestriction { .. }
            | Self::RemoveCountryRestriction { .. }
            | Self::BatchRestrictCountries { .. }
            | Self::BatchUnrestrictCountries { .. } => CountryRestrictModule::NAME,
            Self::SetMaxBalance { .. } | Self::PresetIdentityBalance { .. } => MaxBalanceModule::NAME,
            Self::SetSupplyLimit { .. } => SupplyLimitModule::NAME,
            Self::SetHolderLimit { .. } => HolderLimitModule::NAME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_config_from_yaml() {
        let yaml = "- supply_limit: { limit: 1000 }\n- country_restrict: { countries: [408, 760] }\n- holder_limit:\n    max_holders: 3\n";
        let configs: Vec<ModuleConfig> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            configs,
            vec![
                ModuleConfig::SupplyLimit { limit: 1000 },
                ModuleConfig::CountryRestrict {
                    countries: vec![408, 760]
                },
                ModuleConfig::HolderLimit { max_holders: 3 },
            ]
        );
    }

    #[test]
    fn test_module_call_from_json() {
        let call: ModuleCall = serde_json::from_str(r#"{"add_country_restriction":{"country":408}}"#).unwrap();
        assert_eq!(call, ModuleCall::AddCountryRestriction { country: 408 });
        assert_eq!(call.function_name(), "add_country_restriction");
        assert_eq!(call.module_name(), "CountryRestrictModule");
    }

    #[test]
    fn test_instantiate_names_match() {
        for config in [
            ModuleConfig::CountryRestrict { countries: vec![] },
            ModuleConfig::MaxBalance { max_balance: 1 },
            ModuleConfig::SupplyLimit { limit: 1 },
            ModuleConfig::HolderLimit { max_holders: 1 },
        ] {
            assert_eq!(config.instantiate().unwrap().name(), config.module_name());
        }
    }
}
