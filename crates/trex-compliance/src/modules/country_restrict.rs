//! Blocks receivers whose recorded investor country is restricted.
//!
//! Burns (receiver is the zero address) are never blocked. A receiver with
//! no recorded country is treated as unrestricted here; eligibility already
//! rejects unlinked wallets before compliance runs.

use std::collections::BTreeSet;

use trex_core::{Address, ComplianceContext, InvariantViolation};

use crate::config::ModuleCall;
use crate::module::{wrong_module, ComplianceModule};

pub const MAX_COUNTRIES_PER_BATCH: usize = 195;

#[derive(Debug, Clone, Default)]
pub struct CountryRestrictModule {
    restricted: BTreeSet<u16>,
}

impl CountryRestrictModule {
    pub const NAME: &'static str = "CountryRestrictModule";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_countries(countries: &[u16]) -> Result<Self, InvariantViolation> {
        let mut module = Self::new();
        module.restrict_batch(countries)?;
        Ok(module)
    }

    pub fn is_country_restricted(&self, country: u16) -> bool {
        self.restricted.contains(&country)
    }

    pub fn restricted_countries(&self) -> impl Iterator<Item = u16> + '_ {
        self.restricted.iter().copied()
    }

    fn restrict(&mut self, country: u16) -> Result<(), InvariantViolation> {
        if !self.restricted.insert(country) {
            return Err(InvariantViolation::Duplicate {
                what: format!("country restriction {country}"),
            });
        }
        Ok(())
    }

    fn unrestrict(&mut self, country: u16) -> Result<(), InvariantViolation> {
        if !self.restricted.remove(&country) {
            return Err(InvariantViolation::NotFound {
                what: format!("country restriction {country}"),
            });
        }
        Ok(())
    }

    fn check_batch(countries: &[u16]) -> Result<(), InvariantViolation> {
        if countries.len() > MAX_COUNTRIES_PER_BATCH {
            return Err(InvariantViolation::LimitExceeded {
                what: "countries per batch".into(),
                max: MAX_COUNTRIES_PER_BATCH,
            });
        }
        Ok(())
    }

    // Batches are all-or-nothing: work on a copy and swap it in.
    fn restrict_batch(&mut self, countries: &[u16]) -> Result<(), InvariantViolation> {
        Self::check_batch(countries)?;
        let mut next = self.clone();
        for &country in countries {
            next.restrict(country)?;
        }
        *self = next;
        Ok(())
    }

    fn unrestrict_batch(&mut self, countries: &[u16]) -> Result<(), InvariantViolation> {
        Self::check_batch(countries)?;
        let mut next = self.clone();
        for &country in countries {
            next.unrestrict(country)?;
        }
        *self = next;
        Ok(())
    }
}

impl ComplianceModule for CountryRestrictModule {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, ctx: ComplianceContext<'_>, _from: &Address, to: &Address, _amount: u128) -> Result<(), String> {
        if to.is_zero() {
            return Ok(());
        }
        match ctx.registry.country_of(to) {
            Some(country) if self.is_country_restricted(country) => {
                Err(format!("receiver country {country} is restricted"))
            }
            _ => Ok(()),
        }
    }

    fn configure(&mut self, call: &ModuleCall) -> Result<(), InvariantViolation> {
        match call {
            ModuleCall::AddCountryRestriction { country } => self.restrict(*country),
            ModuleCall::RemoveCountryRestriction { country } => self.unrestrict(*country),
            ModuleCall::BatchRestrictCountries { countries } => self.restrict_batch(countries),
            ModuleCall::BatchUnrestrictCountries { countries } => self.unrestrict_batch(countries),
            other => Err(wrong_module(Self::NAME, other)),
        }
    }

    fn clone_box(&self) -> Box<dyn ComplianceModule> {
        Box::new(self.clone())
    }
}
