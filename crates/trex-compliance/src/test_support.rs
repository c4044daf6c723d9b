//! In-memory ledger and registry doubles for module tests.

use std::collections::BTreeMap;

use trex_core::{Address, ComplianceContext, EligibilityError, EligibilityOracle, LedgerView};

pub fn addr(label: &str) -> Address {
    Address::from_label(label)
}

#[derive(Debug, Default)]
pub struct FakeLedger(pub BTreeMap<Address, u128>);

impl LedgerView for FakeLedger {
    fn balance_of(&self, wallet: &Address) -> u128 {
        self.0.get(wallet).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> u128 {
        self.0.values().sum()
    }
}

#[derive(Debug, Default)]
pub struct FakeRegistry(pub BTreeMap<Address, (Address, u16)>);

impl EligibilityOracle for FakeRegistry {
    fn verify(&self, wallet: &Address) -> Result<(), EligibilityError> {
        self.0
            .get(wallet)
            .map(|_| ())
            .ok_or(EligibilityError::NotLinked { wallet: *wallet })
    }

    fn identity_of(&self, wallet: &Address) -> Option<Address> {
        self.0.get(wallet).map(|(id, _)| *id)
    }

    fn country_of(&self, wallet: &Address) -> Option<u16> {
        self.0.get(wallet).map(|(_, c)| *c)
    }
}

#[derive(Debug)]
pub struct Fixture {
    pub token: Address,
    pub ledger: FakeLedger,
    pub registry: FakeRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            token: addr("token"),
            ledger: FakeLedger::default(),
            registry: FakeRegistry::default(),
        }
    }

    pub fn link(&mut self, wallet: &str, identity: &str, country: u16) {
        self.registry.0.insert(addr(wallet), (addr(identity), country));
    }

    pub fn set_balance(&mut self, wallet: &str, balance: u128) {
        self.ledger.0.insert(addr(wallet), balance);
    }

    pub fn ctx(&self) -> ComplianceContext<'_> {
        ComplianceContext {
            token: self.token,
            ledger: &self.ledger,
            registry: &self.registry,
        }
    }
}
