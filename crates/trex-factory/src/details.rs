//! Suite deployment input.
//!
//! Both structs are opaque to the caller: the factory distributes their
//! fields to the right contracts during deployment. They load from YAML:
//!
//! ```yaml
//! token:
//!   owner: "0x…"
//!   name: Bond 2030
//!   symbol: BND30
//!   decimals: 0
//!   ir_agents: ["0x…"]
//!   compliance_modules:
//!     - supply_limit: { limit: 1000000 }
//! claims:
//!   claim_topics: [1]
//!   issuers: ["0x…"]
//!   issuer_claims: [[1]]
//! ```

use serde::{Deserialize, Serialize};
use trex_compliance::{ModuleCall, ModuleConfig};
use trex_core::{Address, ClaimTopic, InvariantViolation};

pub const MAX_ISSUERS: usize = 5;
pub const MAX_CLAIM_TOPICS: usize = 5;
pub const MAX_IR_AGENTS: usize = 5;
pub const MAX_TOKEN_AGENTS: usize = 5;
pub const MAX_COMPLIANCE_MODULES: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDetails {
    pub owner: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Existing identity registry storage to reuse; zero deploys a new one.
    #[serde(default = "zero")]
    pub irs: Address,
    /// Token identity; zero asks the identity factory for one.
    #[serde(default = "zero")]
    pub onchain_id: Address,
    #[serde(default)]
    pub ir_agents: Vec<Address>,
    #[serde(default)]
    pub token_agents: Vec<Address>,
    #[serde(default)]
    pub compliance_modules: Vec<ModuleConfig>,
    #[serde(default)]
    pub compliance_settings: Vec<ModuleCall>,
}

fn zero() -> Address {
    Address::ZERO
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDetails {
    #[serde(default)]
    pub claim_topics: Vec<ClaimTopic>,
    #[serde(default)]
    pub issuers: Vec<Address>,
    /// Topics each issuer is trusted for, parallel to `issuers`.
    #[serde(default)]
    pub issuer_claims: Vec<Vec<ClaimTopic>>,
}

fn limit(what: &str, len: usize, max: usize) -> Result<(), InvariantViolation> {
    if len > max {
        Err(InvariantViolation::LimitExceeded {
            what: format!("{what} ({len})"),
            max,
        })
    } else {
        Ok(())
    }
}

impl TokenDetails {
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.owner.is_zero() {
            return Err(InvariantViolation::ZeroAddress("suite owner".into()));
        }
        limit("identity registry agents", self.ir_agents.len(), MAX_IR_AGENTS)?;
        limit("token agents", self.token_agents.len(), MAX_TOKEN_AGENTS)?;
        limit("compliance modules", self.compliance_modules.len(), MAX_COMPLIANCE_MODULES)?;
        if self.compliance_settings.len() > self.compliance_modules.len() {
            return Err(InvariantViolation::InvalidInput(format!(
                "{} compliance settings for {} modules",
                self.compliance_settings.len(),
                self.compliance_modules.len()
            )));
        }
        Ok(())
    }
}

impl ClaimDetails {
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        limit("claim topics", self.claim_topics.len(), MAX_CLAIM_TOPICS)?;
        limit("trusted issuers", self.issuers.len(), MAX_ISSUERS)?;
        if self.issuers.len() != self.issuer_claims.len() {
            return Err(InvariantViolation::InvalidInput(format!(
                "{} issuers but {} issuer claim lists",
                self.issuers.len(),
                self.issuer_claims.len()
            )));
        }
        Ok(())
    }
}
