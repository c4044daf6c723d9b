//! # Suite Files
//!
//! A suite file is the YAML form of one `deployTREXSuite` request: the salt
//! plus the token and claim details the factory distributes.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use trex_factory::{ClaimDetails, TokenDetails};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteFile {
    pub salt: String,
    pub token: TokenDetails,
    #[serde(default)]
    pub claims: ClaimDetails,
}

impl SuiteFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("suite file is not valid suite YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        let suite = Self::from_yaml(&yaml).with_context(|| format!("in {}", path.display()))?;
        tracing::debug!(path = %path.display(), salt = %suite.salt, "suite file loaded");
        Ok(suite)
    }

    /// Every check the factory makes before deploying, minus the ones that
    /// depend on chain state (salt reuse, caller ownership).
    pub fn check(&self) -> Result<()> {
        if self.salt.is_empty() {
            bail!("salt must not be empty");
        }
        self.token.validate().context("token details")?;
        self.claims.validate().context("claim details")?;
        Ok(())
    }
}
