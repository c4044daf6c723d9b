//! # Deploy Subcommand
//!
//! Boots an in-memory runtime with the reference implementation, deploys
//! the suite through the suite factory and prints the deployment record.
//! Nothing persists; the point is to see exactly which addresses a salt
//! yields and whether the factory accepts the file.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use trex_core::{Address, SuiteRecord};
use trex_runtime::{Call, Output, Runtime, RuntimeConfig, TrexFactoryCall};

use crate::suite_file::SuiteFile;

/// Principal that owns the protocol contracts when `--admin` is not given.
pub const DEFAULT_ADMIN_LABEL: &str = "trex-admin";

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Suite file to deploy.
    pub suite: PathBuf,

    /// Address that owns the factories and sends the deployment.
    #[arg(long)]
    pub admin: Option<Address>,

    /// Print compact instead of pretty JSON.
    #[arg(long)]
    pub compact: bool,
}

/// Deploy `suite` on a fresh runtime and return its record.
pub fn deploy(suite: &SuiteFile, config: RuntimeConfig, admin: Address) -> Result<SuiteRecord> {
    let (mut runtime, deployment) = Runtime::bootstrap(config, admin).context("bootstrapping the runtime")?;
    let receipt = runtime
        .call(
            admin,
            deployment.trex_factory,
            Call::TrexFactory(TrexFactoryCall::DeployTrexSuite {
                salt: suite.salt.clone(),
                token: suite.token.clone(),
                claims: suite.claims.clone(),
            }),
        )
        .with_context(|| format!("deploying suite {:?}", suite.salt))?;
    match receipt.output {
        Output::Suite(record) => {
            tracing::info!(salt = %record.salt, token = %record.token, block = receipt.block, "suite deployed");
            Ok(record)
        }
        other => bail!("suite factory returned {other:?} instead of a suite record"),
    }
}

pub fn run_deploy(args: &DeployArgs) -> Result<u8> {
    let suite = SuiteFile::load(&args.suite)?;
    let config = RuntimeConfig::from_env().context("reading TREX_* configuration")?;
    let admin = args.admin.unwrap_or_else(|| Address::from_label(DEFAULT_ADMIN_LABEL));
    let record = deploy(&suite, config, admin)?;
    let json = if args.compact {
        serde_json::to_string(&record)?
    } else {
        serde_json::to_string_pretty(&record)?
    };
    println!("{json}");
    Ok(0)
}
