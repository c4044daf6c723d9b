//! # Validate Subcommand
//!
//! Checks a suite file against the limits the suite factory enforces
//! (agents, modules, issuers, topics) without deploying anything.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::suite_file::SuiteFile;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Suite file to check.
    pub suite: PathBuf,
}

/// Returns the process exit code: 0 when the file is deployable, 1 when it
/// breaks a factory limit. Unreadable files are errors.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let suite = SuiteFile::load(&args.suite)?;
    match suite.check() {
        Ok(()) => {
            println!(
                "OK: suite {:?} ({} modules, {} claim topics, {} issuers)",
                suite.salt,
                suite.token.compliance_modules.len(),
                suite.claims.claim_topics.len(),
                suite.claims.issuers.len()
            );
            Ok(0)
        }
        Err(e) => {
            eprintln!("FAIL: {}: {e:#}", args.suite.display());
            Ok(1)
        }
    }
}
