//! # trex-cli: Suite File Tooling
//!
//! Provides the `trex` command-line interface over suite files, the YAML
//! form of a suite factory deployment request.
//!
//! ## Subcommands
//!
//! - `trex validate <suite.yaml>`: check the file against the factory limits.
//! - `trex deploy <suite.yaml>`: deploy it on an in-memory runtime and print
//!   the suite record as JSON.
//!
//! ```bash
//! trex validate fixtures/suite.yaml
//! TREX_PAUSE_ALLOWS_RECOVERY=false trex -v deploy fixtures/suite.yaml
//! ```
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; handlers here return an exit code.
//! - Protocol rules stay in the protocol crates. Handlers only load, call
//!   and print.

pub mod deploy;
pub mod suite_file;
pub mod validate;
