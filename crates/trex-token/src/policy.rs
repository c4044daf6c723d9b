//! What a token implementation version permits, independent of its state.

use serde::{Deserialize, Serialize};
use trex_core::Version;

/// Which remediation paths stay open while a token is paused.
///
/// Mint, burn, transfer and `transfer_from` are always blocked while paused.
/// Freezing is always allowed, so an agent can contain a compromised wallet
/// during an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PausePolicy {
    pub forced_transfer_when_paused: bool,
    pub recovery_when_paused: bool,
}

impl Default for PausePolicy {
    fn default() -> Self {
        Self {
            forced_transfer_when_paused: true,
            recovery_when_paused: true,
        }
    }
}

/// The version and policy of the implementation a token proxy resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationInfo {
    pub version: Version,
    pub pause_policy: PausePolicy,
}
