//! Claims held by an identity (ERC-735).

use serde::{Deserialize, Serialize};
use trex_core::{Address, ClaimId, ClaimTopic};

/// A claim as stored. Validity is never stored; verifiers re-derive it from
/// the issuer identity and the trusted issuers registry on every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub topic: ClaimTopic,
    pub scheme: u64,
    pub issuer: Address,
    pub signature: Vec<u8>,
    pub data: Vec<u8>,
    pub uri: String,
}

impl Claim {
    pub fn id(&self) -> ClaimId {
        ClaimId::derive(&self.issuer, self.topic)
    }
}
