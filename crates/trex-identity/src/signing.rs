//! # Claim Signing
//!
//! A claim issuer signs `jcs({identity, topic, data})` with an Ed25519 key
//! whose key hash holds the CLAIM purpose on the issuer's identity. The
//! stored signature is the 32-byte public key followed by the 64-byte
//! signature, so a verifier can recover the signing key and then check its
//! purpose on the issuer identity without any out-of-band key registry.
//!
//! Private keys are never serialized; [`ClaimSigner`] does not implement
//! `Serialize`.

use ed25519_dalek::{Signer, Verifier};
use serde::Serialize;
use thiserror::Error;
use trex_core::{sha256_digest, Address, CanonicalBytes, CanonicalizationError, ClaimTopic, ContentDigest, KeyHash};

/// Length of a stored claim signature: public key then signature.
pub const CLAIM_SIGNATURE_LEN: usize = 32 + 64;

/// Signature scheme tag recorded on Ed25519-signed claims.
pub const SCHEME_ED25519: u64 = 3;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("claim signature must be {CLAIM_SIGNATURE_LEN} bytes, got {0}")]
    MalformedSignature(usize),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}

#[derive(Serialize)]
struct ClaimPayload<'a> {
    identity: &'a Address,
    topic: ClaimTopic,
    data: String,
}

/// The canonical bytes a claim issuer signs.
pub fn claim_payload(
    identity: &Address,
    topic: ClaimTopic,
    data: &[u8],
) -> Result<CanonicalBytes, CanonicalizationError> {
    CanonicalBytes::new(&ClaimPayload {
        identity,
        topic,
        data: trex_core::digest::to_hex(data),
    })
}

/// An Ed25519 claim-signing key.
pub struct ClaimSigner {
    signing_key: ed25519_dalek::SigningKey,
}

impl ClaimSigner {
    /// A fresh random key from the OS RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The hash under which this key is added to the issuer identity.
    pub fn key_hash(&self) -> KeyHash {
        KeyHash::of_public_key(&self.public_key())
    }

    /// Sign a claim about `identity`. Returns the stored signature form.
    pub fn sign_claim(
        &self,
        identity: &Address,
        topic: ClaimTopic,
        data: &[u8],
    ) -> Result<Vec<u8>, CanonicalizationError> {
        let payload = claim_payload(identity, topic, data)?;
        let sig = self.signing_key.sign(payload.as_bytes());
        let mut out = Vec::with_capacity(CLAIM_SIGNATURE_LEN);
        out.extend_from_slice(&self.public_key());
        out.extend_from_slice(&sig.to_bytes());
        Ok(out)
    }
}

impl std::fmt::Debug for ClaimSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClaimSigner(<private>)")
    }
}

/// Verify a stored claim signature and return the signing key's hash.
pub fn recover_signer(
    signature: &[u8],
    identity: &Address,
    topic: ClaimTopic,
    data: &[u8],
) -> Result<KeyHash, SignatureError> {
    if signature.len() != CLAIM_SIGNATURE_LEN {
        return Err(SignatureError::MalformedSignature(signature.len()));
    }
    let mut pk = [0u8; 32];
    pk.copy_from_slice(&signature[..32]);
    let mut sig = [0u8; 64];
    sig.copy_from_slice(&signature[32..]);

    let vk = ed25519_dalek::VerifyingKey::from_bytes(&pk)
        .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))?;
    let payload = claim_payload(identity, topic, data)?;
    vk.verify(payload.as_bytes(), &ed25519_dalek::Signature::from_bytes(&sig))
        .map_err(|e| SignatureError::VerificationFailed(e.to_string()))?;
    Ok(KeyHash::of_public_key(&pk))
}

/// The digest under which a revoked signature is remembered.
pub fn signature_digest(signature: &[u8]) -> ContentDigest {
    let hex = trex_core::digest::to_hex(signature);
    match CanonicalBytes::new(&hex) {
        Ok(cb) => sha256_digest(&cb),
        Err(_) => ContentDigest([0u8; 32]),
    }
}
