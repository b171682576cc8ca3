use std::fmt;
use std::marker::PhantomData;

use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH};
use sha2::digest::consts::U64;
use sha2::{Digest, Sha512};
use thiserror::Error;
use tracing::{debug, warn};

// Ed25519(timestamp || body) → X-Signature-Ed25519 (hex), key published by the platform

pub const SIGNATURE_HEADER: &str = "X-Signature-Ed25519";
pub const TIMESTAMP_HEADER: &str = "X-Signature-Timestamp";

/// Why a request failed verification. Only ever logged, never returned to callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureRejection {
    #[error("missing {0}")]
    MissingHeader(&'static str),
    #[error("signature is not valid hex")]
    MalformedSignature,
    #[error("signature has wrong length")]
    SignatureLength,
    #[error("configured public key is unusable")]
    InvalidPublicKey,
    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies inbound interaction requests against the application's public key.
///
/// The hash used inside the Ed25519 check is a type parameter, so callers pick
/// it at construction instead of patching library state. Production uses SHA-512.
pub struct SignatureVerifier<D = Sha512> {
    public_key: Option<VerifyingKey>,
    _digest: PhantomData<fn() -> D>,
}

impl SignatureVerifier<Sha512> {
    pub fn new(public_key_hex: &str) -> Self {
        Self::with_digest(public_key_hex)
    }
}

impl<D> SignatureVerifier<D>
where
    D: Digest<OutputSize = U64>,
{
    /// Decode the hex public key once. A bad key is logged and every later
    /// verification fails closed.
    pub fn with_digest(public_key_hex: &str) -> Self {
        let public_key = decode_public_key(public_key_hex);
        if public_key.is_none() {
            warn!("interaction public key is not a valid Ed25519 key; all requests will be rejected");
        }
        Self {
            public_key,
            _digest: PhantomData,
        }
    }

    /// Boolean gate used by the HTTP layer. Never panics, never errors.
    pub fn verify(&self, body: &[u8], timestamp: Option<&str>, signature: Option<&str>) -> bool {
        match self.check(body, timestamp, signature) {
            Ok(()) => true,
            Err(reason) => {
                debug!(reason = %reason, body_len = body.len(), "signature rejected");
                false
            }
        }
    }

    pub fn check(
        &self,
        body: &[u8],
        timestamp: Option<&str>,
        signature: Option<&str>,
    ) -> Result<(), SignatureRejection> {
        let timestamp = timestamp.ok_or(SignatureRejection::MissingHeader(TIMESTAMP_HEADER))?;
        let signature = signature.ok_or(SignatureRejection::MissingHeader(SIGNATURE_HEADER))?;
        let public_key = self
            .public_key
            .as_ref()
            .ok_or(SignatureRejection::InvalidPublicKey)?;

        let raw = hex::decode(signature.trim()).map_err(|_| SignatureRejection::MalformedSignature)?;
        let signature =
            Signature::from_slice(&raw).map_err(|_| SignatureRejection::SignatureLength)?;

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        ed25519_dalek::hazmat::raw_verify::<D>(public_key, &message, &signature)
            .map_err(|_| SignatureRejection::Mismatch)
    }
}

impl<D> fmt::Debug for SignatureVerifier<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("public_key", &self.public_key.map(|k| hex::encode(k.as_bytes())))
            .finish()
    }
}

fn decode_public_key(public_key_hex: &str) -> Option<VerifyingKey> {
    let bytes = hex::decode(public_key_hex.trim()).ok()?;
    let bytes = <[u8; PUBLIC_KEY_LENGTH]>::try_from(bytes.as_slice()).ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

/// One-shot form: verify with an explicit hex public key.
pub fn verify(body: &[u8], timestamp: Option<&str>, signature: Option<&str>, public_key_hex: &str) -> bool {
    SignatureVerifier::new(public_key_hex).verify(body, timestamp, signature)
}
