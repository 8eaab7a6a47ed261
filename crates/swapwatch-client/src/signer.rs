//! Request signing for upstream authentication.
//!
//! Every request carries `X-API-SIGN`: the lowercase hex HMAC-SHA256 of the
//! exact JSON body bytes, keyed with the shared API secret.

use std::fmt;
use std::path::PathBuf;

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{SignerError, SignerResult};

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// SecretSource
// =============================================================================

/// Source of the signing secret.
#[derive(Debug, Clone)]
pub enum SecretSource {
    /// Load from environment variable.
    EnvVar { var_name: String },
    /// Load from file (recommend 0600 permissions).
    File { path: PathBuf },
}

impl SecretSource {
    /// Read the secret. Surrounding whitespace is trimmed.
    ///
    /// Never log the returned value.
    pub fn load(&self) -> SignerResult<Zeroizing<String>> {
        let raw = match self {
            Self::EnvVar { var_name } => std::env::var(var_name)
                .map_err(|_| SignerError::SecretUnavailable(format!("env var {var_name} not set")))?,
            Self::File { path } => std::fs::read_to_string(path).map_err(|e| {
                SignerError::SecretUnavailable(format!("{}: {e}", path.display()))
            })?,
        };
        let raw = Zeroizing::new(raw);
        Ok(Zeroizing::new(raw.trim().to_string()))
    }
}

// =============================================================================
// Signer
// =============================================================================

/// JSON body together with the signature over its exact bytes.
#[derive(Clone)]
pub struct SignedBody {
    pub body: String,
    pub signature: String,
}

impl fmt::Debug for SignedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Body carries the order token.
        f.debug_struct("SignedBody")
            .field("body_len", &self.body.len())
            .field("signature", &self.signature)
            .finish()
    }
}

/// HMAC-SHA256 request signer.
pub struct Signer {
    secret: Zeroizing<Vec<u8>>,
}

impl Signer {
    /// Create a signer from the shared secret.
    ///
    /// # Errors
    /// Returns `SignerError::EmptySecret` for an empty secret. This is a
    /// fatal misconfiguration and must not be retried.
    pub fn new(secret: impl AsRef<str>) -> SignerResult<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(SignerError::EmptySecret);
        }
        Ok(Self {
            secret: Zeroizing::new(secret.as_bytes().to_vec()),
        })
    }

    /// Create a signer from a secret source.
    pub fn from_source(source: &SecretSource) -> SignerResult<Self> {
        let secret = source.load()?;
        Self::new(secret.as_str())
    }

    /// Sign raw payload bytes, returning lowercase hex.
    pub fn sign(&self, payload: &[u8]) -> SignerResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Serialize `body` once and sign exactly those bytes.
    ///
    /// Field order follows the struct (serde_json `preserve_order` for maps),
    /// so identical bodies always produce identical signatures.
    pub fn sign_json<T: Serialize>(&self, body: &T) -> SignerResult<SignedBody> {
        let body = serde_json::to_string(body)
            .map_err(|e| SignerError::SerializationFailed(e.to_string()))?;
        let signature = self.sign(body.as_bytes())?;
        Ok(SignedBody { body, signature })
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("secret_len", &self.secret.len())
            .finish()
    }
}
