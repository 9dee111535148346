use std::collections::HashMap;

use council_core::{AppError, AppResult};
use jsonwebtoken::{Algorithm, DecodingKey};

/// Verification key of one issuer.
#[derive(Clone)]
pub struct IssuerKey {
    algorithm: Algorithm,
    key: DecodingKey,
}

impl IssuerKey {
    /// Creates an issuer key from an already decoded key.
    #[must_use]
    pub fn new(algorithm: Algorithm, key: DecodingKey) -> Self {
        Self { algorithm, key }
    }

    /// Parses a PEM public key, selecting RS256, ES256 or EdDSA by key type.
    pub fn from_pem(pem: &[u8]) -> AppResult<Self> {
        if let Ok(key) = DecodingKey::from_rsa_pem(pem) {
            return Ok(Self::new(Algorithm::RS256, key));
        }

        if let Ok(key) = DecodingKey::from_ec_pem(pem) {
            return Ok(Self::new(Algorithm::ES256, key));
        }

        DecodingKey::from_ed_pem(pem)
            .map(|key| Self::new(Algorithm::EdDSA, key))
            .map_err(|error| {
                AppError::Validation(format!(
                    "public key is not a supported RSA, EC or Ed25519 PEM: {error}"
                ))
            })
    }

    /// Returns the signature algorithm tokens of this issuer must use.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(super) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

/// Process-lifetime mapping from issuer name to verification key.
#[derive(Clone, Default)]
pub struct IssuerKeyRegistry {
    keys: HashMap<String, IssuerKey>,
}

impl IssuerKeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the key of an issuer, replacing any earlier one.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>, key: IssuerKey) -> Self {
        self.keys.insert(issuer.into(), key);
        self
    }

    /// Finds the key of an issuer.
    #[must_use]
    pub fn find(&self, issuer: &str) -> Option<&IssuerKey> {
        self.keys.get(issuer)
    }
}
