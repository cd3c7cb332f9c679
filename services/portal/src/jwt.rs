//! Access token verification
//!
//! The hosted provider signs access tokens with the project's JWT secret
//! (HS256). When the secret is configured, persisted sessions are verified
//! before use; without it the portal trusts the stored expiry.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// Claims the portal reads from a provider access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID
    pub sub: Uuid,
    /// Expiration time
    pub exp: u64,
    #[serde(default)]
    pub email: Option<String>,
}

/// Verifies provider access tokens
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: Option<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(jwt_secret: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            decoding_key: jwt_secret.map(|secret| DecodingKey::from_secret(secret.as_bytes())),
            validation,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.decoding_key.is_some()
    }

    /// Validate a token and return its claims; `None` when verification is disabled
    pub fn verify(&self, token: &str) -> Result<Option<AccessClaims>, AuthError> {
        let Some(key) = &self.decoding_key else {
            return Ok(None);
        };

        let token_data = decode::<AccessClaims>(token, key, &self.validation)
            .map_err(|e| AuthError::Other(format!("Invalid access token: {}", e)))?;
        Ok(Some(token_data.claims))
    }
}
