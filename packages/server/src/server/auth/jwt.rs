use anyhow::Result;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT Claims - data stored in the session token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,                // Subject (account_id as string)
    pub account_id: Uuid,           // Login account
    pub member_id: Option<Uuid>,    // Directory member profile, if linked
    pub is_admin: bool,             // Operator flag
    pub exp: i64,                   // Expiration timestamp
    pub iat: i64,                   // Issued at timestamp
    pub iss: String,                // Issuer
    pub jti: String,                // JWT ID (unique token identifier)
}

/// JWT Service - verifies session tokens
///
/// Sessions are issued by the identity service with the shared secret.
#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtService {
    /// Create new JWT service with secret and issuer
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Verify and decode a session token
    ///
    /// Returns claims if token is valid and not expired
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}
