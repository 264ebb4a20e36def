//! JWT token generation and validation
//!
//! Implements the token authority with HMAC-SHA256 signing. Session tokens
//! bind an account id to its role; reset tokens carry the same binding with a
//! different purpose and a short lifetime. A structurally valid token is only
//! accepted while its literal value is absent from the blacklist.
//!
//! Author: Shoparena developers

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shoparena_core::{ArenaError, AuthConfig, BlacklistStore, Role};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    /// Session token presented to role guards
    Access,
    /// Single-use password reset token
    Reset,
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - account id within the role's relation
    pub sub: String,
    /// JWT ID; makes every issued token value distinct
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
    /// Relation the account id refers to
    pub role: Role,
    pub purpose: TokenPurpose,
}

impl Claims {
    /// Account id carried in `sub`
    pub fn account_id(&self) -> Result<i64, JwtError> {
        self.sub.parse().map_err(|_| JwtError::InvalidToken)
    }
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token is not valid for this operation")]
    WrongPurpose,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Blacklist lookup failed: {0}")]
    Store(#[from] ArenaError),

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// Immutable signing configuration, built once at startup
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing (must be at least 256 bits)
    pub secret: String,
    /// Session token lifetime in seconds
    pub access_expiration_secs: u64,
    /// Reset token lifetime in seconds
    pub reset_expiration_secs: u64,
    /// Token issuer identifier
    pub issuer: String,
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            access_expiration_secs: config.access_expiration_secs,
            reset_expiration_secs: config.reset_expiration_secs,
            issuer: config.issuer.clone(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

/// Issues, validates and revokes tokens
#[derive(Clone)]
pub struct TokenAuthority {
    config: Arc<JwtConfig>,
    blacklist: Arc<dyn BlacklistStore>,
}

impl TokenAuthority {
    pub fn new(config: JwtConfig, blacklist: Arc<dyn BlacklistStore>) -> Self {
        Self {
            config: Arc::new(config),
            blacklist,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Issue a session token for account `account_id` in `role`
    pub fn issue(&self, account_id: i64, role: Role) -> Result<String, JwtError> {
        self.sign(account_id, role, TokenPurpose::Access, self.config.access_expiration_secs)
    }

    /// Issue a short-lived password reset token
    pub fn issue_reset(&self, account_id: i64, role: Role) -> Result<String, JwtError> {
        self.sign(account_id, role, TokenPurpose::Reset, self.config.reset_expiration_secs)
    }

    /// Validate a session token
    ///
    /// Signature, expiry and issuer are checked first; the blacklist is only
    /// consulted for tokens that are otherwise well formed.
    pub async fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate_for(token, TokenPurpose::Access).await
    }

    /// Validate a reset token issued for `role`
    pub async fn validate_reset(&self, token: &str, role: Role) -> Result<Claims, JwtError> {
        let claims = self.validate_for(token, TokenPurpose::Reset).await?;
        if claims.role != role {
            return Err(JwtError::WrongPurpose);
        }
        Ok(claims)
    }

    /// Place the literal token value on the blacklist. There is no way back.
    ///
    /// Returns `true` only for the call that added it, so a token can be
    /// spent exactly once even under concurrent requests.
    pub async fn revoke(&self, token: &str) -> Result<bool, ArenaError> {
        self.blacklist.insert(token).await
    }

    async fn validate_for(&self, token: &str, purpose: TokenPurpose) -> Result<Claims, JwtError> {
        let claims = decode_claims(&self.config, token)?;
        if claims.purpose != purpose {
            return Err(JwtError::WrongPurpose);
        }
        if self.blacklist.contains(token).await? {
            return Err(JwtError::Revoked);
        }
        Ok(claims)
    }

    fn sign(
        &self,
        account_id: i64,
        role: Role,
        purpose: TokenPurpose,
        lifetime_secs: u64,
    ) -> Result<String, JwtError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: account_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + lifetime_secs,
            role,
            purpose,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )?;

        Ok(token)
    }
}

/// Check signature, expiry and issuer without touching the blacklist
pub fn decode_claims(config: &JwtConfig, token: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        _ => JwtError::InvalidToken,
    })?;

    Ok(token_data.claims)
}
