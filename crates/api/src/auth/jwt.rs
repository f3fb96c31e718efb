//! Bearer tokens presented by CD pipelines and operators.
//!
//! Tokens are HS256 JWTs minted by the identity provider that shares
//! `JWT_SECRET` with this service. The subject is the user whose exclusions a
//! state query evaluates. [`generate_access_token`] mints compatible tokens
//! for tooling and tests.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use windowgate_core::types::DbId;

/// Default lifetime of minted tokens, in minutes.
const DEFAULT_EXPIRY_MINS: i64 = 15;

/// Clock skew tolerated on `exp`, in seconds.
const DEFAULT_LEEWAY_SECS: u64 = 30;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// The requesting user's id.
    pub sub: DbId,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_mins: i64,
    /// Required `iss` claim, when set.
    pub issuer: Option<String>,
    pub leeway_secs: u64,
}

impl JwtConfig {
    /// A config with default lifetime and leeway and no issuer check.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_token_expiry_mins: DEFAULT_EXPIRY_MINS,
            issuer: None,
            leeway_secs: DEFAULT_LEEWAY_SECS,
        }
    }

    /// | Env Var                  | Required | Default |
    /// |--------------------------|----------|---------|
    /// | `JWT_SECRET`             | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS` | no       | `15`    |
    /// | `JWT_ISSUER`             | no       | unset   |
    /// | `JWT_LEEWAY_SECS`        | no       | `30`    |
    ///
    /// Panics on a missing or empty secret and on unparseable numbers.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let mut config = Self::with_secret(secret);
        if let Ok(v) = std::env::var("JWT_ACCESS_EXPIRY_MINS") {
            config.access_token_expiry_mins = v.parse().expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64");
        }
        if let Ok(v) = std::env::var("JWT_LEEWAY_SECS") {
            config.leeway_secs = v.parse().expect("JWT_LEEWAY_SECS must be a valid u64");
        }
        config.issuer = std::env::var("JWT_ISSUER").ok().filter(|s| !s.trim().is_empty());
        config
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }
}

/// Why a bearer token was refused.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token issuer not accepted")]
    WrongIssuer,
    #[error("malformed token")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidIssuer => TokenError::WrongIssuer,
            _ => TokenError::Malformed,
        }
    }
}

/// Mint a token for `user_id` with `role`, carrying the configured issuer.
pub fn generate_access_token(
    user_id: DbId,
    role: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp: now + config.access_token_expiry_mins * 60,
        iat: now,
        jti: Uuid::new_v4().to_string(),
        iss: config.issuer.clone(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Verify signature, expiry and issuer, returning the claims.
pub fn validate_token(token: &str, config: &JwtConfig) -> Result<Claims, TokenError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &config.validation(),
    )?;
    Ok(data.claims)
}
