//! JWT token handling for caller authentication
//!
//! The token only proves who the caller is. Role and friend set are always
//! resolved from the store per request, never taken from claims.
//!
//! Tokens are signed with HS256 (HMAC-SHA256).

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::GarageError;

/// Payload stored in JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID (hex ObjectId)
    pub sub: String,
    /// Login name at time of issue
    pub login_name: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    expiry_seconds: u64,
}

impl JwtValidator {
    /// Create a new JWT validator
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, GarageError> {
        if secret.is_empty() {
            return Err(GarageError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(GarageError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Create a validator for dev mode
    pub fn new_dev() -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
            expiry_seconds: 3600,
        }
    }

    /// Issue a token for an authenticated user
    pub fn generate_token(&self, user_id: &str, login_name: &str) -> Result<String, GarageError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GarageError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: user_id.to_string(),
            login_name: login_name.to_string(),
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| GarageError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Verify a token and return its claims
    pub fn verify_token(&self, token: &str) -> Result<Claims, GarageError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let reason = match err.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidToken => "Invalid token",
                ErrorKind::InvalidSignature => "Invalid signature",
                _ => "Token validation failed",
            };
            GarageError::Unauthorized(reason.to_string())
        })
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        return (!token.is_empty()).then_some(token);
    }

    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}
