use crate::domain::user::Role;
use crate::error::{AppError, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub const ISSUER: &str = "synkronus";

/// Distinguishes access tokens from refresh tokens so one can never be
/// presented where the other is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub token_type: TokenKind,
}

fn unix_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(std::time::Duration::ZERO).as_secs() as i64
}

impl Claims {
    #[must_use]
    pub fn new(sub: Uuid, username: String, role: Role, kind: TokenKind, ttl_secs: u64) -> Self {
        let iat = unix_now();
        Self { sub, username, role, iss: ISSUER.to_string(), iat, exp: iat + ttl_secs as i64, token_type: kind }
    }

    /// Signs the claims with HS256.
    pub fn encode(&self, secret: &str) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), self, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|_| AppError::Internal)
    }

    /// Verifies signature, algorithm, issuer, and expiry. A token advertising
    /// any algorithm other than HS256 is rejected outright.
    pub fn decode(token: &str, secret: &str) -> Result<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);

        let token_data = decode::<Self>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .map_err(|_| AppError::AuthError)?;

        Ok(token_data.claims)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret";

    fn claims(kind: TokenKind) -> Claims {
        Claims::new(Uuid::new_v4(), "alice".to_string(), Role::ReadWrite, kind, 3600)
    }

    #[test]
    fn roundtrip() {
        let claims = claims(TokenKind::Access);
        let token = claims.encode(SECRET).unwrap();
        let decoded = Claims::decode(&token, SECRET).unwrap();
        assert_eq!(claims, decoded);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = claims(TokenKind::Access).encode(SECRET).unwrap();
        assert!(matches!(Claims::decode(&token, "other_secret"), Err(AppError::AuthError)));
    }

    #[test]
    fn expired_rejected() {
        let mut expired = claims(TokenKind::Access);
        expired.exp = expired.iat - 600;
        let token = expired.encode(SECRET).unwrap();
        assert!(matches!(Claims::decode(&token, SECRET), Err(AppError::AuthError)));
    }

    #[test]
    fn foreign_algorithm_rejected() {
        // HS512-signed token against an HS256-only validation.
        let claims = claims(TokenKind::Access);
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(Claims::decode(&token, SECRET), Err(AppError::AuthError)));
    }

    #[test]
    fn wrong_issuer_rejected() {
        let mut foreign = claims(TokenKind::Access);
        foreign.iss = "someone-else".to_string();
        let token = foreign.encode(SECRET).unwrap();
        assert!(matches!(Claims::decode(&token, SECRET), Err(AppError::AuthError)));
    }

    #[test]
    fn token_kind_survives_roundtrip() {
        let token = claims(TokenKind::Refresh).encode(SECRET).unwrap();
        let decoded = Claims::decode(&token, SECRET).unwrap();
        assert_eq!(decoded.token_type, TokenKind::Refresh);
    }
}
