// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access/refresh token issuance and verification.
//!
//! Both kinds are HS256 JWTs signed with separate secrets and lifetimes. This
//! layer only checks signature, structure and expiry; revocation of refresh
//! tokens is the session manager's job.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::AppError;
use crate::models::UserRecord;

/// Secrets and lifetimes for both token kinds.
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: Vec<u8>,
    pub access_ttl_secs: u64,
    pub refresh_secret: Vec<u8>,
    pub refresh_ttl_secs: u64,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    /// Unique token ID
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Claims carried by a refresh token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RefreshClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Unique token ID, so consecutive rotations never repeat a token
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Token errors. Callers map every variant to an authentication failure.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Token signing failed: {0}")]
    Signing(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AppError::Internal(anyhow::anyhow!(msg)),
            TokenError::Expired | TokenError::Invalid => {
                AppError::Unauthorized("Invalid or expired token".to_string())
            }
        }
    }
}

/// Issues and verifies the two token kinds.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(&config.access_secret),
            access_decoding: DecodingKey::from_secret(&config.access_secret),
            refresh_encoding: EncodingKey::from_secret(&config.refresh_secret),
            refresh_decoding: DecodingKey::from_secret(&config.refresh_secret),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
        }
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl_secs
    }

    /// Issue a short-lived access token carrying the user's identity.
    pub fn issue_access_token(&self, user: &UserRecord) -> Result<String, TokenError> {
        let now = unix_now()?;
        let claims = AccessClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            fullname: user.fullname.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.access_ttl_secs,
        };
        sign(&claims, &self.access_encoding)
    }

    /// Issue a long-lived refresh token carrying only the subject.
    pub fn issue_refresh_token(&self, user: &UserRecord) -> Result<String, TokenError> {
        let now = unix_now()?;
        let claims = RefreshClaims {
            sub: user.id.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.refresh_ttl_secs,
        };
        sign(&claims, &self.refresh_encoding)
    }

    pub fn issue_pair(&self, user: &UserRecord) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user)?,
            refresh_token: self.issue_refresh_token(user)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token, TokenKind::Refresh)
    }

    /// Verify signature and expiry with the key for `kind`.
    pub fn verify<C: DeserializeOwned>(&self, token: &str, kind: TokenKind) -> Result<C, TokenError> {
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<C>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

fn sign<C: Serialize>(claims: &C, key: &EncodingKey) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|e| TokenError::Signing(e.to_string()))
}

fn unix_now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| TokenError::Signing(format!("System time error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn service() -> TokenService {
        TokenService::new(&Config::test_default().tokens)
    }

    fn user() -> UserRecord {
        UserRecord {
            id: "user-1".to_string(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            fullname: "Alice".to_string(),
            password: "hash".to_string(),
            avatar: "https://cdn.example.com/a.png".to_string(),
            cover_image: None,
            refresh_token: None,
            watch_history: Vec::new(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_pair_roundtrip_shares_subject() {
        let tokens = service();
        let pair = tokens.issue_pair(&user()).unwrap();

        let access = tokens.verify_access(&pair.access_token).unwrap();
        let refresh = tokens.verify_refresh(&pair.refresh_token).unwrap();

        assert_eq!(access.sub, "user-1");
        assert_eq!(refresh.sub, access.sub);
        assert_eq!(access.username, "alice");
        assert_eq!(access.email, "a@x.com");
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let tokens = service();
        let pair = tokens.issue_pair(&user()).unwrap();

        assert!(matches!(
            tokens.verify_refresh(&pair.access_token),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            tokens.verify_access(&pair.refresh_token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_consecutive_refresh_tokens_differ() {
        let tokens = service();
        let first = tokens.issue_refresh_token(&user()).unwrap();
        let second = tokens.issue_refresh_token(&user()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = Config::test_default().tokens;
        let tokens = TokenService::new(&config);
        let now = unix_now().unwrap();

        let claims = RefreshClaims {
            sub: "user-1".to_string(),
            jti: "j".to_string(),
            iat: now - 120,
            exp: now - 60,
        };
        let token = sign(&claims, &EncodingKey::from_secret(&config.refresh_secret)).unwrap();

        assert!(matches!(
            tokens.verify_refresh(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_malformed_and_tampered_tokens_rejected() {
        let tokens = service();
        assert!(matches!(
            tokens.verify_access("not-a-jwt"),
            Err(TokenError::Invalid)
        ));

        let pair = tokens.issue_pair(&user()).unwrap();
        let mut tampered = pair.access_token.clone();
        tampered.pop();
        tampered.push(if pair.access_token.ends_with('A') { 'B' } else { 'A' });
        assert!(tokens.verify_access(&tampered).is_err());
    }

    #[test]
    fn test_token_error_maps_to_unauthorized() {
        let err: AppError = TokenError::Expired.into();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
