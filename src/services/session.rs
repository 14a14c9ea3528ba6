// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle: register, login, refresh, logout and password change.
//!
//! A user has at most one live refresh token. Its value is stored on the user
//! record as a fingerprint; login and refresh overwrite it, logout clears it,
//! and a refresh token that does not match the fingerprint is rejected.
//!
//! Registration checks uniqueness with a lookup and then creates the user,
//! and refresh reads the fingerprint and then overwrites it. Neither pair runs
//! in a transaction; the store's unique indexes reject a losing duplicate
//! registration, and two concurrent refreshes with the same token can both win.

use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::db::CredentialStore;
use crate::error::{AppError, Result};
use crate::models::{User, UserFilter, UserPatch, UserRecord};
use crate::services::media::{self, LocalUpload, MediaStore};
use crate::services::password::PasswordHasher;
use crate::services::token::{TokenPair, TokenService};
use crate::time_utils::now_rfc3339;

/// Every refresh failure carries this message so callers cannot tell which
/// check rejected the token.
const INVALID_REFRESH: &str = "Invalid refresh token";

/// Registration input. Text fields are taken as submitted.
#[derive(Debug, Default)]
pub struct NewAccount {
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<LocalUpload>,
    /// Only the first file is used; any others are discarded
    pub cover_images: Vec<LocalUpload>,
}

impl NewAccount {
    fn staged_files(&self) -> impl Iterator<Item = &LocalUpload> {
        self.avatar.iter().chain(self.cover_images.iter())
    }
}

/// Successful login: the sanitized user plus a fresh token pair.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

/// Orchestrates credential checks, token issuance and fingerprint storage.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    media: Arc<dyn MediaStore>,
    hasher: PasswordHasher,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        media: Arc<dyn MediaStore>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            store,
            tokens,
            media,
            hasher,
        }
    }

    /// Create an account and return the sanitized user.
    pub async fn register(&self, account: NewAccount) -> Result<User> {
        if let Err(e) = self.check_new_account(&account).await {
            for file in account.staged_files() {
                media::discard(file).await;
            }
            return Err(e);
        }

        let NewAccount {
            fullname,
            username,
            email,
            password,
            avatar,
            cover_images,
        } = account;

        let Some(avatar_file) = avatar else {
            for file in &cover_images {
                media::discard(file).await;
            }
            return Err(AppError::MediaMissing("Avatar file is required".to_string()));
        };

        let avatar = media::upload_and_discard(self.media.as_ref(), &avatar_file).await;

        let mut covers = cover_images.into_iter();
        let cover = match covers.next() {
            Some(file) => media::upload_and_discard(self.media.as_ref(), &file).await,
            None => None,
        };
        for extra in covers {
            media::discard(&extra).await;
        }

        let avatar = avatar
            .ok_or_else(|| AppError::MediaUpload("Failed to upload avatar".to_string()))?;

        let now = now_rfc3339();
        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.trim().to_lowercase(),
            email: email.trim().to_string(),
            fullname: fullname.trim().to_string(),
            password: self.hash_password(password).await?,
            avatar: avatar.url,
            cover_image: cover.map(|c| c.url),
            refresh_token: None,
            watch_history: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        self.store.create_user(&record).await?;

        let created = self
            .store
            .find_user_by_id(&record.id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("User vanished after registration"))
            })?;

        tracing::info!(user_id = %created.id, username = %created.username, "User registered");
        Ok(created.into())
    }

    /// Required fields and the (non-atomic) uniqueness check.
    async fn check_new_account(&self, account: &NewAccount) -> Result<()> {
        let required = [
            &account.fullname,
            &account.username,
            &account.email,
            &account.password,
        ];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(AppError::Validation("All fields are required".to_string()));
        }

        let existing = self
            .store
            .find_user(&UserFilter::Any(vec![
                UserFilter::Username(account.username.trim().to_lowercase()),
                UserFilter::Email(account.email.trim().to_string()),
            ]))
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }
        Ok(())
    }

    /// Verify credentials and start a new session, replacing any previous one.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let username = username.trim().to_lowercase();
        if username.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let user = self
            .store
            .find_user(&UserFilter::Username(username))
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        if !self.verify_password(password, &user.password).await? {
            tracing::info!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AppError::Unauthorized("Invalid user credentials".to_string()));
        }

        let (user, tokens) = self.start_session(&user).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome {
            user: user.into(),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair, rotating the stored fingerprint.
    pub async fn refresh(&self, incoming: Option<&str>) -> Result<TokenPair> {
        let incoming = incoming
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Unauthorized request".to_string()))?;

        let claims = self
            .tokens
            .verify_refresh(incoming)
            .map_err(|_| AppError::Unauthorized(INVALID_REFRESH.to_string()))?;

        let user = self
            .store
            .find_user_by_id(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_REFRESH.to_string()))?;

        if !fingerprint_matches(user.refresh_token.as_deref(), incoming) {
            tracing::warn!(user_id = %user.id, "Refresh token reuse or revoked token presented");
            return Err(AppError::Unauthorized(INVALID_REFRESH.to_string()));
        }

        let (user, tokens) = self.start_session(&user).await?;
        tracing::debug!(user_id = %user.id, "Refresh token rotated");
        Ok(tokens)
    }

    /// End the user's session. Any refresh token issued before stops working.
    pub async fn logout(&self, user_id: &str) -> Result<()> {
        self.store
            .update_user(user_id, UserPatch::refresh_token(None))
            .await?;
        tracing::info!(user_id, "User logged out");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        if new_password.trim().is_empty() {
            return Err(AppError::Validation("New password is required".to_string()));
        }

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        if !self.verify_password(current_password, &user.password).await? {
            return Err(AppError::Unauthorized("Invalid old password".to_string()));
        }

        let hash = self.hash_password(new_password.to_string()).await?;
        self.store
            .update_user(
                user_id,
                UserPatch {
                    password: Some(hash),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Issue a pair and store the refresh token as the sole valid fingerprint.
    async fn start_session(&self, user: &UserRecord) -> Result<(UserRecord, TokenPair)> {
        let tokens = self.tokens.issue_pair(user)?;
        let updated = self
            .store
            .update_user(
                &user.id,
                UserPatch::refresh_token(Some(tokens.refresh_token.clone())),
            )
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_REFRESH.to_string()))?;
        Ok((updated, tokens))
    }

    // Argon2 runs on the blocking pool.
    async fn hash_password(&self, plain: String) -> Result<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| AppError::Internal(e.into()))?
    }

    async fn verify_password(&self, plain: &str, stored: &str) -> Result<bool> {
        let hasher = self.hasher.clone();
        let plain = plain.to_string();
        let stored = stored.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &stored))
            .await
            .map_err(|e| AppError::Internal(e.into()))
    }
}

/// Constant-time comparison against the stored fingerprint. No stored
/// fingerprint never matches.
fn fingerprint_matches(stored: Option<&str>, presented: &str) -> bool {
    match stored {
        Some(stored) => stored.as_bytes().ct_eq(presented.as_bytes()).into(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_matches() {
        assert!(fingerprint_matches(Some("abc.def"), "abc.def"));
        assert!(!fingerprint_matches(Some("abc.def"), "abc.deg"));
        assert!(!fingerprint_matches(Some("abc"), "abc.def"));
        assert!(!fingerprint_matches(None, "abc.def"));
    }

    #[test]
    fn test_staged_files_lists_avatar_then_covers() {
        let file = |name: &str| LocalUpload {
            path: std::path::PathBuf::from(name),
            file_name: name.to_string(),
        };
        let account = NewAccount {
            avatar: Some(file("a")),
            cover_images: vec![file("c1"), file("c2")],
            ..Default::default()
        };
        let names: Vec<_> = account
            .staged_files()
            .map(|f| f.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "c1", "c2"]);
    }
}
