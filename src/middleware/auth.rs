// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access-token authentication middleware.

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::User;
use crate::services::TokenService;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie carrying the access token.
pub const ACCESS_COOKIE: &str = "accessToken";
/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Authenticated user attached to the request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

/// Pull the access token from the cookie, falling back to a bearer header.
pub fn extract_access_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Verify an access token and load the sanitized user it names.
pub async fn authenticate(
    tokens: &TokenService,
    store: &dyn CredentialStore,
    token: Option<&str>,
) -> Result<User, AppError> {
    let token = token.ok_or_else(|| AppError::Unauthorized("Unauthorized request".to_string()))?;

    let claims = tokens.verify_access(token)?;

    let user = store
        .find_user_by_id(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid access token".to_string()))?;

    Ok(user.into())
}

/// Middleware that requires a valid access token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_access_token(&jar, request.headers());
    let user = authenticate(&state.tokens, state.db.as_ref(), token.as_deref()).await?;

    request.extensions_mut().insert(AuthUser { user });

    Ok(next.run(request).await)
}
