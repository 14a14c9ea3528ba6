// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User account routes under `/api/v1/users`.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Multipart, Path, State},
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::envelope::{ApiResponse, Empty};
use super::uploads::stage_multipart;
use crate::error::{AppError, Result};
use crate::middleware::auth::{AuthUser, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::models::{ChannelProfile, User, WatchedVideo};
use crate::services::{NewAccount, TokenPair};
use crate::AppState;

/// Routes that need no session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
}

/// Routes behind the auth middleware (applied in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-account", put(update_account))
        .route("/avatar", patch(update_avatar))
        .route("/cover-images", patch(update_cover_image))
        .route("/c/{username}", get(channel_profile))
        .route("/history", get(watch_history))
}

// ─── Request/Response Bodies ─────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default, alias = "oldPassword")]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

/// Login result: the user and both tokens (also set as cookies).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginData {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

// ─── Helpers ─────────────────────────────────────────────────

/// Unwrap a JSON body, reporting rejections in the error envelope.
fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::Validation(e.body_text()))
}

fn session_cookie(name: &'static str, value: String, ttl_secs: u64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(ttl_secs.min(i64::MAX as u64) as i64))
        .build()
}

fn set_session_cookies(state: &AppState, jar: CookieJar, tokens: &TokenPair) -> CookieJar {
    let secure = state.config.cookie_secure;
    jar.add(session_cookie(
        ACCESS_COOKIE,
        tokens.access_token.clone(),
        state.tokens.access_ttl_secs(),
        secure,
    ))
    .add(session_cookie(
        REFRESH_COOKIE,
        tokens.refresh_token.clone(),
        state.tokens.refresh_ttl_secs(),
        secure,
    ))
}

/// Removal cookies carry the same attributes the session cookies were set with.
fn clear_session_cookies(state: &AppState, jar: CookieJar) -> CookieJar {
    let removal = |name: &'static str| {
        Cookie::build(name)
            .http_only(true)
            .secure(state.config.cookie_secure)
            .same_site(SameSite::Lax)
            .path("/")
    };
    jar.remove(removal(ACCESS_COOKIE))
        .remove(removal(REFRESH_COOKIE))
}

// ─── Session ─────────────────────────────────────────────────

async fn register(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<ApiResponse<User>> {
    let mut form = stage_multipart(
        multipart,
        &state.config.upload_dir,
        &[("avatar", 1), ("coverimage", 3)],
    )
    .await?;

    let account = NewAccount {
        fullname: form.take_field("fullname"),
        username: form.take_field("username"),
        email: form.take_field("email"),
        password: form.take_field("password"),
        avatar: form.take_files("avatar").into_iter().next(),
        cover_images: form.take_files("coverimage"),
    };
    form.discard_rest().await;

    let user = state.sessions.register(account).await?;
    Ok(ApiResponse::created(user, "User registered successfully"))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<LoginData>)> {
    let req = json_body(payload)?;
    let outcome = state.sessions.login(&req.username, &req.password).await?;

    let jar = set_session_cookies(&state, jar, &outcome.tokens);
    Ok((
        jar,
        ApiResponse::ok(
            LoginData {
                user: outcome.user,
                access_token: outcome.tokens.access_token,
                refresh_token: outcome.tokens.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<Empty>)> {
    state.sessions.logout(auth.id()).await?;
    Ok((
        clear_session_cookies(&state, jar),
        ApiResponse::ok(Empty::default(), "User logged out"),
    ))
}

/// Cookie first, then a JSON `refreshToken` in the body.
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, ApiResponse<TokenPair>)> {
    let from_cookie = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    let incoming = from_cookie.or_else(|| {
        if body.is_empty() {
            return None;
        }
        serde_json::from_slice::<RefreshRequest>(&body)
            .ok()
            .and_then(|req| req.refresh_token)
    });

    let tokens = state.sessions.refresh(incoming.as_deref()).await?;
    let jar = set_session_cookies(&state, jar, &tokens);
    Ok((jar, ApiResponse::ok(tokens, "Access token refreshed")))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    payload: std::result::Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<ApiResponse<Empty>> {
    let req = json_body(payload)?;
    state
        .sessions
        .change_password(auth.id(), &req.current_password, &req.new_password)
        .await?;
    Ok(ApiResponse::ok(
        Empty::default(),
        "Password changed successfully",
    ))
}

// ─── Profile ─────────────────────────────────────────────────

async fn current_user(Extension(auth): Extension<AuthUser>) -> ApiResponse<User> {
    ApiResponse::ok(auth.user, "Current user fetched successfully")
}

async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    payload: std::result::Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<ApiResponse<User>> {
    let req = json_body(payload)?;
    // Missing fields get the "required" message from the profile service
    if !req.email.trim().is_empty() {
        req.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }

    let user = state
        .profiles
        .update_account(auth.id(), &req.fullname, &req.email)
        .await?;
    Ok(ApiResponse::ok(user, "Account details updated successfully"))
}

async fn update_avatar(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<ApiResponse<User>> {
    let mut form = stage_multipart(multipart, &state.config.upload_dir, &[("avatar", 1)]).await?;
    let file = form.take_files("avatar").into_iter().next();
    form.discard_rest().await;

    let user = state.profiles.update_avatar(auth.id(), file).await?;
    Ok(ApiResponse::ok(user, "Avatar image updated successfully"))
}

async fn update_cover_image(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<ApiResponse<User>> {
    let mut form =
        stage_multipart(multipart, &state.config.upload_dir, &[("coverimage", 3)]).await?;
    let files = form.take_files("coverimage");
    form.discard_rest().await;

    let user = state.profiles.update_cover_image(auth.id(), files).await?;
    Ok(ApiResponse::ok(user, "Cover image updated successfully"))
}

// ─── Graph ───────────────────────────────────────────────────

async fn channel_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(username): Path<String>,
) -> Result<ApiResponse<ChannelProfile>> {
    let channel = state
        .graph
        .channel_profile(&username, Some(auth.id()))
        .await?;
    Ok(ApiResponse::ok(channel, "User channel fetched successfully"))
}

async fn watch_history(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<Vec<WatchedVideo>>> {
    let history = state.graph.watch_history(auth.id()).await?;
    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}
