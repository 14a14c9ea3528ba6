// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User document as stored in the credential store.
///
/// Carries secrets (`password`, `refresh_token`) and must never be returned
/// to a client; convert to [`User`] first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// UUID, also used as document ID
    pub id: String,
    /// Unique handle, always lowercase
    pub username: String,
    pub email: String,
    pub fullname: String,
    /// Argon2id PHC string
    pub password: String,
    /// Avatar URL
    pub avatar: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Fingerprint of the single currently valid refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Watched video IDs in insertion order
    #[serde(default)]
    pub watch_history: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Sanitized user returned by every outward-facing operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub watch_history: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            email: record.email,
            fullname: record.fullname,
            avatar: record.avatar,
            cover_image: record.cover_image,
            watch_history: record.watch_history,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Lookup filter for a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    /// Exact match on the (already lowercased) username
    Username(String),
    Email(String),
    /// Matches when any inner filter matches
    Any(Vec<UserFilter>),
}

impl UserFilter {
    /// Evaluate the filter against a stored record.
    pub fn matches(&self, record: &UserRecord) -> bool {
        match self {
            UserFilter::Username(username) => record.username == *username,
            UserFilter::Email(email) => record.email == *email,
            UserFilter::Any(filters) => filters.iter().any(|f| f.matches(record)),
        }
    }
}

/// Partial update applied to a user record.
///
/// `None` leaves a field untouched. For nullable fields the inner option is the
/// new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<Option<String>>,
    pub refresh_token: Option<Option<String>>,
}

impl UserPatch {
    /// Patch that replaces (or clears) the stored refresh-token fingerprint.
    pub fn refresh_token(fingerprint: Option<String>) -> Self {
        Self {
            refresh_token: Some(fingerprint),
            ..Default::default()
        }
    }

    /// Stored field names this patch writes, `updatedAt` included.
    ///
    /// Backends that write partial documents use this as the update mask, so a
    /// profile write never touches `refreshToken` and a fingerprint write never
    /// touches profile fields.
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.fullname.is_some() {
            paths.push("fullname");
        }
        if self.email.is_some() {
            paths.push("email");
        }
        if self.password.is_some() {
            paths.push("password");
        }
        if self.avatar.is_some() {
            paths.push("avatar");
        }
        if self.cover_image.is_some() {
            paths.push("coverImage");
        }
        if self.refresh_token.is_some() {
            paths.push("refreshToken");
        }
        paths.push("updatedAt");
        paths
    }

    /// Apply the patch in place, stamping `updated_at`.
    pub fn apply(self, record: &mut UserRecord, now: String) {
        if let Some(fullname) = self.fullname {
            record.fullname = fullname;
        }
        if let Some(email) = self.email {
            record.email = email;
        }
        if let Some(password) = self.password {
            record.password = password;
        }
        if let Some(avatar) = self.avatar {
            record.avatar = avatar;
        }
        if let Some(cover_image) = self.cover_image {
            record.cover_image = cover_image;
        }
        if let Some(refresh_token) = self.refresh_token {
            record.refresh_token = refresh_token;
        }
        record.updated_at = now;
    }
}
