// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: the credential store and its backends.

pub mod firestore;
pub mod memory;
pub mod pipeline;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;
pub use pipeline::{DocumentSource, Expr, Lookup, Pipeline, Stage};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::models::{UserFilter, UserPatch, UserRecord};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const VIDEOS: &str = "videos";
    /// Create-only claim documents keyed by username (uniqueness index)
    pub const USER_HANDLES: &str = "user_handles";
    /// Create-only claim documents keyed by email (uniqueness index)
    pub const USER_EMAILS: &str = "user_emails";
}

/// Persistence for user records plus pipeline execution.
///
/// Backends must enforce uniqueness of `username` and `email` on create and on
/// email change, failing with [`AppError::Conflict`]. Callers still check
/// before creating; the store is the last line when two requests race.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user(&self, filter: &UserFilter) -> Result<Option<UserRecord>, AppError>;

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>, AppError>;

    async fn create_user(&self, user: &UserRecord) -> Result<(), AppError>;

    /// Apply `patch` and return the updated record, or `None` if no such user.
    async fn update_user(
        &self,
        id: &str,
        patch: UserPatch,
    ) -> Result<Option<UserRecord>, AppError>;

    /// Execute an aggregation pipeline and return the resulting documents in order.
    async fn run_aggregation(&self, pipeline: &Pipeline) -> Result<Vec<Value>, AppError>;
}
