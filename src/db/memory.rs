// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process credential store.
//!
//! Used by the test suite and for local development without Firestore
//! (`DATABASE_BACKEND=memory`). All state is lost when the process exits.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

use crate::db::pipeline::{self, field_values, DocumentSource, Pipeline};
use crate::db::{collections, CredentialStore};
use crate::error::AppError;
use crate::models::{Subscription, UserFilter, UserPatch, UserRecord, Video};
use crate::time_utils::now_rfc3339;

/// Memory-backed store keyed by document ID.
#[derive(Default)]
pub struct MemoryDb {
    users: DashMap<String, UserRecord>,
    subscriptions: DashMap<String, Subscription>,
    videos: DashMap<String, Video>,
    /// Held for every user write so uniqueness checks and writes are atomic.
    user_writes: Mutex<()>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Collaborator Writes ─────────────────────────────────────

    /// Store a subscription edge.
    pub fn insert_subscription(&self, subscription: Subscription) {
        self.subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    /// Store a video.
    pub fn insert_video(&self, video: Video) {
        self.videos.insert(video.id.clone(), video);
    }

    /// Append a video to a user's watch history.
    pub fn push_watch_history(&self, user_id: &str, video_id: &str) -> Result<(), AppError> {
        let _guard = self.user_writes.lock().unwrap_or_else(|e| e.into_inner());
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        user.watch_history.push(video_id.to_string());
        Ok(())
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn matching<T: Serialize>(
        map: &DashMap<String, T>,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Value>, AppError> {
        let mut docs = Vec::new();
        for entry in map.iter() {
            let doc = serde_json::to_value(entry.value())
                .map_err(|e| AppError::Internal(e.into()))?;
            if field_values(&doc, field).iter().any(|v| values.contains(*v)) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }
}

#[async_trait]
impl CredentialStore for MemoryDb {
    async fn find_user(&self, filter: &UserFilter) -> Result<Option<UserRecord>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone()))
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.get(id).map(|user| user.value().clone()))
    }

    async fn create_user(&self, user: &UserRecord) -> Result<(), AppError> {
        let _guard = self.user_writes.lock().unwrap_or_else(|e| e.into_inner());

        let taken = self.users.iter().any(|entry| {
            entry.username == user.username || entry.email == user.email || entry.id == user.id
        });
        if taken {
            return Err(AppError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(
        &self,
        id: &str,
        patch: UserPatch,
    ) -> Result<Option<UserRecord>, AppError> {
        let _guard = self.user_writes.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(email) = &patch.email {
            let taken = self
                .users
                .iter()
                .any(|entry| entry.id != id && entry.email == *email);
            if taken {
                return Err(AppError::Conflict("Email is already in use".to_string()));
            }
        }

        let Some(mut user) = self.users.get_mut(id) else {
            return Ok(None);
        };
        patch.apply(&mut user, now_rfc3339());
        Ok(Some(user.clone()))
    }

    async fn run_aggregation(&self, pipeline: &Pipeline) -> Result<Vec<Value>, AppError> {
        pipeline::execute(self, pipeline).await
    }
}

#[async_trait]
impl DocumentSource for MemoryDb {
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Value>, AppError> {
        match collection {
            collections::USERS => Self::matching(&self.users, field, values),
            collections::SUBSCRIPTIONS => Self::matching(&self.subscriptions, field, values),
            collections::VIDEOS => Self::matching(&self.videos, field, values),
            other => Err(AppError::Database(format!("Unknown collection: {}", other))),
        }
    }
}
