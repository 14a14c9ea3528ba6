// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (credential records, keyed by user ID)
//! - Username/email claims (create-only documents acting as unique indexes)
//! - Subscriptions and videos (read as pipeline join targets)

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::pipeline::{self, DocumentSource, Pipeline};
use crate::db::{collections, CredentialStore};
use crate::error::AppError;
use crate::models::{Subscription, UserFilter, UserPatch, UserRecord, Video};
use crate::time_utils::now_rfc3339;

// Firestore caps `in` filters at 30 values.
const IN_QUERY_LIMIT: usize = 30;

/// Claim document reserving a username or email for one user.
#[derive(Debug, Serialize, Deserialize)]
struct Claim {
    user_id: String,
    claimed_at: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator rejects real credentials, so use an unauthenticated connection.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client; every operation fails with a database error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    async fn find_user_by_field(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<UserRecord>, AppError> {
        let mut found: Vec<UserRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.field(field).eq(value))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(found.pop())
    }

    async fn write_user(&self, user: &UserRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Write only `fields` of an existing user and return the stored result.
    ///
    /// Fields outside the mask keep whatever value the document holds at write
    /// time, not the value `user` was read with.
    async fn write_user_fields(
        &self,
        user: &UserRecord,
        fields: &[&str],
    ) -> Result<UserRecord, AppError> {
        self.get_client()?
            .fluent()
            .update()
            .fields(fields.iter().copied())
            .in_col(collections::USERS)
            .precondition(firestore::FirestoreWritePrecondition::Exists(true))
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Uniqueness Claims ───────────────────────────────────────

    /// Reserve `key` in a claim collection. Fails with `Conflict` if taken.
    async fn claim(&self, collection: &str, key: &str, user_id: &str) -> Result<(), AppError> {
        let claim = Claim {
            user_id: user_id.to_string(),
            claimed_at: now_rfc3339(),
        };

        let result: Result<Claim, _> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collection)
            .document_id(claim_id(key))
            .object(&claim)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(firestore::errors::FirestoreError::DataConflictError(_)) => Err(
                AppError::Conflict("User with email or username already exists".to_string()),
            ),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn release(&self, collection: &str, key: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(claim_id(key))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Release a claim after a failed write, logging instead of failing.
    async fn release_quietly(&self, collection: &str, key: &str, user_id: &str) {
        if let Err(e) = self.release(collection, key).await {
            tracing::error!(error = %e, collection, user_id, "Failed to release claim");
        }
    }

    // ─── Collaborator Writes ─────────────────────────────────────

    /// Store a subscription edge.
    pub async fn set_subscription(&self, subscription: &Subscription) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SUBSCRIPTIONS)
            .document_id(&subscription.id)
            .object(subscription)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Store a video.
    pub async fn set_video(&self, video: &Video) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::VIDEOS)
            .document_id(&video.id)
            .object(video)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Append a video to a user's watch history.
    ///
    /// Only `watchHistory` is written. Two concurrent appends can still lose
    /// one entry, but credential fields are never rewritten from the stale read.
    pub async fn push_watch_history(&self, user_id: &str, video_id: &str) -> Result<(), AppError> {
        let mut user = self
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        user.watch_history.push(video_id.to_string());
        self.write_user_fields(&user, &["watchHistory"]).await?;
        Ok(())
    }

    // ─── Pipeline Support ────────────────────────────────────────

    /// Query documents whose `field` is one of the string `values`, in chunks.
    async fn query_in<T>(
        &self,
        collection: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Value>, AppError>
    where
        T: DeserializeOwned + Serialize + Send,
    {
        let keys: Vec<String> = values
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        let client = self.get_client()?;

        let mut docs = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(IN_QUERY_LIMIT) {
            let found: Vec<T> = client
                .fluent()
                .select()
                .from(collection)
                .filter(|q| q.field(field).is_in(chunk.to_vec()))
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            for doc in found {
                docs.push(serde_json::to_value(doc).map_err(|e| AppError::Internal(e.into()))?);
            }
        }
        Ok(docs)
    }
}

/// Document IDs may not contain `/`, so claim keys are hex encoded.
fn claim_id(key: &str) -> String {
    hex::encode(key.as_bytes())
}

/// Flatten a filter into (field, value) probes evaluated in order.
fn filter_probes(filter: &UserFilter) -> Vec<(&'static str, &str)> {
    match filter {
        UserFilter::Username(username) => vec![("username", username.as_str())],
        UserFilter::Email(email) => vec![("email", email.as_str())],
        UserFilter::Any(filters) => filters.iter().flat_map(filter_probes).collect(),
    }
}

#[async_trait]
impl CredentialStore for FirestoreDb {
    async fn find_user(&self, filter: &UserFilter) -> Result<Option<UserRecord>, AppError> {
        for (field, value) in filter_probes(filter) {
            if let Some(user) = self.find_user_by_field(field, value).await? {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn create_user(&self, user: &UserRecord) -> Result<(), AppError> {
        self.claim(collections::USER_HANDLES, &user.username, &user.id)
            .await?;

        if let Err(e) = self
            .claim(collections::USER_EMAILS, &user.email, &user.id)
            .await
        {
            self.release_quietly(collections::USER_HANDLES, &user.username, &user.id)
                .await;
            return Err(e);
        }

        // Claims without a user document would block the handle and email forever
        if let Err(e) = self.write_user(user).await {
            self.release_quietly(collections::USER_HANDLES, &user.username, &user.id)
                .await;
            self.release_quietly(collections::USER_EMAILS, &user.email, &user.id)
                .await;
            return Err(e);
        }
        tracing::debug!(user_id = %user.id, "User document created");
        Ok(())
    }

    async fn update_user(
        &self,
        id: &str,
        patch: UserPatch,
    ) -> Result<Option<UserRecord>, AppError> {
        let Some(mut user) = self.find_user_by_id(id).await? else {
            return Ok(None);
        };

        let old_email = user.email.clone();
        let new_email = patch.email.clone().filter(|email| *email != old_email);
        if let Some(email) = &new_email {
            self.claim(collections::USER_EMAILS, email, id).await?;
        }

        let fields = patch.field_paths();
        patch.apply(&mut user, now_rfc3339());
        let user = match self.write_user_fields(&user, &fields).await {
            Ok(stored) => stored,
            Err(e) => {
                if let Some(email) = &new_email {
                    self.release_quietly(collections::USER_EMAILS, email, id).await;
                }
                return Err(e);
            }
        };

        if new_email.is_some() {
            if let Err(e) = self.release(collections::USER_EMAILS, &old_email).await {
                tracing::warn!(error = %e, user_id = id, "Failed to release old email claim");
            }
        }

        Ok(Some(user))
    }

    async fn run_aggregation(&self, pipeline: &Pipeline) -> Result<Vec<Value>, AppError> {
        pipeline::execute(self, pipeline).await
    }
}

#[async_trait]
impl DocumentSource for FirestoreDb {
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Value>, AppError> {
        match collection {
            collections::USERS => self.query_in::<UserRecord>(collection, field, values).await,
            collections::SUBSCRIPTIONS => {
                self.query_in::<Subscription>(collection, field, values)
                    .await
            }
            collections::VIDEOS => self.query_in::<Video>(collection, field, values).await,
            other => Err(AppError::Database(format!("Unknown collection: {}", other))),
        }
    }
}
