// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile updates owned by the signed-in user: account details and images.

use std::sync::Arc;

use crate::db::CredentialStore;
use crate::error::{AppError, Result};
use crate::models::{User, UserPatch};
use crate::services::media::{self, LocalUpload, MediaStore};

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn CredentialStore>,
    media: Arc<dyn MediaStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn CredentialStore>, media: Arc<dyn MediaStore>) -> Self {
        Self { store, media }
    }

    /// Replace full name and email. Both are required.
    pub async fn update_account(&self, user_id: &str, fullname: &str, email: &str) -> Result<User> {
        let (fullname, email) = (fullname.trim(), email.trim());
        if fullname.is_empty() || email.is_empty() {
            return Err(AppError::Validation("All fields are required".to_string()));
        }

        let patch = UserPatch {
            fullname: Some(fullname.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        };
        let user = self.apply(user_id, patch).await?;
        tracing::info!(user_id, "Account details updated");
        Ok(user)
    }

    pub async fn update_avatar(&self, user_id: &str, file: Option<LocalUpload>) -> Result<User> {
        let file =
            file.ok_or_else(|| AppError::MediaMissing("Avatar file is missing".to_string()))?;

        let uploaded = media::upload_and_discard(self.media.as_ref(), &file)
            .await
            .ok_or_else(|| AppError::MediaUpload("Error while uploading avatar".to_string()))?;

        let patch = UserPatch {
            avatar: Some(uploaded.url),
            ..Default::default()
        };
        self.apply(user_id, patch).await
    }

    /// Upload the first file as the new cover image; extra files are dropped.
    pub async fn update_cover_image(&self, user_id: &str, files: Vec<LocalUpload>) -> Result<User> {
        let mut files = files.into_iter();
        let first = files
            .next()
            .ok_or_else(|| AppError::MediaMissing("Cover image file is missing".to_string()))?;
        for extra in files {
            media::discard(&extra).await;
        }

        let uploaded = media::upload_and_discard(self.media.as_ref(), &first)
            .await
            .ok_or_else(|| {
                AppError::MediaUpload("Error while uploading cover image".to_string())
            })?;

        let patch = UserPatch {
            cover_image: Some(Some(uploaded.url)),
            ..Default::default()
        };
        self.apply(user_id, patch).await
    }

    async fn apply(&self, user_id: &str, patch: UserPatch) -> Result<User> {
        self.store
            .update_user(user_id, patch)
            .await?
            .map(User::from)
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))
    }
}
