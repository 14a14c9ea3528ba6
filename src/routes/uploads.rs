// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Multipart parsing: text fields are collected, file fields are staged to
//! the upload directory for the media store to pick up.

use axum::extract::Multipart;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::services::media::{self, LocalUpload};

/// Parsed multipart body with files already on disk.
#[derive(Debug, Default)]
pub struct StagedForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, Vec<LocalUpload>>,
}

impl StagedForm {
    /// Take a text field, empty when absent.
    pub fn take_field(&mut self, name: &str) -> String {
        self.fields.remove(name).unwrap_or_default()
    }

    pub fn take_files(&mut self, name: &str) -> Vec<LocalUpload> {
        self.files.remove(name).unwrap_or_default()
    }

    /// Delete every staged file that was not taken.
    pub async fn discard_rest(self) {
        for file in self.files.values().flatten() {
            media::discard(file).await;
        }
    }
}

/// Read a multipart body, staging files for the fields in `file_limits`
/// (field name, maximum count). Any other file field is rejected. On error
/// nothing is left behind on disk.
pub async fn stage_multipart(
    multipart: Multipart,
    upload_dir: &Path,
    file_limits: &[(&str, usize)],
) -> Result<StagedForm> {
    let mut form = StagedForm::default();
    match read_parts(multipart, upload_dir, file_limits, &mut form).await {
        Ok(()) => Ok(form),
        Err(e) => {
            form.discard_rest().await;
            Err(e)
        }
    }
}

async fn read_parts(
    mut multipart: Multipart,
    upload_dir: &Path,
    file_limits: &[(&str, usize)],
    form: &mut StagedForm,
) -> Result<()> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Cannot create upload dir: {}", e)))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Unreadable field {}: {}", name, e)))?;
            form.fields.insert(name, text);
            continue;
        };
        // Browsers send an empty file part when nothing was selected
        if file_name.is_empty() {
            continue;
        }

        let limit = file_limits
            .iter()
            .find(|(field_name, _)| *field_name == name)
            .map(|(_, max)| *max)
            .ok_or_else(|| AppError::Validation(format!("Unexpected file field: {}", name)))?;

        let staged = form.files.entry(name.clone()).or_default();
        if staged.len() >= limit {
            return Err(AppError::Validation(format!(
                "Too many files for field {} (max {})",
                name, limit
            )));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Unreadable file {}: {}", name, e)))?;

        let path = upload_dir.join(staged_name(&file_name));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cannot stage upload: {}", e)))?;

        tracing::debug!(field = %name, file = %file_name, size = bytes.len(), "Staged upload");
        staged.push(LocalUpload { path, file_name });
    }

    Ok(())
}

/// Unique on-disk name keeping the client's extension.
fn staged_name(file_name: &str) -> String {
    let id = uuid::Uuid::new_v4();
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.chars().all(|c| c.is_ascii_alphanumeric()) => format!("{}.{}", id, ext),
        _ => id.to_string(),
    }
}
