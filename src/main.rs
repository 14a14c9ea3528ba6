// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! VideoTube Accounts API Server
//!
//! Serves registration, login and session refresh, profile media updates,
//! and channel/watch-history reads.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use videotube_accounts::{
    config::{Config, DatabaseBackend},
    db::{CredentialStore, FirestoreDb, MemoryDb},
    services::{CloudinaryClient, MediaStore},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting VideoTube Accounts API");

    let db: Arc<dyn CredentialStore> = match config.database_backend {
        DatabaseBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory store; all data is lost on restart");
            Arc::new(MemoryDb::new())
        }
    };

    let media: Arc<dyn MediaStore> = Arc::new(CloudinaryClient::new(config.cloudinary.clone()));
    tracing::info!(cloud = %config.cloudinary.cloud_name, "Media store initialized");

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, media));

    // Build router
    let app = videotube_accounts::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("videotube_accounts=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
