// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! VideoTube accounts: user registration, sessions and the social graph
//!
//! This crate provides the backend API for user accounts: credential
//! checks, dual-token sessions with refresh rotation, profile media, and
//! channel/watch-history reads computed with aggregation pipelines.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::CredentialStore;
use services::{
    GraphAggregator, MediaStore, PasswordHasher, ProfileService, SessionManager, TokenService,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn CredentialStore>,
    pub tokens: Arc<TokenService>,
    pub sessions: SessionManager,
    pub profiles: ProfileService,
    pub graph: GraphAggregator,
}

impl AppState {
    /// Wire the services around a store and a media backend.
    pub fn new(config: Config, db: Arc<dyn CredentialStore>, media: Arc<dyn MediaStore>) -> Self {
        let tokens = Arc::new(TokenService::new(&config.tokens));
        let hasher = PasswordHasher::new(config.password);

        Self {
            sessions: SessionManager::new(db.clone(), tokens.clone(), media.clone(), hasher),
            profiles: ProfileService::new(db.clone(), media),
            graph: GraphAggregator::new(db.clone()),
            tokens,
            db,
            config,
        }
    }
}
