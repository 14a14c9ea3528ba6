// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local development.

use std::env;
use std::path::PathBuf;

use crate::services::password::PasswordConfig;
use crate::services::token::TokenConfig;

/// Which credential store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Firestore,
    /// In-process store, state is lost on restart.
    Memory,
}

impl std::str::FromStr for DatabaseBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(DatabaseBackend::Firestore),
            "memory" => Ok(DatabaseBackend::Memory),
            _ => Err(ConfigError::Invalid("DATABASE_BACKEND")),
        }
    }
}

/// Cloudinary credentials for the media store.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Server port
    pub port: u16,
    /// Allowed browser origin for credentialed CORS requests
    pub cors_origin: String,
    /// Whether session cookies carry the `Secure` attribute
    pub cookie_secure: bool,
    /// Directory where multipart uploads are staged before reaching the media store
    pub upload_dir: PathBuf,
    pub database_backend: DatabaseBackend,
    /// GCP project ID
    pub gcp_project_id: String,
    pub password: PasswordConfig,

    // --- Secrets ---
    /// Signing secrets and lifetimes for the access/refresh token pair
    pub tokens: TokenConfig,
    pub cloudinary: CloudinaryConfig,
}

impl Config {
    /// Default config for testing only.
    ///
    /// Uses deterministic secrets and a cheap password hash.
    pub fn test_default() -> Self {
        Self {
            port: 8000,
            cors_origin: "http://localhost:5173".to_string(),
            cookie_secure: true,
            upload_dir: env::temp_dir().join("videotube-accounts-test-uploads"),
            database_backend: DatabaseBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            password: PasswordConfig {
                memory_kib: 8,
                iterations: 1,
            },
            tokens: TokenConfig {
                access_secret: b"test_access_secret_32_bytes_min!".to_vec(),
                access_ttl_secs: 3600,
                refresh_secret: b"test_refresh_secret_32_bytes_mn!".to_vec(),
                refresh_ttl_secs: 7 * 24 * 3600,
            },
            cloudinary: CloudinaryConfig {
                cloud_name: "test-cloud".to_string(),
                api_key: "test_key".to_string(),
                api_secret: "test_secret".to_string(),
            },
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = PasswordConfig::default();

        Ok(Self {
            port: parse_or("PORT", 8000),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| !matches!(v.trim(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./public/temp")),
            database_backend: env::var("DATABASE_BACKEND")
                .unwrap_or_else(|_| "firestore".to_string())
                .parse()?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            password: PasswordConfig {
                memory_kib: parse_or("ARGON2_MEMORY_KIB", defaults.memory_kib),
                iterations: parse_or("ARGON2_ITERATIONS", defaults.iterations),
            },

            tokens: TokenConfig {
                access_secret: required("ACCESS_TOKEN_SECRET")?.into_bytes(),
                access_ttl_secs: parse_or("ACCESS_TOKEN_EXPIRY_SECS", 24 * 60 * 60),
                refresh_secret: required("REFRESH_TOKEN_SECRET")?.into_bytes(),
                refresh_ttl_secs: parse_or("REFRESH_TOKEN_EXPIRY_SECS", 10 * 24 * 60 * 60),
            },
            cloudinary: CloudinaryConfig {
                cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
            },
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
