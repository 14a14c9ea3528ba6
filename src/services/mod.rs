// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod graph;
pub mod media;
pub mod password;
pub mod profile;
pub mod session;
pub mod token;

pub use graph::GraphAggregator;
pub use media::{CloudinaryClient, LocalUpload, MediaStore, UploadedMedia};
pub use password::{PasswordConfig, PasswordHasher};
pub use profile::ProfileService;
pub use session::{LoginOutcome, NewAccount, SessionManager};
pub use token::{TokenConfig, TokenPair, TokenService};
