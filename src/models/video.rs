// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Video and subscription models.
//!
//! Both are written by collaborators outside this service; here they are
//! only read as join targets.

use serde::{Deserialize, Serialize};

/// Stored video record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    /// Video ID (also used as document ID)
    pub id: String,
    /// Media URL of the video file
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    /// Duration in seconds
    pub duration: f64,
    #[serde(default)]
    pub views: u64,
    #[serde(default = "default_published")]
    pub is_published: bool,
    /// Owning user's ID
    pub owner: String,
    pub created_at: String,
}

fn default_published() -> bool {
    true
}

/// Directed subscription edge: `subscriber` follows `channel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    /// User ID of the follower
    pub subscriber: String,
    /// User ID of the followed channel
    pub channel: String,
    pub created_at: String,
}
