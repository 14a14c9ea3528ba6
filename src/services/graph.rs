// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Social-graph reads computed at read time with aggregation pipelines.
//!
//! Nothing here is cached or denormalized: subscriber counts and watch-history
//! enrichment are derived from the subscription and video collections on
//! every call.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::db::pipeline::{project, Expr, Lookup, Pipeline, Stage};
use crate::db::{collections, CredentialStore};
use crate::error::{AppError, Result};
use crate::models::{ChannelProfile, VideoOwner, WatchedVideo};

/// Fields returned for a channel profile.
const CHANNEL_FIELDS: &[&str] = &[
    "fullname",
    "username",
    "subscribersCount",
    "channelSubscribedToCount",
    "isSubscribed",
    "avatar",
    "coverImage",
    "email",
];

/// Owner fields embedded in a watched video.
const OWNER_FIELDS: &[&str] = &["fullname", "username", "avatar"];

/// A video as it leaves the owner join, before the owner list is collapsed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinedVideo {
    id: String,
    video_file: String,
    thumbnail: String,
    title: String,
    description: String,
    duration: f64,
    #[serde(default)]
    views: u64,
    #[serde(default)]
    is_published: bool,
    created_at: String,
    #[serde(default)]
    owner: Vec<VideoOwner>,
}

/// Replace the joined owner list with its first element, or `None`.
fn collapse_owner(video: JoinedVideo) -> WatchedVideo {
    WatchedVideo {
        id: video.id,
        video_file: video.video_file,
        thumbnail: video.thumbnail,
        title: video.title,
        description: video.description,
        duration: video.duration,
        views: video.views,
        is_published: video.is_published,
        created_at: video.created_at,
        owner: video.owner.into_iter().next(),
    }
}

/// Builds and runs the channel-profile and watch-history pipelines.
#[derive(Clone)]
pub struct GraphAggregator {
    store: Arc<dyn CredentialStore>,
}

impl GraphAggregator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Pipeline computing a channel's subscriber counts and the viewer's
    /// subscription status.
    pub fn channel_profile_pipeline(username: &str, viewer_id: Option<&str>) -> Pipeline {
        let viewer = viewer_id.map(Value::from).unwrap_or(Value::Null);

        Pipeline::matching(collections::USERS, "username", username.trim().to_lowercase())
            .lookup(Lookup::new(
                collections::SUBSCRIPTIONS,
                "id",
                "channel",
                "subscribers",
            ))
            .lookup(Lookup::new(
                collections::SUBSCRIPTIONS,
                "id",
                "subscriber",
                "subscribedTo",
            ))
            .set([
                ("subscribersCount", Expr::Size("subscribers".into())),
                ("channelSubscribedToCount", Expr::Size("subscribedTo".into())),
                (
                    "isSubscribed",
                    Expr::In {
                        value: viewer,
                        path: "subscribers.subscriber".into(),
                    },
                ),
            ])
            .project(CHANNEL_FIELDS)
    }

    /// Pipeline joining a user's watch history to videos and their owners.
    pub fn watch_history_pipeline(viewer_id: &str) -> Pipeline {
        let owner = Lookup::new(collections::USERS, "owner", "id", "owner")
            .with_pipeline(vec![project(OWNER_FIELDS)]);

        Pipeline::matching(collections::USERS, "id", viewer_id)
            .lookup(
                Lookup::new(collections::VIDEOS, "watchHistory", "id", "watchHistory")
                    .with_pipeline(vec![Stage::Lookup(owner)]),
            )
            .project(&["watchHistory"])
    }

    pub async fn channel_profile(
        &self,
        username: &str,
        viewer_id: Option<&str>,
    ) -> Result<ChannelProfile> {
        if username.trim().is_empty() {
            return Err(AppError::Validation("Username is missing".to_string()));
        }

        let pipeline = Self::channel_profile_pipeline(username, viewer_id);
        let doc = self
            .store
            .run_aggregation(&pipeline)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Channel does not exist".to_string()))?;

        serde_json::from_value(doc).map_err(|e| AppError::Internal(e.into()))
    }

    /// The viewer's watch history, in stored order. Unknown viewers and empty
    /// histories both yield an empty list.
    pub async fn watch_history(&self, viewer_id: &str) -> Result<Vec<WatchedVideo>> {
        let pipeline = Self::watch_history_pipeline(viewer_id);
        let Some(mut doc) = self.store.run_aggregation(&pipeline).await?.into_iter().next() else {
            return Ok(Vec::new());
        };

        let videos = match doc.get_mut("watchHistory").map(Value::take) {
            Some(Value::Array(videos)) => videos,
            _ => return Ok(Vec::new()),
        };

        videos
            .into_iter()
            .map(|video| {
                serde_json::from_value::<JoinedVideo>(video)
                    .map(collapse_owner)
                    .map_err(|e| AppError::Internal(e.into()))
            })
            .collect()
    }
}
