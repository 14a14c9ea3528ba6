// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST set). Without it they are skipped.
//!
//! Every test uses fresh IDs, so runs against a shared emulator do not collide.

use videotube_accounts::db::CredentialStore;
use videotube_accounts::error::AppError;
use videotube_accounts::models::{Subscription, UserFilter, UserPatch, UserRecord, Video};
use videotube_accounts::services::GraphAggregator;
use videotube_accounts::time_utils::now_rfc3339;

mod common;
use common::test_db;

fn unique(prefix: &str) -> String {
    format!("{}{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Helper to create a basic test user
fn test_user(username: &str) -> UserRecord {
    UserRecord {
        id: uuid::Uuid::new_v4().to_string(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        fullname: "Test User".to_string(),
        password: "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$aGFzaGhhc2g".to_string(),
        avatar: "https://media.test/avatar.png".to_string(),
        cover_image: None,
        refresh_token: None,
        watch_history: Vec::new(),
        created_at: now_rfc3339(),
        updated_at: now_rfc3339(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_and_find_user() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user(&unique("alice"));
    db.create_user(&user).await.unwrap();

    let by_id = db.find_user_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.username, user.username);

    let by_name = db
        .find_user(&UserFilter::Username(user.username.clone()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_name.id, user.id);

    let by_either = db
        .find_user(&UserFilter::Any(vec![
            UserFilter::Username(unique("nobody")),
            UserFilter::Email(user.email.clone()),
        ]))
        .await
        .unwrap();
    assert_eq!(by_either.map(|u| u.id), Some(user.id.clone()));

    println!("✓ User created and found: id={}", user.id);
}

#[tokio::test]
async fn test_duplicate_username_and_email_rejected() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user(&unique("dup"));
    db.create_user(&user).await.unwrap();

    let mut same_name = test_user(&user.username);
    same_name.email = format!("{}@example.com", unique("other"));
    assert!(matches!(
        db.create_user(&same_name).await,
        Err(AppError::Conflict(_))
    ));

    let mut same_email = test_user(&unique("other"));
    same_email.email = user.email.clone();
    assert!(matches!(
        db.create_user(&same_email).await,
        Err(AppError::Conflict(_))
    ));

    // The failed email claim must not leave the username claimed
    let retry = test_user(&same_email.username);
    db.create_user(&retry).await.unwrap();
}

#[tokio::test]
async fn test_update_user_rotates_fingerprint_and_email() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user(&unique("patch"));
    db.create_user(&user).await.unwrap();

    let updated = db
        .update_user(&user.id, UserPatch::refresh_token(Some("fp-1".to_string())))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.refresh_token.as_deref(), Some("fp-1"));

    let new_email = format!("{}@example.com", unique("moved"));
    let updated = db
        .update_user(
            &user.id,
            UserPatch {
                email: Some(new_email.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.email, new_email);
    assert_eq!(updated.refresh_token.as_deref(), Some("fp-1"));

    // The old email is free again
    let mut reuse = test_user(&unique("reuse"));
    reuse.email = user.email.clone();
    db.create_user(&reuse).await.unwrap();

    let missing = db
        .update_user("no-such-user", UserPatch::refresh_token(None))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_logout_survives_concurrent_profile_and_history_writes() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user(&unique("interleave"));
    db.create_user(&user).await.unwrap();

    for round in 0..20 {
        let fingerprint = format!("fp-{round}");
        db.update_user(&user.id, UserPatch::refresh_token(Some(fingerprint)))
            .await
            .unwrap();

        let profile = UserPatch {
            fullname: Some(format!("Round {round}")),
            ..Default::default()
        };
        let (profile_write, logout, history_write) = tokio::join!(
            db.update_user(&user.id, profile),
            db.update_user(&user.id, UserPatch::refresh_token(None)),
            db.push_watch_history(&user.id, "v1"),
        );
        profile_write.unwrap();
        logout.unwrap();
        history_write.unwrap();

        let stored = db.find_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, None, "round {round} restored a fingerprint");
        assert_eq!(stored.fullname, format!("Round {round}"));
    }
}

#[tokio::test]
async fn test_failed_user_write_releases_claims() {
    require_emulator!();

    let db = test_db().await;
    let mut broken = test_user(&unique("orphan"));
    // A slash makes the document path invalid, so only the user write fails
    broken.id = format!("{}/extra", broken.id);
    assert!(matches!(
        db.create_user(&broken).await,
        Err(AppError::Database(_))
    ));

    let mut retry = test_user(&broken.username);
    retry.email = broken.email.clone();
    db.create_user(&retry).await.unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════
// AGGREGATION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_channel_profile_and_history_pipelines() {
    require_emulator!();

    let db = test_db().await;
    let channel = test_user(&unique("chan"));
    let fan = test_user(&unique("fan"));
    db.create_user(&channel).await.unwrap();
    db.create_user(&fan).await.unwrap();

    db.set_subscription(&Subscription {
        id: uuid::Uuid::new_v4().to_string(),
        subscriber: fan.id.clone(),
        channel: channel.id.clone(),
        created_at: now_rfc3339(),
    })
    .await
    .unwrap();

    let video_ids: Vec<String> = (0..2).map(|_| unique("v")).collect();
    for id in &video_ids {
        db.set_video(&Video {
            id: id.clone(),
            video_file: format!("https://media.test/{id}.mp4"),
            thumbnail: format!("https://media.test/{id}.png"),
            title: id.clone(),
            description: String::new(),
            duration: 1.0,
            views: 0,
            is_published: true,
            owner: channel.id.clone(),
            created_at: now_rfc3339(),
        })
        .await
        .unwrap();
    }
    db.push_watch_history(&fan.id, &video_ids[1]).await.unwrap();
    db.push_watch_history(&fan.id, &video_ids[0]).await.unwrap();

    let store: std::sync::Arc<dyn CredentialStore> = std::sync::Arc::new(db);
    let graph = GraphAggregator::new(store);

    let profile = graph
        .channel_profile(&channel.username, Some(&fan.id))
        .await
        .unwrap();
    assert_eq!(profile.subscribers_count, 1);
    assert_eq!(profile.channel_subscribed_to_count, 0);
    assert!(profile.is_subscribed);

    let history = graph.watch_history(&fan.id).await.unwrap();
    let ids: Vec<&str> = history.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec![video_ids[1].as_str(), video_ids[0].as_str()]);
    assert_eq!(
        history[0].owner.as_ref().map(|o| o.username.as_str()),
        Some(channel.username.as_str())
    );
}
