use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use videotube_accounts::db::{CredentialStore, MemoryDb};
use videotube_accounts::models::{Subscription, UserRecord, Video};
use videotube_accounts::services::GraphAggregator;

const USERS: usize = 500;
const HISTORY_LEN: usize = 200;

fn user(i: usize) -> UserRecord {
    UserRecord {
        id: format!("u{i}"),
        username: format!("user{i}"),
        email: format!("user{i}@example.com"),
        fullname: format!("User {i}"),
        password: "hash".to_string(),
        avatar: format!("https://media.test/u{i}.png"),
        cover_image: None,
        refresh_token: None,
        watch_history: Vec::new(),
        created_at: String::new(),
        updated_at: String::new(),
    }
}

/// Every user follows the next ten, and owns two videos.
/// `u0` has a long watch history spread across all owners.
fn seed(rt: &tokio::runtime::Runtime) -> Arc<MemoryDb> {
    let db = Arc::new(MemoryDb::new());
    rt.block_on(async {
        for i in 0..USERS {
            db.create_user(&user(i)).await.expect("Failed to seed user");
        }
    });

    for i in 0..USERS {
        for step in 1..=10 {
            db.insert_subscription(Subscription {
                id: format!("s{i}-{step}"),
                subscriber: format!("u{i}"),
                channel: format!("u{}", (i + step) % USERS),
                created_at: String::new(),
            });
        }
        for n in 0..2 {
            db.insert_video(Video {
                id: format!("v{i}-{n}"),
                video_file: String::new(),
                thumbnail: String::new(),
                title: format!("Video {i}-{n}"),
                description: String::new(),
                duration: 60.0,
                views: 0,
                is_published: true,
                owner: format!("u{i}"),
                created_at: String::new(),
            });
        }
    }

    for k in 0..HISTORY_LEN {
        db.push_watch_history("u0", &format!("v{}-{}", (k * 7) % USERS, k % 2))
            .expect("Failed to seed history");
    }
    db
}

fn benchmark_graph_pipelines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to build runtime");
    let db = seed(&rt);
    let graph = GraphAggregator::new(db);

    let mut group = c.benchmark_group("graph_pipelines");

    group.bench_function("channel_profile", |b| {
        b.iter(|| {
            rt.block_on(graph.channel_profile(black_box("user42"), Some("u35")))
                .expect("profile")
        })
    });

    group.bench_function("watch_history", |b| {
        b.iter(|| {
            rt.block_on(graph.watch_history(black_box("u0")))
                .expect("history")
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_graph_pipelines);
criterion_main!(benches);
