//! Seed scenario 1 ("Cold detection", §8) plus the boundary and
//! idempotence laws around it.

use time::{Duration, OffsetDateTime};

use youtube_chat_archiver_core::capability::{
    FeedEntry, LiveBroadcastContent, StateStore, VideoState,
};
use youtube_chat_archiver_core::model::{BroadcastStatus, Channel};
use youtube_chat_archiver_testkit::{FakeVideoPlatformClient, InMemoryStateStore};

fn now() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_753_531_200).unwrap() // 2025-07-26T00:00:00Z
}

fn sample_channel(now: OffsetDateTime) -> Channel {
    Channel {
        channel_id: "UCabc".into(),
        display_name: "Example Channel".into(),
        description: String::new(),
        is_active: true,
        created_at: now,
        updated_at: now,
        subscriber_count: None,
        video_count: None,
        view_count: None,
        thumbnail_url: None,
        api_retrieved_at: None,
    }
}

fn sample_video_state(live_broadcast_content: LiveBroadcastContent) -> VideoState {
    VideoState {
        live_broadcast_content,
        has_live_streaming_details: true,
        title: "Some Stream".into(),
        description: String::new(),
        scheduled_start_time: None,
        actual_start_time: None,
        actual_end_time: None,
        concurrent_viewers: None,
    }
}

#[tokio::test]
async fn cold_detection_inserts_a_single_upcoming_broadcast() {
    let now = now();
    let store = InMemoryStateStore::new();
    store.seed_channel(sample_channel(now)).await;

    let platform = FakeVideoPlatformClient::new();
    platform
        .set_feed(
            "UCabc",
            vec![FeedEntry {
                video_id: "v1".into(),
                title: "Some Stream".into(),
                published: now - Duration::minutes(5),
            }],
        )
        .await;
    platform
        .set_video_state("v1", sample_video_state(LiveBroadcastContent::Upcoming))
        .await;

    let outcome = youtube_chat_archiver_scanner::scan_channel(&store, &platform, "UCabc", now)
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 1);
    let broadcast = store.broadcast("v1").await.expect("broadcast was inserted");
    assert_eq!(broadcast.status, BroadcastStatus::Detected);
    assert_eq!(broadcast.channel_id, "UCabc");
}

#[tokio::test]
async fn feed_entry_exactly_24h_old_is_rejected() {
    let now = now();
    let store = InMemoryStateStore::new();
    let platform = FakeVideoPlatformClient::new();
    platform
        .set_feed(
            "UCabc",
            vec![FeedEntry {
                video_id: "v-old".into(),
                title: "Old stream".into(),
                published: now - Duration::hours(24),
            }],
        )
        .await;

    let outcome = youtube_chat_archiver_scanner::scan_channel(&store, &platform, "UCabc", now)
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.rejected_stale, 1);
    assert!(!store.broadcast_exists("v-old").await.unwrap());
}

#[tokio::test]
async fn not_live_entries_are_rejected_without_insert() {
    let now = now();
    let store = InMemoryStateStore::new();
    let platform = FakeVideoPlatformClient::new();
    platform
        .set_feed(
            "UCabc",
            vec![FeedEntry {
                video_id: "v2".into(),
                title: "Regular upload".into(),
                published: now - Duration::minutes(5),
            }],
        )
        .await;
    platform
        .set_video_state(
            "v2",
            VideoState {
                has_live_streaming_details: false,
                ..sample_video_state(LiveBroadcastContent::None)
            },
        )
        .await;

    let outcome = youtube_chat_archiver_scanner::scan_channel(&store, &platform, "UCabc", now)
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.rejected_not_live, 1);
}

#[tokio::test]
async fn rerunning_scan_over_unchanged_feed_inserts_nothing_new() {
    let now = now();
    let store = InMemoryStateStore::new();
    let platform = FakeVideoPlatformClient::new();
    let entry = FeedEntry {
        video_id: "v3".into(),
        title: "Stream".into(),
        published: now - Duration::minutes(1),
    };
    platform.set_feed("UCabc", vec![entry]).await;
    platform
        .set_video_state("v3", sample_video_state(LiveBroadcastContent::Live))
        .await;

    let first = youtube_chat_archiver_scanner::scan_channel(&store, &platform, "UCabc", now)
        .await
        .unwrap();
    assert_eq!(first.inserted, 1);

    let second = youtube_chat_archiver_scanner::scan_channel(&store, &platform, "UCabc", now)
        .await
        .unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.rejected_known, 1);
}
