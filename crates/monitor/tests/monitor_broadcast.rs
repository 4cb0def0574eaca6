//! Seed scenarios 2 ("Go-live"), 4 ("End-of-broadcast"), and 6 ("Zombie
//! worker") from §8.

use time::OffsetDateTime;

use youtube_chat_archiver_core::capability::{
    ControlAction, LiveBroadcastContent, StateStore, TaskBus, VideoState, WorkerRuntime,
    WorkerSpec,
};
use youtube_chat_archiver_core::model::{Broadcast, BroadcastStatus, WorkerTask, WorkerTaskStatus};
use youtube_chat_archiver_testkit::{FakeVideoPlatformClient, InMemoryStateStore, InMemoryTaskBus, InMemoryWorkerRuntime};

fn now() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_753_531_200).unwrap()
}

fn upcoming_broadcast(now: OffsetDateTime) -> Broadcast {
    Broadcast {
        video_id: "v1".into(),
        channel_id: "UCabc".into(),
        title: "Stream".into(),
        description: String::new(),
        status: BroadcastStatus::Upcoming,
        scheduled_start_time: None,
        actual_start_time: None,
        actual_end_time: None,
        concurrent_viewers: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn go_live_emits_start_collection_when_no_worker_exists() {
    let now = now();
    let store = InMemoryStateStore::new();
    store.seed_broadcast(upcoming_broadcast(now)).await;

    let platform = FakeVideoPlatformClient::new();
    platform
        .set_video_state(
            "v1",
            VideoState {
                live_broadcast_content: LiveBroadcastContent::Live,
                has_live_streaming_details: true,
                title: "Stream".into(),
                description: String::new(),
                scheduled_start_time: None,
                actual_start_time: Some(now),
                actual_end_time: None,
                concurrent_viewers: Some(10),
            },
        )
        .await;

    let runtime = InMemoryWorkerRuntime::new();
    let bus = InMemoryTaskBus::new();

    youtube_chat_archiver_monitor::monitor_broadcast(&store, &platform, &runtime, &bus, "v1", now)
        .await
        .unwrap();

    let broadcast = store.broadcast("v1").await.unwrap();
    assert_eq!(broadcast.status, BroadcastStatus::Live);

    let deliveries = bus.receive(10).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].message.action, ControlAction::StartCollection);
    assert_eq!(deliveries[0].message.video_id, "v1");
}

#[tokio::test]
async fn end_of_broadcast_emits_stop_collection() {
    let now = now();
    let store = InMemoryStateStore::new();
    let mut live = upcoming_broadcast(now);
    live.status = BroadcastStatus::Live;
    store.seed_broadcast(live).await;

    let platform = FakeVideoPlatformClient::new();
    platform
        .set_video_state(
            "v1",
            VideoState {
                live_broadcast_content: LiveBroadcastContent::None,
                has_live_streaming_details: true,
                title: "Stream".into(),
                description: String::new(),
                scheduled_start_time: None,
                actual_start_time: Some(now),
                actual_end_time: Some(now),
                concurrent_viewers: None,
            },
        )
        .await;

    let runtime = InMemoryWorkerRuntime::new();
    let bus = InMemoryTaskBus::new();

    youtube_chat_archiver_monitor::monitor_broadcast(&store, &platform, &runtime, &bus, "v1", now)
        .await
        .unwrap();

    let broadcast = store.broadcast("v1").await.unwrap();
    assert_eq!(broadcast.status, BroadcastStatus::Ended);

    let deliveries = bus.receive(10).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].message.action, ControlAction::StopCollection);
}

#[tokio::test]
async fn zombie_worker_is_reconciled_and_start_collection_reissued() {
    let now = now();
    let store = InMemoryStateStore::new();
    let mut live = upcoming_broadcast(now);
    live.status = BroadcastStatus::Live;
    store.seed_broadcast(live).await;

    let runtime = InMemoryWorkerRuntime::new();
    let handle = runtime
        .launch(WorkerSpec {
            video_id: "v1".into(),
            channel_id: "UCabc".into(),
            environment: "dev".into(),
        })
        .await
        .unwrap();
    store
        .seed_worker_task(WorkerTask {
            video_id: "v1".into(),
            channel_id: "UCabc".into(),
            status: WorkerTaskStatus::Running,
            task_handle: Some(handle.0.clone()),
            message_count: 0,
            started_at: Some(now),
            updated_at: now,
            stopped_at: None,
            finished_at: None,
        })
        .await;

    // Runtime loses track of the worker without the state store knowing.
    runtime.kill(&handle).await;

    let platform = FakeVideoPlatformClient::new();
    platform
        .set_video_state(
            "v1",
            VideoState {
                live_broadcast_content: LiveBroadcastContent::Live,
                has_live_streaming_details: true,
                title: "Stream".into(),
                description: String::new(),
                scheduled_start_time: None,
                actual_start_time: Some(now),
                actual_end_time: None,
                concurrent_viewers: None,
            },
        )
        .await;
    let bus = InMemoryTaskBus::new();

    youtube_chat_archiver_monitor::monitor_broadcast(&store, &platform, &runtime, &bus, "v1", now)
        .await
        .unwrap();

    let task = store.worker_task("v1").await.unwrap();
    assert_eq!(task.status, WorkerTaskStatus::Stopped);

    let deliveries = bus.receive(10).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].message.action, ControlAction::StartCollection);
}
