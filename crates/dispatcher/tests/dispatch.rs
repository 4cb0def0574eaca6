//! Seed scenario 5 ("Duplicate start", §8) and the stop-on-already-
//! stopped boundary behaviour.

use time::OffsetDateTime;

use youtube_chat_archiver_core::capability::WorkerRuntime;
use youtube_chat_archiver_core::model::{WorkerTask, WorkerTaskStatus};
use youtube_chat_archiver_testkit::{InMemoryStateStore, InMemoryWorkerRuntime};

fn now() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_753_531_200).unwrap()
}

#[tokio::test]
async fn concurrent_start_collection_results_in_exactly_one_worker() {
    let store = InMemoryStateStore::new();
    let runtime = InMemoryWorkerRuntime::new();
    let now = now();

    // Two concurrent deliveries for the same video_id (scanner-race /
    // retried-queue-delivery scenario).
    let (r1, r2) = tokio::join!(
        youtube_chat_archiver_dispatcher::start_collection(&store, &runtime, "v2", "UCabc", "dev", now),
        youtube_chat_archiver_dispatcher::start_collection(&store, &runtime, "v2", "UCabc", "dev", now),
    );
    r1.unwrap();
    r2.unwrap();

    let running = runtime.list_running().await.unwrap();
    assert_eq!(running.iter().filter(|w| w.video_id == "v2").count(), 1);
}

#[tokio::test]
async fn start_collection_is_idempotent_when_task_already_active() {
    let store = InMemoryStateStore::new();
    let runtime = InMemoryWorkerRuntime::new();
    let now = now();

    youtube_chat_archiver_dispatcher::start_collection(&store, &runtime, "v1", "UCabc", "dev", now)
        .await
        .unwrap();
    let first_count = runtime.list_running().await.unwrap().len();

    youtube_chat_archiver_dispatcher::start_collection(&store, &runtime, "v1", "UCabc", "dev", now)
        .await
        .unwrap();
    let second_count = runtime.list_running().await.unwrap().len();

    assert_eq!(first_count, second_count);
}

#[tokio::test]
async fn stop_collection_on_already_stopped_task_is_a_no_op() {
    let store = InMemoryStateStore::new();
    let runtime = InMemoryWorkerRuntime::new();
    let now = now();

    store
        .seed_worker_task(WorkerTask {
            video_id: "v1".into(),
            channel_id: "UCabc".into(),
            status: WorkerTaskStatus::Stopped,
            task_handle: None,
            message_count: 12,
            started_at: Some(now),
            updated_at: now,
            stopped_at: Some(now),
            finished_at: None,
        })
        .await;

    // No error is surfaced and the task is left exactly as it was.
    youtube_chat_archiver_dispatcher::stop_collection(&store, &runtime, "v1", now)
        .await
        .unwrap();

    let task = store.worker_task("v1").await.unwrap();
    assert_eq!(task.status, WorkerTaskStatus::Stopped);
    assert_eq!(task.message_count, 12);
}

#[tokio::test]
async fn stop_collection_stops_the_runtime_worker_and_updates_task() {
    let store = InMemoryStateStore::new();
    let runtime = InMemoryWorkerRuntime::new();
    let now = now();

    youtube_chat_archiver_dispatcher::start_collection(&store, &runtime, "v1", "UCabc", "dev", now)
        .await
        .unwrap();
    assert_eq!(runtime.list_running().await.unwrap().len(), 1);

    youtube_chat_archiver_dispatcher::stop_collection(&store, &runtime, "v1", now)
        .await
        .unwrap();

    assert_eq!(runtime.list_running().await.unwrap().len(), 0);
    let task = store.worker_task("v1").await.unwrap();
    assert_eq!(task.status, WorkerTaskStatus::Stopped);
}
