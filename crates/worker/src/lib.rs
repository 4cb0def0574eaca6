//! Chat Collector Worker (C7, §4.4). A long-running process parameterised
//! by a single `video_id`/`channel_id`, run one-per-broadcast by the
//! Worker Runtime.

use std::time::Duration;

use rand::Rng;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use youtube_chat_archiver_core::capability::{LiveChatSource, LiveChatSourceFactory, StateStore};
use youtube_chat_archiver_core::error::{OrchestratorError, Result};
use youtube_chat_archiver_core::model::{AuthorFlags, Message, WorkerTask, WorkerTaskStatus};

const MAX_CONNECTION_ATTEMPTS: u32 = 3;
const CONNECTION_BACKOFF: Duration = Duration::from_secs(5);
const BATCH_SIZE: usize = 25;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Connect with bounded retry (§4.4 step 1): up to 3 attempts, 5s backoff
/// between failures, no backoff after the final attempt.
#[instrument(skip(factory), fields(video_id = %video_id))]
async fn connect_with_retry<F: LiveChatSourceFactory>(factory: &F, video_id: &str) -> Result<F::Source> {
    let mut last_err = None;
    for attempt in 1..=MAX_CONNECTION_ATTEMPTS {
        match factory.connect(video_id).await {
            Ok(source) => return Ok(source),
            Err(err) => {
                warn!(video_id, attempt, error = %err, "connection attempt failed");
                last_err = Some(err);
                if attempt < MAX_CONNECTION_ATTEMPTS {
                    tokio::time::sleep(CONNECTION_BACKOFF).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| OrchestratorError::UpstreamTransient("connect failed with no error recorded".into())))
}

fn to_message(video_id: &str, channel_id: &str, event: youtube_chat_archiver_core::capability::ChatEvent, now: OffsetDateTime) -> Message {
    Message {
        video_id: video_id.to_string(),
        channel_id: channel_id.to_string(),
        platform_message_id: event.platform_message_id,
        author_name: event.author_name,
        author_channel_id: event.author_channel_id,
        body: event.body,
        timestamp: event.datetime,
        datetime: event.datetime,
        author_flags: event.author_flags,
        created_at: now,
    }
}

/// Flush the buffer to the state store, retrying once before surfacing
/// failure (§4.4 batch-write guarantee).
async fn flush_buffer(store: &dyn StateStore, buffer: &mut Vec<Message>) -> Result<()> {
    if buffer.is_empty() {
        return Ok(());
    }
    let batch = std::mem::take(buffer);
    if let Err(first_err) = store.batch_put_messages(batch.clone()).await {
        warn!(error = %first_err, "batch write failed, retrying once");
        store.batch_put_messages(batch).await?;
    }
    Ok(())
}

async fn record_start(store: &dyn StateStore, video_id: &str, channel_id: &str, now: OffsetDateTime) -> Result<()> {
    store
        .put_worker_task(WorkerTask {
            video_id: video_id.to_string(),
            channel_id: channel_id.to_string(),
            status: WorkerTaskStatus::Collecting,
            task_handle: None,
            message_count: 0,
            started_at: Some(now),
            updated_at: now,
            stopped_at: None,
            finished_at: None,
        })
        .await
}

async fn mark_completed(store: &dyn StateStore, video_id: &str, channel_id: &str, message_count: u64, now: OffsetDateTime) -> Result<()> {
    let mut task = store
        .get_worker_task(video_id)
        .await?
        .unwrap_or_else(|| fresh_task(video_id, channel_id, now));
    task.status = WorkerTaskStatus::Completed;
    task.message_count = message_count;
    task.finished_at = Some(now);
    task.updated_at = now;
    store.put_worker_task(task).await
}

async fn mark_failed(store: &dyn StateStore, video_id: &str, channel_id: &str, message_count: u64, now: OffsetDateTime) -> Result<()> {
    let mut task = store
        .get_worker_task(video_id)
        .await?
        .unwrap_or_else(|| fresh_task(video_id, channel_id, now));
    task.status = WorkerTaskStatus::Failed;
    task.message_count = message_count;
    task.updated_at = now;
    store.put_worker_task(task).await
}

fn fresh_task(video_id: &str, channel_id: &str, now: OffsetDateTime) -> WorkerTask {
    WorkerTask {
        video_id: video_id.to_string(),
        channel_id: channel_id.to_string(),
        status: WorkerTaskStatus::Collecting,
        task_handle: None,
        message_count: 0,
        started_at: Some(now),
        updated_at: now,
        stopped_at: None,
        finished_at: None,
    }
}

/// Jittered inter-poll sleep, 1-2 seconds (§4.4 step 3).
async fn poll_jitter() {
    let millis = rand::rng().random_range(1_000..=2_000);
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

/// Run one worker to completion: connect, record start, main loop,
/// shutdown or abort. Returns the final message count.
///
/// Generic over [`LiveChatSourceFactory`] so tests substitute
/// `FakeLiveChatSourceFactory` without touching the polling HTTP client.
#[instrument(skip(store, factory), fields(video_id = %video_id))]
pub async fn run_worker<F: LiveChatSourceFactory>(
    store: &dyn StateStore,
    factory: &F,
    video_id: &str,
    channel_id: &str,
) -> Result<u64> {
    let now = OffsetDateTime::now_utc();

    let mut source = match connect_with_retry(factory, video_id).await {
        Ok(source) => source,
        Err(err) => {
            warn!(video_id, error = %err, "connection attempts exhausted, marking worker failed");
            mark_failed(store, video_id, channel_id, 0, OffsetDateTime::now_utc()).await?;
            return Err(err);
        }
    };

    record_start(store, video_id, channel_id, now).await?;
    info!(video_id, "worker recorded as collecting");

    let mut buffer = Vec::with_capacity(BATCH_SIZE);
    let mut total: u64 = 0;
    let mut last_heartbeat = std::time::Instant::now();

    let outcome = main_loop(store, &mut source, video_id, channel_id, &mut buffer, &mut total, &mut last_heartbeat).await;

    match outcome {
        Ok(()) => {
            source.terminate().await;
            let now = OffsetDateTime::now_utc();
            if let Err(err) = flush_buffer(store, &mut buffer).await {
                warn!(video_id, error = %err, "final flush failed during shutdown");
            }
            mark_completed(store, video_id, channel_id, total, now).await?;
            info!(video_id, total, "worker completed cleanly");
            Ok(total)
        }
        Err(err) => {
            warn!(video_id, error = %err, "worker aborting on fatal error");
            // Best-effort flush; a failure here must not mask the
            // original abort cause (§4.4 step 5).
            let _ = flush_buffer(store, &mut buffer).await;
            mark_failed(store, video_id, channel_id, total, OffsetDateTime::now_utc()).await?;
            Err(err)
        }
    }
}

async fn main_loop<S: LiveChatSource>(
    store: &dyn StateStore,
    source: &mut S,
    video_id: &str,
    channel_id: &str,
    buffer: &mut Vec<Message>,
    total: &mut u64,
    last_heartbeat: &mut std::time::Instant,
) -> Result<()> {
    while source.is_alive() {
        match source.poll().await {
            Ok(events) => {
                let now = OffsetDateTime::now_utc();
                for event in events {
                    buffer.push(to_message(video_id, channel_id, event, now));
                    *total += 1;
                    if buffer.len() >= BATCH_SIZE {
                        flush_buffer(store, buffer).await?;
                    }
                }
            }
            Err(err) => {
                // Per-poll errors are recoverable: log and retry on the
                // next tick (§4.4 step 3).
                warn!(video_id, error = %err, "poll failed, retrying next tick");
            }
        }

        if last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
            if let Some(mut task) = store.get_worker_task(video_id).await? {
                task.message_count = *total;
                task.updated_at = OffsetDateTime::now_utc();
                store.put_worker_task(task).await?;
            }
            *last_heartbeat = std::time::Instant::now();
        }

        poll_jitter().await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use youtube_chat_archiver_core::capability::ChatEvent;
    use youtube_chat_archiver_testkit::{FakeLiveChatSourceFactory, InMemoryStateStore};

    fn event(id: &str) -> ChatEvent {
        ChatEvent {
            platform_message_id: id.to_string(),
            author_name: "alice".into(),
            author_channel_id: "uc-alice".into(),
            body: "hi".into(),
            datetime: OffsetDateTime::now_utc(),
            author_flags: AuthorFlags::default(),
        }
    }

    #[tokio::test]
    async fn collects_messages_across_multiple_polls_and_marks_completed() {
        let store = InMemoryStateStore::new();
        let batches = vec![
            (0..20).map(|i| event(&format!("m{i}"))).collect(),
            (20..50).map(|i| event(&format!("m{i}"))).collect(),
            (50..60).map(|i| event(&format!("m{i}"))).collect(),
        ];
        let factory = FakeLiveChatSourceFactory::new(batches);

        let total = run_worker(&store, &factory, "v1", "UCabc").await.unwrap();
        assert_eq!(total, 60);

        let messages = store.all_messages().await;
        assert_eq!(messages.len(), 60);

        let task = store.worker_task("v1").await.unwrap();
        assert_eq!(task.status, WorkerTaskStatus::Completed);
        assert_eq!(task.message_count, 60);
    }

    #[tokio::test]
    async fn buffer_of_exactly_batch_size_is_flushed_immediately() {
        let store = InMemoryStateStore::new();
        let batches = vec![(0..BATCH_SIZE).map(|i| event(&format!("m{i}"))).collect()];
        let factory = FakeLiveChatSourceFactory::new(batches);

        run_worker(&store, &factory, "v1", "UCabc").await.unwrap();

        // The flush inside the loop already wrote all 25 before shutdown
        // ran its own (now empty) flush.
        assert_eq!(store.all_messages().await.len(), BATCH_SIZE);
    }

    #[tokio::test]
    async fn stream_closing_before_any_message_completes_with_zero_count() {
        let store = InMemoryStateStore::new();
        let factory = FakeLiveChatSourceFactory::new(vec![]);

        let total = run_worker(&store, &factory, "v1", "UCabc").await.unwrap();
        assert_eq!(total, 0);

        let task = store.worker_task("v1").await.unwrap();
        assert_eq!(task.status, WorkerTaskStatus::Completed);
        assert_eq!(task.message_count, 0);
    }

    #[tokio::test]
    async fn connection_retry_exhaustion_marks_worker_failed() {
        let store = InMemoryStateStore::new();
        let factory = FakeLiveChatSourceFactory::always_fails();

        let result = run_worker(&store, &factory, "v1", "UCabc").await;
        assert!(result.is_err());

        let task = store.worker_task("v1").await.unwrap();
        assert_eq!(task.status, WorkerTaskStatus::Failed);
    }

    #[tokio::test]
    async fn connects_successfully_after_transient_failures() {
        let store = InMemoryStateStore::new();
        let factory = FakeLiveChatSourceFactory::failing_n_times(2, vec![vec![event("m0")]]);

        let total = run_worker(&store, &factory, "v1", "UCabc").await.unwrap();
        assert_eq!(total, 1);
    }
}
