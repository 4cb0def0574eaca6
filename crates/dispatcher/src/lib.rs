//! Dispatcher (C6, §4.3). Consumes the task bus and reconciles desired
//! start/stop state with the worker runtime.

use time::OffsetDateTime;
use tracing::{info, instrument};

use youtube_chat_archiver_core::capability::{
    ControlAction, ControlMessage, StateStore, TaskBus, TaskHandle, WorkerRuntime, WorkerSpec,
};
use youtube_chat_archiver_core::error::Result;
use youtube_chat_archiver_core::model::{WorkerTask, WorkerTaskStatus};

/// `start_collection` (§4.3): idempotent, adopts an already-running
/// worker tagged with the target `video_id` before launching a new one.
#[instrument(skip(store, runtime), fields(video_id = %video_id, channel_id = %channel_id))]
pub async fn start_collection(
    store: &dyn StateStore,
    runtime: &dyn WorkerRuntime,
    video_id: &str,
    channel_id: &str,
    environment: &str,
    now: OffsetDateTime,
) -> Result<()> {
    if let Some(existing) = store.get_worker_task(video_id).await? {
        if existing.status.counts_as_active() {
            info!(video_id, "start_collection is a no-op, worker already active");
            return Ok(());
        }
    }

    // Cross-check the runtime for an already-running worker tagged with
    // this video_id before launching a duplicate (§4.3 step 2, grounded
    // on `ecs_task_launcher/main.py::check_running_tasks_for_video`'s
    // "ECSクラスターでも重複チェック" belt-and-suspenders check).
    let running = runtime.list_running().await?;
    if let Some(adopted) = running.into_iter().find(|w| w.video_id == video_id) {
        info!(video_id, task_handle = %adopted.task_handle.0, "adopting already-running worker");
        store
            .put_worker_task(WorkerTask {
                video_id: video_id.to_string(),
                channel_id: channel_id.to_string(),
                status: WorkerTaskStatus::Collecting,
                task_handle: Some(adopted.task_handle.0),
                message_count: 0,
                started_at: Some(now),
                updated_at: now,
                stopped_at: None,
                finished_at: None,
            })
            .await?;
        return Ok(());
    }

    let handle = runtime
        .launch(WorkerSpec {
            video_id: video_id.to_string(),
            channel_id: channel_id.to_string(),
            environment: environment.to_string(),
        })
        .await?;

    info!(video_id, task_handle = %handle.0, "launched new collector worker");
    store
        .put_worker_task(WorkerTask {
            video_id: video_id.to_string(),
            channel_id: channel_id.to_string(),
            status: WorkerTaskStatus::Running,
            task_handle: Some(handle.0),
            message_count: 0,
            started_at: Some(now),
            updated_at: now,
            stopped_at: None,
            finished_at: None,
        })
        .await?;

    Ok(())
}

/// `stop_collection` (§4.3): no-op if the task is already inactive.
#[instrument(skip(store, runtime), fields(video_id = %video_id))]
pub async fn stop_collection(
    store: &dyn StateStore,
    runtime: &dyn WorkerRuntime,
    video_id: &str,
    now: OffsetDateTime,
) -> Result<()> {
    let Some(mut task) = store.get_worker_task(video_id).await? else {
        info!(video_id, "stop_collection is a no-op, no worker task on record");
        return Ok(());
    };

    if !task.status.counts_as_active() {
        info!(video_id, "stop_collection is a no-op, worker already inactive");
        return Ok(());
    }

    if let Some(handle) = task.task_handle.clone() {
        runtime.stop(&TaskHandle(handle), "broadcast ended").await?;
    }

    task.status = WorkerTaskStatus::Stopped;
    task.stopped_at = Some(now);
    task.updated_at = now;
    store.put_worker_task(task).await?;

    Ok(())
}

/// Dispatch a single control message (§4.3).
pub async fn dispatch(
    store: &dyn StateStore,
    runtime: &dyn WorkerRuntime,
    message: &ControlMessage,
    environment: &str,
    now: OffsetDateTime,
) -> Result<()> {
    match message.action {
        ControlAction::StartCollection => {
            start_collection(store, runtime, &message.video_id, &message.channel_id, environment, now).await
        }
        ControlAction::StopCollection => stop_collection(store, runtime, &message.video_id, now).await,
    }
}

/// Drain up to `max` deliveries from the bus, dispatching and acking each
/// on success. A dispatch failure leaves the message un-acked so the bus
/// redelivers it (§4.3 failure semantics).
pub async fn run_dispatcher_once(
    store: &dyn StateStore,
    runtime: &dyn WorkerRuntime,
    bus: &dyn TaskBus,
    environment: &str,
    max: usize,
    now: OffsetDateTime,
) -> Result<usize> {
    let deliveries = bus.receive(max).await?;
    let mut dispatched = 0;

    for delivery in deliveries {
        match dispatch(store, runtime, &delivery.message, environment, now).await {
            Ok(()) => {
                bus.ack(&delivery.receipt).await?;
                dispatched += 1;
            }
            Err(err) => {
                tracing::warn!(
                    video_id = %delivery.message.video_id,
                    error = %err,
                    "dispatch failed, leaving message for redelivery"
                );
            }
        }
    }

    Ok(dispatched)
}
