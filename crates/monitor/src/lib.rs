//! State Monitor (C5, §4.2). Authoritative owner of `Broadcast.status`.
//!
//! Runs once per invocation (1-minute external cadence, §5). Selects
//! monitorable broadcasts belonging to active channels, maps the
//! upstream platform state to the internal status per the §4.2 table,
//! reconciles `WorkerTask` state against the worker runtime, and emits
//! start/stop control messages.

use std::collections::HashSet;
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use youtube_chat_archiver_core::capability::{
    ControlAction, ControlMessage, LiveBroadcastContent, StateStore, TaskBus, VideoPlatformClient,
    VideoState, WorkerRuntime,
};
use youtube_chat_archiver_core::error::Result;
use youtube_chat_archiver_core::model::{Broadcast, BroadcastStatus, WorkerTaskStatus};

/// Map the raw platform fields to the internal status, per the §4.2
/// table exactly: `liveBroadcastContent` is primary, `actualEndTime`
/// presence only disambiguates the `none` row.
pub fn map_status(state: &VideoState) -> BroadcastStatus {
    match state.live_broadcast_content {
        LiveBroadcastContent::Live => BroadcastStatus::Live,
        LiveBroadcastContent::Upcoming => BroadcastStatus::Upcoming,
        LiveBroadcastContent::None => {
            if state.actual_end_time.is_some() {
                BroadcastStatus::Ended
            } else {
                BroadcastStatus::NotLive
            }
        }
        LiveBroadcastContent::Other(_) => BroadcastStatus::Unknown,
    }
}

/// Apply a freshly-observed state onto an existing broadcast row,
/// following "never overwrite with empty" (§4.2 transition effects).
/// Guards §8 invariant 2: a mapped status the state graph forbids from the
/// current one is logged and ignored rather than written, since `Ended` is
/// immutable and no other backslide should reach the store either way.
fn apply_state(broadcast: &mut Broadcast, state: &VideoState, now: OffsetDateTime) {
    let mapped = map_status(state);
    if broadcast.status.can_transition_to(mapped) {
        broadcast.status = mapped;
    } else {
        warn!(
            video_id = %broadcast.video_id,
            from = ?broadcast.status,
            to = ?mapped,
            "upstream reported an illegal status transition, keeping recorded status"
        );
    }
    broadcast.title = state.title.clone();
    broadcast.description = state.description.clone();
    if let Some(viewers) = state.concurrent_viewers {
        broadcast.concurrent_viewers = Some(viewers);
    }
    if state.scheduled_start_time.is_some() {
        broadcast.scheduled_start_time = state.scheduled_start_time;
    }
    if state.actual_start_time.is_some() {
        broadcast.actual_start_time = state.actual_start_time;
    }
    if state.actual_end_time.is_some() {
        broadcast.actual_end_time = state.actual_end_time;
    }
    broadcast.updated_at = now;
}

/// Reconcile the recorded `WorkerTask` against the worker runtime's
/// observed reality (§4.2 "Reconciliation on each tick"). Returns `true`
/// if, after reconciliation, a healthy worker is known to exist for this
/// broadcast.
#[instrument(skip(store, runtime))]
async fn reconcile_worker(
    store: &dyn StateStore,
    runtime: &dyn WorkerRuntime,
    video_id: &str,
) -> Result<bool> {
    let Some(mut task) = store.get_worker_task(video_id).await? else {
        return Ok(false);
    };

    if !task.status.counts_as_active() {
        return Ok(false);
    }

    let Some(handle) = task.task_handle.clone().map(youtube_chat_archiver_core::capability::TaskHandle) else {
        return Ok(false);
    };

    if runtime.is_running(&handle).await? {
        return Ok(true);
    }

    warn!(video_id, "worker task marked active but runtime reports it gone, reconciling to stopped");
    task.status = WorkerTaskStatus::Stopped;
    task.stopped_at = Some(OffsetDateTime::now_utc());
    task.updated_at = OffsetDateTime::now_utc();
    store.put_worker_task(task).await?;
    Ok(false)
}

/// Process one broadcast: fetch authoritative state, apply transition
/// effects, reconcile, and emit control messages as needed.
#[instrument(skip(store, platform, runtime, bus), fields(video_id = %video_id))]
pub async fn monitor_broadcast(
    store: &dyn StateStore,
    platform: &dyn VideoPlatformClient,
    runtime: &dyn WorkerRuntime,
    bus: &dyn TaskBus,
    video_id: &str,
    now: OffsetDateTime,
) -> Result<()> {
    let Some(mut broadcast) = store.get_broadcast(video_id).await? else {
        return Ok(());
    };
    let previous_status = broadcast.status;

    let state = platform.fetch_video_state(video_id).await?;
    apply_state(&mut broadcast, &state, now);
    store.put_broadcast(broadcast.clone()).await?;

    if broadcast.status == BroadcastStatus::Live {
        let has_healthy_worker = reconcile_worker(store, runtime, video_id).await?;
        if !has_healthy_worker {
            info!(video_id, "broadcast is live with no healthy worker, emitting start_collection");
            bus.send(ControlMessage {
                action: ControlAction::StartCollection,
                video_id: video_id.to_string(),
                channel_id: broadcast.channel_id.clone(),
                timestamp: now,
            })
            .await?;
        }
    } else if previous_status == BroadcastStatus::Live && broadcast.status == BroadcastStatus::Ended {
        info!(video_id, "broadcast ended, emitting stop_collection");
        bus.send(ControlMessage {
            action: ControlAction::StopCollection,
            video_id: video_id.to_string(),
            channel_id: broadcast.channel_id.clone(),
            timestamp: now,
        })
        .await?;
    }

    Ok(())
}

/// One full monitor invocation: scan monitorable broadcasts belonging to
/// active channels (§4.2 selection: "two scans, filter in memory"),
/// process each, isolating per-broadcast failures (§7).
pub async fn run_monitor(
    store: Arc<dyn StateStore>,
    platform: Arc<dyn VideoPlatformClient>,
    runtime: Arc<dyn WorkerRuntime>,
    bus: Arc<dyn TaskBus>,
    now: OffsetDateTime,
) -> Result<usize> {
    let active_channels: HashSet<String> = store
        .list_active_channels()
        .await?
        .into_iter()
        .map(|c| c.channel_id)
        .collect();

    let broadcasts = store.scan_monitorable_broadcasts().await?;
    let mut processed = 0;

    for broadcast in broadcasts {
        if !active_channels.contains(&broadcast.channel_id) {
            continue;
        }
        match monitor_broadcast(
            store.as_ref(),
            platform.as_ref(),
            runtime.as_ref(),
            bus.as_ref(),
            &broadcast.video_id,
            now,
        )
        .await
        {
            Ok(()) => processed += 1,
            Err(err) => {
                warn!(video_id = %broadcast.video_id, error = %err, "state monitor tick failed for broadcast, skipping");
            }
        }
    }

    Ok(processed)
}
