//! Feed Scanner (C4, §4.1).
//!
//! Runs once per invocation (the external trigger, EventBridge in
//! production, supplies the 5-minute cadence — see §5 "separately
//! scheduled short-lived task"). For each active channel: fetch the
//! public feed, reject stale/known entries, verify liveness against the
//! control API, and insert newly-detected broadcasts.

use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use youtube_chat_archiver_core::capability::{
    FeedEntry, LiveBroadcastContent, StateStore, VideoPlatformClient,
};
use youtube_chat_archiver_core::model::{Broadcast, BroadcastStatus};

/// Feed entries older than this are rejected even if otherwise a live
/// broadcast (§4.1 step 1, boundary in §8: "exactly 24h old -> rejected").
pub const MAX_ENTRY_AGE: Duration = Duration::hours(24);

/// How many of the feed's most recent entries to consider (§4.1).
pub const FEED_ENTRIES_CONSIDERED: usize = 5;

/// A video is a live broadcast iff `liveBroadcastContent` is `live` or
/// `upcoming`, falling back to presence of live-streaming details as a
/// tiebreak only (§4.1 step 3, §9 "Source ambiguity").
pub fn is_live_broadcast(content: &LiveBroadcastContent, has_live_streaming_details: bool) -> bool {
    match content {
        LiveBroadcastContent::Live | LiveBroadcastContent::Upcoming => true,
        LiveBroadcastContent::None | LiveBroadcastContent::Other(_) => has_live_streaming_details,
    }
}

fn recent_enough(entry: &FeedEntry, now: OffsetDateTime) -> bool {
    now - entry.published < MAX_ENTRY_AGE
}

/// Outcome of scanning one channel, returned for logging/testing rather
/// than swallowed, even though the caller never treats it as an error.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChannelScanOutcome {
    pub candidates_seen: usize,
    pub rejected_stale: usize,
    pub rejected_known: usize,
    pub rejected_not_live: usize,
    pub inserted: usize,
}

/// Scan a single channel's feed and insert any newly-detected broadcasts.
/// Per-channel failures are the caller's responsibility to catch (§4.1
/// failure policy): this function returns `Err` on the first upstream or
/// store failure rather than partially applying and swallowing errors
/// itself, so the caller can log-and-continue per item while still seeing
/// what happened.
#[instrument(skip(store, platform), fields(channel_id = %channel_id))]
pub async fn scan_channel(
    store: &dyn StateStore,
    platform: &dyn VideoPlatformClient,
    channel_id: &str,
    now: OffsetDateTime,
) -> youtube_chat_archiver_core::error::Result<ChannelScanOutcome> {
    let mut outcome = ChannelScanOutcome::default();

    let entries = platform.fetch_channel_feed(channel_id).await?;
    for entry in entries.into_iter().take(FEED_ENTRIES_CONSIDERED) {
        outcome.candidates_seen += 1;

        if !recent_enough(&entry, now) {
            outcome.rejected_stale += 1;
            continue;
        }

        if store.broadcast_exists(&entry.video_id).await? {
            outcome.rejected_known += 1;
            continue;
        }

        let state = platform.fetch_video_state(&entry.video_id).await?;
        if !is_live_broadcast(&state.live_broadcast_content, state.has_live_streaming_details) {
            outcome.rejected_not_live += 1;
            continue;
        }

        let broadcast = Broadcast {
            video_id: entry.video_id.clone(),
            channel_id: channel_id.to_string(),
            title: entry.title.clone(),
            description: String::new(),
            status: BroadcastStatus::Detected,
            scheduled_start_time: None,
            actual_start_time: None,
            actual_end_time: None,
            concurrent_viewers: None,
            created_at: now,
            updated_at: now,
        };

        // Conditional insert makes this idempotent under a race with the
        // state monitor or a re-run over an unchanged feed (§4.1, §8
        // round-trip law).
        if store.put_broadcast_if_absent(broadcast).await? {
            outcome.inserted += 1;
            info!(video_id = %entry.video_id, "detected new broadcast");
        } else {
            outcome.rejected_known += 1;
        }
    }

    Ok(outcome)
}

/// One full scanner invocation: every active channel, failures isolated
/// per-channel (§4.1 failure policy).
pub async fn run_scan(
    store: Arc<dyn StateStore>,
    platform: Arc<dyn VideoPlatformClient>,
    now: OffsetDateTime,
) -> youtube_chat_archiver_core::error::Result<usize> {
    let channels = store.list_active_channels().await?;
    let mut total_inserted = 0;

    for channel in channels {
        match scan_channel(store.as_ref(), platform.as_ref(), &channel.channel_id, now).await {
            Ok(outcome) => total_inserted += outcome.inserted,
            Err(err) => {
                warn!(channel_id = %channel.channel_id, error = %err, "feed scan failed for channel, skipping");
            }
        }
    }

    Ok(total_inserted)
}
