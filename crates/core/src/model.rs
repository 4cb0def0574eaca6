//! The four persisted entities (§3): Channel, Broadcast, WorkerTask, Message.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A channel an operator has registered for monitoring.
///
/// "Deletion" is `is_active = false`; rows are never removed so cached
/// statistics and history survive a channel being paused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub channel_id: String,
    pub display_name: String,
    pub description: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub subscriber_count: Option<u64>,
    pub video_count: Option<u64>,
    pub view_count: Option<u64>,
    pub thumbnail_url: Option<String>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub api_retrieved_at: Option<OffsetDateTime>,
}

/// Authoritative lifecycle status of a [`Broadcast`].
///
/// Transitions are one-directional and enforced by the state monitor
/// (§4.2, invariant 2 in §8): `Detected -> {Upcoming, Live, NotLive, Ended,
/// Unknown}`, `Upcoming -> {Live, Ended, NotLive}`, `Live -> Ended`. Nothing
/// transitions out of `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastStatus {
    Detected,
    Upcoming,
    Live,
    Ended,
    NotLive,
    Unknown,
}

impl BroadcastStatus {
    /// Rows in these states are still worth polling; see §4.2 selection.
    pub fn is_monitorable(self) -> bool {
        matches!(
            self,
            BroadcastStatus::Detected | BroadcastStatus::Upcoming | BroadcastStatus::Live
        )
    }

    /// `Ended` broadcasts are immutable (§3 invariant) and excluded from
    /// further monitoring.
    pub fn is_terminal(self) -> bool {
        matches!(self, BroadcastStatus::Ended)
    }

    /// Whether `next` is a legal successor of `self` per §8 invariant 2.
    pub fn can_transition_to(self, next: BroadcastStatus) -> bool {
        use BroadcastStatus::*;
        if self == next {
            return true;
        }
        match self {
            Detected => matches!(next, Upcoming | Live | NotLive | Ended | Unknown),
            Upcoming => matches!(next, Live | Ended | NotLive),
            Live => matches!(next, Ended),
            Ended => false,
            NotLive | Unknown => matches!(next, Detected | Upcoming | Live | Ended | Unknown),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    pub video_id: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub status: BroadcastStatus,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub scheduled_start_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub actual_start_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub actual_end_time: Option<OffsetDateTime>,
    pub concurrent_viewers: Option<u64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Status of the per-broadcast worker process (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerTaskStatus {
    Running,
    Collecting,
    Stopped,
    Completed,
    Failed,
}

impl WorkerTaskStatus {
    /// Whether a worker in this state counts toward the "at most one
    /// running worker per `video_id`" invariant (§8 invariant 1).
    pub fn counts_as_active(self) -> bool {
        matches!(self, WorkerTaskStatus::Running | WorkerTaskStatus::Collecting)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerTask {
    pub video_id: String,
    pub channel_id: String,
    pub status: WorkerTaskStatus,
    pub task_handle: Option<String>,
    pub message_count: u64,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub stopped_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub finished_at: Option<OffsetDateTime>,
}

impl WorkerTask {
    pub fn key(video_id: impl Into<String>) -> String {
        video_id.into()
    }
}

/// Author role flags carried on every chat message (§6.3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorFlags {
    pub is_owner: bool,
    pub is_moderator: bool,
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub video_id: String,
    pub channel_id: String,
    pub platform_message_id: String,
    pub author_name: String,
    pub author_channel_id: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub datetime: OffsetDateTime,
    #[serde(flatten)]
    pub author_flags: AuthorFlags,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    /// Primary key: `{video_id}#{platform_message_id}` (§3).
    pub fn message_id(&self) -> String {
        format!("{}#{}", self.video_id, self.platform_message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_status_transitions_follow_the_state_machine() {
        use BroadcastStatus::*;
        assert!(Detected.can_transition_to(Upcoming));
        assert!(Detected.can_transition_to(Live));
        assert!(Upcoming.can_transition_to(Live));
        assert!(Live.can_transition_to(Ended));
        assert!(!Ended.can_transition_to(Live));
        assert!(!Ended.can_transition_to(Detected));
        assert!(!Live.can_transition_to(Upcoming));
    }

    #[test]
    fn message_id_joins_video_and_platform_ids() {
        let m = Message {
            video_id: "v1".into(),
            channel_id: "c1".into(),
            platform_message_id: "pm-1".into(),
            author_name: "alice".into(),
            author_channel_id: "uc-alice".into(),
            body: "hi".into(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            datetime: OffsetDateTime::UNIX_EPOCH,
            author_flags: AuthorFlags::default(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        assert_eq!(m.message_id(), "v1#pm-1");
    }

    #[test]
    fn worker_task_status_counts_active_correctly() {
        assert!(WorkerTaskStatus::Running.counts_as_active());
        assert!(WorkerTaskStatus::Collecting.counts_as_active());
        assert!(!WorkerTaskStatus::Stopped.counts_as_active());
        assert!(!WorkerTaskStatus::Completed.counts_as_active());
        assert!(!WorkerTaskStatus::Failed.counts_as_active());
    }
}
