//! Narrow capability traits for every external collaborator (§9 design
//! notes: "Polymorphism over platform/runtime back-ends... expressed as
//! narrow capability sets... so tests can substitute in-memory fakes").
//!
//! No type in this module names an AWS SDK type or a YouTube wire format;
//! those live in `youtube-chat-archiver-aws`. Production code and tests
//! both depend only on these traits.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::Result;
use crate::model::{Broadcast, Channel, Message, WorkerTask};

/// One of the four tables in §3/§4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Channels,
    Broadcasts,
    WorkerTasks,
    Messages,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Channels => "Channels",
            Table::Broadcasts => "Broadcasts",
            Table::WorkerTasks => "WorkerTasks",
            Table::Messages => "Messages",
        }
    }
}

/// The §4.5 data-access contract, kept generic over the record shape by
/// splitting one method per entity rather than one generic method per
/// table, matching how the teacher's `PluginCallbacks` trait has one
/// method per message kind instead of a single dispatch function.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_channel(&self, channel_id: &str) -> Result<Option<Channel>>;
    async fn put_channel(&self, channel: Channel) -> Result<()>;
    /// Unconditional field-level update, e.g. toggling `is_active` or
    /// refreshing cached statistics.
    async fn update_channel_active(&self, channel_id: &str, is_active: bool) -> Result<()>;
    async fn list_active_channels(&self) -> Result<Vec<Channel>>;

    async fn get_broadcast(&self, video_id: &str) -> Result<Option<Broadcast>>;
    /// Idempotent insert; returns `Ok(false)` without error on a
    /// conditional-check miss (§4.1: "duplicate inserts... are allowed").
    async fn put_broadcast_if_absent(&self, broadcast: Broadcast) -> Result<bool>;
    async fn put_broadcast(&self, broadcast: Broadcast) -> Result<()>;
    /// Broadcasts whose status is still worth polling (§4.2 selection).
    async fn scan_monitorable_broadcasts(&self) -> Result<Vec<Broadcast>>;
    async fn broadcast_exists(&self, video_id: &str) -> Result<bool>;

    async fn get_worker_task(&self, video_id: &str) -> Result<Option<WorkerTask>>;
    async fn put_worker_task(&self, task: WorkerTask) -> Result<()>;

    /// Up to 25 records per call (§4.5, §6.5); partial success is
    /// allowed per-record within a batch.
    async fn batch_put_messages(&self, messages: Vec<Message>) -> Result<()>;
    /// Chronological retrieval via the `(video_id, timestamp)` index
    /// (§6.5).
    async fn query_messages_by_video(&self, video_id: &str) -> Result<Vec<Message>>;
}

/// Opaque identifier for a launched worker instance (§3/Glossary "task
/// handle").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub String);

/// Parameters a new worker is launched with (§4.4).
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub video_id: String,
    pub channel_id: String,
    pub environment: String,
}

/// A worker the runtime currently knows about, tagged with the `video_id`
/// it was launched for (§4.3 adoption path / §4.2 reconciliation).
#[derive(Debug, Clone)]
pub struct RunningWorker {
    pub task_handle: TaskHandle,
    pub video_id: String,
}

/// Launch/stop/list over isolated worker processes (§2 C2, §9: "treated
/// as an abstract `WorkerRuntime`").
#[async_trait]
pub trait WorkerRuntime: Send + Sync {
    async fn launch(&self, spec: WorkerSpec) -> Result<TaskHandle>;
    async fn stop(&self, handle: &TaskHandle, reason: &str) -> Result<()>;
    async fn list_running(&self) -> Result<Vec<RunningWorker>>;
    /// Whether a specific handle is still present among the running set
    /// (§4.2 reconciliation: "verify with the Worker Runtime that the
    /// referenced `task_handle` is actually running").
    async fn is_running(&self, handle: &TaskHandle) -> Result<bool> {
        Ok(self
            .list_running()
            .await?
            .iter()
            .any(|w| &w.task_handle == handle))
    }
}

/// `{start|stop, video_id, channel_id}` control message (§2 C3, §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    StartCollection,
    StopCollection,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ControlMessage {
    pub action: ControlAction,
    pub video_id: String,
    pub channel_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// A message handed back by [`TaskBus::receive`] together with its
/// delivery handle, so the dispatcher can `ack` only after it has
/// successfully processed it (at-least-once delivery, §6.4).
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: ControlMessage,
    pub receipt: String,
}

/// FIFO-ish queue carrying [`ControlMessage`]s between control loops and
/// the dispatcher (§2 C3).
#[async_trait]
pub trait TaskBus: Send + Sync {
    async fn send(&self, message: ControlMessage) -> Result<()>;
    /// Receive up to `max` messages; may return fewer, including zero,
    /// without that being an error (long-poll semantics).
    async fn receive(&self, max: usize) -> Result<Vec<Delivery>>;
    async fn ack(&self, receipt: &str) -> Result<()>;
}

/// Raw platform state for one video, before mapping to
/// [`crate::model::BroadcastStatus`] (§4.2 table, §6.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveBroadcastContent {
    Live,
    Upcoming,
    None,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct VideoState {
    pub live_broadcast_content: LiveBroadcastContent,
    pub has_live_streaming_details: bool,
    pub title: String,
    pub description: String,
    pub scheduled_start_time: Option<OffsetDateTime>,
    pub actual_start_time: Option<OffsetDateTime>,
    pub actual_end_time: Option<OffsetDateTime>,
    pub concurrent_viewers: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub video_id: String,
    pub title: String,
    pub published: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelMetadata {
    pub display_name: String,
    pub description: String,
    pub subscriber_count: Option<u64>,
    pub video_count: Option<u64>,
    pub view_count: Option<u64>,
    pub thumbnail_url: Option<String>,
}

/// The video-platform feed and control API (§6.1/§6.2).
#[async_trait]
pub trait VideoPlatformClient: Send + Sync {
    async fn fetch_channel_feed(&self, channel_id: &str) -> Result<Vec<FeedEntry>>;
    async fn fetch_video_state(&self, video_id: &str) -> Result<VideoState>;
    async fn fetch_channel_metadata(&self, channel_id: &str) -> Result<ChannelMetadata>;
}

/// One chat message as delivered by the live chat source (§6.3), prior to
/// being shaped into a [`Message`] record.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub platform_message_id: String,
    pub author_name: String,
    pub author_channel_id: String,
    pub body: String,
    pub datetime: OffsetDateTime,
    pub author_flags: crate::model::AuthorFlags,
}

/// An opaque live-chat subscription for a single broadcast (§6.3).
#[async_trait]
pub trait LiveChatSource: Send {
    fn is_alive(&self) -> bool;
    async fn poll(&mut self) -> Result<Vec<ChatEvent>>;
    async fn terminate(&mut self);
}

/// Opens a [`LiveChatSource`] for a given `video_id` (§4.4 step 1:
/// "Connect... up to 3 connection attempts").
#[async_trait]
pub trait LiveChatSourceFactory: Send + Sync {
    type Source: LiveChatSource;

    async fn connect(&self, video_id: &str) -> Result<Self::Source>;
}
