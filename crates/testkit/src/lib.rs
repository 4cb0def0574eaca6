//! In-memory fakes for every capability trait in
//! `youtube_chat_archiver_core::capability`, grounded on the teacher's
//! `touchportal_sdk::mock` module: shared state behind `Arc<Mutex<_>>`,
//! plain data structures instead of a real backend, so control loops and
//! the worker can be exercised without AWS credentials or network access.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use youtube_chat_archiver_core::capability::{
    ChannelMetadata, ChatEvent, ControlMessage, Delivery, FeedEntry, LiveChatSource,
    LiveChatSourceFactory, RunningWorker, StateStore, TaskBus, TaskHandle, VideoPlatformClient,
    VideoState, WorkerRuntime, WorkerSpec,
};
use youtube_chat_archiver_core::error::{OrchestratorError, Result};
use youtube_chat_archiver_core::model::{Broadcast, Channel, Message, WorkerTask};

/// An in-memory stand-in for the four DynamoDB-backed tables (§4.5).
#[derive(Debug, Default, Clone)]
pub struct InMemoryStateStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    channels: HashMap<String, Channel>,
    broadcasts: HashMap<String, Broadcast>,
    worker_tasks: HashMap<String, WorkerTask>,
    messages: Vec<Message>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_channel(&self, channel: Channel) {
        self.inner.lock().await.channels.insert(channel.channel_id.clone(), channel);
    }

    pub async fn seed_broadcast(&self, broadcast: Broadcast) {
        self.inner
            .lock()
            .await
            .broadcasts
            .insert(broadcast.video_id.clone(), broadcast);
    }

    pub async fn seed_worker_task(&self, task: WorkerTask) {
        self.inner
            .lock()
            .await
            .worker_tasks
            .insert(task.video_id.clone(), task);
    }

    pub async fn all_messages(&self) -> Vec<Message> {
        self.inner.lock().await.messages.clone()
    }

    pub async fn worker_task(&self, video_id: &str) -> Option<WorkerTask> {
        self.inner.lock().await.worker_tasks.get(video_id).cloned()
    }

    pub async fn broadcast(&self, video_id: &str) -> Option<Broadcast> {
        self.inner.lock().await.broadcasts.get(video_id).cloned()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_channel(&self, channel_id: &str) -> Result<Option<Channel>> {
        Ok(self.inner.lock().await.channels.get(channel_id).cloned())
    }

    async fn put_channel(&self, channel: Channel) -> Result<()> {
        self.inner.lock().await.channels.insert(channel.channel_id.clone(), channel);
        Ok(())
    }

    async fn update_channel_active(&self, channel_id: &str, is_active: bool) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let Some(channel) = guard.channels.get_mut(channel_id) else {
            return Err(OrchestratorError::StateStore(format!(
                "no such channel {channel_id}"
            )));
        };
        channel.is_active = is_active;
        Ok(())
    }

    async fn list_active_channels(&self) -> Result<Vec<Channel>> {
        Ok(self
            .inner
            .lock()
            .await
            .channels
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    async fn get_broadcast(&self, video_id: &str) -> Result<Option<Broadcast>> {
        Ok(self.inner.lock().await.broadcasts.get(video_id).cloned())
    }

    async fn put_broadcast_if_absent(&self, broadcast: Broadcast) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        if guard.broadcasts.contains_key(&broadcast.video_id) {
            return Ok(false);
        }
        guard.broadcasts.insert(broadcast.video_id.clone(), broadcast);
        Ok(true)
    }

    async fn put_broadcast(&self, broadcast: Broadcast) -> Result<()> {
        self.inner
            .lock()
            .await
            .broadcasts
            .insert(broadcast.video_id.clone(), broadcast);
        Ok(())
    }

    async fn scan_monitorable_broadcasts(&self) -> Result<Vec<Broadcast>> {
        Ok(self
            .inner
            .lock()
            .await
            .broadcasts
            .values()
            .filter(|b| b.status.is_monitorable())
            .cloned()
            .collect())
    }

    async fn broadcast_exists(&self, video_id: &str) -> Result<bool> {
        Ok(self.inner.lock().await.broadcasts.contains_key(video_id))
    }

    async fn get_worker_task(&self, video_id: &str) -> Result<Option<WorkerTask>> {
        Ok(self.inner.lock().await.worker_tasks.get(video_id).cloned())
    }

    async fn put_worker_task(&self, task: WorkerTask) -> Result<()> {
        self.inner
            .lock()
            .await
            .worker_tasks
            .insert(task.video_id.clone(), task);
        Ok(())
    }

    async fn batch_put_messages(&self, messages: Vec<Message>) -> Result<()> {
        if messages.len() > 25 {
            return Err(OrchestratorError::Programmer(
                "batch_put_messages called with more than 25 records".into(),
            ));
        }
        self.inner.lock().await.messages.extend(messages);
        Ok(())
    }

    async fn query_messages_by_video(&self, video_id: &str) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .inner
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.video_id == video_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}

/// An in-memory stand-in for the ECS-backed [`WorkerRuntime`], letting
/// tests simulate a "zombie" worker by removing an entry directly.
#[derive(Debug, Default, Clone)]
pub struct InMemoryWorkerRuntime {
    running: Arc<Mutex<HashMap<String, String>>>,
    next_handle: Arc<Mutex<u64>>,
    pub fail_next_launch: Arc<Mutex<bool>>,
}

impl InMemoryWorkerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directly remove a running worker, simulating a crash the runtime
    /// has already noticed but the state store has not yet reconciled
    /// (§8 "zombie worker" scenario).
    pub async fn kill(&self, handle: &TaskHandle) {
        self.running.lock().await.remove(&handle.0);
    }

    pub async fn set_fail_next_launch(&self, fail: bool) {
        *self.fail_next_launch.lock().await = fail;
    }
}

#[async_trait]
impl WorkerRuntime for InMemoryWorkerRuntime {
    async fn launch(&self, spec: WorkerSpec) -> Result<TaskHandle> {
        if std::mem::take(&mut *self.fail_next_launch.lock().await) {
            return Err(OrchestratorError::WorkerRuntime("launch rejected".into()));
        }
        let mut counter = self.next_handle.lock().await;
        *counter += 1;
        let handle = TaskHandle(format!("task-{}", *counter));
        self.running
            .lock()
            .await
            .insert(handle.0.clone(), spec.video_id);
        Ok(handle)
    }

    async fn stop(&self, handle: &TaskHandle, _reason: &str) -> Result<()> {
        self.running.lock().await.remove(&handle.0);
        Ok(())
    }

    async fn list_running(&self) -> Result<Vec<RunningWorker>> {
        Ok(self
            .running
            .lock()
            .await
            .iter()
            .map(|(handle, video_id)| RunningWorker {
                task_handle: TaskHandle(handle.clone()),
                video_id: video_id.clone(),
            })
            .collect())
    }
}

/// An in-memory FIFO queue with at-least-once-flavoured `receive`: a
/// message stays enqueued until [`TaskBus::ack`] is called with its
/// receipt, matching the real SQS contract.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTaskBus {
    inner: Arc<Mutex<TaskBusInner>>,
}

#[derive(Debug, Default)]
struct TaskBusInner {
    queue: VecDeque<(String, ControlMessage)>,
    next_receipt: u64,
}

impl InMemoryTaskBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TaskBus for InMemoryTaskBus {
    async fn send(&self, message: ControlMessage) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let receipt = guard.next_receipt.to_string();
        guard.next_receipt += 1;
        guard.queue.push_back((receipt, message));
        Ok(())
    }

    async fn receive(&self, max: usize) -> Result<Vec<Delivery>> {
        let guard = self.inner.lock().await;
        Ok(guard
            .queue
            .iter()
            .take(max)
            .map(|(receipt, message)| Delivery {
                message: message.clone(),
                receipt: receipt.clone(),
            })
            .collect())
    }

    async fn ack(&self, receipt: &str) -> Result<()> {
        self.inner.lock().await.queue.retain(|(r, _)| r != receipt);
        Ok(())
    }
}

/// A scripted [`VideoPlatformClient`]: tests push the feed/state/metadata
/// they want returned, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct FakeVideoPlatformClient {
    feeds: Arc<Mutex<HashMap<String, Vec<FeedEntry>>>>,
    states: Arc<Mutex<HashMap<String, VideoState>>>,
    metadata: Arc<Mutex<HashMap<String, ChannelMetadata>>>,
    pub fail_video_state_for: Arc<Mutex<Option<String>>>,
}

impl FakeVideoPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_feed(&self, channel_id: &str, entries: Vec<FeedEntry>) {
        self.feeds.lock().await.insert(channel_id.to_string(), entries);
    }

    pub async fn set_video_state(&self, video_id: &str, state: VideoState) {
        self.states.lock().await.insert(video_id.to_string(), state);
    }

    pub async fn set_channel_metadata(&self, channel_id: &str, metadata: ChannelMetadata) {
        self.metadata
            .lock()
            .await
            .insert(channel_id.to_string(), metadata);
    }
}

#[async_trait]
impl VideoPlatformClient for FakeVideoPlatformClient {
    async fn fetch_channel_feed(&self, channel_id: &str) -> Result<Vec<FeedEntry>> {
        Ok(self
            .feeds
            .lock()
            .await
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_video_state(&self, video_id: &str) -> Result<VideoState> {
        if self.fail_video_state_for.lock().await.as_deref() == Some(video_id) {
            return Err(OrchestratorError::UpstreamTransient(format!(
                "simulated failure fetching state for {video_id}"
            )));
        }
        self.states
            .lock()
            .await
            .get(video_id)
            .cloned()
            .ok_or_else(|| {
                OrchestratorError::UpstreamPermanent(format!("no such video {video_id}"))
            })
    }

    async fn fetch_channel_metadata(&self, channel_id: &str) -> Result<ChannelMetadata> {
        Ok(self
            .metadata
            .lock()
            .await
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// A scripted [`LiveChatSource`]: `poll()` returns successive batches from
/// a pre-loaded queue, then reports itself dead once exhausted.
#[derive(Debug, Clone)]
pub struct FakeLiveChatSource {
    batches: Arc<Mutex<VecDeque<Vec<ChatEvent>>>>,
    alive: Arc<std::sync::atomic::AtomicBool>,
}

impl FakeLiveChatSource {
    pub fn new(batches: Vec<Vec<ChatEvent>>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(batches.into())),
            alive: Arc::new(std::sync::atomic::AtomicBool::new(true)),
        }
    }
}

#[async_trait]
impl LiveChatSource for FakeLiveChatSource {
    fn is_alive(&self) -> bool {
        self.alive.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn poll(&mut self) -> Result<Vec<ChatEvent>> {
        let mut guard = self.batches.lock().await;
        let batch = guard.pop_front().unwrap_or_default();
        if guard.is_empty() {
            self.alive.store(false, std::sync::atomic::Ordering::SeqCst);
        }
        Ok(batch)
    }

    async fn terminate(&mut self) {
        self.alive.store(false, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Hands out a single pre-scripted [`FakeLiveChatSource`], or fails
/// `connect` a fixed number of times first to exercise the worker's
/// connection-retry path (§4.4 step 1).
#[derive(Debug, Clone)]
pub struct FakeLiveChatSourceFactory {
    batches: Vec<Vec<ChatEvent>>,
    failures_before_success: Arc<Mutex<u32>>,
}

impl FakeLiveChatSourceFactory {
    pub fn new(batches: Vec<Vec<ChatEvent>>) -> Self {
        Self {
            batches,
            failures_before_success: Arc::new(Mutex::new(0)),
        }
    }

    pub fn always_fails() -> Self {
        Self {
            batches: Vec::new(),
            failures_before_success: Arc::new(Mutex::new(u32::MAX)),
        }
    }

    pub fn failing_n_times(n: u32, batches: Vec<Vec<ChatEvent>>) -> Self {
        Self {
            batches,
            failures_before_success: Arc::new(Mutex::new(n)),
        }
    }
}

#[async_trait]
impl LiveChatSourceFactory for FakeLiveChatSourceFactory {
    type Source = FakeLiveChatSource;

    async fn connect(&self, _video_id: &str) -> Result<Self::Source> {
        let mut remaining = self.failures_before_success.lock().await;
        if *remaining > 0 {
            *remaining -= 1;
            return Err(OrchestratorError::UpstreamTransient(
                "simulated connection failure".into(),
            ));
        }
        Ok(FakeLiveChatSource::new(self.batches.clone()))
    }
}
