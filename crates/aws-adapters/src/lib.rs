//! Concrete, AWS-backed implementations of the capability traits in
//! `youtube_chat_archiver_core::capability`. Nothing outside this crate
//! should need to name an `aws-sdk-*` or `reqwest` type directly (§9,
//! SPEC_FULL.md "AMBIENT STACK").

pub mod credential;
pub mod dynamo;
pub mod ecs;
pub mod sqs;
pub mod youtube;

pub use credential::CachedApiKey;
pub use dynamo::DynamoStateStore;
pub use ecs::EcsWorkerRuntime;
pub use sqs::SqsTaskBus;
pub use youtube::{PollingLiveChatSourceFactory, YouTubeApiClient};
