//! Binary entry point for the Chat Collector Worker (C7). One process per
//! broadcast, parameterised by `VIDEO_ID`/`CHANNEL_ID` (§6.6).

use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_ssm::Client as SsmClient;
use tracing::info;

use youtube_chat_archiver_aws::{CachedApiKey, DynamoStateStore, PollingLiveChatSourceFactory};
use youtube_chat_archiver_core::config::WorkerConfig;
use youtube_chat_archiver_core::logging::init_tracing;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    init_tracing();

    let config = WorkerConfig::from_env()?;
    let aws_config = aws_config::load_from_env().await;

    let store = DynamoStateStore::new(DynamoClient::new(&aws_config), config.environment.environment.clone());
    let api_key = CachedApiKey::new(SsmClient::new(&aws_config), config.youtube_api_key_param);
    let factory = PollingLiveChatSourceFactory::new(api_key)?;

    let total = youtube_chat_archiver_worker::run_worker(&store, &factory, &config.video_id, &config.channel_id).await?;
    info!(video_id = %config.video_id, total, "worker exiting");

    Ok(())
}
