//! Binary entry point for the Feed Scanner (C4). One invocation = one
//! pass over every active channel (§4.1); the external trigger supplies
//! the 5-minute cadence (§5).

use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_ssm::Client as SsmClient;
use time::OffsetDateTime;
use tracing::info;

use youtube_chat_archiver_aws::{CachedApiKey, DynamoStateStore, YouTubeApiClient};
use youtube_chat_archiver_core::config::ControlLoopConfig;
use youtube_chat_archiver_core::logging::init_tracing;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    init_tracing();

    let config = ControlLoopConfig::from_env()?;
    let aws_config = aws_config::load_from_env().await;

    let store = Arc::new(DynamoStateStore::new(
        DynamoClient::new(&aws_config),
        config.environment.environment.clone(),
    ));
    let api_key = CachedApiKey::new(SsmClient::new(&aws_config), config.youtube_api_key_param);
    let platform = Arc::new(YouTubeApiClient::new(api_key)?);

    let inserted = youtube_chat_archiver_scanner::run_scan(store, platform, OffsetDateTime::now_utc()).await?;
    info!(inserted, "feed scan complete");

    // Control-loop tasks exit 0 always; per-item failures are logged and
    // skipped rather than propagated (§6.6, §7).
    Ok(())
}
