//! Binary entry point for the State Monitor (C5). One invocation = one
//! pass over every monitorable broadcast (§4.2); the external trigger
//! supplies the 1-minute cadence (§5).

use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_ecs::Client as EcsClient;
use aws_sdk_sqs::Client as SqsClient;
use aws_sdk_ssm::Client as SsmClient;
use time::OffsetDateTime;
use tracing::info;

use youtube_chat_archiver_aws::{CachedApiKey, DynamoStateStore, EcsWorkerRuntime, SqsTaskBus, YouTubeApiClient};
use youtube_chat_archiver_core::config::{ControlLoopConfig, WorkerPlacementConfig};
use youtube_chat_archiver_core::logging::init_tracing;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    init_tracing();

    let config = ControlLoopConfig::from_env()?;
    let placement = WorkerPlacementConfig::from_env()?;
    let aws_config = aws_config::load_from_env().await;

    let store = Arc::new(DynamoStateStore::new(
        DynamoClient::new(&aws_config),
        config.environment.environment.clone(),
    ));
    let api_key = CachedApiKey::new(SsmClient::new(&aws_config), config.youtube_api_key_param);
    let platform = Arc::new(YouTubeApiClient::new(api_key)?);
    let runtime = Arc::new(EcsWorkerRuntime::new(
        EcsClient::new(&aws_config),
        placement.cluster,
        placement.task_definition,
        placement.subnets,
        placement.security_groups,
    ));
    let bus = Arc::new(SqsTaskBus::new(SqsClient::new(&aws_config), config.task_control_queue_url));

    let processed = youtube_chat_archiver_monitor::run_monitor(
        store,
        platform,
        runtime,
        bus,
        OffsetDateTime::now_utc(),
    )
    .await?;
    info!(processed, "state monitor tick complete");

    Ok(())
}
