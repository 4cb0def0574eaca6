//! Binary entry point for the Dispatcher (C6). Long-poll drains the task
//! bus and reconciles with the worker runtime (§4.3).

use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_ecs::Client as EcsClient;
use aws_sdk_sqs::Client as SqsClient;
use time::OffsetDateTime;
use tracing::info;

use youtube_chat_archiver_aws::{DynamoStateStore, EcsWorkerRuntime, SqsTaskBus};
use youtube_chat_archiver_core::capability::TaskBus;
use youtube_chat_archiver_core::config::{ControlLoopConfig, WorkerPlacementConfig};
use youtube_chat_archiver_core::logging::init_tracing;

const RECEIVE_BATCH_SIZE: usize = 10;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    init_tracing();

    let config = ControlLoopConfig::from_env()?;
    let placement = WorkerPlacementConfig::from_env()?;
    let aws_config = aws_config::load_from_env().await;

    let store = DynamoStateStore::new(DynamoClient::new(&aws_config), config.environment.environment.clone());
    let runtime = EcsWorkerRuntime::new(
        EcsClient::new(&aws_config),
        placement.cluster,
        placement.task_definition,
        placement.subnets,
        placement.security_groups,
    );
    let bus = SqsTaskBus::new(SqsClient::new(&aws_config), config.task_control_queue_url);

    // The dispatcher is invoked per-delivery by the queue trigger in
    // production; this loop drains whatever is currently available and
    // exits, mirroring a single Lambda invocation (§5, §6.6).
    loop {
        let dispatched = youtube_chat_archiver_dispatcher::run_dispatcher_once(
            &store,
            &runtime,
            &bus,
            &config.environment.environment,
            RECEIVE_BATCH_SIZE,
            OffsetDateTime::now_utc(),
        )
        .await?;
        info!(dispatched, "dispatcher batch complete");
        if dispatched == 0 && bus.receive(1).await?.is_empty() {
            break;
        }
    }

    Ok(())
}
