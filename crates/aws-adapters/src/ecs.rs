//! `WorkerRuntime` backed by ECS Fargate (§2 C2, §6.6).
//!
//! Grounded on
//! `original_source/src/lambda/ecs_task_launcher/main.py`:
//! `launch_ecs_task` -> `run_task`, `check_running_tasks_for_video` ->
//! `list_tasks` + `describe_tasks` filtering container overrides for the
//! `VIDEO_ID` environment variable.

use async_trait::async_trait;
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, ContainerOverride, KeyValuePair, LaunchType,
    NetworkConfiguration, TaskOverride,
};
use aws_sdk_ecs::Client;

use youtube_chat_archiver_core::capability::{RunningWorker, TaskHandle, WorkerRuntime, WorkerSpec};
use youtube_chat_archiver_core::error::{OrchestratorError, Result};

/// Name of the single container in the task definition that receives the
/// `VIDEO_ID`/`CHANNEL_ID`/`ENVIRONMENT` overrides.
const CONTAINER_NAME: &str = "comment-collector";

pub struct EcsWorkerRuntime {
    client: Client,
    cluster: String,
    task_definition: String,
    subnets: Vec<String>,
    security_groups: Vec<String>,
}

impl EcsWorkerRuntime {
    pub fn new(
        client: Client,
        cluster: impl Into<String>,
        task_definition: impl Into<String>,
        subnets: Vec<String>,
        security_groups: Vec<String>,
    ) -> Self {
        Self {
            client,
            cluster: cluster.into(),
            task_definition: task_definition.into(),
            subnets,
            security_groups,
        }
    }

    fn map_sdk_error(context: &str) -> impl Fn(impl std::fmt::Display) -> OrchestratorError + '_ {
        move |e| OrchestratorError::WorkerRuntime(format!("{context}: {e}"))
    }

    /// Pull the `VIDEO_ID` tag back out of a task's container overrides
    /// (mirrors `check_running_tasks_for_video`'s env-var scan).
    fn video_id_of(task: &aws_sdk_ecs::types::Task) -> Option<String> {
        task.overrides()?
            .container_overrides()
            .iter()
            .flat_map(|c| c.environment())
            .find(|kv| kv.name() == Some("VIDEO_ID"))
            .and_then(|kv| kv.value())
            .map(str::to_string)
    }
}

#[async_trait]
impl WorkerRuntime for EcsWorkerRuntime {
    async fn launch(&self, spec: WorkerSpec) -> Result<TaskHandle> {
        let overrides = TaskOverride::builder()
            .container_overrides(
                ContainerOverride::builder()
                    .name(CONTAINER_NAME)
                    .environment(
                        KeyValuePair::builder()
                            .name("VIDEO_ID")
                            .value(&spec.video_id)
                            .build(),
                    )
                    .environment(
                        KeyValuePair::builder()
                            .name("CHANNEL_ID")
                            .value(&spec.channel_id)
                            .build(),
                    )
                    .environment(
                        KeyValuePair::builder()
                            .name("ENVIRONMENT")
                            .value(&spec.environment)
                            .build(),
                    )
                    .build(),
            )
            .build();

        let network_config = NetworkConfiguration::builder()
            .awsvpc_configuration(
                AwsVpcConfiguration::builder()
                    .set_subnets(Some(self.subnets.clone()))
                    .set_security_groups(Some(self.security_groups.clone()))
                    .assign_public_ip(AssignPublicIp::Enabled)
                    .build()
                    .map_err(Self::map_sdk_error("build network configuration"))?,
            )
            .build();

        let response = self
            .client
            .run_task()
            .cluster(&self.cluster)
            .task_definition(&self.task_definition)
            .launch_type(LaunchType::Fargate)
            .network_configuration(network_config)
            .overrides(overrides)
            .count(1)
            .send()
            .await
            .map_err(Self::map_sdk_error("run_task"))?;

        let failures = response.failures();
        if !failures.is_empty() {
            return Err(OrchestratorError::WorkerRuntime(format!(
                "run_task reported failures: {failures:?}"
            )));
        }

        let task = response
            .tasks()
            .first()
            .ok_or_else(|| OrchestratorError::WorkerRuntime("run_task returned no tasks".into()))?;
        let task_arn = task
            .task_arn()
            .ok_or_else(|| OrchestratorError::WorkerRuntime("launched task has no ARN".into()))?;

        Ok(TaskHandle(task_arn.to_string()))
    }

    async fn stop(&self, handle: &TaskHandle, reason: &str) -> Result<()> {
        let result = self
            .client
            .stop_task()
            .cluster(&self.cluster)
            .task(&handle.0)
            .reason(reason)
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            // Stopping a task that's already gone is benign (§7d).
            Err(e) if e.to_string().contains("not found") => Ok(()),
            Err(e) => Err(Self::map_sdk_error("stop_task")(e)),
        }
    }

    async fn list_running(&self) -> Result<Vec<RunningWorker>> {
        let arns_response = self
            .client
            .list_tasks()
            .cluster(&self.cluster)
            .desired_status(aws_sdk_ecs::types::DesiredStatus::Running)
            .send()
            .await
            .map_err(Self::map_sdk_error("list_tasks"))?;

        let arns = arns_response.task_arns();
        if arns.is_empty() {
            return Ok(Vec::new());
        }

        let described = self
            .client
            .describe_tasks()
            .cluster(&self.cluster)
            .set_tasks(Some(arns.to_vec()))
            .send()
            .await
            .map_err(Self::map_sdk_error("describe_tasks"))?;

        Ok(described
            .tasks()
            .iter()
            .filter_map(|task| {
                let video_id = Self::video_id_of(task)?;
                let task_arn = task.task_arn()?.to_string();
                Some(RunningWorker {
                    task_handle: TaskHandle(task_arn),
                    video_id,
                })
            })
            .collect())
    }
}
