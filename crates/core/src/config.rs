//! Per-process configuration (§6.6).
//!
//! Each binary builds the slice of [`OrchestratorConfig`] it actually needs
//! at startup and fails fast (a [`crate::OrchestratorError::Programmer`])
//! if a required variable is missing, rather than discovering it mid-run.

use crate::error::{OrchestratorError, Result};

fn require_env(name: &'static str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| OrchestratorError::Programmer(format!("missing required env var {name}")))
}

fn optional_env(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Configuration shared by every binary: which environment's tables to
/// address (§6.6 `ENVIRONMENT`).
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
}

impl EnvironmentConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            environment: optional_env("ENVIRONMENT", "dev"),
        })
    }

    /// `{env}-Channels`, `{env}-Broadcasts`, etc. (§6.6).
    pub fn table_name(&self, table: crate::capability::Table) -> String {
        format!("{}-{}", self.environment, table.name())
    }
}

/// Scanner/monitor/dispatcher configuration: where the task bus lives and
/// which credential parameter to read.
#[derive(Debug, Clone)]
pub struct ControlLoopConfig {
    pub environment: EnvironmentConfig,
    pub task_control_queue_url: String,
    pub youtube_api_key_param: String,
}

impl ControlLoopConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            environment: EnvironmentConfig::from_env()?,
            task_control_queue_url: require_env("TASK_CONTROL_QUEUE_URL")?,
            youtube_api_key_param: optional_env(
                "YOUTUBE_API_KEY_PARAM",
                "/dev/youtube-chat-archiver/youtube-api-key",
            ),
        })
    }
}

/// Dispatcher-only configuration: where new workers get placed (§6.6).
#[derive(Debug, Clone)]
pub struct WorkerPlacementConfig {
    pub cluster: String,
    pub task_definition: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
}

impl WorkerPlacementConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            cluster: require_env("WORKER_CLUSTER")?,
            task_definition: require_env("WORKER_TASK_DEFINITION")?,
            subnets: split_csv(&require_env("WORKER_SUBNETS")?),
            security_groups: split_csv(&require_env("WORKER_SECURITY_GROUPS")?),
        })
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Worker parameterisation (§6.6 `VIDEO_ID`, `CHANNEL_ID`).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub environment: EnvironmentConfig,
    pub video_id: String,
    pub channel_id: String,
    pub youtube_api_key_param: String,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            environment: EnvironmentConfig::from_env()?,
            video_id: require_env("VIDEO_ID")?,
            channel_id: require_env("CHANNEL_ID")?,
            youtube_api_key_param: optional_env(
                "YOUTUBE_API_KEY_PARAM",
                "/dev/youtube-chat-archiver/youtube-api-key",
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_is_prefixed_with_environment() {
        let cfg = EnvironmentConfig {
            environment: "prod".to_string(),
        };
        assert_eq!(
            cfg.table_name(crate::capability::Table::Broadcasts),
            "prod-Broadcasts"
        );
    }

    #[test]
    fn split_csv_trims_and_drops_empties() {
        assert_eq!(
            split_csv("subnet-1, subnet-2,, subnet-3 "),
            vec!["subnet-1", "subnet-2", "subnet-3"]
        );
    }
}
