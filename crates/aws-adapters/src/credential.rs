//! Lazy, process-wide cached read of the YouTube API key from SSM
//! Parameter Store (§6.6 `YOUTUBE_API_KEY_PARAM`, §9 design note: "the
//! only process-wide mutable state is the cached upstream credential (one
//! lazy read on first use)").

use tokio::sync::OnceCell;
use tracing::debug;

use youtube_chat_archiver_core::error::{OrchestratorError, Result};

pub struct CachedApiKey {
    ssm: aws_sdk_ssm::Client,
    parameter_name: String,
    cached: OnceCell<String>,
}

impl CachedApiKey {
    pub fn new(ssm: aws_sdk_ssm::Client, parameter_name: impl Into<String>) -> Self {
        Self {
            ssm,
            parameter_name: parameter_name.into(),
            cached: OnceCell::new(),
        }
    }

    /// Resolve the API key, reading from SSM only on the first call.
    pub async fn get(&self) -> Result<&str> {
        self.cached
            .get_or_try_init(|| async {
                debug!(parameter = %self.parameter_name, "reading YouTube API key from parameter store");
                let response = self
                    .ssm
                    .get_parameter()
                    .name(&self.parameter_name)
                    .with_decryption(true)
                    .send()
                    .await
                    .map_err(|e| {
                        OrchestratorError::UpstreamPermanent(format!(
                            "failed to read {}: {e}",
                            self.parameter_name
                        ))
                    })?;
                response
                    .parameter
                    .and_then(|p| p.value)
                    .ok_or_else(|| {
                        OrchestratorError::UpstreamPermanent(format!(
                            "parameter {} has no value",
                            self.parameter_name
                        ))
                    })
            })
            .await
            .map(String::as_str)
    }
}
