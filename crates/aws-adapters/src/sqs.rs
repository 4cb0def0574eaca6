//! `TaskBus` backed by SQS (§2 C3, §6.4).
//!
//! At-least-once delivery is the SQS default; the receipt handle returned
//! by `receive_message` is threaded through as [`Delivery::receipt`] so
//! [`TaskBus::ack`] can delete exactly the message that was processed.

use async_trait::async_trait;
use aws_sdk_sqs::Client;

use youtube_chat_archiver_core::capability::{ControlMessage, Delivery, TaskBus};
use youtube_chat_archiver_core::error::{OrchestratorError, Result};

/// SQS caps a single receive at 10 messages.
const MAX_RECEIVE_BATCH: i32 = 10;
const LONG_POLL_WAIT_SECONDS: i32 = 10;

pub struct SqsTaskBus {
    client: Client,
    queue_url: String,
}

impl SqsTaskBus {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    fn map_sdk_error(context: &str) -> impl Fn(impl std::fmt::Display) -> OrchestratorError + '_ {
        move |e| OrchestratorError::StateStore(format!("{context}: {e}"))
    }
}

#[async_trait]
impl TaskBus for SqsTaskBus {
    async fn send(&self, message: ControlMessage) -> Result<()> {
        let body = serde_json::to_string(&message)
            .map_err(|e| OrchestratorError::Programmer(format!("failed to serialize control message: {e}")))?;
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(Self::map_sdk_error("send_message"))?;
        Ok(())
    }

    async fn receive(&self, max: usize) -> Result<Vec<Delivery>> {
        let max = max.min(MAX_RECEIVE_BATCH as usize) as i32;
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max)
            .wait_time_seconds(LONG_POLL_WAIT_SECONDS)
            .send()
            .await
            .map_err(Self::map_sdk_error("receive_message"))?;

        let mut deliveries = Vec::new();
        for sqs_message in response.messages() {
            let (Some(body), Some(receipt)) = (sqs_message.body(), sqs_message.receipt_handle())
            else {
                continue;
            };
            match serde_json::from_str::<ControlMessage>(body) {
                Ok(message) => deliveries.push(Delivery {
                    message,
                    receipt: receipt.to_string(),
                }),
                Err(e) => {
                    // Malformed queue message is a programmer error (§7e),
                    // but one bad message must not block the rest of the
                    // batch; surface it via logging and drop it.
                    tracing::error!(error = %e, body, "dropping malformed control message");
                }
            }
        }
        Ok(deliveries)
    }

    async fn ack(&self, receipt: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(Self::map_sdk_error("delete_message"))?;
        Ok(())
    }
}
