//! `StateStore` backed by DynamoDB (§4.5, §6.5).
//!
//! Table names are `{ENVIRONMENT}-{Table}` (§6.6). Records round-trip
//! through `serde_json::Value` and a small [`AttributeValue`] conversion
//! rather than hand-writing each field, since every domain type in
//! `youtube_chat_archiver_core::model` already derives `Serialize`/
//! `Deserialize`.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};

use youtube_chat_archiver_core::capability::{StateStore, Table};
use youtube_chat_archiver_core::error::{OrchestratorError, Result};
use youtube_chat_archiver_core::model::{Broadcast, BroadcastStatus, Channel, Message, WorkerTask};

/// Batch writes are capped at 25 records per call (§4.5, §6.5).
pub const BATCH_WRITE_LIMIT: usize = 25;

fn json_to_attr(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(json_to_attr).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_attr(v)))
                .collect(),
        ),
    }
}

fn attr_to_json(attr: &AttributeValue) -> Value {
    match attr {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => n
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::L(items) => Value::Array(items.iter().map(attr_to_json).collect()),
        AttributeValue::M(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), attr_to_json(v))).collect())
        }
        _ => Value::Null,
    }
}

fn to_item<T: Serialize>(record: &T) -> Result<HashMap<String, AttributeValue>> {
    let value = serde_json::to_value(record)
        .map_err(|e| OrchestratorError::Programmer(format!("failed to serialize record: {e}")))?;
    let Value::Object(map) = value else {
        return Err(OrchestratorError::Programmer(
            "record did not serialize to an object".into(),
        ));
    };
    Ok(map
        .into_iter()
        .map(|(k, v)| (k, json_to_attr(&v)))
        .collect())
}

fn from_item<T: DeserializeOwned>(item: &HashMap<String, AttributeValue>) -> Result<T> {
    let map: serde_json::Map<String, Value> = item
        .iter()
        .map(|(k, v)| (k.clone(), attr_to_json(v)))
        .collect();
    serde_json::from_value(Value::Object(map))
        .map_err(|e| OrchestratorError::StateStore(format!("failed to deserialize item: {e}")))
}

pub struct DynamoStateStore {
    client: Client,
    environment: String,
}

impl DynamoStateStore {
    pub fn new(client: Client, environment: impl Into<String>) -> Self {
        Self {
            client,
            environment: environment.into(),
        }
    }

    fn table(&self, table: Table) -> String {
        format!("{}-{}", self.environment, table.name())
    }

    fn map_sdk_error(context: &str) -> impl Fn(impl std::fmt::Display) -> OrchestratorError + '_ {
        move |e| OrchestratorError::StateStore(format!("{context}: {e}"))
    }
}

#[async_trait]
impl StateStore for DynamoStateStore {
    #[instrument(skip(self))]
    async fn get_channel(&self, channel_id: &str) -> Result<Option<Channel>> {
        let response = self
            .client
            .get_item()
            .table_name(self.table(Table::Channels))
            .key("channel_id", AttributeValue::S(channel_id.to_string()))
            .send()
            .await
            .map_err(Self::map_sdk_error("get_channel"))?;
        response.item.as_ref().map(from_item).transpose()
    }

    async fn put_channel(&self, channel: Channel) -> Result<()> {
        let item = to_item(&channel)?;
        self.client
            .put_item()
            .table_name(self.table(Table::Channels))
            .set_item(Some(item))
            .send()
            .await
            .map_err(Self::map_sdk_error("put_channel"))?;
        Ok(())
    }

    async fn update_channel_active(&self, channel_id: &str, is_active: bool) -> Result<()> {
        self.client
            .update_item()
            .table_name(self.table(Table::Channels))
            .key("channel_id", AttributeValue::S(channel_id.to_string()))
            .update_expression("SET is_active = :a")
            .expression_attribute_values(":a", AttributeValue::Bool(is_active))
            .send()
            .await
            .map_err(Self::map_sdk_error("update_channel_active"))?;
        Ok(())
    }

    async fn list_active_channels(&self) -> Result<Vec<Channel>> {
        let response = self
            .client
            .scan()
            .table_name(self.table(Table::Channels))
            .filter_expression("is_active = :a")
            .expression_attribute_values(":a", AttributeValue::Bool(true))
            .send()
            .await
            .map_err(Self::map_sdk_error("list_active_channels"))?;
        response
            .items
            .unwrap_or_default()
            .iter()
            .map(from_item)
            .collect()
    }

    async fn get_broadcast(&self, video_id: &str) -> Result<Option<Broadcast>> {
        let response = self
            .client
            .get_item()
            .table_name(self.table(Table::Broadcasts))
            .key("video_id", AttributeValue::S(video_id.to_string()))
            .send()
            .await
            .map_err(Self::map_sdk_error("get_broadcast"))?;
        response.item.as_ref().map(from_item).transpose()
    }

    #[instrument(skip(self, broadcast))]
    async fn put_broadcast_if_absent(&self, broadcast: Broadcast) -> Result<bool> {
        let video_id = broadcast.video_id.clone();
        let item = to_item(&broadcast)?;
        let result = self
            .client
            .put_item()
            .table_name(self.table(Table::Broadcasts))
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(video_id)")
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|s| s.is_conditional_check_failed_exception()).unwrap_or(false) => {
                warn!(%video_id, "broadcast already present, idempotent insert skipped");
                Ok(false)
            }
            Err(e) => Err(Self::map_sdk_error("put_broadcast_if_absent")(e)),
        }
    }

    async fn put_broadcast(&self, broadcast: Broadcast) -> Result<()> {
        let item = to_item(&broadcast)?;
        self.client
            .put_item()
            .table_name(self.table(Table::Broadcasts))
            .set_item(Some(item))
            .send()
            .await
            .map_err(Self::map_sdk_error("put_broadcast"))?;
        Ok(())
    }

    /// A full-table scan filtered in memory, per the §9 scale-up note:
    /// "at small scale, Scanner and State Monitor use full-table scans
    /// filtered in memory... not doing so is a performance bug, not a
    /// correctness one". A GSI on `status` is the production fix.
    async fn scan_monitorable_broadcasts(&self) -> Result<Vec<Broadcast>> {
        let response = self
            .client
            .scan()
            .table_name(self.table(Table::Broadcasts))
            .send()
            .await
            .map_err(Self::map_sdk_error("scan_monitorable_broadcasts"))?;
        let broadcasts: Vec<Broadcast> = response
            .items
            .unwrap_or_default()
            .iter()
            .map(from_item)
            .collect::<Result<Vec<_>>>()?;
        Ok(broadcasts
            .into_iter()
            .filter(|b| b.status.is_monitorable())
            .collect())
    }

    async fn broadcast_exists(&self, video_id: &str) -> Result<bool> {
        Ok(self.get_broadcast(video_id).await?.is_some())
    }

    async fn get_worker_task(&self, video_id: &str) -> Result<Option<WorkerTask>> {
        let response = self
            .client
            .get_item()
            .table_name(self.table(Table::WorkerTasks))
            .key("video_id", AttributeValue::S(video_id.to_string()))
            .send()
            .await
            .map_err(Self::map_sdk_error("get_worker_task"))?;
        response.item.as_ref().map(from_item).transpose()
    }

    async fn put_worker_task(&self, task: WorkerTask) -> Result<()> {
        let item = to_item(&task)?;
        self.client
            .put_item()
            .table_name(self.table(Table::WorkerTasks))
            .set_item(Some(item))
            .send()
            .await
            .map_err(Self::map_sdk_error("put_worker_task"))?;
        Ok(())
    }

    /// Chunks into groups of [`BATCH_WRITE_LIMIT`] and retries a chunk
    /// once on failure before surfacing it (§4.4 batch-write guarantee:
    /// "the worker retries the write once before surfacing failure").
    async fn batch_put_messages(&self, messages: Vec<Message>) -> Result<()> {
        let table = self.table(Table::Messages);
        for chunk in messages.chunks(BATCH_WRITE_LIMIT) {
            let mut attempt = 0;
            loop {
                attempt += 1;
                let requests: Result<Vec<_>> = chunk
                    .iter()
                    .map(|m| {
                        to_item(m).map(|item| {
                            aws_sdk_dynamodb::types::WriteRequest::builder()
                                .put_request(
                                    aws_sdk_dynamodb::types::PutRequest::builder()
                                        .set_item(Some(item))
                                        .build()
                                        .expect("item is always set"),
                                )
                                .build()
                        })
                    })
                    .collect();
                let requests = requests?;
                let result = self
                    .client
                    .batch_write_item()
                    .request_items(&table, requests)
                    .send()
                    .await;
                match result {
                    Ok(_) => break,
                    Err(e) if attempt < 2 => {
                        warn!(error = %e, "batch_put_messages failed, retrying once");
                        continue;
                    }
                    Err(e) => return Err(Self::map_sdk_error("batch_put_messages")(e)),
                }
            }
        }
        Ok(())
    }

    async fn query_messages_by_video(&self, video_id: &str) -> Result<Vec<Message>> {
        let response = self
            .client
            .query()
            .table_name(self.table(Table::Messages))
            .index_name("video_id-timestamp-index")
            .key_condition_expression("video_id = :v")
            .expression_attribute_values(":v", AttributeValue::S(video_id.to_string()))
            .scan_index_forward(false)
            .send()
            .await
            .map_err(Self::map_sdk_error("query_messages_by_video"))?;
        response
            .items
            .unwrap_or_default()
            .iter()
            .map(from_item)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_attribute_round_trip_preserves_scalars() {
        let value = serde_json::json!({
            "a": "s",
            "b": true,
            "c": 3,
            "nested": { "x": 1 },
            "list": [1, 2, 3],
        });
        let attr = json_to_attr(&value);
        let back = attr_to_json(&attr);
        assert_eq!(value["a"], back["a"]);
        assert_eq!(value["b"], back["b"]);
        assert_eq!(value["nested"]["x"], back["nested"]["x"]);
        assert_eq!(value["list"], back["list"]);
    }

    #[test]
    fn broadcast_round_trips_through_item_conversion() {
        let broadcast = Broadcast {
            video_id: "v1".into(),
            channel_id: "c1".into(),
            title: "Live now".into(),
            description: String::new(),
            status: BroadcastStatus::Live,
            scheduled_start_time: None,
            actual_start_time: None,
            actual_end_time: None,
            concurrent_viewers: Some(42),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            updated_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        let item = to_item(&broadcast).unwrap();
        let back: Broadcast = from_item(&item).unwrap();
        assert_eq!(broadcast, back);
    }
}
