//! BulkIndexSink - bulk-indexing replication for search/analytics backends
//!
//! Each record becomes two NDJSON lines: an index-action envelope and the
//! record with every `.` in its keys replaced by `_`. One HTTP POST per batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, HeaderSet, Record, ReplicationSink, TelemetryBatch};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Index routing for one record (`_index`, `_type`, optional `_id`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDefinition {
    #[serde(rename = "_index")]
    pub index: String,

    #[serde(rename = "_type")]
    pub type_name: String,

    /// Set when an existing document may be updated
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl IndexDefinition {
    pub fn new(index: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            type_name: type_name.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// `{"index": {...}}`
#[derive(Serialize)]
struct IndexAction<'a> {
    index: &'a IndexDefinition,
}

/// Operator-supplied routing: record -> index definition
pub type IndexSelector = Arc<dyn Fn(&Record) -> IndexDefinition + Send + Sync>;

/// Construction options for [`BulkIndexSink`]
#[derive(Clone, Default)]
pub struct BulkIndexSinkOptions {
    /// Absolute URI of the bulk API
    pub bulk_endpoint: Option<String>,
    /// Index routing
    pub index_selector: Option<IndexSelector>,
    /// Client-level request timeout
    pub timeout: Option<Duration>,
    /// Shared client; a pooled client is built when absent
    pub client: Option<reqwest::Client>,
}

/// Sink posting NDJSON bulk requests
pub struct BulkIndexSink {
    name: String,
    endpoint: Url,
    selector: IndexSelector,
    client: reqwest::Client,
}

impl BulkIndexSink {
    /// Create a new BulkIndexSink
    ///
    /// # Errors
    /// Endpoint missing or not an absolute http(s) URI, selector missing,
    /// client construction failure.
    pub fn new(
        name: impl Into<String>,
        options: BulkIndexSinkOptions,
    ) -> Result<Self, ContractError> {
        let name = name.into();

        let field = format!("sinks[{name}].endpoint");
        let raw = options
            .bulk_endpoint
            .as_deref()
            .ok_or_else(|| ContractError::config_validation(&field, "bulk endpoint is required"))?;
        let endpoint = parse_absolute_uri(raw)
            .map_err(|message| ContractError::config_validation(&field, message))?;

        let selector = options.index_selector.ok_or_else(|| {
            ContractError::config_validation(
                format!("sinks[{name}].index"),
                "index selector is required",
            )
        })?;

        let client = match options.client {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = options.timeout {
                    builder = builder.timeout(timeout);
                }
                builder
                    .build()
                    .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?
            }
        };

        debug!(sink = %name, endpoint = %endpoint, "BulkIndexSink created");

        Ok(Self {
            name,
            endpoint,
            selector,
            client,
        })
    }

    /// Create from params (for factory)
    ///
    /// Params: `endpoint`, `index`, `type`, optional `id_pointer`.
    #[instrument(name = "bulk_index_sink_from_params", skip(name, params))]
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let index = params.get("index");
        let type_name = params.get("type");

        let index_selector = match (index, type_name) {
            (Some(index), Some(type_name)) => Some(static_index_selector(
                index.clone(),
                type_name.clone(),
                params.get("id_pointer").cloned(),
            )),
            (Some(_), None) => {
                return Err(ContractError::config_validation(
                    format!("sinks[{name}].params.type"),
                    "missing 'type' parameter",
                ))
            }
            _ => None,
        };

        Self::new(
            name,
            BulkIndexSinkOptions {
                bulk_endpoint: params.get("endpoint").cloned(),
                index_selector,
                ..Default::default()
            },
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Render the whole batch as one bulk body
    pub fn render(&self, batch: &TelemetryBatch) -> Result<String, ContractError> {
        let mut body = String::new();
        for record in batch {
            let definition = (self.selector)(record);
            let action = serde_json::to_string(&IndexAction { index: &definition })
                .map_err(|e| ContractError::sink_write(&self.name, format!("json error: {e}")))?;
            let sanitized = sanitize_record(record)
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
            let source = serde_json::to_string(&sanitized)
                .map_err(|e| ContractError::sink_write(&self.name, format!("json error: {e}")))?;

            body.push_str(&action);
            body.push('\n');
            body.push_str(&source);
            body.push('\n');
        }
        Ok(body)
    }

    async fn transmit(&self, body: String) -> Result<(), ContractError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| ContractError::sink_connection(&self.name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContractError::SinkRejected {
                sink_name: self.name.clone(),
                status: status.as_u16(),
            });
        }

        // A 2xx bulk answer can still report per-item failures
        if let Ok(bytes) = response.bytes().await {
            if let Ok(summary) = serde_json::from_slice::<BulkSummary>(&bytes) {
                if summary.errors {
                    warn!(
                        sink = %self.name,
                        failed_items = summary.failed_items(),
                        "Bulk request partially rejected"
                    );
                }
            }
        }

        Ok(())
    }
}

impl ReplicationSink for BulkIndexSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "bulk_index_sink_replicate",
        skip(self, batch, _headers),
        fields(sink = %self.name, records = batch.len())
    )]
    async fn replicate(
        &self,
        batch: &TelemetryBatch,
        _headers: &HeaderSet,
    ) -> Result<(), ContractError> {
        if batch.is_empty() {
            debug!(sink = %self.name, "Empty batch, nothing to index");
            return Ok(());
        }

        debug!(sink = %self.name, records = batch.len(), "Replicating batch");
        let body = self.render(batch)?;
        self.transmit(body).await
    }
}

/// Bulk API answer, only the parts we inspect
#[derive(Debug, Deserialize)]
struct BulkSummary {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, Value>>,
}

impl BulkSummary {
    fn failed_items(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.values().any(|op| op.get("error").is_some()))
            .count()
    }
}

/// Selector returning a fixed index/type and an optional `_id` looked up
/// with an RFC 6901 pointer (e.g. `/data/baseData/id`).
pub fn static_index_selector(
    index: String,
    type_name: String,
    id_pointer: Option<String>,
) -> IndexSelector {
    Arc::new(move |record: &Record| {
        let definition = IndexDefinition::new(index.clone(), type_name.clone());
        match id_pointer.as_deref().and_then(|p| lookup(record, p)) {
            Some(Value::String(id)) => definition.with_id(id.clone()),
            Some(Value::Number(id)) => definition.with_id(id.to_string()),
            _ => definition,
        }
    })
}

fn lookup<'a>(record: &'a Record, pointer: &str) -> Option<&'a Value> {
    let pointer = pointer.strip_prefix('/')?;
    let (head, rest) = match pointer.split_once('/') {
        Some((head, rest)) => (head, Some(rest)),
        None => (pointer, None),
    };
    let value = record.get(&head.replace("~1", "/").replace("~0", "~"))?;
    match rest {
        Some(rest) => value.pointer(&format!("/{rest}")),
        None => Some(value),
    }
}

/// Two keys of one object map to the same sanitized name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("keys collide after replacing '.' with '_': '{0}'")]
pub struct KeyCollision(pub String);

/// Copy of `value` with `.` replaced by `_` in every object key, recursively
pub fn sanitize_keys(value: &Value) -> Result<Value, KeyCollision> {
    Ok(match value {
        Value::Object(map) => Value::Object(sanitize_record(map)?),
        Value::Array(items) => {
            Value::Array(items.iter().map(sanitize_keys).collect::<Result<_, _>>()?)
        }
        other => other.clone(),
    })
}

/// [`sanitize_keys`] for a top-level record
///
/// A record holding both `a.b` and `a_b` cannot be indexed and is rejected.
pub fn sanitize_record(record: &Record) -> Result<Record, KeyCollision> {
    let mut sanitized = Record::new();
    for (key, value) in record {
        let key = key.replace('.', "_");
        if sanitized.contains_key(&key) {
            return Err(KeyCollision(key));
        }
        let value = sanitize_keys(value)?;
        sanitized.insert(key, value);
    }
    Ok(sanitized)
}

fn parse_absolute_uri(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("'{raw}' is not an absolute uri: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme '{other}' in '{raw}'")),
    }
}
