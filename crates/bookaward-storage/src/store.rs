//! Remote tabular store seam and the Airtable REST client behind it.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bookaward_core::wire::{choice_key, WireFields};
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{classify_status, Retryable, RetryDisposition};

pub const AIRTABLE_API_ROOT: &str = "https://api.airtable.com/v0";

/// Error from any remote-store call. `message` is the store's own text, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("store unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },
    #[error("store transport error: {0}")]
    Transport(String),
}

impl WriteError {
    pub fn message(&self) -> &str {
        match self {
            WriteError::Rejected { message, .. } | WriteError::Unavailable { message, .. } => {
                message
            }
            WriteError::Transport(message) => message,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        WriteError::Transport(err.to_string())
    }
}

impl Retryable for WriteError {
    fn is_transient(&self) -> bool {
        !matches!(self, WriteError::Rejected { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRow {
    pub id: String,
    pub created_time: Option<DateTime<Utc>>,
    pub fields: WireFields,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Airtable formula, e.g. `{Award Website} = 'https://x.org'`.
    pub formula: Option<String>,
    /// Restrict the returned columns. Empty means all.
    pub fields: Vec<String>,
}

impl ListFilter {
    pub fn all() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create(&self, fields: &WireFields) -> Result<RemoteRow, WriteError>;
    async fn update(&self, id: &str, fields: &WireFields) -> Result<RemoteRow, WriteError>;
    async fn list(&self, filter: &ListFilter) -> Result<Vec<RemoteRow>, WriteError>;
    async fn delete(&self, id: &str) -> Result<(), WriteError>;
}

#[derive(Debug, Clone)]
pub struct AirtableConfig {
    pub api_key: String,
    pub base_id: String,
    pub table_name: String,
    pub api_root: String,
    pub timeout: Duration,
}

impl AirtableConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_id: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_id: base_id.into(),
            table_name: table_name.into(),
            api_root: AIRTABLE_API_ROOT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(rename = "createdTime", default)]
    created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    fields: WireFields,
}

impl From<AirtableRecord> for RemoteRow {
    fn from(record: AirtableRecord) -> Self {
        RemoteRow {
            id: record.id,
            created_time: record.created_time,
            fields: record.fields,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AirtablePage {
    #[serde(default)]
    records: Vec<AirtableRecord>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BaseSchema {
    #[serde(default)]
    tables: Vec<TableSchema>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    id: String,
    name: String,
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    options: Option<FieldOptions>,
}

#[derive(Debug, Deserialize)]
struct FieldOptions {
    #[serde(default)]
    choices: Vec<SelectChoice>,
}

#[derive(Debug, Deserialize)]
struct SelectChoice {
    name: String,
}

/// Existing single-select choices per column of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectChoices {
    by_column: BTreeMap<String, Vec<String>>,
}

impl SelectChoices {
    /// Read the choices of `table` (matched by name or id) out of a
    /// `meta/bases/{base}/tables` response body.
    pub fn from_base_schema(body: &str, table: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_schema(serde_json::from_str(body)?, table))
    }

    fn from_schema(schema: BaseSchema, table: &str) -> Self {
        let by_column = schema
            .tables
            .into_iter()
            .find(|t| t.name == table || t.id == table)
            .map(|t| {
                t.fields
                    .into_iter()
                    .filter(|f| f.kind == "singleSelect")
                    .map(|f| {
                        let choices = f
                            .options
                            .map(|o| o.choices.into_iter().map(|c| c.name).collect())
                            .unwrap_or_default();
                        (f.name, choices)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { by_column }
    }

    pub fn is_empty(&self) -> bool {
        self.by_column.is_empty()
    }

    pub fn choices(&self, column: &str) -> Option<&[String]> {
        self.by_column.get(column).map(Vec::as_slice)
    }

    /// Rewrite select values onto the column's spelling of the same choice.
    /// Values with no matching choice are dropped, since the store rejects new
    /// options when typecasting is off. Columns without known choices pass through.
    pub fn apply(&self, fields: &mut WireFields) {
        for (column, choices) in &self.by_column {
            let Some(Value::String(value)) = fields.get(column).cloned() else {
                continue;
            };
            if choices.contains(&value) {
                continue;
            }
            let key = choice_key(&value);
            match choices.iter().find(|c| choice_key(c) == key) {
                Some(choice) => {
                    debug!(column = %column, from = %value, to = %choice, "select value mapped");
                    fields.insert(column.clone(), Value::String(choice.clone()));
                }
                None => {
                    warn!(column = %column, value = %value, "no matching select choice; value dropped");
                    fields.remove(column);
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct AirtableStore {
    client: reqwest::Client,
    config: AirtableConfig,
    table_url: Url,
    schema_url: Url,
    select_choices: OnceCell<SelectChoices>,
}

impl AirtableStore {
    pub fn new(config: AirtableConfig) -> anyhow::Result<Self> {
        let root = Url::parse(&config.api_root)
            .with_context(|| format!("parsing airtable api root {}", config.api_root))?;
        let mut table_url = root.clone();
        table_url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("airtable api root cannot be a base url"))?
            .pop_if_empty()
            .push(&config.base_id)
            .push(&config.table_name);
        let mut schema_url = root;
        schema_url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("airtable api root cannot be a base url"))?
            .pop_if_empty()
            .extend(["meta", "bases", config.base_id.as_str(), "tables"]);
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building airtable client")?;
        Ok(Self {
            client,
            config,
            table_url,
            schema_url,
            select_choices: OnceCell::new(),
        })
    }

    /// Select choices of the configured table, fetched once per store. When the
    /// schema cannot be read, values are sent unmapped.
    async fn select_choices(&self) -> &SelectChoices {
        self.select_choices
            .get_or_init(|| async {
                match self.fetch_select_choices().await {
                    Ok(choices) => {
                        info!(columns = choices.by_column.len(), "select choices loaded");
                        choices
                    }
                    Err(err) => {
                        warn!(error = %err, "could not read base schema; select values sent as-is");
                        SelectChoices::default()
                    }
                }
            })
            .await
    }

    async fn fetch_select_choices(&self) -> Result<SelectChoices, WriteError> {
        let schema: BaseSchema = self
            .send(Method::GET, self.schema_url.clone(), None)
            .instrument(info_span!("airtable_schema", base = %self.config.base_id))
            .await?;
        Ok(SelectChoices::from_schema(schema, &self.config.table_name))
    }

    async fn prepared(&self, fields: &WireFields) -> WireFields {
        let mut fields = fields.clone();
        self.select_choices().await.apply(&mut fields);
        fields
    }

    fn record_url(&self, id: &str) -> Url {
        let mut url = self.table_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        url
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T, WriteError> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.config.api_key);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let resp = request.send().await.map_err(WriteError::from_reqwest)?;
        let status = resp.status();
        let text = resp.text().await.map_err(WriteError::from_reqwest)?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        serde_json::from_str(&text)
            .map_err(|err| WriteError::Transport(format!("decoding airtable response: {err}")))
    }
}

#[async_trait]
impl RemoteStore for AirtableStore {
    async fn create(&self, fields: &WireFields) -> Result<RemoteRow, WriteError> {
        let fields = self.prepared(fields).await;
        let body = json!({ "fields": fields, "typecast": false });
        let record: AirtableRecord = self
            .send(Method::POST, self.table_url.clone(), Some(body))
            .instrument(info_span!("airtable_create", table = %self.config.table_name))
            .await?;
        Ok(record.into())
    }

    async fn update(&self, id: &str, fields: &WireFields) -> Result<RemoteRow, WriteError> {
        let fields = self.prepared(fields).await;
        let body = json!({ "fields": fields, "typecast": false });
        let record: AirtableRecord = self
            .send(Method::PATCH, self.record_url(id), Some(body))
            .instrument(info_span!("airtable_update", record_id = id))
            .await?;
        Ok(record.into())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<RemoteRow>, WriteError> {
        let mut rows = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let mut url = self.table_url.clone();
            {
                let mut query = url.query_pairs_mut();
                if let Some(formula) = &filter.formula {
                    query.append_pair("filterByFormula", formula);
                }
                for field in &filter.fields {
                    query.append_pair("fields[]", field);
                }
                if let Some(offset) = &offset {
                    query.append_pair("offset", offset);
                }
            }
            let page: AirtablePage = self
                .send(Method::GET, url, None)
                .instrument(info_span!("airtable_list", page = rows.len()))
                .await?;
            debug!(records = page.records.len(), "airtable page received");
            rows.extend(page.records.into_iter().map(RemoteRow::from));
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(rows)
    }

    async fn delete(&self, id: &str) -> Result<(), WriteError> {
        let _: Value = self
            .send(Method::DELETE, self.record_url(id), None)
            .instrument(info_span!("airtable_delete", record_id = id))
            .await?;
        Ok(())
    }
}

fn status_error(status: StatusCode, body: &str) -> WriteError {
    let message = store_error_message(body);
    match classify_status(status) {
        RetryDisposition::Retryable => WriteError::Unavailable {
            status: status.as_u16(),
            message,
        },
        RetryDisposition::NonRetryable => WriteError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull the human-readable message out of an Airtable error body.
pub fn store_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    match value.get("error") {
        Some(Value::Object(error)) => error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.get("type").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string()),
        Some(Value::String(code)) => code.clone(),
        _ => body.trim().to_string(),
    }
}
