//! Airtable REST client.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, TryStreamExt};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_retry::RetryIf;
use url::Url;

use super::batch::{batch_ranges, SubBatchResult};
use super::models::{FieldMap, FieldValue, RemoteField, RemoteRecord};
use super::payload::{
    ErrorBody, ListRecordsResponse, NewRecord, RecordPayload, RecordsResponse, TablesResponse,
    UpdatedRecord, WriteRequest,
};
use crate::config::{
    Config, HTTP_STATUS_FORBIDDEN, HTTP_STATUS_NOT_FOUND, HTTP_STATUS_TOO_MANY_REQUESTS,
    HTTP_STATUS_UNAUTHORIZED,
};
use crate::error_handling::{categorize_response, InitializationError, RemoteError, RetryPolicy};
use crate::initialization::{init_client, Throttle};

/// One page of a record listing.
#[derive(Debug, Default)]
pub struct RecordPage {
    pub records: Vec<RemoteRecord>,
    /// Descriptions of entries that could not be decoded.
    pub malformed: Vec<String>,
}

/// A record update: store identifier plus the fields to overwrite.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub id: String,
    pub fields: FieldMap,
}

/// Client for one Airtable account.
///
/// Every request, retries included, first acquires a slot from the shared
/// throttle. Retryable failures (429, 5xx, transport errors) are retried with
/// the configured backoff; everything else is returned on first failure.
/// Creates are resent only after a 429 or a failed connection.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    api_url: Url,
    throttle: Arc<dyn Throttle>,
    retry: RetryPolicy,
    page_size: usize,
}

impl RemoteClient {
    /// Builds a client from the runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is unusable or the API URL cannot carry
    /// path segments.
    pub fn new(config: &Config, throttle: Arc<dyn Throttle>) -> Result<Self, InitializationError> {
        let http = init_client(&config.api_key)?;
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| InitializationError::ApiUrlError(format!("{}: {e}", config.api_url)))?;
        if api_url.cannot_be_a_base() {
            return Err(InitializationError::ApiUrlError(config.api_url.clone()));
        }
        Ok(Self {
            http,
            api_url,
            throttle,
            retry: config.retry_policy(),
            page_size: config.page_size.clamp(1, 100),
        })
    }

    /// Lists the fields of `table`, in the store's order.
    ///
    /// # Errors
    ///
    /// `RemoteError::Schema` if the base or the table cannot be found, or the
    /// token is not allowed to read its schema.
    pub async fn list_fields(&self, base: &str, table: &str) -> Result<Vec<RemoteField>, RemoteError> {
        let url = self.endpoint(&["v0", "meta", "bases", base, "tables"]);
        let response: TablesResponse = match self.request(Method::GET, url, None::<&()>).await {
            Ok(response) => response,
            Err(e)
                if matches!(
                    e.status(),
                    Some(HTTP_STATUS_UNAUTHORIZED | HTTP_STATUS_FORBIDDEN | HTTP_STATUS_NOT_FOUND)
                ) =>
            {
                return Err(RemoteError::Schema(format!(
                    "Base {base} not found or not accessible: {e}"
                )));
            }
            Err(e) => return Err(e),
        };

        let schema = response
            .tables
            .into_iter()
            .find(|t| t.name == table || t.id == table)
            .ok_or_else(|| RemoteError::Schema(format!("Table {table} not found in base {base}")))?;

        let fields = schema
            .fields
            .into_iter()
            .map(|f| {
                let options = f
                    .options
                    .map(|o| o.choices.into_iter().map(|c| c.name).collect())
                    .unwrap_or_default();
                RemoteField::from_api(&f.name, f.field_type.as_deref(), options)
            })
            .collect();
        Ok(fields)
    }

    /// Streams every record of `table`, one page at a time.
    ///
    /// Pages are fetched lazily. The stream ends after the page without a
    /// continuation offset; an error ends it after yielding the error.
    pub fn list_pages<'a>(
        &'a self,
        base: &'a str,
        table: &'a str,
    ) -> impl Stream<Item = Result<RecordPage, RemoteError>> + 'a {
        // None: done. Some(None): first page. Some(Some(offset)): continuation.
        stream::try_unfold(Some(None::<String>), move |state| async move {
            let Some(offset) = state else {
                return Ok(None);
            };
            let (page, next) = self.fetch_page(base, table, offset.as_deref()).await?;
            Ok(Some((page, next.map(Some))))
        })
    }

    /// Streams every record of `table`, dropping entries that cannot be decoded.
    pub fn list_records<'a>(
        &'a self,
        base: &'a str,
        table: &'a str,
    ) -> impl Stream<Item = Result<RemoteRecord, RemoteError>> + 'a {
        self.list_pages(base, table)
            .map_ok(move |page| {
                for entry in &page.malformed {
                    log::warn!("Skipping malformed record in {table}: {entry}");
                }
                stream::iter(page.records.into_iter().map(Ok))
            })
            .try_flatten()
    }

    async fn fetch_page(
        &self,
        base: &str,
        table: &str,
        offset: Option<&str>,
    ) -> Result<(RecordPage, Option<String>), RemoteError> {
        let mut url = self.endpoint(&["v0", base, table]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", &self.page_size.to_string());
            if let Some(offset) = offset {
                query.append_pair("offset", offset);
            }
        }

        let response: ListRecordsResponse = match self.request(Method::GET, url, None::<&()>).await {
            Ok(response) => response,
            Err(e) if matches!(e.status(), Some(HTTP_STATUS_FORBIDDEN | HTTP_STATUS_NOT_FOUND)) => {
                return Err(RemoteError::Schema(format!(
                    "Table {table} not found in base {base} or not accessible: {e}"
                )));
            }
            Err(e) => return Err(e),
        };

        let mut page = RecordPage::default();
        for raw in response.records {
            match decode_record(raw) {
                Ok(record) => page.records.push(record),
                Err(reason) => page.malformed.push(reason),
            }
        }
        log::debug!(
            "Fetched {} records from {table} (more: {})",
            page.records.len(),
            response.offset.is_some()
        );
        Ok((page, response.offset))
    }

    /// Creates records in sub-batches of at most `max_batch`.
    ///
    /// Sub-batches are sent in order and each reports independently. Created
    /// records come back in input order.
    pub async fn create_records(
        &self,
        base: &str,
        table: &str,
        records: &[FieldMap],
        max_batch: usize,
    ) -> Vec<SubBatchResult<Vec<RemoteRecord>>> {
        let url = self.endpoint(&["v0", base, table]);
        let mut results = Vec::new();
        for range in batch_ranges(records.len(), max_batch) {
            log::debug!("Creating records {range:?} in {table}");
            let body = WriteRequest {
                records: records[range.clone()]
                    .iter()
                    .map(|fields| NewRecord {
                        fields: encode_fields(fields),
                    })
                    .collect(),
                typecast: true,
            };
            let result = self
                .request::<RecordsResponse, _>(Method::POST, url.clone(), Some(&body))
                .await
                .map(|response| decode_written(response, range.len()));
            if let Err(e) = &result {
                log::warn!("Create of records {range:?} in {table} failed: {e}");
            }
            results.push(SubBatchResult { range, result });
        }
        results
    }

    /// Updates records in sub-batches of at most `max_batch`.
    ///
    /// Each successful sub-batch reports how many records the store acknowledged.
    pub async fn update_records(
        &self,
        base: &str,
        table: &str,
        updates: &[RecordUpdate],
        max_batch: usize,
    ) -> Vec<SubBatchResult<usize>> {
        let url = self.endpoint(&["v0", base, table]);
        let mut results = Vec::new();
        for range in batch_ranges(updates.len(), max_batch) {
            log::debug!("Updating records {range:?} in {table}");
            let body = WriteRequest {
                records: updates[range.clone()]
                    .iter()
                    .map(|update| UpdatedRecord {
                        id: update.id.clone(),
                        fields: encode_fields(&update.fields),
                    })
                    .collect(),
                typecast: true,
            };
            let result = self
                .request::<RecordsResponse, _>(Method::PATCH, url.clone(), Some(&body))
                .await
                .map(|response| response.records.len());
            if let Err(e) = &result {
                log::warn!("Update of records {range:?} in {table} failed: {e}");
            }
            results.push(SubBatchResult { range, result });
        }
        results
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends one request with throttling and bounded retries.
    async fn request<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T, RemoteError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let attempt = || {
            let method = method.clone();
            let url = url.clone();
            async move {
                self.throttle.acquire().await;
                let mut builder = self.http.request(method, url);
                if let Some(body) = body {
                    builder = builder.json(body);
                }
                let response = builder.send().await?;
                let status = response.status();
                if status.is_success() {
                    Ok(response.json::<T>().await?)
                } else {
                    let text = response.text().await.unwrap_or_default();
                    Err(error_from_response(status, &text))
                }
            }
        };

        let delays: Vec<Duration> = self.retry.delays().collect();
        let mut failures = 0usize;
        let should_retry = |e: &RemoteError| {
            failures += 1;
            let Some(wait) = delays.get(failures - 1) else {
                return false;
            };
            if !e.is_retryable_for(&method) {
                return false;
            }
            if e.status() == Some(HTTP_STATUS_TOO_MANY_REQUESTS) {
                log::warn!(
                    "Rate limited by Airtable (attempt {failures}/{}), waiting {wait:?}",
                    self.retry.max_attempts
                );
            } else {
                log::warn!(
                    "Airtable request failed (attempt {failures}/{}), retrying in {wait:?}: {e}",
                    self.retry.max_attempts
                );
            }
            true
        };

        RetryIf::spawn(delays.clone(), attempt, should_retry)
            .await
            .map_err(RemoteError::exhausted)
    }
}

fn error_from_response(status: StatusCode, body: &str) -> RemoteError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(error) => {
            let (error_type, message) = error.into_parts();
            categorize_response(status.as_u16(), Some(&error_type), &message)
        }
        Err(_) => categorize_response(status.as_u16(), None, body.trim()),
    }
}

fn encode_fields(fields: &FieldMap) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

fn decode_written(response: RecordsResponse, expected: usize) -> Vec<RemoteRecord> {
    let records: Vec<RemoteRecord> = response
        .records
        .into_iter()
        .map(into_record)
        .collect();
    if records.len() != expected {
        log::warn!(
            "Airtable acknowledged {} of {expected} created records",
            records.len()
        );
    }
    records
}

fn decode_record(raw: Value) -> Result<RemoteRecord, String> {
    let payload: RecordPayload =
        serde_json::from_value(raw.clone()).map_err(|e| format!("{e}: {raw}"))?;
    if payload.id.is_empty() {
        return Err(format!("record without id: {raw}"));
    }
    Ok(into_record(payload))
}

fn into_record(payload: RecordPayload) -> RemoteRecord {
    let created_time = payload
        .created_time
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));
    let fields = payload
        .fields
        .iter()
        .filter_map(|(name, value)| {
            FieldValue::from_json(value).map(|v| (name.clone(), v))
        })
        .collect();
    RemoteRecord {
        id: payload.id,
        created_time,
        fields,
    }
}
