use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::external_services::moneta::PaymentStatus;

/// Upper bound on list pages fetched for one formula.
const MAX_PAGES: usize = 100;

#[derive(Error, Debug)]
pub enum RecordStoreError {
    #[error("Record {0} not found")]
    NotFound(String),

    #[error("Authorization error: {0}")]
    Unauthorized(StatusCode),

    #[error("Unsupported response code: {code} {body}")]
    UnexpectedStatus { code: StatusCode, body: String },

    #[error("Can't connect to record store: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Can't deserialize response: {0}")]
    Malformed(String),

    #[error("Field {field:?} is missing in record {record_id}")]
    FieldMissing { field: String, record_id: String },

    #[error("Invalid record store url: {0}")]
    InvalidUrl(String),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Deserialize, Debug)]
struct RecordPage {
    records: Vec<Record>,
    offset: Option<String>,
}

/// The hosted table holding payment records, keyed by the gateway transaction id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Sets `Amount` and `Status` of the record.
    async fn update_payment(
        &self,
        record_id: &str,
        amount: &str,
        status: PaymentStatus,
    ) -> Result<(), RecordStoreError>;

    async fn fetch_record(&self, record_id: &str) -> Result<Record, RecordStoreError>;

    /// E-mail of the payer linked to the record, used as the receipt recipient.
    async fn recipient_email(&self, record_id: &str) -> Result<String, RecordStoreError>;

    async fn find_records(&self, formula: &str) -> Result<Vec<Record>, RecordStoreError>;
}

#[derive(Debug, Clone)]
pub struct AirtableSettings {
    pub api_url: String,
    pub api_key: String,
    pub base_id: String,
    pub table_name: String,
    pub recipient_field: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AirtableClient {
    http_client: Client,
    table_url: Url,
    api_key: String,
    recipient_field: String,
}

impl AirtableClient {
    pub fn new(settings: &AirtableSettings) -> Result<Self, RecordStoreError> {
        let http_client = Client::builder().timeout(settings.timeout).build()?;

        let mut table_url = Url::parse(&settings.api_url)
            .map_err(|e| RecordStoreError::InvalidUrl(format!("{}: {e}", settings.api_url)))?;
        table_url
            .path_segments_mut()
            .map_err(|_| RecordStoreError::InvalidUrl(settings.api_url.clone()))?
            .pop_if_empty()
            .extend([settings.base_id.as_str(), settings.table_name.as_str()]);

        Ok(Self {
            http_client,
            table_url,
            api_key: settings.api_key.clone(),
            recipient_field: settings.recipient_field.clone(),
        })
    }

    fn record_url(&self, record_id: &str) -> Url {
        let mut url = self.table_url.clone();

        // table_url was built from path segments, so it always has a base
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(record_id);
        }

        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
    }

    /// `record_id` is `None` for list requests, where 404 means the table itself is missing.
    async fn error_for(response: Response, record_id: Option<&str>) -> RecordStoreError {
        match (response.status(), record_id) {
            (StatusCode::NOT_FOUND, Some(record_id)) => {
                RecordStoreError::NotFound(record_id.to_string())
            }

            (code @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN), _) => {
                RecordStoreError::Unauthorized(code)
            }

            (code, _) => RecordStoreError::UnexpectedStatus {
                code,
                body: response.text().await.unwrap_or_default(),
            },
        }
    }
}

#[async_trait]
impl RecordStore for AirtableClient {
    async fn update_payment(
        &self,
        record_id: &str,
        amount: &str,
        status: PaymentStatus,
    ) -> Result<(), RecordStoreError> {
        let payload = json!({
            "typecast": true,
            "fields": {
                "Amount": amount,
                "Status": status.as_str(),
            }
        });

        let response = self
            .authorized(self.http_client.patch(self.record_url(record_id)))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                debug!(record_id, %status, "Record updated");
                Ok(())
            }

            _ => {
                let err = Self::error_for(response, Some(record_id)).await;
                error!(record_id, error = %err, "Record update failed");
                Err(err)
            }
        }
    }

    async fn fetch_record(&self, record_id: &str) -> Result<Record, RecordStoreError> {
        let response = self
            .authorized(self.http_client.get(self.record_url(record_id)))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => response
                .json::<Record>()
                .await
                .map_err(|e| RecordStoreError::Malformed(e.to_string())),

            _ => Err(Self::error_for(response, Some(record_id)).await),
        }
    }

    async fn recipient_email(&self, record_id: &str) -> Result<String, RecordStoreError> {
        let record = self.fetch_record(record_id).await?;

        recipient_from_fields(&record.fields, &self.recipient_field).ok_or_else(|| {
            RecordStoreError::FieldMissing {
                field: self.recipient_field.clone(),
                record_id: record_id.to_string(),
            }
        })
    }

    async fn find_records(&self, formula: &str) -> Result<Vec<Record>, RecordStoreError> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut url = self.table_url.clone();
            url.query_pairs_mut()
                .append_pair("filterByFormula", formula);
            if let Some(offset) = &offset {
                url.query_pairs_mut().append_pair("offset", offset);
            }

            let response = self.authorized(self.http_client.get(url)).send().await?;

            let page = match response.status() {
                StatusCode::OK => response
                    .json::<RecordPage>()
                    .await
                    .map_err(|e| RecordStoreError::Malformed(e.to_string()))?,

                _ => return Err(Self::error_for(response, None).await),
            };

            records.extend(page.records);
            pages += 1;

            match page.offset {
                None => return Ok(records),

                Some(next) if offset.as_deref() == Some(next.as_str()) || pages >= MAX_PAGES => {
                    warn!(formula, pages, offset = %next, "Record listing stopped paginating");
                    return Ok(records);
                }

                Some(next) => offset = Some(next),
            }
        }
    }
}

/// Lookup fields come back as arrays; the first non-empty string wins.
fn recipient_from_fields(fields: &Map<String, Value>, field: &str) -> Option<String> {
    let value = match fields.get(field)? {
        Value::Array(values) => values.first()?,
        value => value,
    };

    value
        .as_str()
        .filter(|email| !email.is_empty())
        .map(str::to_string)
}
