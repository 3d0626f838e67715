//! REST client for the hosted record/blob store.
//!
//! Records live in a PostgREST-style collection at `/rest/v1/formulari`;
//! file blobs are retrieved through `/storage/v1/object/sign/<bucket>`.
//! The API key travels as both `apikey` and bearer token.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::models::FormularioRecord;

use super::{RecordStore, StoreError};

const RECORDS_PATH: &str = "/rest/v1/formulari";

pub struct RestRecordStore {
    client: reqwest::Client,
    base_url: String,
    key: String,
    bucket: String,
}

impl RestRecordStore {
    pub fn new(base_url: &str, key: &str, bucket: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    fn records_url(&self) -> String {
        format!("{}{}", self.base_url, RECORDS_PATH)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Content-Type", "application/json")
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn select_one(&self, query: &[(&str, String)]) -> Result<Option<FormularioRecord>, StoreError> {
        let response = self
            .authed(self.client.get(self.records_url()))
            .query(query)
            .query(&[("select", "*")])
            .send()
            .await?;
        let response = self.check(response).await?;
        let mut records: Vec<FormularioRecord> = response.json().await?;
        let first = records.drain(..).next();
        Ok(first)
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn insert(&self, record: &FormularioRecord) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.post(self.records_url()))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        self.check(response).await.map(|_| ())
    }

    async fn update(&self, record: &FormularioRecord) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.patch(self.records_url()))
            .query(&[("id", format!("eq.{}", record.id))])
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        self.check(response).await.map(|_| ())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.delete(self.records_url()))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.to_string())),
            _ => self.check(response).await.map(|_| ()),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<FormularioRecord>, StoreError> {
        self.select_one(&[("id", format!("eq.{}", id))]).await
    }

    async fn find_by_fir(&self, fir: &str) -> Result<Option<FormularioRecord>, StoreError> {
        self.select_one(&[("fir_number", format!("eq.{}", fir))])
            .await
    }

    async fn list(&self) -> Result<Vec<FormularioRecord>, StoreError> {
        let response = self
            .authed(self.client.get(self.records_url()))
            .query(&[("select", "*"), ("order", "fir_number.asc")])
            .send()
            .await?;
        let response = self.check(response).await?;
        Ok(response.json().await?)
    }

    async fn signed_url(&self, path: &str, expires_secs: u64) -> Result<String, StoreError> {
        #[derive(Deserialize)]
        struct SignResponse {
            #[serde(rename = "signedURL")]
            signed_url: String,
        }

        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        );
        let response = self
            .authed(self.client.post(url))
            .json(&serde_json::json!({ "expiresIn": expires_secs }))
            .send()
            .await?;
        let response = self.check(response).await?;
        let signed: SignResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(format!("{}{}", self.base_url, signed.signed_url))
    }
}
