//! Persisted record store.
//!
//! The hosted service is reached through [`RecordStore`]; production uses
//! the REST client, tests and store-less local runs use the in-memory impl.

mod memory;
mod rest;

pub use memory::MemoryRecordStore;
pub use rest::RestRecordStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::FormularioRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("unexpected store response: {0}")]
    Decode(String),
}

/// Record store with blob signed-URL retrieval.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: &FormularioRecord) -> Result<(), StoreError>;
    async fn update(&self, record: &FormularioRecord) -> Result<(), StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Option<FormularioRecord>, StoreError>;
    async fn find_by_fir(&self, fir: &str) -> Result<Option<FormularioRecord>, StoreError>;
    async fn list(&self) -> Result<Vec<FormularioRecord>, StoreError>;
    /// Signed download URL for a stored file path, valid for `expires_secs`.
    async fn signed_url(&self, path: &str, expires_secs: u64) -> Result<String, StoreError>;
}
