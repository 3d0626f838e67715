//! In-memory record store for tests and store-less local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::FormularioRecord;

use super::{RecordStore, StoreError};

#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, FormularioRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &FormularioRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &FormularioRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if !records.contains_key(&record.id) {
            return Err(StoreError::NotFound(record.id.clone()));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get(&self, id: &str) -> Result<Option<FormularioRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_by_fir(&self, fir: &str) -> Result<Option<FormularioRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.fir_number == fir)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<FormularioRecord>, StoreError> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.fir_number.cmp(&b.fir_number));
        Ok(records)
    }

    async fn signed_url(&self, path: &str, expires_secs: u64) -> Result<String, StoreError> {
        // No blob store behind the in-memory impl; hand back a local
        // download-proxy URL so callers still get something usable.
        Ok(format!(
            "/api/download?file={}&expires={}",
            urlencoding::encode(path),
            expires_secs
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentLabel, RecordStatus};
    use std::collections::BTreeMap;

    fn record(fir: &str) -> FormularioRecord {
        let mut files = BTreeMap::new();
        files.insert(DocumentLabel::Formulario, format!("/w/output/{}.pdf", fir));
        FormularioRecord::from_scan(fir.to_string(), files)
    }

    #[tokio::test]
    async fn insert_get_find_delete() {
        let store = MemoryRecordStore::new();
        let rec = record("F1");
        store.insert(&rec).await.unwrap();

        assert!(store.get(&rec.id).await.unwrap().is_some());
        assert_eq!(
            store.find_by_fir("F1").await.unwrap().unwrap().id,
            rec.id
        );
        assert!(store.find_by_fir("F2").await.unwrap().is_none());

        store.delete(&rec.id).await.unwrap();
        assert!(store.get(&rec.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete(&rec.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_requires_existing_record() {
        let store = MemoryRecordStore::new();
        let mut rec = record("F1");
        assert!(matches!(
            store.update(&rec).await,
            Err(StoreError::NotFound(_))
        ));

        store.insert(&rec).await.unwrap();
        rec.set_status(RecordStatus::Archived);
        store.update(&rec).await.unwrap();

        let stored = store.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.status, RecordStatus::Archived);
        assert_eq!(stored.change_history.len(), 2);
    }
}
