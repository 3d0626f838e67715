//! Persisted formulario records and their change history.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three document categories a classified page can belong to.
///
/// Serialized with the exact labels the classifier and the hosted store use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DocumentLabel {
    Formulario,
    #[serde(rename = "Buono di intervento")]
    BuonoDiIntervento,
    #[serde(rename = "Scontrino del peso")]
    ScontrinoDelPeso,
}

impl DocumentLabel {
    pub const ALL: [DocumentLabel; 3] = [
        DocumentLabel::Formulario,
        DocumentLabel::BuonoDiIntervento,
        DocumentLabel::ScontrinoDelPeso,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentLabel::Formulario => "Formulario",
            DocumentLabel::BuonoDiIntervento => "Buono di intervento",
            DocumentLabel::ScontrinoDelPeso => "Scontrino del peso",
        }
    }

    /// Parse the exact label text; anything else is an unrecognized category.
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.as_str() == label)
    }
}

impl fmt::Display for DocumentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record lifecycle status. Transitions are not constrained; deletion via
/// status flag does not purge files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Archived,
    Deleted,
}

/// What a change-history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Creation,
    DocumentGeneration,
    MetadataUpdate,
}

/// Free-form payload of a change entry. Field names follow the hosted
/// schema (camelCase inside `details`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeDetails {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentLabel>,
    pub description: String,
    #[serde(rename = "oldValue", skip_serializing_if = "Option::is_none")]
    pub old_value: Option<serde_json::Value>,
    #[serde(rename = "newValue", skip_serializing_if = "Option::is_none")]
    pub new_value: Option<serde_json::Value>,
}

/// One append-only change-history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub timestamp: DateTime<Utc>,
    pub action: ChangeAction,
    pub details: ChangeDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Creation/update timestamps plus lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: RecordStatus,
}

/// One persisted record per FIR (transport-document identifier).
///
/// Invariant: `change_history` only ever grows; every mutation of `files`
/// goes through a method that appends exactly one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormularioRecord {
    pub id: String,
    pub fir_number: String,
    pub files: BTreeMap<DocumentLabel, String>,
    pub metadata: RecordMetadata,
    pub change_history: Vec<ChangeRecord>,
}

impl FormularioRecord {
    /// Build a fresh record from a scan result, with a single `creation`
    /// change entry.
    pub fn from_scan(fir_number: String, files: BTreeMap<DocumentLabel, String>) -> Self {
        let now = Utc::now();
        let creation = ChangeRecord {
            timestamp: now,
            action: ChangeAction::Creation,
            details: ChangeDetails {
                document_type: None,
                description: "Record created from scan".to_string(),
                old_value: None,
                new_value: Some(serde_json::json!({ "files": files })),
            },
            user: None,
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            fir_number,
            files,
            metadata: RecordMetadata {
                created_at: now,
                updated_at: now,
                status: RecordStatus::Active,
            },
            change_history: vec![creation],
        }
    }

    /// Replace the file path for one document type, appending a
    /// `document_generation` change entry recording old and new path.
    pub fn set_file(&mut self, label: DocumentLabel, path: String) {
        let old = self.files.insert(label, path.clone());
        let now = Utc::now();
        self.metadata.updated_at = now;
        self.change_history.push(ChangeRecord {
            timestamp: now,
            action: ChangeAction::DocumentGeneration,
            details: ChangeDetails {
                document_type: Some(label),
                description: format!("Document regenerated for {}", label),
                old_value: old.map(serde_json::Value::String),
                new_value: Some(serde_json::Value::String(path)),
            },
            user: None,
        });
    }

    /// Change the lifecycle status, appending a `metadata_update` entry.
    pub fn set_status(&mut self, status: RecordStatus) {
        let old = self.metadata.status;
        let now = Utc::now();
        self.metadata.status = status;
        self.metadata.updated_at = now;
        self.change_history.push(ChangeRecord {
            timestamp: now,
            action: ChangeAction::MetadataUpdate,
            details: ChangeDetails {
                document_type: None,
                description: "Status changed".to_string(),
                old_value: serde_json::to_value(old).ok(),
                new_value: serde_json::to_value(status).ok(),
            },
            user: None,
        });
    }
}
