//! Domain models.

mod record;

pub use record::{
    ChangeAction, ChangeDetails, ChangeRecord, DocumentLabel, FormularioRecord, RecordMetadata,
    RecordStatus,
};
