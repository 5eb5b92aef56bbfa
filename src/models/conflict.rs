use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::collection::Collection;
use crate::models::record::Record;

/// Resultado de comparar copia local vs remota de un mismo registro
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Identical,
    LocallyAhead,
    RemotelyAhead,
    Conflict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Local,
    Remote,
    Merge,
}

/// Par local/remoto divergente, pendiente de decisión del usuario
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictCase {
    pub id: String,
    pub collection: Collection,
    pub local_record: Record,
    pub remote_record: Record,
    pub local_modified_at: DateTime<Utc>,
    pub remote_modified_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolution: Option<Resolution>,
}

impl ConflictCase {
    pub fn new(local_record: Record, remote_record: Record) -> Self {
        Self {
            id: Self::case_id(local_record.collection, &local_record.id),
            collection: local_record.collection,
            local_modified_at: local_record.modified_at,
            remote_modified_at: remote_record.modified_at,
            local_record,
            remote_record,
            resolved: false,
            resolution: None,
        }
    }

    /// Un caso por registro: el id se deriva de colección + id de registro
    pub fn case_id(collection: Collection, record_id: &str) -> String {
        format!("{}:{}", collection, record_id)
    }

    pub fn record_id(&self) -> &str {
        &self.local_record.id
    }
}
