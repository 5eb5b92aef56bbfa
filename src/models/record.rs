use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::collection::Collection;

/// Prefijo reservado de los ids generados localmente (antes de que el servidor asigne uno)
pub const TEMP_ID_PREFIX: &str = "tmp_";

/// Genera un id temporal único
pub fn new_temporary_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4().simple())
}

pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    Synced,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
    Conflicted,
}

impl SyncStatus {
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            SyncStatus::PendingCreate | SyncStatus::PendingUpdate | SyncStatus::PendingDelete
        )
    }
}

/// Registro de dominio (tarea, progreso, antojo...) con su estado de sincronización
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub collection: Collection,
    pub modified_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
    /// `modified_at` de la última versión en la que local y remoto coincidían
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    pub payload: Value,
}

impl Record {
    /// Registro recién creado offline, con id temporal
    pub fn new_local(collection: Collection, payload: Value) -> Self {
        Self {
            id: new_temporary_id(),
            collection,
            modified_at: Utc::now(),
            sync_status: SyncStatus::PendingCreate,
            synced_at: None,
            payload,
        }
    }

    /// Copia confirmada por el servidor
    pub fn from_remote(collection: Collection, remote: RemoteRecord) -> Self {
        Self {
            id: remote.id,
            collection,
            modified_at: remote.modified_at,
            sync_status: SyncStatus::Synced,
            synced_at: Some(remote.modified_at),
            payload: remote.payload,
        }
    }

    pub fn has_temporary_id(&self) -> bool {
        is_temporary_id(&self.id)
    }

    pub fn is_visible(&self) -> bool {
        self.sync_status != SyncStatus::PendingDelete
    }
}

/// Forma de un registro en el servicio remoto
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub id: String,
    pub modified_at: DateTime<Utc>,
    pub payload: Value,
}

/// Filtro de lectura: se aplica igual en el servidor y en el store local
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadFilter {
    pub id: Option<String>,
    /// Igualdad exacta sobre campos del payload
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl ReadFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(ref id) = self.id {
            if &record.id != id {
                return false;
            }
        }

        self.fields
            .iter()
            .all(|(name, expected)| record.payload.get(name) == Some(expected))
    }

    /// Pares `campo=valor` para la query string del endpoint
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(ref id) = self.id {
            pairs.push(("id".to_string(), id.clone()));
        }
        for (name, value) in &self.fields {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            pairs.push((name.clone(), value));
        }
        pairs
    }
}
