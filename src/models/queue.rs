// ============================================================================
// QUEUE PERSISTENTE DE ESCRITURAS PARA MODO OFFLINE
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::collection::Collection;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Estado de una entrada dentro de la queue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Esperando el próximo drain
    Pending,
    /// El servidor la rechazó (validación/autorización), requiere decisión
    Conflicted,
    /// Superó el máximo de intentos
    Stuck,
}

/// Unidad de trabajo ordenada y durable
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub sequence_number: u64,
    pub collection: Collection,
    pub operation: Operation,
    pub record_id: String,
    pub payload: Value,
    /// `modified_at` local en el momento de encolar
    pub modified_at: DateTime<Utc>,
    /// Versión del servidor sobre la que se hizo el cambio (control de concurrencia)
    #[serde(default)]
    pub base_modified_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub state: EntryState,
}

impl QueueEntry {
    pub fn pending(sequence_number: u64, entry: NewQueueEntry) -> Self {
        Self {
            sequence_number,
            collection: entry.collection,
            operation: entry.operation,
            record_id: entry.record_id,
            payload: entry.payload,
            modified_at: entry.modified_at,
            base_modified_at: entry.base_modified_at,
            attempts: 0,
            last_error: None,
            state: EntryState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == EntryState::Pending
    }

    pub fn is_blocked(&self) -> bool {
        !self.is_pending()
    }
}

/// Datos para encolar; la queue asigna número de secuencia
#[derive(Clone, Debug, PartialEq)]
pub struct NewQueueEntry {
    pub collection: Collection,
    pub operation: Operation,
    pub record_id: String,
    pub payload: Value,
    pub modified_at: DateTime<Utc>,
    pub base_modified_at: Option<DateTime<Utc>>,
}

impl NewQueueEntry {
    pub fn new(collection: Collection, operation: Operation, record_id: impl Into<String>, payload: Value) -> Self {
        Self {
            collection,
            operation,
            record_id: record_id.into(),
            payload,
            modified_at: Utc::now(),
            base_modified_at: None,
        }
    }

    pub fn modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = modified_at;
        self
    }

    pub fn based_on(mut self, base_modified_at: Option<DateTime<Utc>>) -> Self {
        self.base_modified_at = base_modified_at;
        self
    }
}

/// Estado persistido de la queue
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Siguiente número a asignar; nunca retrocede aunque la queue se vacíe
    pub next_sequence: u64,
    pub entries: Vec<QueueEntry>,
}
