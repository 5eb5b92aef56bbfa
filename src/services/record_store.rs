// ============================================================================
// LOCAL RECORD STORE - copia durable de cada registro por colección
// ============================================================================

use std::rc::Rc;

use crate::error::{SyncError, SyncResult};
use crate::models::{Collection, Record, SyncStatus};
use crate::services::storage::{load_json, save_json, KeyValueStore};

#[derive(Clone)]
pub struct LocalRecordStore {
    store: Rc<dyn KeyValueStore>,
    namespace: String,
}

impl LocalRecordStore {
    pub fn new(store: Rc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    fn key(&self, collection: Collection) -> String {
        format!("{}:records:{}", self.namespace, collection)
    }

    fn load(&self, collection: Collection) -> SyncResult<Vec<Record>> {
        Ok(load_json(self.store.as_ref(), &self.key(collection))?.unwrap_or_default())
    }

    fn save(&self, collection: Collection, records: &[Record]) -> SyncResult<()> {
        save_json(self.store.as_ref(), &self.key(collection), &records)
    }

    /// Todos los registros en orden de inserción, incluidos los `pendingDelete`
    pub fn get_all(&self, collection: Collection) -> SyncResult<Vec<Record>> {
        self.load(collection)
    }

    pub fn get_by_id(&self, collection: Collection, id: &str) -> SyncResult<Option<Record>> {
        Ok(self.load(collection)?.into_iter().find(|r| r.id == id))
    }

    /// Inserta o reemplaza; al volver Ok el registro ya es durable
    pub fn upsert(&self, collection: Collection, record: Record) -> SyncResult<()> {
        let mut records = self.load(collection)?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.save(collection, &records)
    }

    /// Devuelve `true` si el registro existía
    pub fn remove(&self, collection: Collection, id: &str) -> SyncResult<bool> {
        let mut records = self.load(collection)?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.save(collection, &records)?;
        Ok(true)
    }

    pub fn set_sync_status(&self, collection: Collection, id: &str, status: SyncStatus) -> SyncResult<()> {
        let mut records = self.load(collection)?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| SyncError::NotFound {
                collection,
                id: id.to_string(),
            })?;
        record.sync_status = status;
        self.save(collection, &records)
    }

    /// Sustituye un id temporal por el id del servidor conservando la posición
    pub fn rewrite_id(&self, collection: Collection, old_id: &str, new_id: &str) -> SyncResult<bool> {
        let mut records = self.load(collection)?;
        let Some(record) = records.iter_mut().find(|r| r.id == old_id) else {
            return Ok(false);
        };
        record.id = new_id.to_string();
        // Si el servidor ya nos había devuelto ese id (pull previo) evitamos el duplicado
        let mut seen = false;
        records.retain(|r| {
            if r.id != new_id {
                return true;
            }
            let keep = !seen;
            seen = true;
            keep
        });
        self.save(collection, &records)?;
        Ok(true)
    }
}
