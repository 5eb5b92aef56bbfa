// ============================================================================
// ALMACENAMIENTO PERSISTENTE - contrato clave/valor
// ============================================================================
// En el navegador lo implementa localStorage (utils::storage); en tests y
// entornos sin navegador, MemoryStore.
// ============================================================================

use serde::{de::DeserializeOwned, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{SyncError, SyncResult};

/// Almacenamiento clave/valor durable
pub trait KeyValueStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> SyncResult<()>;
    fn remove(&self, key: &str) -> SyncResult<()>;
}

pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> SyncResult<Option<T>> {
    match store.get(key)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> SyncResult<()> {
    let json = serde_json::to_string(value)?;
    store.set(key, &json)
}

/// Store en memoria. Los clones comparten datos, así que sobrevive a "reinicios"
/// de los componentes construidos encima.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Rc<RefCell<HashMap<String, String>>>,
    read_only: Rc<Cell<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simula almacenamiento lleno: toda escritura falla
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.set(read_only);
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }

    fn check_writable(&self) -> SyncResult<()> {
        if self.read_only.get() {
            return Err(SyncError::StorageUnavailable("cuota de almacenamiento excedida".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.data.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        self.check_writable()?;
        self.data.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        self.check_writable()?;
        self.data.borrow_mut().remove(key);
        Ok(())
    }
}
