// ============================================================================
// LOCAL STORAGE - backend clave/valor del navegador
// ============================================================================

use gloo_storage::{LocalStorage, Storage};

use crate::error::{SyncError, SyncResult};
use crate::services::storage::KeyValueStore;

/// `localStorage` de la ventana. Los valores ya llegan serializados en JSON.
#[derive(Clone, Copy, Default)]
pub struct LocalStorageStore;

impl LocalStorageStore {
    pub fn new() -> Self {
        Self
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        LocalStorage::raw()
            .get_item(key)
            .map_err(|_| SyncError::StorageUnavailable("No se pudo leer localStorage".to_string()))
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        LocalStorage::raw().set_item(key, value).map_err(|_| {
            log::error!("❌ [STORE] Error guardando {} en localStorage", key);
            SyncError::StorageUnavailable("Error guardando en localStorage (¿cuota excedida?)".to_string())
        })
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        LocalStorage::delete(key);
        Ok(())
    }
}
