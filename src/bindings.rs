// ============================================================================
// BINDINGS - superficie JavaScript sobre SyncEngine
// ============================================================================
// Todo valor cruza la frontera con serde-wasm-bindgen; las operaciones
// asíncronas devuelven Promise.
// ============================================================================

use js_sys::Promise;
use serde::Serialize;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::config::CONFIG;
use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::models::{Collection, Resolution};
use crate::services::api_client::HttpRemote;
use crate::services::network_monitor::NetworkMonitor;
use crate::services::router::Request;
use crate::utils::{BrowserSpawner, LocalStorageStore};

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(JsValue::from)
}

fn to_js_error(err: SyncError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn parse_collection(name: &str) -> Result<Collection, JsValue> {
    name.parse::<Collection>().map_err(|e| JsValue::from_str(&e))
}

#[wasm_bindgen]
pub struct OfflineClient {
    engine: SyncEngine,
}

#[wasm_bindgen]
impl OfflineClient {
    /// Crea el engine con la configuración de compilación, localStorage y HTTP
    #[wasm_bindgen(constructor)]
    pub fn new() -> OfflineClient {
        let config = CONFIG.clone();
        let monitor = NetworkMonitor::new();
        let remote = Rc::new(HttpRemote::new(Rc::new(config.clone())));
        let engine = SyncEngine::new(config, Rc::new(LocalStorageStore::new()), remote, monitor.clone());

        // Antes de empezar a monitorear: la primera transición a online ya sincroniza
        engine.start_auto_sync(BrowserSpawner);
        monitor.start_monitoring();

        log::info!("✅ OfflineClient listo ({})", engine.config().backend_url);
        OfflineClient { engine }
    }

    /// `request`: `{ kind: "list" | "get" | "create" | "update" | "delete", ... }`
    pub fn perform(&self, collection: String, request: JsValue) -> Promise {
        let engine = self.engine.clone();
        future_to_promise(async move {
            let collection = parse_collection(&collection)?;
            let request: Request = serde_wasm_bindgen::from_value(request)?;
            let response = engine.perform(collection, request).await.map_err(to_js_error)?;
            to_js(&response)
        })
    }

    #[wasm_bindgen(js_name = getSyncStatus)]
    pub fn get_sync_status(&self) -> Result<JsValue, JsValue> {
        let status = self.engine.get_sync_status().map_err(to_js_error)?;
        to_js(&status)
    }

    #[wasm_bindgen(js_name = triggerSync)]
    pub fn trigger_sync(&self) -> Promise {
        let engine = self.engine.clone();
        future_to_promise(async move {
            let report = engine.trigger_sync().await;
            to_js(&report)
        })
    }

    #[wasm_bindgen(js_name = listPendingConflicts)]
    pub fn list_pending_conflicts(&self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.list_pending_conflicts())
    }

    #[wasm_bindgen(js_name = currentConflict)]
    pub fn current_conflict(&self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.current_conflict())
    }

    /// `resolution`: `"local" | "remote" | "merge"`
    #[wasm_bindgen(js_name = resolveConflict)]
    pub fn resolve_conflict(&self, case_id: String, resolution: JsValue) -> Promise {
        let engine = self.engine.clone();
        future_to_promise(async move {
            let resolution: Resolution = serde_wasm_bindgen::from_value(resolution)?;
            let resolved = engine
                .resolve_conflict(&case_id, resolution)
                .await
                .map_err(to_js_error)?;
            to_js(&resolved)
        })
    }

    #[wasm_bindgen(js_name = skipConflict)]
    pub fn skip_conflict(&self, case_id: String) -> Result<(), JsValue> {
        self.engine.skip_conflict(&case_id).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = listBlockedEntries)]
    pub fn list_blocked_entries(&self) -> Result<JsValue, JsValue> {
        let entries = self.engine.list_blocked_entries().map_err(to_js_error)?;
        to_js(&entries)
    }

    #[wasm_bindgen(js_name = retryEntry)]
    pub fn retry_entry(&self, sequence_number: u64) -> Result<JsValue, JsValue> {
        let entry = self.engine.retry_entry(sequence_number).map_err(to_js_error)?;
        to_js(&entry)
    }

    #[wasm_bindgen(js_name = discardEntry)]
    pub fn discard_entry(&self, sequence_number: u64) -> Result<JsValue, JsValue> {
        let entry = self.engine.discard_entry(sequence_number).map_err(to_js_error)?;
        to_js(&entry)
    }

    #[wasm_bindgen(js_name = isOnline)]
    pub fn is_online(&self) -> bool {
        self.engine.monitor().is_online()
    }
}

impl Default for OfflineClient {
    fn default() -> Self {
        Self::new()
    }
}
