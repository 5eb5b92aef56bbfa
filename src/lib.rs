// ============================================================================
// OFFLINE SYNC CORE - capa de datos offline-first
// ============================================================================
// - Models: registros, queue, conflictos y reportes (serializables)
// - Services: monitor de red, store local, queue, router, reconciliador,
//   detector y protocolo de conflictos
// - Engine: fachada única que usa la UI
// - Utils / bindings: adaptadores del navegador (solo wasm32)
// ============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

#[cfg(target_arch = "wasm32")]
pub mod bindings;
#[cfg(target_arch = "wasm32")]
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::{SyncConfig, CONFIG};
pub use engine::SyncEngine;
pub use error::{RemoteError, SyncError, SyncResult};
pub use models::{
    Collection, ConflictCase, QueueEntry, ReadFilter, Record, RemoteRecord, Resolution, SyncPhase, SyncReport,
    SyncStatus, SyncStatusSnapshot,
};
pub use services::{KeyValueStore, MemoryStore, NetworkMonitor, NetworkStatus, RemoteService, Request, RouterResponse};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    // Inicializar panic hook para mejor debugging
    console_error_panic_hook::set_once();

    // Inicializar logging
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("🚀 Offline Sync Core - listo");
}
