// ============================================================================
// SYNC ENGINE - fachada que ve la UI
// ============================================================================
// Une router, queue, reconciliador y protocolo de conflictos sobre el mismo
// almacenamiento. Clonar el engine es barato: todo el estado es compartido.
// ============================================================================

use chrono::{DateTime, Utc};
use futures::task::{LocalSpawn, LocalSpawnExt};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::{
    is_temporary_id, Collection, ConflictCase, DrainReport, Operation, QueueEntry, Resolution, SyncPhase, SyncReport,
    SyncStatus, SyncStatusSnapshot,
};
use crate::services::conflict_resolver::ConflictResolver;
use crate::services::network_monitor::{ListenerId, NetworkMonitor, NetworkStatus};
use crate::services::reconciler::SyncReconciler;
use crate::services::record_store::LocalRecordStore;
use crate::services::remote::RemoteService;
use crate::services::router::{Request, RequestRouter, RouterResponse};
use crate::services::storage::{load_json, save_json, KeyValueStore};
use crate::services::write_queue::WriteQueue;
use crate::state::SyncStateWrapper;

/// Metadatos persistidos entre reinicios
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncMeta {
    last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct SyncEngine {
    config: Rc<SyncConfig>,
    store: Rc<dyn KeyValueStore>,
    records: LocalRecordStore,
    queue: WriteQueue,
    router: RequestRouter,
    reconciler: SyncReconciler,
    resolver: ConflictResolver,
    monitor: NetworkMonitor,
    state: SyncStateWrapper,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        store: Rc<dyn KeyValueStore>,
        remote: Rc<dyn RemoteService>,
        monitor: NetworkMonitor,
    ) -> Self {
        let config = Rc::new(config);
        let namespace = config.storage_namespace.clone();

        let records = LocalRecordStore::new(store.clone(), namespace.as_str());
        let queue = WriteQueue::new(store.clone(), &namespace);
        let resolver = ConflictResolver::new(config.clone());
        let router = RequestRouter::new(
            records.clone(),
            queue.clone(),
            remote.clone(),
            monitor.clone(),
            config.clone(),
        );
        let reconciler = SyncReconciler::new(
            records.clone(),
            queue.clone(),
            remote,
            monitor.clone(),
            config.clone(),
            resolver.clone(),
        );

        let state = SyncStateWrapper::new();
        match load_json::<SyncMeta>(store.as_ref(), &config.storage_key("meta")) {
            Ok(meta) => state.set_last_sync_at(meta.and_then(|m| m.last_sync_at)),
            Err(e) => log::warn!("⚠️ [STORE] Metadatos de sync ilegibles: {}", e),
        }

        Self {
            config,
            store,
            records,
            queue,
            router,
            reconciler,
            resolver,
            monitor,
            state,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }

    /// Punto de entrada único para leer y escribir registros
    pub async fn perform(&self, collection: Collection, request: Request) -> SyncResult<RouterResponse> {
        self.router.handle(collection, request).await
    }

    pub fn get_sync_status(&self) -> SyncResult<SyncStatusSnapshot> {
        Ok(SyncStatusSnapshot {
            pending_count: self.queue.pending_count()?,
            blocked_count: self.queue.blocked_entries()?.len(),
            conflict_count: self.resolver.len(),
            last_sync_at: self.state.last_sync_at(),
            is_online: self.monitor.is_online(),
            phase: self.state.phase(),
        })
    }

    pub fn last_report(&self) -> Option<SyncReport> {
        self.state.last_report()
    }

    // ========================================================================
    // SINCRONIZACIÓN
    // ========================================================================

    /// Drain + pull/merge. Si ya hay una pasada en curso, se omite.
    pub async fn trigger_sync(&self) -> SyncReport {
        if !self.state.try_begin() {
            log::info!("🔄 Sincronización ya en progreso, saltando...");
            return SyncReport::skipped();
        }

        log::info!("🔄 Iniciando sincronización...");
        self.state.set_phase(SyncPhase::Draining);
        let drain = self.reconciler.drain().await;

        let pull = if drain.aborted {
            None
        } else {
            self.state.set_phase(SyncPhase::Pulling);
            Some(self.reconciler.pull_and_merge().await)
        };

        let completed = pull.as_ref().map_or(false, |p| !p.aborted);
        if completed {
            self.record_sync_time(Utc::now());
        }

        let report = SyncReport {
            drain,
            pull,
            skipped: false,
        };
        self.finish(report.clone());

        log::info!(
            "✅ Sincronización terminada ({:?}, {} conflictos pendientes)",
            report.drain.outcome(),
            self.resolver.len()
        );
        report
    }

    fn finish(&self, report: SyncReport) {
        self.state.set_phase(if self.resolver.is_empty() {
            SyncPhase::Idle
        } else {
            SyncPhase::AwaitingResolution
        });
        self.state.finish(report);
    }

    fn record_sync_time(&self, at: DateTime<Utc>) {
        self.state.set_last_sync_at(Some(at));
        let meta = SyncMeta { last_sync_at: Some(at) };
        if let Err(e) = save_json(self.store.as_ref(), &self.config.storage_key("meta"), &meta) {
            log::warn!("⚠️ [STORE] No se pudo guardar la hora de sync: {}", e);
        }
    }

    /// Registra un listener de red que lanza una sincronización en cada
    /// transición a online.
    pub fn start_auto_sync<S>(&self, spawner: S) -> ListenerId
    where
        S: LocalSpawn + 'static,
    {
        let engine = self.clone();
        self.monitor.on_change(move |status| {
            if status != NetworkStatus::Online {
                return;
            }
            let engine = engine.clone();
            let spawned = spawner.spawn_local(async move {
                engine.trigger_sync().await;
            });
            if let Err(e) = spawned {
                log::error!("❌ [NETWORK] No se pudo lanzar la sincronización: {}", e);
            }
        })
    }

    // ========================================================================
    // CONFLICTOS
    // ========================================================================

    pub fn list_pending_conflicts(&self) -> Vec<ConflictCase> {
        self.resolver.list_pending()
    }

    /// Caso que se presenta ahora (uno a la vez)
    pub fn current_conflict(&self) -> Option<ConflictCase> {
        self.resolver.current()
    }

    /// Aplica la resolución elegida. Cuando ya no quedan casos y hay red, se
    /// hace un último drain para enviar los resultados.
    pub async fn resolve_conflict(&self, case_id: &str, resolution: Resolution) -> SyncResult<ConflictCase> {
        let reconciler = self.reconciler.clone();
        let resolved = self
            .resolver
            .resolve(case_id, resolution, |case, record| reconciler.commit_resolution(case, record))?;

        if self.resolver.is_empty() {
            if self.monitor.is_online() {
                self.final_drain().await;
            } else if !self.state.is_syncing() {
                self.state.set_phase(SyncPhase::Idle);
            }
        }
        Ok(resolved)
    }

    async fn final_drain(&self) -> Option<DrainReport> {
        if !self.state.try_begin() {
            return None;
        }
        self.state.set_phase(SyncPhase::Draining);
        let drain = self.reconciler.drain().await;
        self.finish(SyncReport {
            drain: drain.clone(),
            pull: None,
            skipped: false,
        });
        Some(drain)
    }

    /// Pospone un caso; el registro sigue `conflicted` y el próximo pull lo
    /// vuelve a detectar.
    pub fn skip_conflict(&self, case_id: &str) -> SyncResult<()> {
        self.resolver.skip(case_id)?;
        if self.resolver.is_empty() && !self.state.is_syncing() {
            self.state.set_phase(SyncPhase::Idle);
        }
        Ok(())
    }

    // ========================================================================
    // ENTRADAS BLOQUEADAS
    // ========================================================================

    pub fn list_blocked_entries(&self) -> SyncResult<Vec<QueueEntry>> {
        self.queue.blocked_entries()
    }

    /// Vuelve a intentar una entrada rechazada o atascada en el próximo drain
    pub fn retry_entry(&self, sequence_number: u64) -> SyncResult<QueueEntry> {
        let entry = self.queue.retry(sequence_number)?;
        let status = match entry.operation {
            Operation::Create => SyncStatus::PendingCreate,
            Operation::Update => SyncStatus::PendingUpdate,
            Operation::Delete => SyncStatus::PendingDelete,
        };
        match self.records.set_sync_status(entry.collection, &entry.record_id, status) {
            Ok(()) | Err(SyncError::NotFound { .. }) => Ok(entry),
            Err(e) => Err(e),
        }
    }

    /// Descarta una entrada. Si el registro queda sin cambios pendientes se
    /// devuelve a la versión del servidor (o se elimina si nunca llegó a él).
    pub fn discard_entry(&self, sequence_number: u64) -> SyncResult<QueueEntry> {
        let entry = self.queue.ack(sequence_number)?;
        let collection = entry.collection;
        log::info!("🗑️ [QUEUE] #{} descartada ({})", sequence_number, entry.record_id);

        if is_temporary_id(&entry.record_id) {
            if entry.operation == Operation::Create {
                // Sin create, el resto de entradas del registro nunca se podría enviar
                self.queue.remove_for_record(collection, &entry.record_id)?;
                self.records.remove(collection, &entry.record_id)?;
            }
            return Ok(entry);
        }

        if !self.queue.has_entries_for(collection, &entry.record_id)? {
            if let Some(mut record) = self.records.get_by_id(collection, &entry.record_id)? {
                // Sin avance local respecto del punto de sync: el próximo pull trae la copia remota
                record.sync_status = SyncStatus::Synced;
                if let Some(synced_at) = record.synced_at {
                    record.modified_at = synced_at;
                }
                self.records.upsert(collection, record)?;
            }
        }
        Ok(entry)
    }
}
