// ============================================================================
// SYNC RECONCILER - vacía la queue y luego trae/mezcla el estado remoto
// ============================================================================
// Drain: cada colección en paralelo, FIFO dentro de la colección. Una entrada
// rechazada bloquea solo su registro; la pérdida de red aborta todo el drain.
// Pull: por colección offline, clasifica cada par local/remoto y genera
// casos de conflicto para el protocolo de resolución.
// ============================================================================

use futures::future::join_all;
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::config::SyncConfig;
use crate::error::{RemoteError, SyncError, SyncResult};
use crate::models::{
    Classification, Collection, ConflictCase, DrainReport, EntryState, NewQueueEntry, Operation, PullReport,
    QueueEntry, ReadFilter, Record, RemoteRecord, SyncReport, SyncStatus,
};
use crate::services::conflict_detector::classify;
use crate::services::conflict_resolver::ConflictResolver;
use crate::services::network_monitor::NetworkMonitor;
use crate::services::record_store::LocalRecordStore;
use crate::services::remote::{RemoteService, WriteRequest};
use crate::services::write_queue::WriteQueue;

/// Resultado de entregar una entrada
#[derive(Debug, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Rejected,
    /// Sin red; `stuck` si la entrada alcanzó el máximo de intentos
    Unreachable { stuck: bool },
    /// Error local al registrar el resultado
    Failed,
}

#[derive(Clone)]
pub struct SyncReconciler {
    records: LocalRecordStore,
    queue: WriteQueue,
    remote: Rc<dyn RemoteService>,
    monitor: NetworkMonitor,
    config: Rc<SyncConfig>,
    resolver: ConflictResolver,
}

impl SyncReconciler {
    pub fn new(
        records: LocalRecordStore,
        queue: WriteQueue,
        remote: Rc<dyn RemoteService>,
        monitor: NetworkMonitor,
        config: Rc<SyncConfig>,
        resolver: ConflictResolver,
    ) -> Self {
        Self {
            records,
            queue,
            remote,
            monitor,
            config,
            resolver,
        }
    }

    /// Pasada completa: drain y, si no se abortó, pull + merge
    pub async fn sync(&self) -> SyncReport {
        let drain = self.drain().await;
        if drain.aborted {
            log::warn!("⚠️ [DRAIN] Abortado, se omite el pull");
            return SyncReport {
                drain,
                pull: None,
                skipped: false,
            };
        }

        let pull = self.pull_and_merge().await;
        SyncReport {
            drain,
            pull: Some(pull),
            skipped: false,
        }
    }

    // ========================================================================
    // DRAIN
    // ========================================================================

    pub async fn drain(&self) -> DrainReport {
        if self.monitor.is_offline() {
            return DrainReport {
                aborted: true,
                ..DrainReport::default()
            };
        }

        let collections = match self.queue.collections_with_pending() {
            Ok(collections) => collections,
            Err(e) => {
                log::error!("❌ [DRAIN] No se pudo leer la queue: {}", e);
                return DrainReport {
                    errors: 1,
                    ..DrainReport::default()
                };
            }
        };

        if collections.is_empty() {
            return DrainReport::default();
        }

        log::info!("🔄 [DRAIN] Enviando cambios de {} colecciones", collections.len());

        let abort = Cell::new(false);
        let reports = join_all(collections.into_iter().map(|c| self.drain_collection(c, &abort))).await;

        let mut report = DrainReport::default();
        for partial in reports {
            report.merge(partial);
        }

        log::info!(
            "✅ [DRAIN] {} entregadas, {} rechazadas, {} atascadas{}",
            report.delivered.len(),
            report.rejected.len(),
            report.stuck.len(),
            if report.aborted { " (abortado)" } else { "" }
        );
        report
    }

    async fn drain_collection(&self, collection: Collection, abort: &Cell<bool>) -> DrainReport {
        let mut report = DrainReport::default();
        let mut last_sequence = 0;

        loop {
            if abort.get() || self.monitor.is_offline() {
                report.aborted = true;
                break;
            }

            let entry = match self.queue.next_after(collection, last_sequence) {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    log::error!("❌ [DRAIN] {}: {}", collection, e);
                    report.errors += 1;
                    break;
                }
            };
            last_sequence = entry.sequence_number;

            match self.deliver(&entry).await {
                Delivery::Delivered => report.delivered.push(entry.sequence_number),
                Delivery::Rejected => report.rejected.push(entry.sequence_number),
                Delivery::Failed => report.errors += 1,
                Delivery::Unreachable { stuck } => {
                    if stuck {
                        report.stuck.push(entry.sequence_number);
                    }
                    abort.set(true);
                    report.aborted = true;
                    break;
                }
            }
        }

        report
    }

    async fn deliver(&self, entry: &QueueEntry) -> Delivery {
        let request = WriteRequest {
            collection: entry.collection,
            operation: entry.operation,
            record_id: match entry.operation {
                Operation::Create => None,
                _ => Some(entry.record_id.clone()),
            },
            payload: entry.payload.clone(),
            modified_at: entry.modified_at,
            base_modified_at: entry.base_modified_at,
        };

        match self.remote.write(request).await {
            // Aunque la red haya caído durante la petición, el servidor ya la aceptó
            Ok(confirmed) => match self.settle(entry, confirmed) {
                Ok(()) => Delivery::Delivered,
                Err(e) => {
                    log::error!("❌ [DRAIN] #{} entregada pero no registrada: {}", entry.sequence_number, e);
                    Delivery::Failed
                }
            },
            Err(RemoteError::Unreachable(message)) => {
                log::warn!("📴 [DRAIN] #{} sin red: {}", entry.sequence_number, message);
                match self
                    .queue
                    .report_failure(entry.sequence_number, &message, self.config.max_attempts)
                {
                    Ok(updated) => Delivery::Unreachable {
                        stuck: updated.state == EntryState::Stuck,
                    },
                    Err(e) => {
                        log::error!("❌ [DRAIN] #{}: {}", entry.sequence_number, e);
                        Delivery::Unreachable { stuck: false }
                    }
                }
            }
            Err(rejected) => {
                log::warn!("⚠️ [DRAIN] #{} rechazada: {}", entry.sequence_number, rejected);
                let marked = self
                    .queue
                    .mark_conflicted(entry.sequence_number, &rejected.to_string())
                    .and_then(|_| self.mark_record_conflicted(entry.collection, &entry.record_id));
                match marked {
                    Ok(()) => Delivery::Rejected,
                    Err(e) => {
                        log::error!("❌ [DRAIN] #{}: {}", entry.sequence_number, e);
                        Delivery::Failed
                    }
                }
            }
        }
    }

    fn mark_record_conflicted(&self, collection: Collection, id: &str) -> SyncResult<()> {
        match self.records.set_sync_status(collection, id, SyncStatus::Conflicted) {
            Err(SyncError::NotFound { .. }) => Ok(()),
            other => other,
        }
    }

    /// Registra una escritura aceptada: saca la entrada, sustituye ids
    /// temporales y actualiza la copia local.
    fn settle(&self, entry: &QueueEntry, confirmed: Option<RemoteRecord>) -> SyncResult<()> {
        let collection = entry.collection;

        let confirmed = match (entry.operation, confirmed) {
            (Operation::Create, Some(remote)) => return self.settle_create(entry, remote),
            (_, confirmed) => confirmed,
        };

        match self.queue.ack(entry.sequence_number) {
            Ok(_) => {}
            Err(SyncError::UnknownEntry(_)) => return Ok(()),
            Err(e) => return Err(e),
        }

        let Some(remote) = confirmed else {
            if entry.operation == Operation::Delete {
                if !self.queue.has_entries_for(collection, &entry.record_id)? {
                    self.records.remove(collection, &entry.record_id)?;
                }
            } else {
                self.mark_synced_without_body(entry)?;
            }
            return Ok(());
        };

        if entry.operation == Operation::Delete {
            if !self.queue.has_entries_for(collection, &remote.id)? {
                self.records.remove(collection, &remote.id)?;
            }
            return Ok(());
        }

        if self.queue.rebase_record(collection, &remote.id, remote.modified_at)? > 0 {
            self.keep_local_changes(collection, &remote)?;
            return Ok(());
        }

        self.records.upsert(collection, Record::from_remote(collection, remote))
    }

    /// El create se confirma al final: si algo falla antes, la entrada sigue
    /// en la queue con el id temporal y el registro local intacto.
    fn settle_create(&self, entry: &QueueEntry, remote: RemoteRecord) -> SyncResult<()> {
        let collection = entry.collection;
        let renamed = self.records.rewrite_id(collection, &entry.record_id, &remote.id)?;

        let remaining = match self.queue.ack_create(entry.sequence_number, &remote.id, remote.modified_at) {
            Ok(remaining) => remaining,
            Err(SyncError::UnknownEntry(_)) => {
                // El registro se borró localmente mientras su create estaba en vuelo
                log::info!("🗑️ [DRAIN] {} borrado en vuelo, encolando delete de {}", entry.record_id, remote.id);
                self.queue.enqueue(
                    NewQueueEntry::new(collection, Operation::Delete, remote.id, remote.payload)
                        .based_on(Some(remote.modified_at)),
                )?;
                return Ok(());
            }
            Err(e) => {
                if renamed {
                    if let Err(undo) = self.records.rewrite_id(collection, &remote.id, &entry.record_id) {
                        log::error!("❌ [DRAIN] No se pudo volver a {}: {}", entry.record_id, undo);
                    }
                }
                return Err(e);
            }
        };
        log::info!("🆔 [DRAIN] {} -> {}", entry.record_id, remote.id);

        if remaining > 0 {
            return self.keep_local_changes(collection, &remote);
        }
        self.records.upsert(collection, Record::from_remote(collection, remote))
    }

    /// Quedan cambios posteriores: se conserva el payload local y se avanza
    /// el punto de sincronización
    fn keep_local_changes(&self, collection: Collection, remote: &RemoteRecord) -> SyncResult<()> {
        if let Some(mut local) = self.records.get_by_id(collection, &remote.id)? {
            local.synced_at = Some(remote.modified_at);
            if local.sync_status == SyncStatus::PendingCreate {
                local.sync_status = SyncStatus::PendingUpdate;
            }
            self.records.upsert(collection, local)?;
        }
        Ok(())
    }

    fn mark_synced_without_body(&self, entry: &QueueEntry) -> SyncResult<()> {
        if self.queue.has_entries_for(entry.collection, &entry.record_id)? {
            return Ok(());
        }
        if let Some(mut local) = self.records.get_by_id(entry.collection, &entry.record_id)? {
            local.sync_status = SyncStatus::Synced;
            local.synced_at = Some(entry.modified_at);
            self.records.upsert(entry.collection, local)?;
        }
        Ok(())
    }

    // ========================================================================
    // PULL + MERGE
    // ========================================================================

    pub async fn pull_and_merge(&self) -> PullReport {
        let mut report = PullReport::default();
        let mut cases = Vec::new();

        for collection in self.config.offline_collections.iter().copied() {
            if self.monitor.is_offline() {
                report.aborted = true;
                break;
            }

            let remote_records = match self.remote.read(collection, &ReadFilter::all()).await {
                Ok(records) => records,
                Err(RemoteError::Unreachable(message)) => {
                    log::warn!("📴 [PULL] {} sin red: {}", collection, message);
                    report.aborted = true;
                    break;
                }
                Err(e) => {
                    log::error!("❌ [PULL] {}: {}", collection, e);
                    report.errors += 1;
                    continue;
                }
            };

            // Respuesta que llega ya offline: se descarta
            if self.monitor.is_offline() {
                report.aborted = true;
                break;
            }

            match self.merge_collection(collection, remote_records, &mut cases) {
                Ok(partial) => report.merge(partial),
                Err(e) => {
                    log::error!("❌ [PULL] Merge de {} falló: {}", collection, e);
                    report.errors += 1;
                }
            }
        }

        if !cases.is_empty() {
            log::warn!("⚠️ [CONFLICT] {} conflictos detectados", cases.len());
            self.resolver.add_cases(cases);
        }

        log::info!(
            "📥 [PULL] {} aplicados, {} eliminados, {} locales por delante, {} conflictos",
            report.applied,
            report.removed,
            report.locally_ahead,
            report.conflicts
        );
        report
    }

    fn merge_collection(
        &self,
        collection: Collection,
        remote_records: Vec<RemoteRecord>,
        cases: &mut Vec<ConflictCase>,
    ) -> SyncResult<PullReport> {
        let mut report = PullReport::default();
        let remote_ids: HashSet<String> = remote_records.iter().map(|r| r.id.clone()).collect();

        for remote in remote_records {
            let remote = Record::from_remote(collection, remote);

            let Some(local) = self.records.get_by_id(collection, &remote.id)? else {
                // Sin copia local pero con entradas: un delete local en curso
                if !self.queue.has_entries_for(collection, &remote.id)? {
                    self.records.upsert(collection, remote)?;
                    report.applied += 1;
                }
                continue;
            };

            let classification = classify(&local, &remote);

            if local.sync_status == SyncStatus::Synced {
                match classification {
                    Classification::Conflict => {
                        self.open_case(collection, local, remote, cases)?;
                        report.conflicts += 1;
                    }
                    _ if local != remote => {
                        self.records.upsert(collection, remote)?;
                        report.applied += 1;
                    }
                    _ => {}
                }
                continue;
            }

            match classification {
                Classification::Conflict | Classification::RemotelyAhead => {
                    self.open_case(collection, local, remote, cases)?;
                    report.conflicts += 1;
                }
                Classification::LocallyAhead | Classification::Identical => report.locally_ahead += 1,
            }
        }

        // Borrados en el servidor: solo registros sincronizados sin cambios locales
        for local in self.records.get_all(collection)? {
            if remote_ids.contains(&local.id)
                || local.sync_status != SyncStatus::Synced
                || local.has_temporary_id()
                || self.queue.has_entries_for(collection, &local.id)?
            {
                continue;
            }
            self.records.remove(collection, &local.id)?;
            report.removed += 1;
        }

        Ok(report)
    }

    fn open_case(
        &self,
        collection: Collection,
        local: Record,
        remote: Record,
        cases: &mut Vec<ConflictCase>,
    ) -> SyncResult<()> {
        // Un borrado pendiente conserva su estado para que "local" siga siendo un delete
        if local.sync_status != SyncStatus::PendingDelete {
            self.records.set_sync_status(collection, &local.id, SyncStatus::Conflicted)?;
        }
        cases.push(ConflictCase::new(local, remote));
        Ok(())
    }

    // ========================================================================
    // RESOLUCIÓN
    // ========================================================================

    /// Confirma el registro elegido para un caso: reemplaza cualquier entrada
    /// previa del registro y, si el resultado no es la copia remota, encola su
    /// envío basado en la versión remota vista.
    pub fn commit_resolution(&self, case: &ConflictCase, record: Record) -> SyncResult<()> {
        let collection = case.collection;
        let id = record.id.clone();

        let entry = match record.sync_status {
            SyncStatus::Synced => None,
            status => {
                let operation = if status == SyncStatus::PendingDelete {
                    Operation::Delete
                } else {
                    Operation::Update
                };
                Some(
                    NewQueueEntry::new(collection, operation, id.as_str(), record.payload.clone())
                        .modified_at(record.modified_at)
                        .based_on(Some(case.remote_modified_at)),
                )
            }
        };

        let previous = self.records.get_by_id(collection, &id)?;
        self.records.upsert(collection, record)?;

        if let Err(err) = self.queue.replace_for_record(collection, &id, entry) {
            // Sin la queue actualizada el caso sigue abierto sobre la versión anterior
            let restored = match previous {
                Some(previous) => self.records.upsert(collection, previous),
                None => self.records.remove(collection, &id).map(|_| ()),
            };
            if let Err(restore_err) = restored {
                log::error!("❌ [CONFLICT] No se pudo restaurar {}: {}", id, restore_err);
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }
}
