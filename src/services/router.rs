// ============================================================================
// REQUEST ROUTER - único punto de entrada para leer/escribir registros
// ============================================================================
// Online: va al servicio remoto y escribe el resultado en el store local.
// Offline (o remoto inalcanzable): sirve desde el store local y encola las
// escrituras. El llamador recibe la misma forma de respuesta en ambos casos.
// ============================================================================

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::rc::Rc;

use crate::config::SyncConfig;
use crate::error::{RemoteError, SyncError, SyncResult};
use crate::models::{
    is_temporary_id, Collection, NewQueueEntry, Operation, ReadFilter, Record, RemoteRecord, SyncStatus,
};
use crate::services::network_monitor::NetworkMonitor;
use crate::services::record_store::LocalRecordStore;
use crate::services::remote::{RemoteService, WriteRequest};
use crate::services::write_queue::WriteQueue;

/// Operación pedida por la UI
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    List { filter: ReadFilter },
    Get { id: String },
    Create { payload: Value },
    /// Reemplaza el payload completo
    Update { id: String, payload: Value },
    Delete { id: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    Remote,
    Local,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterResponse {
    pub records: Vec<Record>,
    pub source: ServedFrom,
    /// Número de secuencia si la escritura quedó en la queue
    pub queued: Option<u64>,
}

impl RouterResponse {
    fn remote(records: Vec<Record>) -> Self {
        Self {
            records,
            source: ServedFrom::Remote,
            queued: None,
        }
    }

    fn local(records: Vec<Record>, queued: Option<u64>) -> Self {
        Self {
            records,
            source: ServedFrom::Local,
            queued,
        }
    }
}

#[derive(Clone)]
pub struct RequestRouter {
    records: LocalRecordStore,
    queue: WriteQueue,
    remote: Rc<dyn RemoteService>,
    monitor: NetworkMonitor,
    config: Rc<SyncConfig>,
}

impl RequestRouter {
    pub fn new(
        records: LocalRecordStore,
        queue: WriteQueue,
        remote: Rc<dyn RemoteService>,
        monitor: NetworkMonitor,
        config: Rc<SyncConfig>,
    ) -> Self {
        Self {
            records,
            queue,
            remote,
            monitor,
            config,
        }
    }

    pub async fn handle(&self, collection: Collection, request: Request) -> SyncResult<RouterResponse> {
        match request {
            Request::List { filter } => self.read(collection, filter).await,
            Request::Get { id } => {
                let response = self.read(collection, ReadFilter::by_id(id.clone())).await?;
                if response.records.is_empty() {
                    return Err(SyncError::NotFound { collection, id });
                }
                Ok(response)
            }
            Request::Create { payload } => self.create(collection, payload).await,
            Request::Update { id, payload } => self.update(collection, id, payload).await,
            Request::Delete { id } => self.delete(collection, id).await,
        }
    }

    fn ensure_offline_capable(&self, collection: Collection) -> SyncResult<()> {
        if self.config.is_offline_capable(collection) {
            Ok(())
        } else {
            Err(SyncError::NotSupportedOffline(collection))
        }
    }

    // ========================================================================
    // LECTURAS
    // ========================================================================

    async fn read(&self, collection: Collection, filter: ReadFilter) -> SyncResult<RouterResponse> {
        if self.monitor.is_offline() {
            return self.read_local(collection, &filter);
        }

        if !self.config.is_offline_capable(collection) {
            let remote_records = self.remote.read(collection, &filter).await.map_err(|err| match err {
                RemoteError::Unreachable(_) => SyncError::NotSupportedOffline(collection),
                other => other.into(),
            })?;
            return Ok(RouterResponse::remote(
                remote_records
                    .into_iter()
                    .map(|r| Record::from_remote(collection, r))
                    .collect(),
            ));
        }

        // Ids conocidos antes de la petición: detecta borrados locales en vuelo
        let known_before: HashSet<String> = self
            .records
            .get_all(collection)?
            .into_iter()
            .map(|r| r.id)
            .collect();

        match self.remote.read(collection, &filter).await {
            Ok(remote_records) => self.write_through(collection, &filter, remote_records, &known_before),
            Err(RemoteError::Unreachable(message)) => {
                log::warn!("📴 [ROUTER] {} inalcanzable ({}), sirviendo desde local", collection, message);
                self.read_local(collection, &filter)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn read_local(&self, collection: Collection, filter: &ReadFilter) -> SyncResult<RouterResponse> {
        self.ensure_offline_capable(collection)?;
        let records = self
            .records
            .get_all(collection)?
            .into_iter()
            .filter(|r| r.is_visible() && filter.matches(r))
            .collect();
        Ok(RouterResponse::local(records, None))
    }

    /// Guarda la respuesta remota sin pisar cambios locales pendientes
    fn write_through(
        &self,
        collection: Collection,
        filter: &ReadFilter,
        remote_records: Vec<RemoteRecord>,
        known_before: &HashSet<String>,
    ) -> SyncResult<RouterResponse> {
        let mut served = Vec::with_capacity(remote_records.len());

        for remote in remote_records {
            match self.records.get_by_id(collection, &remote.id)? {
                Some(local) if local.sync_status != SyncStatus::Synced => {
                    // La versión local con cambios sin enviar es la que ve el usuario
                    if local.is_visible() {
                        served.push(local);
                    }
                    continue;
                }
                None if known_before.contains(&remote.id) => {
                    log::debug!("🗑️ [ROUTER] {} borrado durante la lectura, se descarta", remote.id);
                    continue;
                }
                None if self.queue.has_entries_for(collection, &remote.id)? => continue,
                _ => {}
            }

            let record = Record::from_remote(collection, remote);
            self.records.upsert(collection, record.clone())?;
            served.push(record);
        }

        // Registros creados offline que el servidor todavía no conoce
        served.extend(
            self.records
                .get_all(collection)?
                .into_iter()
                .filter(|r| r.has_temporary_id() && r.is_visible() && filter.matches(r)),
        );

        Ok(RouterResponse::remote(served))
    }

    // ========================================================================
    // ESCRITURAS
    // ========================================================================

    async fn create(&self, collection: Collection, payload: Value) -> SyncResult<RouterResponse> {
        if self.monitor.is_offline() {
            return self.create_local(collection, payload);
        }

        let request = WriteRequest {
            collection,
            operation: Operation::Create,
            record_id: None,
            payload: payload.clone(),
            modified_at: Utc::now(),
            base_modified_at: None,
        };

        match self.remote.write(request).await {
            Ok(confirmed) => {
                let remote = confirmed
                    .ok_or_else(|| SyncError::Serialization("create sin registro en la respuesta".to_string()))?;
                self.store_confirmed(collection, remote)
            }
            Err(RemoteError::Unreachable(message)) => {
                log::warn!("📴 [ROUTER] create en {} sin red ({}), encolando", collection, message);
                self.create_local(collection, payload)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update(&self, collection: Collection, id: String, payload: Value) -> SyncResult<RouterResponse> {
        if !self.should_write_remote(collection, &id)? {
            return self.update_local(collection, &id, payload);
        }

        let base = self.records.get_by_id(collection, &id)?.and_then(|r| r.synced_at);
        let request = WriteRequest {
            collection,
            operation: Operation::Update,
            record_id: Some(id.clone()),
            payload: payload.clone(),
            modified_at: Utc::now(),
            base_modified_at: base,
        };

        match self.remote.write(request).await {
            Ok(Some(remote)) => self.store_confirmed(collection, remote),
            Ok(None) => Err(SyncError::Serialization("update sin registro en la respuesta".to_string())),
            Err(RemoteError::Unreachable(message)) => {
                log::warn!("📴 [ROUTER] update de {} sin red ({}), encolando", id, message);
                self.update_local(collection, &id, payload)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, collection: Collection, id: String) -> SyncResult<RouterResponse> {
        // Un registro que el servidor nunca vio se borra sin contactarlo
        if is_temporary_id(&id) {
            return self.delete_local_only(collection, &id);
        }

        if !self.should_write_remote(collection, &id)? {
            return self.delete_local(collection, &id);
        }

        let local = self.records.get_by_id(collection, &id)?;
        let request = WriteRequest {
            collection,
            operation: Operation::Delete,
            record_id: Some(id.clone()),
            payload: local.as_ref().map(|r| r.payload.clone()).unwrap_or(Value::Null),
            modified_at: Utc::now(),
            base_modified_at: local.and_then(|r| r.synced_at),
        };

        match self.remote.write(request).await {
            Ok(_) => {
                if self.config.is_offline_capable(collection) {
                    self.records.remove(collection, &id)?;
                }
                Ok(RouterResponse::remote(Vec::new()))
            }
            Err(RemoteError::Unreachable(message)) => {
                log::warn!("📴 [ROUTER] delete de {} sin red ({}), encolando", id, message);
                self.delete_local(collection, &id)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Las escrituras sobre un registro con entradas en la queue se encolan
    /// detrás de ellas para no adelantarse al orden FIFO.
    fn should_write_remote(&self, collection: Collection, id: &str) -> SyncResult<bool> {
        if self.monitor.is_offline() || is_temporary_id(id) {
            return Ok(false);
        }
        if !self.config.is_offline_capable(collection) {
            return Ok(true);
        }
        Ok(!self.queue.has_entries_for(collection, id)?)
    }

    fn store_confirmed(&self, collection: Collection, remote: RemoteRecord) -> SyncResult<RouterResponse> {
        let record = Record::from_remote(collection, remote);
        if self.config.is_offline_capable(collection) {
            self.records.upsert(collection, record.clone())?;
        }
        Ok(RouterResponse::remote(vec![record]))
    }

    /// Guarda la versión optimista y encola su envío. Si la queue no se puede
    /// guardar, el store vuelve a `previous` y la operación falla entera.
    fn save_and_enqueue(
        &self,
        collection: Collection,
        previous: Option<Record>,
        record: &Record,
        entry: NewQueueEntry,
    ) -> SyncResult<u64> {
        self.records.upsert(collection, record.clone())?;

        match self.queue.enqueue(entry) {
            Ok(sequence) => Ok(sequence),
            Err(err) => {
                let restored = match previous {
                    Some(previous) => self.records.upsert(collection, previous),
                    None => self.records.remove(collection, &record.id).map(|_| ()),
                };
                if let Err(restore_err) = restored {
                    log::error!("❌ [ROUTER] No se pudo restaurar {}: {}", record.id, restore_err);
                }
                Err(err)
            }
        }
    }

    fn create_local(&self, collection: Collection, payload: Value) -> SyncResult<RouterResponse> {
        self.ensure_offline_capable(collection)?;

        let record = Record::new_local(collection, payload);
        let sequence = self.save_and_enqueue(
            collection,
            None,
            &record,
            NewQueueEntry::new(collection, Operation::Create, record.id.clone(), record.payload.clone())
                .modified_at(record.modified_at),
        )?;

        log::info!("💾 [ROUTER] {} creado offline como {}", collection, record.id);
        Ok(RouterResponse::local(vec![record], Some(sequence)))
    }

    fn update_local(&self, collection: Collection, id: &str, payload: Value) -> SyncResult<RouterResponse> {
        self.ensure_offline_capable(collection)?;

        let previous = self
            .records
            .get_by_id(collection, id)?
            .filter(Record::is_visible)
            .ok_or_else(|| SyncError::NotFound {
                collection,
                id: id.to_string(),
            })?;

        let mut record = previous.clone();
        record.payload = payload;
        record.modified_at = Utc::now();
        if record.sync_status == SyncStatus::Synced {
            record.sync_status = SyncStatus::PendingUpdate;
        }

        let sequence = self.save_and_enqueue(
            collection,
            Some(previous),
            &record,
            NewQueueEntry::new(collection, Operation::Update, id, record.payload.clone())
                .modified_at(record.modified_at)
                .based_on(record.synced_at),
        )?;

        Ok(RouterResponse::local(vec![record], Some(sequence)))
    }

    fn delete_local(&self, collection: Collection, id: &str) -> SyncResult<RouterResponse> {
        self.ensure_offline_capable(collection)?;

        let previous = self
            .records
            .get_by_id(collection, id)?
            .filter(Record::is_visible)
            .ok_or_else(|| SyncError::NotFound {
                collection,
                id: id.to_string(),
            })?;

        let mut record = previous.clone();
        record.modified_at = Utc::now();
        record.sync_status = SyncStatus::PendingDelete;

        let sequence = self.save_and_enqueue(
            collection,
            Some(previous),
            &record,
            NewQueueEntry::new(collection, Operation::Delete, id, record.payload.clone())
                .modified_at(record.modified_at)
                .based_on(record.synced_at),
        )?;

        Ok(RouterResponse::local(Vec::new(), Some(sequence)))
    }

    fn delete_local_only(&self, collection: Collection, id: &str) -> SyncResult<RouterResponse> {
        let removed_entries = self.queue.remove_for_record(collection, id)?;
        let existed = self.records.remove(collection, id)?;
        if !existed && removed_entries == 0 {
            return Err(SyncError::NotFound {
                collection,
                id: id.to_string(),
            });
        }

        log::info!("🗑️ [ROUTER] {} solo existía localmente, {} entradas descartadas", id, removed_entries);
        Ok(RouterResponse::local(Vec::new(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::KeyValueStore;
    use crate::test_support::{t, FakeRemote, Fixture, SelectiveFailStore};
    use async_trait::async_trait;
    use futures::executor::block_on;
    use serde_json::json;

    fn router(fx: &Fixture) -> RequestRouter {
        router_over(fx, fx.store(), fx.remote())
    }

    fn router_over(fx: &Fixture, store: Rc<dyn KeyValueStore>, remote: Rc<dyn RemoteService>) -> RequestRouter {
        RequestRouter::new(
            LocalRecordStore::new(store.clone(), "test"),
            WriteQueue::new(store, "test"),
            remote,
            fx.monitor.clone(),
            fx.config.clone(),
        )
    }

    /// Remoto cuya lectura borra un registro local antes de responder, como
    /// un borrado del usuario mientras la petición está en vuelo
    struct DeletesDuringRead {
        inner: Rc<FakeRemote>,
        records: LocalRecordStore,
        id: String,
    }

    #[async_trait(?Send)]
    impl RemoteService for DeletesDuringRead {
        async fn read(&self, collection: Collection, filter: &ReadFilter) -> Result<Vec<RemoteRecord>, RemoteError> {
            self.records.remove(collection, &self.id).unwrap();
            self.inner.read(collection, filter).await
        }

        async fn write(&self, request: WriteRequest) -> Result<Option<RemoteRecord>, RemoteError> {
            self.inner.write(request).await
        }
    }

    fn queue(fx: &Fixture) -> WriteQueue {
        WriteQueue::new(fx.store(), "test")
    }

    fn records(fx: &Fixture) -> LocalRecordStore {
        LocalRecordStore::new(fx.store(), "test")
    }

    fn list(router: &RequestRouter, collection: Collection) -> RouterResponse {
        block_on(router.handle(collection, Request::List { filter: ReadFilter::all() })).unwrap()
    }

    #[test]
    fn online_read_writes_through_to_local_store() {
        let fx = Fixture::new();
        fx.remote.seed(Collection::Tasks, "srv_1", t(0), json!({ "title": "Buy milk" }));
        let router = router(&fx);

        let response = list(&router, Collection::Tasks);
        assert_eq!(response.source, ServedFrom::Remote);
        assert_eq!(response.records.len(), 1);

        let stored = records(&fx).get_by_id(Collection::Tasks, "srv_1").unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
        assert_eq!(stored.synced_at, Some(t(0)));
    }

    #[test]
    fn offline_read_serves_local_copy() {
        let fx = Fixture::new();
        fx.remote.seed(Collection::Tasks, "srv_1", t(0), json!({ "title": "Buy milk", "done": false }));
        let router = router(&fx);
        list(&router, Collection::Tasks);

        fx.go_offline();
        let response = list(&router, Collection::Tasks);
        assert_eq!(response.source, ServedFrom::Local);
        assert_eq!(response.records[0].payload["title"], "Buy milk");

        let filtered = block_on(router.handle(
            Collection::Tasks,
            Request::List {
                filter: ReadFilter::all().with_field("done", json!(true)),
            },
        ))
        .unwrap();
        assert!(filtered.records.is_empty());
    }

    #[test]
    fn unreachable_remote_falls_back_to_local() {
        let fx = Fixture::new();
        let router = router(&fx);
        // El monitor dice online pero la petición falla sin status
        fx.remote.set_reachable(false);

        let response = block_on(router.handle(Collection::Tasks, Request::Create { payload: json!({ "title": "A" }) }))
            .unwrap();
        assert_eq!(response.source, ServedFrom::Local);
        assert!(response.queued.is_some());
        assert!(response.records[0].has_temporary_id());

        let listed = list(&router, Collection::Tasks);
        assert_eq!(listed.source, ServedFrom::Local);
        assert_eq!(listed.records.len(), 1);
    }

    #[test]
    fn offline_writes_are_queued_in_order() {
        let fx = Fixture::new();
        fx.remote.seed(Collection::Tasks, "srv_1", t(0), json!({ "title": "Buy milk" }));
        let router = router(&fx);
        list(&router, Collection::Tasks);
        fx.go_offline();

        let created = block_on(router.handle(Collection::Tasks, Request::Create { payload: json!({ "title": "B" }) }))
            .unwrap();
        let tmp_id = created.records[0].id.clone();
        block_on(router.handle(
            Collection::Tasks,
            Request::Update {
                id: "srv_1".into(),
                payload: json!({ "title": "Buy oat milk" }),
            },
        ))
        .unwrap();
        block_on(router.handle(Collection::Tasks, Request::Delete { id: "srv_1".into() })).unwrap();

        let entries = queue(&fx).entries().unwrap();
        let ops: Vec<_> = entries.iter().map(|e| (e.operation, e.record_id.clone())).collect();
        assert_eq!(
            ops,
            vec![
                (Operation::Create, tmp_id),
                (Operation::Update, "srv_1".to_string()),
                (Operation::Delete, "srv_1".to_string()),
            ]
        );
        // La actualización se basa en la versión que vimos del servidor
        assert_eq!(entries[1].base_modified_at, Some(t(0)));

        // El registro borrado deja de verse aunque siga en el store
        let listed = list(&router, Collection::Tasks);
        assert_eq!(listed.records.len(), 1);
        assert_eq!(
            records(&fx).get_by_id(Collection::Tasks, "srv_1").unwrap().unwrap().sync_status,
            SyncStatus::PendingDelete
        );
        assert!(fx.remote.writes().is_empty());
    }

    #[test]
    fn deleting_local_only_record_never_contacts_remote() {
        let fx = Fixture::new();
        let router = router(&fx);
        fx.go_offline();

        let created = block_on(router.handle(Collection::Tasks, Request::Create { payload: json!({ "title": "A" }) }))
            .unwrap();
        let id = created.records[0].id.clone();
        block_on(router.handle(
            Collection::Tasks,
            Request::Update {
                id: id.clone(),
                payload: json!({ "title": "A2" }),
            },
        ))
        .unwrap();

        fx.go_online();
        let response = block_on(router.handle(Collection::Tasks, Request::Delete { id: id.clone() })).unwrap();
        assert_eq!(response.queued, None);

        assert!(queue(&fx).entries().unwrap().is_empty());
        assert!(records(&fx).get_by_id(Collection::Tasks, &id).unwrap().is_none());
        assert!(fx.remote.writes().is_empty());
    }

    #[test]
    fn non_offline_collection_is_refused_when_offline() {
        let fx = Fixture::new();
        let router = router(&fx);
        fx.go_offline();

        let read = block_on(router.handle(Collection::Insights, Request::List { filter: ReadFilter::all() }));
        assert_eq!(read, Err(SyncError::NotSupportedOffline(Collection::Insights)));

        let write = block_on(router.handle(Collection::Insights, Request::Create { payload: json!({}) }));
        assert_eq!(write, Err(SyncError::NotSupportedOffline(Collection::Insights)));
        assert!(queue(&fx).entries().unwrap().is_empty());
    }

    #[test]
    fn non_offline_collection_goes_straight_to_remote() {
        let fx = Fixture::new();
        fx.remote.seed(Collection::Insights, "srv_9", t(0), json!({ "score": 3 }));
        let router = router(&fx);

        let response = list(&router, Collection::Insights);
        assert_eq!(response.records.len(), 1);
        assert!(records(&fx).get_all(Collection::Insights).unwrap().is_empty());
    }

    #[test]
    fn online_update_writes_through_and_rejection_propagates() {
        let fx = Fixture::new();
        fx.remote.seed(Collection::Tasks, "srv_1", t(0), json!({ "title": "Buy milk" }));
        let router = router(&fx);
        list(&router, Collection::Tasks);

        let response = block_on(router.handle(
            Collection::Tasks,
            Request::Update {
                id: "srv_1".into(),
                payload: json!({ "title": "Buy oat milk" }),
            },
        ))
        .unwrap();
        assert_eq!(response.source, ServedFrom::Remote);
        assert_eq!(fx.remote.get(Collection::Tasks, "srv_1").unwrap().payload["title"], "Buy oat milk");
        assert_eq!(fx.remote.writes()[0].base_modified_at, Some(t(0)));

        fx.remote.reject_when("title", json!(""));
        let rejected = block_on(router.handle(
            Collection::Tasks,
            Request::Update {
                id: "srv_1".into(),
                payload: json!({ "title": "" }),
            },
        ));
        assert!(matches!(rejected, Err(SyncError::RejectedWrite { status: 422, .. })));
        assert!(queue(&fx).entries().unwrap().is_empty());
    }

    #[test]
    fn writes_on_queued_record_stay_behind_the_queue() {
        let fx = Fixture::new();
        fx.remote.seed(Collection::Tasks, "srv_1", t(0), json!({ "title": "A" }));
        let router = router(&fx);
        list(&router, Collection::Tasks);

        fx.go_offline();
        block_on(router.handle(
            Collection::Tasks,
            Request::Update {
                id: "srv_1".into(),
                payload: json!({ "title": "B" }),
            },
        ))
        .unwrap();

        fx.go_online();
        let response = block_on(router.handle(
            Collection::Tasks,
            Request::Update {
                id: "srv_1".into(),
                payload: json!({ "title": "C" }),
            },
        ))
        .unwrap();
        assert_eq!(response.source, ServedFrom::Local);
        assert_eq!(queue(&fx).entries().unwrap().len(), 2);
        assert!(fx.remote.writes().is_empty());
    }

    #[test]
    fn online_read_keeps_pending_local_version() {
        let fx = Fixture::new();
        fx.remote.seed(Collection::Tasks, "srv_1", t(0), json!({ "title": "A" }));
        let router = router(&fx);
        list(&router, Collection::Tasks);

        fx.go_offline();
        block_on(router.handle(
            Collection::Tasks,
            Request::Update {
                id: "srv_1".into(),
                payload: json!({ "title": "mine" }),
            },
        ))
        .unwrap();
        block_on(router.handle(Collection::Tasks, Request::Create { payload: json!({ "title": "new" }) })).unwrap();

        fx.go_online();
        let response = list(&router, Collection::Tasks);
        let titles: Vec<_> = response.records.iter().map(|r| r.payload["title"].clone()).collect();
        assert_eq!(titles, vec![json!("mine"), json!("new")]);
    }

    #[test]
    fn get_missing_record_is_not_found() {
        let fx = Fixture::new();
        let router = router(&fx);
        let result = block_on(router.handle(Collection::Tasks, Request::Get { id: "srv_404".into() }));
        assert!(matches!(result, Err(SyncError::NotFound { .. })));

        fx.go_offline();
        let result = block_on(router.handle(Collection::Tasks, Request::Get { id: "srv_404".into() }));
        assert!(matches!(result, Err(SyncError::NotFound { .. })));
    }

    #[test]
    fn storage_failure_is_reported_for_offline_write() {
        let fx = Fixture::new();
        let router = router(&fx);
        fx.go_offline();
        fx.memory.set_read_only(true);

        let result = block_on(router.handle(Collection::Tasks, Request::Create { payload: json!({ "title": "A" }) }));
        assert!(matches!(result, Err(SyncError::StorageUnavailable(_))));
        assert!(queue(&fx).entries().unwrap().is_empty());
    }

    #[test]
    fn record_deleted_during_read_is_not_resurrected() {
        let fx = Fixture::new();
        fx.remote.seed(Collection::Tasks, "srv_1", t(0), json!({ "title": "Buy milk" }));
        list(&router(&fx), Collection::Tasks);

        let remote = Rc::new(DeletesDuringRead {
            inner: fx.remote.clone(),
            records: records(&fx),
            id: "srv_1".to_string(),
        });
        let response = list(&router_over(&fx, fx.store(), remote), Collection::Tasks);

        assert_eq!(response.source, ServedFrom::Remote);
        assert!(response.records.is_empty());
        assert!(records(&fx).get_by_id(Collection::Tasks, "srv_1").unwrap().is_none());
    }

    #[test]
    fn failed_queue_write_leaves_no_orphan_create() {
        let fx = Fixture::new();
        let store = SelectiveFailStore::new(fx.memory.clone());
        let failing = router_over(&fx, Rc::new(store.clone()), fx.remote());
        fx.go_offline();
        store.fail_writes_to(":queue");

        let result = block_on(failing.handle(Collection::Tasks, Request::Create { payload: json!({ "title": "A" }) }));
        assert!(matches!(result, Err(SyncError::StorageUnavailable(_))));

        assert!(records(&fx).get_all(Collection::Tasks).unwrap().is_empty());
        assert!(queue(&fx).entries().unwrap().is_empty());
        assert!(list(&router(&fx), Collection::Tasks).records.is_empty());
    }

    #[test]
    fn failed_queue_write_restores_previous_version() {
        let fx = Fixture::new();
        fx.remote.seed(Collection::Tasks, "srv_1", t(0), json!({ "title": "Buy milk" }));
        list(&router(&fx), Collection::Tasks);

        let store = SelectiveFailStore::new(fx.memory.clone());
        let failing = router_over(&fx, Rc::new(store.clone()), fx.remote());
        fx.go_offline();
        store.fail_writes_to(":queue");

        let updated = block_on(failing.handle(
            Collection::Tasks,
            Request::Update {
                id: "srv_1".into(),
                payload: json!({ "title": "Buy oat milk" }),
            },
        ));
        assert!(matches!(updated, Err(SyncError::StorageUnavailable(_))));
        let deleted = block_on(failing.handle(Collection::Tasks, Request::Delete { id: "srv_1".into() }));
        assert!(matches!(deleted, Err(SyncError::StorageUnavailable(_))));

        let stored = records(&fx).get_by_id(Collection::Tasks, "srv_1").unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
        assert_eq!(stored.payload["title"], "Buy milk");
        assert!(queue(&fx).entries().unwrap().is_empty());

        // Con la queue disponible otra vez, la misma edición se encola normalmente
        store.heal();
        let retried = block_on(failing.handle(
            Collection::Tasks,
            Request::Update {
                id: "srv_1".into(),
                payload: json!({ "title": "Buy oat milk" }),
            },
        ))
        .unwrap();
        assert!(retried.queued.is_some());
    }
}
