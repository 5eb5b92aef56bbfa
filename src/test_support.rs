//! Servicio remoto falso y fixtures compartidos por los tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::config::SyncConfig;
use crate::error::{RemoteError, SyncError, SyncResult};
use crate::models::{Collection, Operation, ReadFilter, Record, RemoteRecord};
use crate::services::network_monitor::{NetworkMonitor, NetworkStatus};
use crate::services::remote::{RemoteService, WriteRequest};
use crate::services::storage::{KeyValueStore, MemoryStore};

pub fn t(offset_seconds: i64) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
        + Duration::seconds(offset_seconds)
}

#[derive(Default)]
struct FakeState {
    records: BTreeMap<Collection, Vec<RemoteRecord>>,
    next_id: u64,
    unreachable: bool,
    /// Tras N escrituras correctas más, el servidor deja de responder
    unreachable_after: Option<usize>,
    /// Rechaza (422) toda escritura cuyo payload tenga `campo == valor`
    reject_when: Vec<(String, Value)>,
    writes: Vec<WriteRequest>,
    reads: usize,
}

/// Servidor en memoria: asigna ids `srv_N`, respeta `base_modified_at` (409)
/// y registra cada escritura recibida.
#[derive(Default)]
pub struct FakeRemote {
    state: RefCell<FakeState>,
}

impl FakeRemote {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.borrow_mut().unreachable = !reachable;
    }

    pub fn unreachable_after(&self, writes: usize) {
        self.state.borrow_mut().unreachable_after = Some(writes);
    }

    pub fn reject_when(&self, field: &str, value: Value) {
        self.state.borrow_mut().reject_when.push((field.to_string(), value));
    }

    pub fn seed(&self, collection: Collection, id: &str, modified_at: DateTime<Utc>, payload: Value) {
        let mut state = self.state.borrow_mut();
        let records = state.records.entry(collection).or_default();
        records.retain(|r| r.id != id);
        records.push(RemoteRecord {
            id: id.to_string(),
            modified_at,
            payload,
        });
    }

    pub fn delete(&self, collection: Collection, id: &str) {
        if let Some(records) = self.state.borrow_mut().records.get_mut(&collection) {
            records.retain(|r| r.id != id);
        }
    }

    pub fn get(&self, collection: Collection, id: &str) -> Option<RemoteRecord> {
        self.state
            .borrow()
            .records
            .get(&collection)
            .and_then(|records| records.iter().find(|r| r.id == id).cloned())
    }

    pub fn records(&self, collection: Collection) -> Vec<RemoteRecord> {
        self.state.borrow().records.get(&collection).cloned().unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<WriteRequest> {
        self.state.borrow().writes.clone()
    }

    pub fn reads(&self) -> usize {
        self.state.borrow().reads
    }

    fn check_reachable(state: &mut FakeState) -> Result<(), RemoteError> {
        if state.unreachable {
            return Err(RemoteError::Unreachable("fetch failed".to_string()));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl RemoteService for FakeRemote {
    async fn read(&self, collection: Collection, filter: &ReadFilter) -> Result<Vec<RemoteRecord>, RemoteError> {
        let mut state = self.state.borrow_mut();
        Self::check_reachable(&mut state)?;
        state.reads += 1;

        Ok(state
            .records
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| filter.matches(&Record::from_remote(collection, (*r).clone())))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn write(&self, request: WriteRequest) -> Result<Option<RemoteRecord>, RemoteError> {
        let mut state = self.state.borrow_mut();
        Self::check_reachable(&mut state)?;

        if let Some(remaining) = state.unreachable_after {
            if remaining == 0 {
                state.unreachable = true;
                return Err(RemoteError::Unreachable("connection reset".to_string()));
            }
            state.unreachable_after = Some(remaining - 1);
        }

        state.writes.push(request.clone());

        let rejected = state
            .reject_when
            .iter()
            .any(|(field, value)| request.payload.get(field) == Some(value));
        if rejected {
            return Err(RemoteError::Rejected {
                status: 422,
                message: "validation failed".to_string(),
            });
        }

        let collection = request.collection;
        match request.operation {
            Operation::Create => {
                state.next_id += 1;
                let record = RemoteRecord {
                    id: format!("srv_{}", state.next_id),
                    modified_at: request.modified_at,
                    payload: request.payload,
                };
                state.records.entry(collection).or_default().push(record.clone());
                Ok(Some(record))
            }
            Operation::Update | Operation::Delete => {
                let id = request.record_id.clone().unwrap_or_default();
                let records = state.records.entry(collection).or_default();
                let index = records.iter().position(|r| r.id == id).ok_or(RemoteError::Rejected {
                    status: 404,
                    message: format!("{} not found", id),
                })?;

                if let Some(base) = request.base_modified_at {
                    if records[index].modified_at > base {
                        return Err(RemoteError::Rejected {
                            status: 409,
                            message: "stale version".to_string(),
                        });
                    }
                }

                if request.operation == Operation::Delete {
                    records.remove(index);
                    return Ok(None);
                }

                records[index].payload = request.payload;
                records[index].modified_at = request.modified_at;
                Ok(Some(records[index].clone()))
            }
        }
    }
}

/// Store sobre `MemoryStore` que rechaza escrituras en las claves con cierto
/// sufijo (p. ej. `:queue`), como un almacenamiento lleno a mitad de operación
#[derive(Clone)]
pub struct SelectiveFailStore {
    memory: MemoryStore,
    failing_suffix: Rc<RefCell<Option<String>>>,
}

impl SelectiveFailStore {
    pub fn new(memory: MemoryStore) -> Self {
        Self {
            memory,
            failing_suffix: Rc::new(RefCell::new(None)),
        }
    }

    pub fn fail_writes_to(&self, suffix: &str) {
        *self.failing_suffix.borrow_mut() = Some(suffix.to_string());
    }

    pub fn heal(&self) {
        *self.failing_suffix.borrow_mut() = None;
    }

    fn check(&self, key: &str) -> SyncResult<()> {
        match self.failing_suffix.borrow().as_deref() {
            Some(suffix) if key.ends_with(suffix) => Err(SyncError::StorageUnavailable("quota".to_string())),
            _ => Ok(()),
        }
    }
}

impl KeyValueStore for SelectiveFailStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        self.memory.get(key)
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        self.check(key)?;
        self.memory.set(key, value)
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        self.check(key)?;
        self.memory.remove(key)
    }
}

/// Piezas compartidas para construir componentes sobre el mismo estado
pub struct Fixture {
    pub memory: MemoryStore,
    pub remote: Rc<FakeRemote>,
    pub monitor: NetworkMonitor,
    pub config: Rc<SyncConfig>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default().with_namespace("test"))
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            memory: MemoryStore::new(),
            remote: FakeRemote::new(),
            monitor: NetworkMonitor::with_status(NetworkStatus::Online),
            config: Rc::new(config),
        }
    }

    pub fn store(&self) -> Rc<dyn KeyValueStore> {
        Rc::new(self.memory.clone())
    }

    pub fn remote(&self) -> Rc<dyn RemoteService> {
        self.remote.clone()
    }

    pub fn go_offline(&self) {
        self.monitor.set_status(NetworkStatus::Offline);
        self.remote.set_reachable(false);
    }

    pub fn go_online(&self) {
        self.remote.set_reachable(true);
        self.monitor.set_status(NetworkStatus::Online);
    }
}
