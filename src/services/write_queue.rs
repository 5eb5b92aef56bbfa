// ============================================================================
// WRITE QUEUE - mutaciones pendientes de enviar al servidor
// ============================================================================
// Orden FIFO por colección según número de secuencia. Persistida completa en
// una sola clave para que cada operación sea atómica respecto del event loop.
// ============================================================================

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::rc::Rc;

use crate::error::{SyncError, SyncResult};
use crate::models::{is_temporary_id, Collection, EntryState, NewQueueEntry, Operation, QueueEntry, QueueSnapshot};
use crate::services::storage::{load_json, save_json, KeyValueStore};

#[derive(Clone)]
pub struct WriteQueue {
    store: Rc<dyn KeyValueStore>,
    key: String,
}

impl WriteQueue {
    pub fn new(store: Rc<dyn KeyValueStore>, namespace: &str) -> Self {
        Self {
            store,
            key: format!("{}:queue", namespace),
        }
    }

    fn load(&self) -> SyncResult<QueueSnapshot> {
        let mut snapshot: QueueSnapshot = load_json(self.store.as_ref(), &self.key)?.unwrap_or_default();
        if snapshot.next_sequence == 0 {
            snapshot.next_sequence = 1;
        }
        Ok(snapshot)
    }

    fn save(&self, snapshot: &QueueSnapshot) -> SyncResult<()> {
        save_json(self.store.as_ref(), &self.key, snapshot)
    }

    fn update_entry<F>(&self, sequence_number: u64, apply: F) -> SyncResult<QueueEntry>
    where
        F: FnOnce(&mut QueueEntry),
    {
        let mut snapshot = self.load()?;
        let entry = snapshot
            .entries
            .iter_mut()
            .find(|e| e.sequence_number == sequence_number)
            .ok_or(SyncError::UnknownEntry(sequence_number))?;
        apply(entry);
        let updated = entry.clone();
        self.save(&snapshot)?;
        Ok(updated)
    }

    pub fn enqueue(&self, entry: NewQueueEntry) -> SyncResult<u64> {
        let mut snapshot = self.load()?;
        let sequence_number = snapshot.next_sequence;
        snapshot.next_sequence += 1;

        log::debug!(
            "📝 [QUEUE] #{} {:?} {}/{}",
            sequence_number,
            entry.operation,
            entry.collection,
            entry.record_id
        );

        snapshot.entries.push(QueueEntry::pending(sequence_number, entry));
        self.save(&snapshot)?;
        Ok(sequence_number)
    }

    /// Próxima entrada entregable de la colección
    pub fn peek_next(&self, collection: Collection) -> SyncResult<Option<QueueEntry>> {
        self.next_after(collection, 0)
    }

    /// Próxima entrada entregable con secuencia mayor que `after`.
    ///
    /// Se retienen las entradas de un registro que tiene una entrada anterior
    /// bloqueada, y las que no son `create` sobre un id temporal.
    pub fn next_after(&self, collection: Collection, after: u64) -> SyncResult<Option<QueueEntry>> {
        let snapshot = self.load()?;
        let mut blocked_records: HashSet<&str> = HashSet::new();

        for entry in snapshot.entries.iter().filter(|e| e.collection == collection) {
            if entry.is_blocked() {
                blocked_records.insert(entry.record_id.as_str());
                continue;
            }
            if blocked_records.contains(entry.record_id.as_str()) {
                continue;
            }
            if entry.operation != Operation::Create && is_temporary_id(&entry.record_id) {
                // El create de este registro aún no se confirmó
                blocked_records.insert(entry.record_id.as_str());
                continue;
            }
            if entry.sequence_number > after {
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }

    /// Confirma y elimina la entrada
    pub fn ack(&self, sequence_number: u64) -> SyncResult<QueueEntry> {
        let mut snapshot = self.load()?;
        let index = snapshot
            .entries
            .iter()
            .position(|e| e.sequence_number == sequence_number)
            .ok_or(SyncError::UnknownEntry(sequence_number))?;
        let entry = snapshot.entries.remove(index);
        self.save(&snapshot)?;
        Ok(entry)
    }

    /// Incrementa intentos; al llegar al techo la entrada queda atascada
    pub fn report_failure(&self, sequence_number: u64, error: &str, max_attempts: u32) -> SyncResult<QueueEntry> {
        self.update_entry(sequence_number, |entry| {
            entry.attempts += 1;
            entry.last_error = Some(error.to_string());
            if entry.attempts >= max_attempts {
                entry.state = EntryState::Stuck;
            }
        })
    }

    pub fn mark_conflicted(&self, sequence_number: u64, error: &str) -> SyncResult<QueueEntry> {
        self.update_entry(sequence_number, |entry| {
            entry.attempts += 1;
            entry.last_error = Some(error.to_string());
            entry.state = EntryState::Conflicted;
        })
    }

    /// Vuelve a poner en cola una entrada bloqueada
    pub fn retry(&self, sequence_number: u64) -> SyncResult<QueueEntry> {
        self.update_entry(sequence_number, |entry| {
            entry.attempts = 0;
            entry.last_error = None;
            entry.state = EntryState::Pending;
        })
    }

    /// Confirma un create en una sola escritura: saca la entrada y pasa las
    /// restantes del registro al id del servidor, basadas en su versión.
    /// Devuelve cuántas entradas quedan para el registro.
    pub fn ack_create(&self, sequence_number: u64, new_id: &str, base: DateTime<Utc>) -> SyncResult<usize> {
        let mut snapshot = self.load()?;
        let index = snapshot
            .entries
            .iter()
            .position(|e| e.sequence_number == sequence_number)
            .ok_or(SyncError::UnknownEntry(sequence_number))?;
        let acked = snapshot.entries.remove(index);

        let mut remaining = 0;
        for entry in snapshot
            .entries
            .iter_mut()
            .filter(|e| e.collection == acked.collection && e.record_id == acked.record_id)
        {
            entry.record_id = new_id.to_string();
            entry.base_modified_at = Some(base);
            remaining += 1;
        }
        self.save(&snapshot)?;
        Ok(remaining)
    }

    /// Reemplaza todas las entradas de un registro por `entry` (o por ninguna)
    /// en una sola escritura
    pub fn replace_for_record(
        &self,
        collection: Collection,
        record_id: &str,
        entry: Option<NewQueueEntry>,
    ) -> SyncResult<Option<u64>> {
        let mut snapshot = self.load()?;
        snapshot
            .entries
            .retain(|e| !(e.collection == collection && e.record_id == record_id));

        let sequence = entry.map(|entry| {
            let sequence_number = snapshot.next_sequence;
            snapshot.next_sequence += 1;
            snapshot.entries.push(QueueEntry::pending(sequence_number, entry));
            sequence_number
        });
        self.save(&snapshot)?;
        Ok(sequence)
    }

    /// Tras confirmar una escritura, las entradas restantes del registro pasan
    /// a basarse en la versión que acaba de aceptar el servidor
    pub fn rebase_record(&self, collection: Collection, record_id: &str, base: DateTime<Utc>) -> SyncResult<usize> {
        let mut snapshot = self.load()?;
        let mut rebased = 0;
        for entry in snapshot
            .entries
            .iter_mut()
            .filter(|e| e.collection == collection && e.record_id == record_id)
        {
            entry.base_modified_at = Some(base);
            rebased += 1;
        }
        if rebased > 0 {
            self.save(&snapshot)?;
        }
        Ok(rebased)
    }

    /// Elimina todas las entradas de un registro (p. ej. borrado de un registro solo local)
    pub fn remove_for_record(&self, collection: Collection, record_id: &str) -> SyncResult<usize> {
        let mut snapshot = self.load()?;
        let before = snapshot.entries.len();
        snapshot
            .entries
            .retain(|e| !(e.collection == collection && e.record_id == record_id));
        let removed = before - snapshot.entries.len();
        if removed > 0 {
            self.save(&snapshot)?;
        }
        Ok(removed)
    }

    pub fn entries(&self) -> SyncResult<Vec<QueueEntry>> {
        Ok(self.load()?.entries)
    }

    pub fn has_entries_for(&self, collection: Collection, record_id: &str) -> SyncResult<bool> {
        Ok(self
            .load()?
            .entries
            .iter()
            .any(|e| e.collection == collection && e.record_id == record_id))
    }

    pub fn pending_count(&self) -> SyncResult<usize> {
        Ok(self.load()?.entries.iter().filter(|e| e.is_pending()).count())
    }

    pub fn blocked_entries(&self) -> SyncResult<Vec<QueueEntry>> {
        Ok(self
            .load()?
            .entries
            .into_iter()
            .filter(QueueEntry::is_blocked)
            .collect())
    }

    /// Colecciones con entradas pendientes, en orden de primera aparición
    pub fn collections_with_pending(&self) -> SyncResult<Vec<Collection>> {
        let mut collections = Vec::new();
        for entry in self.load()?.entries.iter().filter(|e| e.is_pending()) {
            if !collections.contains(&entry.collection) {
                collections.push(entry.collection);
            }
        }
        Ok(collections)
    }
}
