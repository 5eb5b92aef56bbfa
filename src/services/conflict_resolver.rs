// ============================================================================
// PROTOCOLO DE RESOLUCIÓN DE CONFLICTOS
// ============================================================================
// Conjunto ordenado (orden de detección) de casos pendientes. Se presentan de
// uno en uno; cada resolución se confirma a través de un callback de commit
// y solo entonces el caso se marca resuelto y sale del conjunto.
// ============================================================================

use chrono::Utc;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::{ConflictCase, Record, Resolution, SyncStatus};

#[derive(Clone)]
pub struct ConflictResolver {
    pending: Rc<RefCell<Vec<ConflictCase>>>,
    config: Rc<SyncConfig>,
}

impl ConflictResolver {
    pub fn new(config: Rc<SyncConfig>) -> Self {
        Self {
            pending: Rc::new(RefCell::new(Vec::new())),
            config,
        }
    }

    /// Añade casos detectados. Un caso ya pendiente para el mismo registro se
    /// refresca con los datos nuevos sin perder su posición.
    pub fn add_cases(&self, cases: Vec<ConflictCase>) {
        let mut pending = self.pending.borrow_mut();
        for case in cases {
            match pending.iter_mut().find(|existing| existing.id == case.id) {
                Some(existing) => *existing = case,
                None => {
                    log::warn!("⚠️ [CONFLICT] Nuevo conflicto: {}", case.id);
                    pending.push(case);
                }
            }
        }
    }

    /// Caso que se presenta ahora al usuario
    pub fn current(&self) -> Option<ConflictCase> {
        self.pending.borrow().first().cloned()
    }

    pub fn list_pending(&self) -> Vec<ConflictCase> {
        self.pending.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    pub fn contains(&self, case_id: &str) -> bool {
        self.pending.borrow().iter().any(|c| c.id == case_id)
    }

    /// Resuelve un caso: calcula el registro resultante, lo confirma con
    /// `commit` y, si todo fue bien, lo saca del conjunto pendiente.
    pub fn resolve<F>(&self, case_id: &str, resolution: Resolution, commit: F) -> SyncResult<ConflictCase>
    where
        F: FnOnce(&ConflictCase, Record) -> SyncResult<()>,
    {
        let case = self
            .pending
            .borrow()
            .iter()
            .find(|c| c.id == case_id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownConflict(case_id.to_string()))?;

        let resolved = resolved_record(&case, resolution, &self.config);
        commit(&case, resolved)?;

        self.pending.borrow_mut().retain(|c| c.id != case_id);

        log::info!("✅ [CONFLICT] {} resuelto ({:?})", case_id, resolution);
        Ok(ConflictCase {
            resolved: true,
            resolution: Some(resolution),
            ..case
        })
    }

    /// Pospone un caso sin resolverlo; reaparece en la próxima reconciliación
    pub fn skip(&self, case_id: &str) -> SyncResult<()> {
        let mut pending = self.pending.borrow_mut();
        let before = pending.len();
        pending.retain(|c| c.id != case_id);
        if pending.len() == before {
            return Err(SyncError::UnknownConflict(case_id.to_string()));
        }
        log::info!("⏭️ [CONFLICT] {} pospuesto", case_id);
        Ok(())
    }
}

/// Registro resultante de aplicar una resolución (sin tocar el almacenamiento)
pub fn resolved_record(case: &ConflictCase, resolution: Resolution, config: &SyncConfig) -> Record {
    let local = &case.local_record;
    let remote = &case.remote_record;

    match resolution {
        Resolution::Remote => Record {
            id: local.id.clone(),
            collection: case.collection,
            modified_at: remote.modified_at,
            sync_status: SyncStatus::Synced,
            synced_at: Some(remote.modified_at),
            payload: remote.payload.clone(),
        },
        Resolution::Local => Record {
            id: local.id.clone(),
            collection: case.collection,
            modified_at: Utc::now(),
            sync_status: if local.sync_status == SyncStatus::PendingDelete {
                SyncStatus::PendingDelete
            } else {
                SyncStatus::PendingUpdate
            },
            synced_at: Some(remote.modified_at),
            payload: local.payload.clone(),
        },
        Resolution::Merge => Record {
            id: local.id.clone(),
            collection: case.collection,
            modified_at: Utc::now(),
            sync_status: SyncStatus::PendingUpdate,
            synced_at: Some(remote.modified_at),
            payload: merge_payloads(&local.payload, &remote.payload, config),
        },
    }
}

/// Unión campo a campo. En colisión gana el remoto, salvo los campos
/// localmente autoritativos, que conservan el valor local si no está vacío.
pub fn merge_payloads(local: &Value, remote: &Value, config: &SyncConfig) -> Value {
    let (Value::Object(local_fields), Value::Object(remote_fields)) = (local, remote) else {
        return remote.clone();
    };

    let mut merged: Map<String, Value> = local_fields.clone();
    for (field, remote_value) in remote_fields {
        let keep_local = config.is_locally_authoritative(field)
            && local_fields.get(field).map_or(false, |v| !is_empty_value(v));
        if !keep_local {
            merged.insert(field.clone(), remote_value.clone());
        }
    }
    Value::Object(merged)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Collection;
    use chrono::{DateTime, Duration};
    use serde_json::json;

    fn t(offset: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::seconds(offset)
    }

    fn case(id: &str, local: Value, remote: Value) -> ConflictCase {
        let local = Record {
            id: id.into(),
            collection: Collection::Tasks,
            modified_at: t(10),
            sync_status: SyncStatus::Conflicted,
            synced_at: Some(t(0)),
            payload: local,
        };
        let remote = Record {
            modified_at: t(12),
            sync_status: SyncStatus::Synced,
            synced_at: Some(t(12)),
            payload: remote,
            ..local.clone()
        };
        ConflictCase::new(local, remote)
    }

    fn resolver() -> ConflictResolver {
        ConflictResolver::new(Rc::new(SyncConfig::default()))
    }

    #[test]
    fn merge_prefers_remote_except_authoritative_fields() {
        let config = SyncConfig::default();
        let merged = merge_payloads(
            &json!({ "title": "Buy milk", "notes": "lactose free", "tags": ["home"], "local_only": 1 }),
            &json!({ "title": "Buy oat milk", "notes": "", "tags": ["shop"], "remote_only": 2 }),
            &config,
        );
        assert_eq!(
            merged,
            json!({
                "title": "Buy oat milk",
                "notes": "lactose free",
                "tags": ["home"],
                "local_only": 1,
                "remote_only": 2
            })
        );
    }

    #[test]
    fn merge_takes_remote_notes_when_local_is_empty() {
        let config = SyncConfig::default();
        let merged = merge_payloads(&json!({ "notes": null }), &json!({ "notes": "from phone" }), &config);
        assert_eq!(merged["notes"], "from phone");
    }

    #[test]
    fn authoritative_fields_are_configurable() {
        let config = SyncConfig::default().with_locally_authoritative_fields(["title"]);
        let merged = merge_payloads(
            &json!({ "title": "mine", "notes": "mine" }),
            &json!({ "title": "theirs", "notes": "theirs" }),
            &config,
        );
        assert_eq!(merged, json!({ "title": "mine", "notes": "theirs" }));
    }

    #[test]
    fn resolved_records_per_resolution() {
        let config = SyncConfig::default();
        let c = case("srv_1", json!({ "title": "Buy milk" }), json!({ "title": "Buy oat milk" }));

        let remote = resolved_record(&c, Resolution::Remote, &config);
        assert_eq!(remote.payload["title"], "Buy oat milk");
        assert_eq!(remote.sync_status, SyncStatus::Synced);
        assert_eq!(remote.modified_at, t(12));

        let local = resolved_record(&c, Resolution::Local, &config);
        assert_eq!(local.payload["title"], "Buy milk");
        assert_eq!(local.sync_status, SyncStatus::PendingUpdate);
        assert!(local.modified_at > t(12));
        assert_eq!(local.synced_at, Some(t(12)));
    }

    #[test]
    fn cases_are_presented_in_detection_order() {
        let resolver = resolver();
        resolver.add_cases(vec![
            case("srv_1", json!(1), json!(2)),
            case("srv_2", json!(1), json!(2)),
        ]);
        // Refrescar un caso existente no cambia el orden
        resolver.add_cases(vec![case("srv_1", json!(5), json!(6))]);

        assert_eq!(resolver.len(), 2);
        let current = resolver.current().unwrap();
        assert_eq!(current.record_id(), "srv_1");
        assert_eq!(current.local_record.payload, json!(5));
    }

    #[test]
    fn failed_commit_keeps_case_pending() {
        let resolver = resolver();
        resolver.add_cases(vec![case("srv_1", json!(1), json!(2))]);
        let id = resolver.current().unwrap().id;

        let result = resolver.resolve(&id, Resolution::Local, |_, _| {
            Err(SyncError::StorageUnavailable("lleno".into()))
        });
        assert!(result.is_err());
        assert!(resolver.contains(&id));

        let resolved = resolver.resolve(&id, Resolution::Remote, |_, _| Ok(())).unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.resolution, Some(Resolution::Remote));
        assert!(resolver.is_empty());
    }

    #[test]
    fn skip_defers_without_resolving() {
        let resolver = resolver();
        resolver.add_cases(vec![case("srv_1", json!(1), json!(2)), case("srv_2", json!(1), json!(2))]);
        let first = resolver.current().unwrap().id;

        resolver.skip(&first).unwrap();
        assert_eq!(resolver.current().unwrap().record_id(), "srv_2");
        assert!(matches!(resolver.skip(&first), Err(SyncError::UnknownConflict(_))));
        assert!(matches!(
            resolver.resolve("tasks:nope", Resolution::Merge, |_, _| Ok(())),
            Err(SyncError::UnknownConflict(_))
        ));
    }
}
