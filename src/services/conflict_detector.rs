// ============================================================================
// DETECTOR DE CONFLICTOS - función pura
// ============================================================================

use chrono::{DateTime, Utc};

use crate::models::{Classification, Record};

/// Clasifica la copia local frente a la remota del mismo registro.
///
/// `synced_at` de la copia local es el último punto de sincronización
/// conocido. Sin él se comparan directamente los `modified_at`.
pub fn classify(local: &Record, remote: &Record) -> Classification {
    // Payloads idénticos nunca son conflicto, aunque ambos lados hayan escrito
    if local.payload == remote.payload {
        return Classification::Identical;
    }

    match local.synced_at {
        Some(sync_point) => classify_against(local.modified_at, remote.modified_at, sync_point),
        None => classify_without_sync_point(local.modified_at, remote.modified_at),
    }
}

fn classify_against(
    local_modified: DateTime<Utc>,
    remote_modified: DateTime<Utc>,
    sync_point: DateTime<Utc>,
) -> Classification {
    let local_advanced = local_modified > sync_point;
    let remote_advanced = remote_modified > sync_point;

    match (local_advanced, remote_advanced) {
        (true, true) => Classification::Conflict,
        (true, false) => Classification::LocallyAhead,
        // Sin avance local, la copia del servidor manda
        (false, _) => Classification::RemotelyAhead,
    }
}

fn classify_without_sync_point(local_modified: DateTime<Utc>, remote_modified: DateTime<Utc>) -> Classification {
    if local_modified > remote_modified {
        Classification::LocallyAhead
    } else if remote_modified > local_modified {
        Classification::RemotelyAhead
    } else {
        Classification::Conflict
    }
}
