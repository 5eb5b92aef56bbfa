use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fase actual del reconciliador (para la UI)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Draining,
    Pulling,
    /// Hay conflictos esperando decisión del usuario
    AwaitingResolution,
}

/// Resultado de un drain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainOutcome {
    /// No había nada que enviar
    Idle,
    Success,
    /// Algunas entradas quedaron rechazadas, atascadas o con error
    PartialFailure,
    /// Se perdió la conexión a mitad del drain
    Aborted,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub delivered: Vec<u64>,
    pub rejected: Vec<u64>,
    pub stuck: Vec<u64>,
    /// Errores locales (storage) capturados por entrada
    pub errors: usize,
    pub aborted: bool,
}

impl DrainReport {
    pub fn outcome(&self) -> DrainOutcome {
        if self.aborted {
            DrainOutcome::Aborted
        } else if !self.rejected.is_empty() || !self.stuck.is_empty() || self.errors > 0 {
            DrainOutcome::PartialFailure
        } else if self.delivered.is_empty() {
            DrainOutcome::Idle
        } else {
            DrainOutcome::Success
        }
    }

    pub fn merge(&mut self, other: DrainReport) {
        self.delivered.extend(other.delivered);
        self.rejected.extend(other.rejected);
        self.stuck.extend(other.stuck);
        self.errors += other.errors;
        self.aborted |= other.aborted;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    /// Registros remotos aplicados localmente (nuevos o remotamente adelantados)
    pub applied: usize,
    /// Registros borrados en el servidor y eliminados localmente
    pub removed: usize,
    pub locally_ahead: usize,
    pub conflicts: usize,
    pub errors: usize,
    pub aborted: bool,
}

impl PullReport {
    pub fn merge(&mut self, other: PullReport) {
        self.applied += other.applied;
        self.removed += other.removed;
        self.locally_ahead += other.locally_ahead;
        self.conflicts += other.conflicts;
        self.errors += other.errors;
        self.aborted |= other.aborted;
    }
}

/// Resumen de una pasada completa (drain + pull/merge)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub drain: DrainReport,
    pub pull: Option<PullReport>,
    pub skipped: bool,
}

impl SyncReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Snapshot para el indicador de sincronización
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusSnapshot {
    pub pending_count: usize,
    pub blocked_count: usize,
    pub conflict_count: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub is_online: bool,
    pub phase: SyncPhase,
}
