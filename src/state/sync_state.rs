// ============================================================================
// SYNC STATE - estado observable de la sincronización
// ============================================================================

use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::models::{SyncPhase, SyncReport};

/// Estado compartido entre el engine y quien pinte el indicador
#[derive(Clone, Default)]
pub struct SyncStateWrapper {
    is_syncing: Rc<Cell<bool>>,
    phase: Rc<Cell<SyncPhase>>,
    last_sync_at: Rc<Cell<Option<DateTime<Utc>>>>,
    last_report: Rc<RefCell<Option<SyncReport>>>,
}

impl SyncStateWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marca el inicio de una pasada. Devuelve `false` si ya había una en curso.
    pub fn try_begin(&self) -> bool {
        if self.is_syncing.get() {
            return false;
        }
        self.is_syncing.set(true);
        true
    }

    pub fn finish(&self, report: SyncReport) {
        self.is_syncing.set(false);
        *self.last_report.borrow_mut() = Some(report);
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing.get()
    }

    pub fn set_phase(&self, phase: SyncPhase) {
        self.phase.set(phase);
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase.get()
    }

    pub fn set_last_sync_at(&self, at: Option<DateTime<Utc>>) {
        self.last_sync_at.set(at);
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_at.get()
    }

    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report.borrow().clone()
    }
}
