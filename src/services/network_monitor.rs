// ============================================================================
// MONITOR DE ESTADO DE RED
// ============================================================================
// Refleja la conectividad reportada por la plataforma y avisa a los listeners
// una sola vez por transición (online <-> offline). Se inyecta en el router y
// en el reconciliador; en tests se maneja con `set_status`.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
    Unknown,
}

pub type ListenerId = usize;

type Listener = Rc<dyn Fn(NetworkStatus)>;

struct MonitorInner {
    status: Cell<NetworkStatus>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener_id: Cell<ListenerId>,
    // Flag para prevenir múltiples registros de listeners del navegador
    monitoring_started: Cell<bool>,
}

#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Rc<MonitorInner>,
}

impl NetworkMonitor {
    pub fn new() -> Self {
        Self::with_status(NetworkStatus::Unknown)
    }

    pub fn with_status(status: NetworkStatus) -> Self {
        Self {
            inner: Rc::new(MonitorInner {
                status: Cell::new(status),
                listeners: RefCell::new(Vec::new()),
                next_listener_id: Cell::new(0),
                monitoring_started: Cell::new(false),
            }),
        }
    }

    pub fn current_status(&self) -> NetworkStatus {
        self.inner.status.get()
    }

    /// `Unknown` cuenta como online: la señal es optimista y un fallo de red
    /// igualmente termina en el camino offline.
    pub fn is_online(&self) -> bool {
        self.current_status() != NetworkStatus::Offline
    }

    pub fn is_offline(&self) -> bool {
        self.current_status() == NetworkStatus::Offline
    }

    /// Registra un listener; se invoca exactamente una vez por transición
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(NetworkStatus) + 'static,
    {
        let id = self.inner.next_listener_id.get();
        self.inner.next_listener_id.set(id + 1);
        self.inner.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Actualiza el estado. Devuelve `true` si hubo transición (y se notificó).
    pub fn set_status(&self, status: NetworkStatus) -> bool {
        if self.inner.status.replace(status) == status {
            return false;
        }

        match status {
            NetworkStatus::Online => log::info!("🌐 [NETWORK] ONLINE"),
            NetworkStatus::Offline => log::warn!("📴 [NETWORK] OFFLINE"),
            NetworkStatus::Unknown => log::info!("❔ [NETWORK] estado desconocido"),
        }

        // Copia de los listeners: un callback puede registrar otros sin pánico de RefCell
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(status);
        }
        true
    }

    /// Inicia el monitoreo de eventos `online`/`offline` de `window`.
    /// Solo registra los listeners una vez.
    #[cfg(target_arch = "wasm32")]
    pub fn start_monitoring(&self) {
        use wasm_bindgen::prelude::*;
        use wasm_bindgen::JsCast;
        use web_sys::Event;

        if self.inner.monitoring_started.replace(true) {
            log::warn!("⚠️ [NETWORK] start_monitoring ya fue llamado, ignorando llamada duplicada");
            return;
        }

        let window = match web_sys::window() {
            Some(w) => w,
            None => return,
        };

        self.set_status(if window.navigator().on_line() {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        });

        let online_closure = Closure::wrap(Box::new({
            let monitor = self.clone();
            move |_event: Event| {
                monitor.set_status(NetworkStatus::Online);
            }
        }) as Box<dyn FnMut(Event)>);

        let offline_closure = Closure::wrap(Box::new({
            let monitor = self.clone();
            move |_event: Event| {
                monitor.set_status(NetworkStatus::Offline);
            }
        }) as Box<dyn FnMut(Event)>);

        let _ = window.add_event_listener_with_callback("online", online_closure.as_ref().unchecked_ref());
        let _ = window.add_event_listener_with_callback("offline", offline_closure.as_ref().unchecked_ref());

        // Los listeners de window viven lo mismo que la app
        online_closure.forget();
        offline_closure.forget();

        log::info!("✅ [NETWORK] listeners registrados (solo una vez)");
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.monitoring_started.get()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}
