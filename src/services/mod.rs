pub mod conflict_detector;
pub mod conflict_resolver;
pub mod network_monitor;
pub mod reconciler;
pub mod record_store;
pub mod remote;
pub mod router;
pub mod storage;
pub mod write_queue;

#[cfg(target_arch = "wasm32")]
pub mod api_client;

pub use conflict_resolver::ConflictResolver;
pub use network_monitor::{NetworkMonitor, NetworkStatus};
pub use reconciler::SyncReconciler;
pub use record_store::LocalRecordStore;
pub use remote::{RemoteService, WriteRequest};
pub use router::{Request, RequestRouter, RouterResponse, ServedFrom};
pub use storage::{KeyValueStore, MemoryStore};
pub use write_queue::WriteQueue;

#[cfg(target_arch = "wasm32")]
pub use api_client::HttpRemote;
