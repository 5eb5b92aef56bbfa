pub mod collection;
pub mod conflict;
pub mod queue;
pub mod record;
pub mod sync;

pub use collection::{Collection, CollectionDescriptor};
pub use conflict::{Classification, ConflictCase, Resolution};
pub use queue::{EntryState, NewQueueEntry, Operation, QueueEntry, QueueSnapshot};
pub use record::{is_temporary_id, new_temporary_id, ReadFilter, Record, RemoteRecord, SyncStatus, TEMP_ID_PREFIX};
pub use sync::{DrainOutcome, DrainReport, PullReport, SyncPhase, SyncReport, SyncStatusSnapshot};
