//! Indexing pipeline: discovery -> streaming source -> transform -> bulk persist.

pub mod coordinator;
pub mod discovery;
pub mod persist;
pub mod policy;
pub mod report;
pub mod source;
pub mod transform;

pub use coordinator::{ChunkCallback, Coordinator, RunId, run_indexing};
pub use discovery::discover;
pub use persist::{BulkPersister, PersistOutcome, to_upsert_op};
pub use policy::{RetryPolicy, SkipPolicy};
pub use report::{RunReport, error_context};
pub use source::DirectoryQueueSource;
pub use transform::{Transformer, describe_error};
