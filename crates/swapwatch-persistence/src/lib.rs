//! Completion records for swapwatch.
//!
//! Writes one record per order that reaches a terminal status, exactly once,
//! to an append-only JSON Lines file (or memory, for tests and dry runs).

pub mod error;
pub mod record;
pub mod recorder;
pub mod store;

pub use error::{PersistenceError, PersistenceResult};
pub use record::CompletionRecord;
pub use recorder::CompletionRecorder;
pub use store::{CompletionStore, DynCompletionStore, JsonLinesStore, MemoryStore, COMPLETIONS_FILE};
