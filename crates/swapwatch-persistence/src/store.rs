//! Completion stores.
//!
//! JSON Lines format (.jsonl):
//! - Each line is a complete JSON object
//! - Partial file corruption only affects individual lines
//! - Can be read even if a write was interrupted

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::PersistenceResult;
use crate::record::CompletionRecord;

/// File name of the completion log inside the data directory.
pub const COMPLETIONS_FILE: &str = "completions.jsonl";

/// Append-only sink for completion records.
///
/// Deduplication is the recorder's job; stores only persist.
pub trait CompletionStore: Send + Sync {
    /// Durably append one record.
    fn append(&self, record: &CompletionRecord) -> PersistenceResult<()>;

    /// All stored records in write order.
    fn load_all(&self) -> PersistenceResult<Vec<CompletionRecord>>;
}

/// Arc wrapper for CompletionStore trait objects.
pub type DynCompletionStore = Arc<dyn CompletionStore>;

// ============================================================================
// JsonLinesStore
// ============================================================================

/// Completion log in `<data_dir>/completions.jsonl`.
///
/// Opened in append mode, so restarts never truncate earlier records.
/// Each record goes out as a single unbuffered write, so a failed append
/// leaves nothing queued for a later one.
pub struct JsonLinesStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesStore {
    /// Open (or create) the completion log under `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> PersistenceResult<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(COMPLETIONS_FILE);

        info!(path = %path.display(), "Opening completion log (append mode)");

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        // Terminate a line left open by an interrupted write.
        if ends_mid_line(&path)? {
            warn!(path = %path.display(), "Completion log ends mid-line, terminating it");
            file.write_all(b"\n")?;
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CompletionStore for JsonLinesStore {
    fn append(&self, record: &CompletionRecord) -> PersistenceResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.sync_data()?;
        Ok(())
    }

    fn load_all(&self) -> PersistenceResult<Vec<CompletionRecord>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CompletionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = idx + 1, error = %e, "Skipping corrupt completion line"),
            }
        }

        Ok(records)
    }
}

fn ends_mid_line(path: &Path) -> PersistenceResult<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<CompletionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl CompletionStore for MemoryStore {
    fn append(&self, record: &CompletionRecord) -> PersistenceResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn load_all(&self) -> PersistenceResult<Vec<CompletionRecord>> {
        Ok(self.records.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::order;
    use swapwatch_core::OrderStatus;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonLinesStore::open(temp_dir.path()).unwrap();

        store
            .append(&CompletionRecord::from_order(&order("X1", OrderStatus::Completed)))
            .unwrap();
        store
            .append(&CompletionRecord::from_order(&order("X2", OrderStatus::Refunded)))
            .unwrap();

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].order_id, "X1");
        assert_eq!(records[1].status, OrderStatus::Refunded);
        assert_eq!(store.path(), temp_dir.path().join(COMPLETIONS_FILE));
    }

    #[test]
    fn test_append_mode_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = JsonLinesStore::open(temp_dir.path()).unwrap();
            store
                .append(&CompletionRecord::from_order(&order("X1", OrderStatus::Completed)))
                .unwrap();
        }
        {
            let store = JsonLinesStore::open(temp_dir.path()).unwrap();
            store
                .append(&CompletionRecord::from_order(&order("X2", OrderStatus::Expired)))
                .unwrap();
            assert_eq!(store.load_all().unwrap().len(), 2, "second open must append");
        }
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonLinesStore::open(temp_dir.path()).unwrap();
        store
            .append(&CompletionRecord::from_order(&order("X1", OrderStatus::Completed)))
            .unwrap();

        // Simulate an interrupted write.
        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        write!(file, "{{\"record_id\":\"trunc").unwrap();

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 1);

        // Reopening terminates the fragment so the next record parses.
        drop(store);
        let store = JsonLinesStore::open(temp_dir.path()).unwrap();
        store
            .append(&CompletionRecord::from_order(&order("X2", OrderStatus::Completed)))
            .unwrap();
        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].order_id, "X2");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_append_is_not_replayed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(COMPLETIONS_FILE);
        std::os::unix::fs::symlink("/dev/full", &path).unwrap();

        let done = CompletionRecord::from_order(&order("X1", OrderStatus::Completed));
        {
            let store = JsonLinesStore::open(temp_dir.path()).unwrap();
            assert!(store.append(&done).is_err());
            assert!(store.append(&done).is_err());
        }

        std::fs::remove_file(&path).unwrap();
        let store = JsonLinesStore::open(temp_dir.path()).unwrap();
        store.append(&done).unwrap();

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].order_id, "X1");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store
            .append(&CompletionRecord::from_order(&order("X1", OrderStatus::Completed)))
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load_all().unwrap()[0].order_id, "X1");
    }
}
