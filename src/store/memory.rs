use super::RateStore;
use crate::core::error::StorageError;
use crate::core::rate::RateSnapshot;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;
use tracing::debug;

struct StoredValue {
    snapshot: RateSnapshot,
    modified: SystemTime,
}

/// In-memory store, used where nothing should touch the disk
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Option<StoredValue>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `snapshot`, last written at `modified`.
    pub fn with_snapshot(snapshot: RateSnapshot, modified: SystemTime) -> Self {
        Self {
            inner: Mutex::new(Some(StoredValue { snapshot, modified })),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl RateStore for MemoryStore {
    fn load(&self) -> Result<Option<RateSnapshot>, StorageError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.as_ref().map(|stored| stored.snapshot.clone()))
    }

    fn save(&self, snapshot: &RateSnapshot) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        debug!("Store PUT {} rates", snapshot.rates.len());
        *inner = Some(StoredValue {
            snapshot: snapshot.clone(),
            modified: SystemTime::now(),
        });
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn last_modified(&self) -> Result<Option<SystemTime>, StorageError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.as_ref().map(|stored| stored.modified))
    }
}
