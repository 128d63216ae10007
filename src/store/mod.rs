pub mod disk;
pub mod memory;

use crate::core::error::StorageError;
use crate::core::rate::RateSnapshot;
use std::time::SystemTime;

pub use disk::DiskStore;
pub use memory::MemoryStore;

/// Persistence for the rate and country mappings.
///
/// Implementations always replace both mappings as a whole.
pub trait RateStore: Send + Sync {
    /// Returns `None` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<RateSnapshot>, StorageError>;

    fn save(&self, snapshot: &RateSnapshot) -> Result<(), StorageError>;

    fn last_modified(&self) -> Result<Option<SystemTime>, StorageError>;
}
