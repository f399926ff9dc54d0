// ABOUTME: Store contract consumed by the reclaimer, plus its SQLite binding
// ABOUTME: Every batch runs in its own unit of work opened by the store itself

use anyhow::Result;
use sync_store::{ChangeKey, Revision, SyncNode, SyncStore, UnitOfWork};

/// A change-log store the reclaimer can garbage collect.
///
/// Implementations must be safe to share across tasks: the reclaimer holds
/// an `Arc` to the store and calls into it from the blocking thread pool.
pub trait ChangeStore: Send + Sync + 'static {
    /// Liveness check consulted before a scheduled continuation runs.
    fn is_open(&self) -> bool;

    /// Run `work` in a new unit of work that belongs to no caller.
    ///
    /// The unit commits when `work` returns `Ok` and is rolled back
    /// otherwise. Nothing may be held once this returns.
    fn with_detached_scope<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&dyn ChangeScope) -> Result<T>;
}

/// Operations available to a single reclamation batch.
pub trait ChangeScope {
    fn list_sync_nodes(&self) -> Result<Vec<SyncNode>>;

    /// Keys of changes with `rev < watermark`, oldest first, at most `limit`.
    fn change_keys_below(&self, watermark: Revision, limit: usize) -> Result<Vec<ChangeKey>>;

    /// Delete `keys`, returning how many rows actually went away.
    fn bulk_delete(&self, keys: &[ChangeKey]) -> Result<u64>;
}

impl ChangeStore for SyncStore {
    fn is_open(&self) -> bool {
        SyncStore::is_open(self)
    }

    fn with_detached_scope<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&dyn ChangeScope) -> Result<T>,
    {
        self.unit_of_work(|unit| work(unit))
    }
}

impl ChangeScope for UnitOfWork<'_> {
    fn list_sync_nodes(&self) -> Result<Vec<SyncNode>> {
        Ok(UnitOfWork::list_sync_nodes(self)?)
    }

    fn change_keys_below(&self, watermark: Revision, limit: usize) -> Result<Vec<ChangeKey>> {
        Ok(UnitOfWork::change_keys_below(self, watermark, limit)?)
    }

    fn bulk_delete(&self, keys: &[ChangeKey]) -> Result<u64> {
        Ok(self.delete_changes(keys)?)
    }
}
