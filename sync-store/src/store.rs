use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, Transaction};

use crate::change::{ChangeKey, ChangeOperation, ChangeRecord, NewChange};
use crate::error::{Result, StoreError};
use crate::node::{NodeKind, Revision, RevisionMarker, SyncNode};

// my_revision is declared without a type so SQLite keeps whatever the
// replication protocol wrote (integer or text) instead of coercing it.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS changes (
    change_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    rev           INTEGER NOT NULL,
    table_name    TEXT NOT NULL,
    op            TEXT NOT NULL,
    row_key       TEXT NOT NULL,
    payload       BLOB,
    source        TEXT,
    created_at    TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS changes_rev_idx ON changes(rev);

CREATE TABLE IF NOT EXISTS sync_nodes (
    node_id       TEXT PRIMARY KEY,
    kind          TEXT NOT NULL,
    my_revision   NOT NULL,
    updated_at    TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

/// Change log and sync node tables behind a single SQLite connection.
///
/// All access goes through [`SyncStore::unit_of_work`], which holds the
/// connection lock for exactly one transaction. Once [`SyncStore::close`]
/// has been called every operation fails with [`StoreError::Closed`].
pub struct SyncStore {
    path: PathBuf,
    open: AtomicBool,
    conn: Mutex<Option<Connection>>,
}

impl SyncStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
                #[cfg(unix)]
                set_owner_perms(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "wal")?;
        conn.pragma_update(None, "synchronous", "normal").ok();
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %path.display(), "opened sync store");
        Ok(Self {
            path: path.to_path_buf(),
            open: AtomicBool::new(true),
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Close the underlying connection. Waits for an in-flight unit of work
    /// to finish. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::Release);
        let mut guard = self.lock();
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, err)| StoreError::Sqlite(err))?;
            tracing::debug!(path = %self.path.display(), "closed sync store");
        }
        Ok(())
    }

    /// Run `work` inside a fresh transaction that is committed when `work`
    /// returns `Ok` and rolled back otherwise.
    pub fn unit_of_work<T, E, F>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&UnitOfWork<'_>) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let mut guard = self.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| StoreError::Closed(self.path.clone()))?;
        let tx = conn.transaction().map_err(StoreError::from)?;
        let unit = UnitOfWork { tx };
        let out = work(&unit)?;
        unit.commit()?;
        Ok(out)
    }

    pub fn append_change(&self, change: &NewChange) -> Result<ChangeKey> {
        self.unit_of_work(|unit| unit.append_change(change))
    }

    pub fn append_changes(&self, changes: &[NewChange]) -> Result<Vec<ChangeKey>> {
        self.unit_of_work(|unit| {
            changes
                .iter()
                .map(|change| unit.append_change(change))
                .collect()
        })
    }

    pub fn upsert_sync_node(&self, node: &SyncNode) -> Result<()> {
        self.unit_of_work(|unit| unit.upsert_sync_node(node))
    }

    pub fn remove_sync_node(&self, node_id: &str) -> Result<bool> {
        self.unit_of_work(|unit| unit.remove_sync_node(node_id))
    }

    pub fn list_sync_nodes(&self) -> Result<Vec<SyncNode>> {
        self.unit_of_work(|unit| unit.list_sync_nodes())
    }

    pub fn list_changes(&self, limit: usize) -> Result<Vec<ChangeRecord>> {
        self.unit_of_work(|unit| unit.list_changes(limit))
    }

    pub fn count_changes(&self) -> Result<u64> {
        self.unit_of_work(|unit| unit.count_changes())
    }

    pub fn count_changes_below(&self, watermark: Revision) -> Result<u64> {
        self.unit_of_work(|unit| unit.count_changes_below(watermark))
    }

    // A unit of work that panicked has already rolled back while unwinding,
    // so the connection behind a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One open transaction against the store.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl UnitOfWork<'_> {
    pub fn list_sync_nodes(&self) -> Result<Vec<SyncNode>> {
        let mut stmt = self
            .tx
            .prepare_cached("SELECT node_id, kind, my_revision FROM sync_nodes ORDER BY node_id")?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get(1)?;
            out.push(SyncNode {
                node_id: row.get(0)?,
                kind: NodeKind::parse(&kind)?,
                my_revision: row.get::<_, RevisionMarker>(2)?,
            });
        }
        Ok(out)
    }

    /// Keys of the oldest changes with `rev` strictly below `watermark`.
    pub fn change_keys_below(&self, watermark: Revision, limit: usize) -> Result<Vec<ChangeKey>> {
        let mut stmt = self.tx.prepare_cached(
            "SELECT change_id FROM changes
             WHERE rev < ?1
             ORDER BY rev ASC, change_id ASC
             LIMIT ?2",
        )?;
        let mut rows = stmt.query(params![watermark, limit as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(ChangeKey(row.get(0)?));
        }
        Ok(out)
    }

    /// Delete the given keys. Keys that no longer exist are skipped and not
    /// counted.
    pub fn delete_changes(&self, keys: &[ChangeKey]) -> Result<u64> {
        let mut stmt = self
            .tx
            .prepare_cached("DELETE FROM changes WHERE change_id = ?1")?;
        let mut deleted = 0u64;
        for key in keys {
            deleted += stmt.execute([key.0])? as u64;
        }
        Ok(deleted)
    }

    pub fn append_change(&self, change: &NewChange) -> Result<ChangeKey> {
        self.tx.execute(
            "INSERT INTO changes(rev, table_name, op, row_key, payload, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                change.rev,
                change.table_name,
                change.operation.as_str(),
                change.row_key,
                change.payload,
                change.source,
            ],
        )?;
        Ok(ChangeKey(self.tx.last_insert_rowid()))
    }

    pub fn list_changes(&self, limit: usize) -> Result<Vec<ChangeRecord>> {
        let mut stmt = self.tx.prepare_cached(
            "SELECT change_id, rev, table_name, op, row_key, payload, source
             FROM changes
             ORDER BY rev ASC, change_id ASC
             LIMIT ?1",
        )?;
        let mut rows = stmt.query([limit as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let op: String = row.get(3)?;
            out.push(ChangeRecord {
                change_id: ChangeKey(row.get(0)?),
                rev: row.get(1)?,
                table_name: row.get(2)?,
                operation: ChangeOperation::parse(&op)?,
                row_key: row.get(4)?,
                payload: row.get(5)?,
                source: row.get(6)?,
            });
        }
        Ok(out)
    }

    pub fn count_changes(&self) -> Result<u64> {
        let count: i64 = self
            .tx
            .query_row("SELECT COUNT(*) FROM changes", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn count_changes_below(&self, watermark: Revision) -> Result<u64> {
        let count: i64 = self.tx.query_row(
            "SELECT COUNT(*) FROM changes WHERE rev < ?1",
            [watermark],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn upsert_sync_node(&self, node: &SyncNode) -> Result<()> {
        self.tx.execute(
            "INSERT INTO sync_nodes(node_id, kind, my_revision, updated_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
             ON CONFLICT(node_id) DO UPDATE SET
                kind = excluded.kind,
                my_revision = excluded.my_revision,
                updated_at = CURRENT_TIMESTAMP",
            params![node.node_id, node.kind.as_str(), node.my_revision],
        )?;
        Ok(())
    }

    pub fn remove_sync_node(&self, node_id: &str) -> Result<bool> {
        let removed = self
            .tx
            .execute("DELETE FROM sync_nodes WHERE node_id = ?1", [node_id])?;
        Ok(removed > 0)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_owner_perms(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = fs::metadata(path)?;
    let mut perms = metadata.permissions();
    perms.set_mode(0o700);
    fs::set_permissions(path, perms)?;
    Ok(())
}
