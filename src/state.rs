use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::constants::state::{DEFAULT_STORE_FILENAME, STATE_DOC_KEY, TX_MAX_ATTEMPTS};
use crate::errors::RotationError;
use crate::types::{DayId, Revision};

/// Raw persisted shape of the shared rotation record.
///
/// Every rotation field is optional: the record lives in an external store,
/// may predate the `next_start_index` field, and may be touched by unrelated
/// writers. The coordinator validates this into a `RotationState` before
/// handing anything to callers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    /// Calendar day the current window belongs to (`%Y%m%d`).
    pub day: Option<DayId>,
    /// First catalog index of the current window.
    pub start_index: Option<u64>,
    /// Number of items in the current window.
    pub batch_size: Option<u64>,
    /// Cursor seeding the next day's window.
    pub next_start_index: Option<u64>,
    /// Store-assigned commit timestamp; informational only.
    pub updated_at: Option<DateTime<Utc>>,
    /// Unrelated metadata riding on the record.
    /// Merge-writes never touch it, so it survives every rollover.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Merge-write payload for the rotation record.
///
/// `None` fields keep their stored value. Annotations are not expressible in
/// a patch, so a patch can never clobber them.
#[derive(Clone, Debug, Default)]
pub struct StatePatch {
    /// New day, if changing.
    pub day: Option<DayId>,
    /// New start index, if changing.
    pub start_index: Option<u64>,
    /// New batch size, if changing.
    pub batch_size: Option<u64>,
    /// New next-start cursor, if changing.
    pub next_start_index: Option<u64>,
    /// Ask the store to stamp `updated_at` with its own clock at commit.
    pub touch_updated_at: bool,
}

impl StatePatch {
    fn apply(&self, doc: &mut StateDocument, now: DateTime<Utc>) {
        if let Some(day) = &self.day {
            doc.day = Some(day.clone());
        }
        if let Some(start_index) = self.start_index {
            doc.start_index = Some(start_index);
        }
        if let Some(batch_size) = self.batch_size {
            doc.batch_size = Some(batch_size);
        }
        if let Some(next_start_index) = self.next_start_index {
            doc.next_start_index = Some(next_start_index);
        }
        if self.touch_updated_at {
            doc.updated_at = Some(now);
        }
    }
}

/// Decision returned by a transaction body.
pub enum TxOutcome {
    /// The current record already satisfies the caller; commit nothing.
    ReadOnly,
    /// Merge-write this patch, provided no concurrent commit intervened.
    Write(StatePatch),
}

/// Document-store seam holding the single shared rotation record.
///
/// Backends implement the two optimistic primitives; `read` and `transact`
/// are derived. `transact` is the only blocking call in the crate and the
/// sole path that mutates the record: it re-executes the body against a
/// fresh snapshot whenever the commit loses a race, so racing callers always
/// converge on one committed state and never observe a half-applied update.
pub trait StateStore: Send + Sync {
    /// Point-read the record together with its commit revision.
    fn snapshot(&self) -> Result<(Option<StateDocument>, Revision), RotationError>;

    /// Merge-write `patch` iff the record revision still equals `expected`.
    ///
    /// `Ok(None)` signals a write conflict (a concurrent commit won).
    /// When `patch.touch_updated_at` is set, the store assigns `updated_at`
    /// from its own clock at commit time.
    fn try_commit(
        &self,
        expected: Revision,
        patch: &StatePatch,
    ) -> Result<Option<StateDocument>, RotationError>;

    /// Point-read without the revision.
    fn read(&self) -> Result<Option<StateDocument>, RotationError> {
        Ok(self.snapshot()?.0)
    }

    /// Run `body` inside the optimistic transaction loop.
    ///
    /// The body must be safe to evaluate multiple times: it is re-run from a
    /// fresh snapshot on every conflict, and only the attempt that commits is
    /// ever observable. Exhausting the retry budget yields
    /// [`RotationError::TransactionAborted`] with no partial write.
    fn transact(
        &self,
        body: &mut dyn FnMut(Option<&StateDocument>) -> Result<TxOutcome, RotationError>,
    ) -> Result<StateDocument, RotationError> {
        for attempt in 1..=TX_MAX_ATTEMPTS {
            let (doc, revision) = self.snapshot()?;
            match body(doc.as_ref())? {
                TxOutcome::ReadOnly => {
                    return doc.ok_or_else(|| {
                        RotationError::Store("read-only outcome on an absent record".to_string())
                    });
                }
                TxOutcome::Write(patch) => match self.try_commit(revision, &patch)? {
                    Some(committed) => {
                        debug!(attempt, "rotation record committed");
                        return Ok(committed);
                    }
                    None => {
                        debug!(attempt, "commit conflict; re-running transaction body");
                    }
                },
            }
        }
        Err(RotationError::TransactionAborted {
            attempts: TX_MAX_ATTEMPTS,
        })
    }
}

/// In-memory state store.
///
/// Reference semantics for the optimistic commit protocol and the fake used
/// throughout the tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<(Option<StateDocument>, Revision)>,
}

impl MemoryStateStore {
    /// Create an empty store (record absent, revision 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with an existing record, e.g. a legacy one.
    pub fn with_document(doc: StateDocument) -> Self {
        Self {
            inner: Mutex::new((Some(doc), 1)),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn snapshot(&self) -> Result<(Option<StateDocument>, Revision), RotationError> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| RotationError::Store("state lock poisoned".to_string()))?;
        Ok((guard.0.clone(), guard.1))
    }

    fn try_commit(
        &self,
        expected: Revision,
        patch: &StatePatch,
    ) -> Result<Option<StateDocument>, RotationError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| RotationError::Store("state lock poisoned".to_string()))?;
        if guard.1 != expected {
            return Ok(None);
        }
        let mut doc = guard.0.clone().unwrap_or_default();
        patch.apply(&mut doc, Utc::now());
        guard.0 = Some(doc.clone());
        guard.1 += 1;
        Ok(Some(doc))
    }
}

/// Durable single-file state store on bundled SQLite.
///
/// One `documents(key, revision, payload)` table holds the singleton record
/// as JSON; `try_commit` re-checks the revision inside a SQLite transaction,
/// so in-process racers behave exactly like remote ones.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open (or create) the store at `path`.
    ///
    /// A directory path is accepted and resolves to the default filename
    /// inside it.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, RotationError> {
        let path = coerce_store_path(path.into());
        ensure_parent_dir(&path)?;
        let conn = Connection::open(&path).map_err(map_sql_err)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                key       TEXT PRIMARY KEY,
                revision  INTEGER NOT NULL,
                payload   TEXT NOT NULL
            )",
            [],
        )
        .map_err(map_sql_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Default store file path inside `dir`.
    pub fn default_path_in_dir<P: AsRef<Path>>(dir: P) -> PathBuf {
        dir.as_ref().join(DEFAULT_STORE_FILENAME)
    }
}

impl StateStore for SqliteStateStore {
    fn snapshot(&self) -> Result<(Option<StateDocument>, Revision), RotationError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RotationError::Store("sqlite connection lock poisoned".to_string()))?;
        read_row(&conn)
    }

    fn try_commit(
        &self,
        expected: Revision,
        patch: &StatePatch,
    ) -> Result<Option<StateDocument>, RotationError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| RotationError::Store("sqlite connection lock poisoned".to_string()))?;
        let tx = conn.transaction().map_err(map_sql_err)?;

        let (current, revision) = read_row(&tx)?;
        if revision != expected {
            return Ok(None);
        }
        let mut doc = current.unwrap_or_default();
        patch.apply(&mut doc, Utc::now());
        let payload = encode_document(&doc)?;
        tx.execute(
            "INSERT INTO documents (key, revision, payload) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET revision = ?2, payload = ?3",
            rusqlite::params![STATE_DOC_KEY, (expected + 1) as i64, payload],
        )
        .map_err(map_sql_err)?;
        tx.commit().map_err(map_sql_err)?;
        Ok(Some(doc))
    }
}

fn read_row(conn: &Connection) -> Result<(Option<StateDocument>, Revision), RotationError> {
    let row = conn.query_row(
        "SELECT revision, payload FROM documents WHERE key = ?1",
        rusqlite::params![STATE_DOC_KEY],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    );
    match row {
        Ok((revision, payload)) => Ok((Some(decode_document(&payload)?), revision as u64)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok((None, 0)),
        Err(err) => Err(map_sql_err(err)),
    }
}

fn encode_document(doc: &StateDocument) -> Result<String, RotationError> {
    serde_json::to_string(doc)
        .map_err(|err| RotationError::Store(format!("failed to encode rotation record: {err}")))
}

fn decode_document(payload: &str) -> Result<StateDocument, RotationError> {
    serde_json::from_str(payload)
        .map_err(|err| RotationError::Store(format!("failed to decode rotation record: {err}")))
}

fn map_sql_err(err: rusqlite::Error) -> RotationError {
    RotationError::Store(err.to_string())
}

fn coerce_store_path(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        path.join(DEFAULT_STORE_FILENAME)
    } else {
        path
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), RotationError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|err| RotationError::Store(format!("create store directory: {err}")))?;
        }
    }
    Ok(())
}
