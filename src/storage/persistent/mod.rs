//! Persistent storage backend for coachdesk.
//!
//! This module provides durable, crash-safe storage with:
//! - Write-Ahead Logging (WAL) for crash recovery
//! - File locking for single-process ownership of the data directory
//! - CRC32 checksums for corruption detection
//! - Snapshot compaction to bound replay time
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     PersistentStores                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  commit  ┌─────────────────┐            │
//! │  │  InMemoryStore  │ ───────→ │  WriteAheadLog  │            │
//! │  │  (all tables)   │          │  (append-only)  │            │
//! │  └────────┬────────┘          └────────┬────────┘            │
//! │           │ compact                    │ truncate            │
//! │           ↓                            ↓                     │
//! │  ┌─────────────────┐          ┌─────────────────┐            │
//! │  │  SnapshotFile   │          │  DirLock (flock)│            │
//! │  └─────────────────┘          └─────────────────┘            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Opening a database loads the snapshot (if any), then replays every log
//! entry newer than the snapshot through the same check/apply path used
//! for live writes.

mod codec;
mod file_lock;
mod snapshot;
mod wal;

pub use file_lock::DirLock;
pub use snapshot::{SnapshotFile, SnapshotHeader};
pub use wal::{WalEntry, WalEntryKind, WalIterator, WriteAheadLog};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CoachError, ExecutionError};
use crate::storage::memory::{InMemoryStore, Tables};
use crate::storage::{StorageError, Stores};

const WAL_FILE: &str = "coachdesk.wal";

fn storage_err(message: String) -> CoachError {
    CoachError::Execution(ExecutionError::Storage { message })
}

/// Configuration for persistent storage.
#[derive(Debug, Clone)]
pub struct PersistentConfig {
    /// WAL size (bytes) above which [`PersistentStores::needs_compaction`]
    /// reports true.
    pub max_wal_size: u64,
    /// Whether to fsync after every write (slower but safer).
    pub sync_on_write: bool,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            max_wal_size: 16 * 1024 * 1024, // 16 MB
            sync_on_write: true,
        }
    }
}

impl PersistentConfig {
    const MIN_WAL_SIZE: u64 = 4 * 1024; // 4 KiB minimum to avoid degenerate compaction loops

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Fails when `max_wal_size` is below 4 KiB.
    pub fn validate(self) -> Result<Self, CoachError> {
        if self.max_wal_size < Self::MIN_WAL_SIZE {
            return Err(storage_err(format!(
                "max_wal_size must be at least {} bytes (got {})",
                Self::MIN_WAL_SIZE,
                self.max_wal_size
            )));
        }
        Ok(self)
    }
}

/// Open or create a persistent coachdesk database at the given path.
///
/// # Arguments
/// * `path` - Directory to store the database files
/// * `config` - Optional configuration (uses defaults if None)
///
/// # Errors
/// - If the path cannot be created or accessed
/// - If another process holds the lock
/// - If the snapshot or WAL is corrupt
///
/// # Example
/// ```rust,ignore
/// use coachdesk::storage::open_database;
/// use coachdesk::Platform;
///
/// let db = open_database("./coachdesk.db", None)?;
/// let platform = Platform::new(db.stores(), Arc::new(SystemClock), SweepPolicy::default());
/// ```
pub fn open_database(
    path: impl AsRef<Path>,
    config: Option<PersistentConfig>,
) -> Result<PersistentStores, CoachError> {
    let cfg = config.unwrap_or_default().validate()?;
    PersistentStores::open(path.as_ref(), cfg)
}

/// Result of a compaction operation.
#[derive(Debug, Clone)]
pub struct CompactionResult {
    /// Number of records written to the snapshot.
    pub records: usize,
    /// Last log sequence folded into the snapshot.
    pub wal_sequence: u64,
    /// Path to the snapshot file.
    pub snapshot_path: PathBuf,
    /// WAL size before compaction.
    pub wal_size_before: u64,
    /// WAL size after compaction.
    pub wal_size_after: u64,
}

/// An open database directory.
///
/// Holds the directory lock for as long as it lives; dropping it releases
/// the directory for another process.
pub struct PersistentStores {
    dir: PathBuf,
    _lock: DirLock,
    wal: Arc<WriteAheadLog>,
    snapshot: SnapshotFile,
    store: Arc<InMemoryStore>,
    config: PersistentConfig,
}

impl std::fmt::Debug for PersistentStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStores")
            .field("dir", &self.dir)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PersistentStores {
    /// Open or create a persistent database.
    ///
    /// # Errors
    ///
    /// See [`open_database`].
    pub fn open(dir: &Path, config: PersistentConfig) -> Result<Self, CoachError> {
        fs::create_dir_all(dir)
            .map_err(|e| storage_err(format!("failed to create database directory: {e}")))?;

        let lock = DirLock::acquire(dir).map_err(|e| storage_err(format!("failed to acquire lock: {e}")))?;

        let snapshot = SnapshotFile::in_dir(dir);
        let (mut tables, snapshot_sequence) = match snapshot
            .load()
            .map_err(|e| storage_err(format!("failed to load snapshot: {e}")))?
        {
            Some((header, image)) => {
                tracing::info!(
                    records = header.record_count,
                    wal_sequence = header.wal_sequence,
                    created_at = %header.created_at,
                    "loaded snapshot"
                );
                let tables = Tables::from_snapshot(image)
                    .map_err(|e| storage_err(format!("inconsistent snapshot: {e}")))?;
                (tables, header.wal_sequence)
            }
            None => (Tables::default(), 0),
        };

        let wal = Arc::new(
            WriteAheadLog::open(&dir.join(WAL_FILE), config.sync_on_write)
                .map_err(|e| storage_err(format!("failed to open WAL: {e}")))?,
        );
        let replayed = replay(&wal, &mut tables, snapshot_sequence)?;
        if replayed > 0 {
            tracing::info!(entries = replayed, "replayed write-ahead log");
        }
        wal.advance_to(snapshot_sequence)
            .map_err(|e| storage_err(format!("failed to position WAL: {e}")))?;

        let store = Arc::new(InMemoryStore::with_log(tables, wal.clone()));
        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: lock,
            wal,
            snapshot,
            store,
            config,
        })
    }

    /// Storage handles backed by this database.
    #[must_use]
    pub fn stores(&self) -> Stores {
        Stores::from_backend(self.store.clone())
    }

    /// The database directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the current WAL size in bytes.
    #[must_use]
    pub fn wal_size(&self) -> u64 {
        self.wal.size_bytes().unwrap_or(0)
    }

    /// True once the WAL has grown past the configured limit.
    #[must_use]
    pub fn needs_compaction(&self) -> bool {
        self.wal_size() > self.config.max_wal_size
    }

    /// Compact the WAL into a snapshot.
    ///
    /// This operation, performed while writes are blocked:
    /// 1. Copies every record out of memory
    /// 2. Writes it atomically to the snapshot file
    /// 3. Truncates the WAL
    /// 4. Writes a checkpoint marker to the WAL
    ///
    /// If it fails partway through, the previous snapshot and the WAL still
    /// hold all data and are replayed on next open.
    ///
    /// # Errors
    ///
    /// Propagates snapshot or WAL I/O failures.
    pub fn compact(&self) -> Result<CompactionResult, CoachError> {
        let wal_size_before = self.wal_size();
        let wal = &self.wal;
        let snapshot = &self.snapshot;

        let result = self.store.exclusive(|tables| {
            let wal_sequence = wal
                .current_sequence()
                .map_err(|e| StorageError::BackendError(e.to_string()))?;
            let header = snapshot
                .write(&tables.snapshot(), wal_sequence)
                .map_err(|e| {
                    StorageError::BackendError(format!("failed to write snapshot: {e}"))
                })?;
            wal.truncate().map_err(|e| {
                StorageError::BackendError(format!("failed to truncate WAL: {e}"))
            })?;
            wal.append(WalEntryKind::Checkpoint {
                snapshot_sequence: wal_sequence,
            })
            .map_err(|e| {
                StorageError::BackendError(format!("failed to write checkpoint: {e}"))
            })?;
            Ok(header)
        })?;

        let wal_size_after = self.wal_size();
        tracing::info!(
            records = result.record_count,
            wal_sequence = result.wal_sequence,
            wal_size_before,
            wal_size_after,
            "compacted database"
        );

        Ok(CompactionResult {
            records: result.record_count,
            wal_sequence: result.wal_sequence,
            snapshot_path: self.snapshot.path().to_path_buf(),
            wal_size_before,
            wal_size_after,
        })
    }
}

/// Applies every logged mutation newer than `after` to `tables`.
fn replay(wal: &WriteAheadLog, tables: &mut Tables, after: u64) -> Result<usize, CoachError> {
    let iter = wal
        .iter()
        .map_err(|e| storage_err(format!("failed to iterate WAL: {e}")))?;

    let mut count = 0;
    for entry in iter {
        let entry = entry.map_err(|e| storage_err(format!("corrupted WAL entry: {e}")))?;
        if entry.sequence <= after {
            continue;
        }
        match entry.kind {
            WalEntryKind::Apply(mutation) => {
                tables.commit(mutation).map_err(|e| {
                    storage_err(format!(
                        "failed to apply WAL entry {}: {e}",
                        entry.sequence
                    ))
                })?;
                count += 1;
            }
            WalEntryKind::Checkpoint { snapshot_sequence } => {
                tracing::debug!(snapshot_sequence, "checkpoint marker");
            }
        }
    }
    Ok(count)
}
