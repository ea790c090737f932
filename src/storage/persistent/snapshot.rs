//! Compacted table snapshots.
//!
//! A snapshot holds every primary record at the moment of compaction. It
//! is written to a temporary file, synced, then renamed over
//! `snapshot.db`, so readers only ever see a complete snapshot or the
//! previous one.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Result as IoResult, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::memory::TablesSnapshot;

use super::codec::{self, FileKind};

const SNAPSHOT_FILE: &str = "snapshot.db";
const SNAPSHOT_TMP: &str = "snapshot.db.tmp";

/// Metadata framed ahead of the snapshot body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
    /// Last log sequence folded into the snapshot.
    pub wal_sequence: u64,
    /// Number of primary records.
    pub record_count: usize,
}

/// Location of the snapshot inside a data directory.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl SnapshotFile {
    /// Snapshot paths under `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(SNAPSHOT_FILE),
            tmp_path: dir.join(SNAPSHOT_TMP),
        }
    }

    /// Final snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the current snapshot, if one exists. Leftover temporary files
    /// from an interrupted compaction are removed.
    ///
    /// # Errors
    ///
    /// Fails when the snapshot exists but cannot be decoded.
    pub fn load(&self) -> IoResult<Option<(SnapshotHeader, TablesSnapshot)>> {
        match fs::remove_file(&self.tmp_path) {
            Ok(()) => tracing::warn!(path = %self.tmp_path.display(), "removed partial snapshot"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        codec::read_header(&mut reader, FileKind::Snapshot)?;
        let header: SnapshotHeader = codec::decode(&mut reader)?;
        let tables: TablesSnapshot = codec::decode(&mut reader)?;
        Ok(Some((header, tables)))
    }

    /// Atomically replaces the snapshot with `tables`.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures; the previous snapshot is left intact.
    pub fn write(&self, tables: &TablesSnapshot, wal_sequence: u64) -> IoResult<SnapshotHeader> {
        let header = SnapshotHeader {
            created_at: Utc::now(),
            wal_sequence,
            record_count: tables.record_count(),
        };

        let result = self.write_tmp(&header, tables).and_then(|()| {
            fs::rename(&self.tmp_path, &self.path)?;
            sync_parent(&self.path)
        });
        if result.is_err() {
            let _ = fs::remove_file(&self.tmp_path);
        }
        result.map(|()| header)
    }

    fn write_tmp(&self, header: &SnapshotHeader, tables: &TablesSnapshot) -> IoResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.tmp_path)?;
        let mut writer = BufWriter::new(file);
        codec::write_header(&mut writer, FileKind::Snapshot)?;
        writer.write_all(&codec::encode(header)?)?;
        writer.write_all(&codec::encode(tables)?)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> IoResult<()> {
    match path.parent() {
        Some(dir) => File::open(dir)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> IoResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::training::{Exercise, ExerciseType, MuscleGroup};

    #[test]
    fn test_missing_snapshot_loads_none() {
        let dir = tempdir().unwrap();
        assert!(SnapshotFile::in_dir(dir.path()).load().unwrap().is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let file = SnapshotFile::in_dir(dir.path());
        let tables = TablesSnapshot {
            exercises: vec![Exercise::new(
                "Push-up",
                "Body weight press",
                ExerciseType::BodyWeight,
                [MuscleGroup::Chest, MuscleGroup::Triceps],
            )],
            ..TablesSnapshot::default()
        };

        let header = file.write(&tables, 42).unwrap();
        assert_eq!(header.record_count, 1);

        let (loaded_header, loaded) = file.load().unwrap().unwrap();
        assert_eq!(loaded_header.wal_sequence, 42);
        assert_eq!(loaded, tables);
    }

    #[test]
    fn test_partial_tmp_file_is_discarded() {
        let dir = tempdir().unwrap();
        let file = SnapshotFile::in_dir(dir.path());
        fs::write(dir.path().join(SNAPSHOT_TMP), b"garbage").unwrap();
        assert!(file.load().unwrap().is_none());
        assert!(!dir.path().join(SNAPSHOT_TMP).exists());
    }
}
