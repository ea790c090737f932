//! Write-ahead log of store mutations.
//!
//! Every accepted [`Mutation`] is framed and appended here before it is
//! applied in memory. On open the log is scanned; a torn tail left by a
//! crash mid-append is cut off so later appends start on a frame boundary.
//!
//! # File Format
//! ```text
//! [header: magic + version + kind=Log]
//! [frame: WalEntry 1]
//! [frame: WalEntry 2]
//! ...
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Result as IoResult, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::memory::{CommitLog, Mutation};
use crate::storage::traits::StorageError;

use super::codec::{self, FileKind, HEADER_LEN};

/// A single entry in the write-ahead log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonically increasing sequence number.
    pub sequence: u64,
    /// When this entry was written.
    pub timestamp: DateTime<Utc>,
    /// The logged operation.
    pub kind: WalEntryKind,
}

/// The type of WAL entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntryKind {
    /// A store mutation.
    Apply(Mutation),
    /// Everything up to `snapshot_sequence` is contained in the snapshot.
    Checkpoint {
        /// Sequence covered by the snapshot.
        snapshot_sequence: u64,
    },
}

struct WalState {
    writer: BufWriter<File>,
    sequence: u64,
}

/// Write-ahead log. Thread-safe via an internal mutex.
pub struct WriteAheadLog {
    path: PathBuf,
    state: Mutex<WalState>,
    sync_on_write: bool,
}

impl std::fmt::Debug for WriteAheadLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteAheadLog")
            .field("path", &self.path)
            .field("sync_on_write", &self.sync_on_write)
            .finish_non_exhaustive()
    }
}

impl WriteAheadLog {
    /// Opens or creates the log at `path`.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, a foreign header, or a corrupt frame that is
    /// not at the tail.
    pub fn open(path: &Path, sync_on_write: bool) -> IoResult<Self> {
        let fresh = !path.exists() || std::fs::metadata(path)?.len() == 0;
        if fresh {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?;
            codec::write_header(&mut file, FileKind::Log)?;
            file.sync_all()?;
        }

        let scan = scan(path)?;
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if scan.valid_len < len {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = len - scan.valid_len,
                last_sequence = scan.last_sequence,
                "truncating torn write-ahead log tail"
            );
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }
        drop(file);

        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(WalState {
                writer: BufWriter::new(file),
                sequence: scan.last_sequence,
            }),
            sync_on_write,
        })
    }

    fn lock(&self) -> IoResult<MutexGuard<'_, WalState>> {
        self.state
            .lock()
            .map_err(|_| std::io::Error::new(ErrorKind::Other, "poisoned lock: wal"))
    }

    /// Appends an entry, returning its sequence number.
    ///
    /// # Errors
    ///
    /// Propagates encoding and I/O failures; the sequence is not advanced.
    pub fn append(&self, kind: WalEntryKind) -> IoResult<u64> {
        let mut state = self.lock()?;
        let sequence = state.sequence + 1;
        let entry = WalEntry {
            sequence,
            timestamp: Utc::now(),
            kind,
        };
        let frame = codec::encode(&entry)?;

        state.writer.write_all(&frame)?;
        state.writer.flush()?;
        if self.sync_on_write {
            state.writer.get_ref().sync_data()?;
        }
        state.sequence = sequence;
        Ok(sequence)
    }

    /// Iterates the entries currently on disk.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or its header is invalid.
    pub fn iter(&self) -> IoResult<WalIterator> {
        WalIterator::open(&self.path)
    }

    /// Sequence number of the last appended entry.
    ///
    /// # Errors
    ///
    /// Fails only on a poisoned lock.
    pub fn current_sequence(&self) -> IoResult<u64> {
        Ok(self.lock()?.sequence)
    }

    /// Log size in bytes.
    ///
    /// # Errors
    ///
    /// Propagates metadata failures.
    pub fn size_bytes(&self) -> IoResult<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Empties the log, keeping only the header. Sequencing continues from
    /// the last appended entry so later entries never collide with those
    /// already folded into a snapshot.
    ///
    /// Only call this once a snapshot covering every entry is durable.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures.
    pub fn truncate(&self) -> IoResult<()> {
        let mut state = self.lock()?;
        state.writer.flush()?;
        let file = state.writer.get_mut();
        file.set_len(0)?;
        codec::write_header(file, FileKind::Log)?;
        file.sync_all()
    }

    /// Raises the sequence counter to at least `sequence`.
    ///
    /// # Errors
    ///
    /// Fails only on a poisoned lock.
    pub fn advance_to(&self, sequence: u64) -> IoResult<()> {
        let mut state = self.lock()?;
        state.sequence = state.sequence.max(sequence);
        Ok(())
    }
}

impl CommitLog for WriteAheadLog {
    fn append(&self, mutation: &Mutation) -> Result<(), StorageError> {
        WriteAheadLog::append(self, WalEntryKind::Apply(mutation.clone()))
            .map(|_| ())
            .map_err(|e| StorageError::BackendError(format!("WAL write failed: {e}")))
    }
}

struct Scan {
    last_sequence: u64,
    valid_len: u64,
}

fn scan(path: &Path) -> IoResult<Scan> {
    let mut iter = WalIterator::open(path)?;
    let mut last_sequence = 0;
    let mut valid_len = HEADER_LEN;
    loop {
        match iter.next_entry() {
            Ok(Some(entry)) => {
                last_sequence = entry.sequence;
                valid_len = iter.position()?;
            }
            Ok(None) => break,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) if iter.position()? >= iter.file_size => {
                tracing::warn!(error = %e, "corrupt final write-ahead log frame");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Scan {
        last_sequence,
        valid_len,
    })
}

/// Iterator over WAL entries. Stops quietly at a torn tail.
pub struct WalIterator {
    reader: BufReader<File>,
    file_size: u64,
}

impl WalIterator {
    fn open(path: &Path) -> IoResult<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        codec::read_header(&mut reader, FileKind::Log)?;
        Ok(Self { reader, file_size })
    }

    fn position(&mut self) -> IoResult<u64> {
        self.reader.stream_position()
    }

    fn next_entry(&mut self) -> IoResult<Option<WalEntry>> {
        if self.position()? >= self.file_size {
            return Ok(None);
        }
        codec::decode(&mut self.reader).map(Some)
    }
}

impl Iterator for WalIterator {
    type Item = IoResult<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::link::StudentProfessionalLink;
    use crate::user::UserId;

    fn link_mutation() -> Mutation {
        Mutation::InsertLink(StudentProfessionalLink::pending(UserId::new(), UserId::new(), Utc::now()))
    }

    #[test]
    fn test_append_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");

        {
            let wal = WriteAheadLog::open(&path, false).unwrap();
            assert_eq!(wal.append(WalEntryKind::Apply(link_mutation())).unwrap(), 1);
            assert_eq!(wal.append(WalEntryKind::Apply(link_mutation())).unwrap(), 2);
        }

        let wal = WriteAheadLog::open(&path, false).unwrap();
        assert_eq!(wal.current_sequence().unwrap(), 2);
        let entries: Vec<_> = wal.iter().unwrap().collect::<IoResult<_>>().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0].kind, WalEntryKind::Apply(Mutation::InsertLink(_))));
    }

    #[test]
    fn test_torn_tail_is_cut_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("torn.wal");
        {
            let wal = WriteAheadLog::open(&path, true).unwrap();
            wal.append(WalEntryKind::Apply(link_mutation())).unwrap();
        }
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[1, 200, 0, 0, 0, b'{']).unwrap();
        }

        let wal = WriteAheadLog::open(&path, true).unwrap();
        assert_eq!(wal.current_sequence().unwrap(), 1);
        wal.append(WalEntryKind::Apply(link_mutation())).unwrap();
        drop(wal);

        let wal = WriteAheadLog::open(&path, true).unwrap();
        let entries: Vec<_> = wal.iter().unwrap().collect::<IoResult<_>>().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].sequence, 2);
    }

    #[test]
    fn test_truncate_keeps_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trunc.wal");
        let wal = WriteAheadLog::open(&path, false).unwrap();
        wal.append(WalEntryKind::Apply(link_mutation())).unwrap();
        wal.truncate().unwrap();
        assert_eq!(wal.current_sequence().unwrap(), 1);
        assert_eq!(wal.size_bytes().unwrap(), HEADER_LEN);
        assert_eq!(wal.iter().unwrap().count(), 0);

        assert_eq!(wal.append(WalEntryKind::Checkpoint { snapshot_sequence: 1 }).unwrap(), 2);
    }

    #[test]
    fn test_advance_to_never_lowers() {
        let dir = tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("adv.wal"), false).unwrap();
        wal.advance_to(40).unwrap();
        wal.advance_to(10).unwrap();
        assert_eq!(wal.append(WalEntryKind::Apply(link_mutation())).unwrap(), 41);
    }
}
