//! Append-only durability journal (feature `persistent`).
//!
//! A redo log of accepted mutations: every upsert, historical insert,
//! expiry, and entity registration the engine applies is framed and
//! appended here, and replayed on open to rebuild the in-memory store.
//! Version ids and recorded-at timestamps are journaled, so replayed chains
//! reconstruct identically — including supersession back-references.
//!
//! # File format
//!
//! ```text
//! [MAGIC: 4 bytes "TWNJ"][VERSION: 1 byte]
//! [ENTRY: len u32 LE][crc32 u32 LE][JSON bytes]
//! [ENTRY...]
//! ```
//!
//! A torn final frame (crash mid-append) is treated as clean truncation; a
//! CRC mismatch inside the file is corruption and fails the open. Targets
//! single-process embedded use — callers wanting multi-process exclusion
//! put the journal behind their own lock.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Error, ErrorKind, Read, Result as IoResult, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::fact::FactDraft;
use crate::interval::Interval;
use crate::triple::{TripleId, TripleKey, VersionId};

const MAGIC: &[u8; 4] = b"TWNJ";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: u64 = 5;

/// Frames larger than this are treated as corruption, not allocation
/// requests.
const MAX_ENTRY_LEN: u32 = 64 * 1024 * 1024;

/// One journaled mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalOp {
    /// Entity registration.
    Entity {
        entity: Entity,
    },

    /// Accepted upsert, with the id and transaction time it was applied
    /// under.
    Upsert {
        key: TripleKey,
        draft: FactDraft,
        as_of: DateTime<Utc>,
        id: VersionId,
        recorded_at: DateTime<Utc>,
    },

    /// Accepted historical insert.
    Historical {
        key: TripleKey,
        draft: FactDraft,
        validity: Interval,
        id: VersionId,
        recorded_at: DateTime<Utc>,
    },

    /// Accepted expiry.
    Expire {
        triple: TripleId,
        at: DateTime<Utc>,
    },
}

/// A framed journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Monotonically increasing sequence number.
    pub sequence: u64,

    /// When the entry was written.
    pub written_at: DateTime<Utc>,

    /// The mutation.
    pub op: JournalOp,
}

#[derive(Debug)]
struct JournalWriter {
    file: BufWriter<File>,
    sequence: u64,
}

/// Append-only journal. Thread-safe via an internal mutex.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    writer: Mutex<JournalWriter>,
}

impl Journal {
    /// Opens (or creates) a journal, returning the handle and every record
    /// already on disk, in write order.
    pub fn open(path: &Path) -> IoResult<(Self, Vec<JournalRecord>)> {
        let fresh = !path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let (records, good_len) = if fresh || file.metadata()?.len() < HEADER_LEN {
            let mut file = &file;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(MAGIC)?;
            file.write_all(&[FORMAT_VERSION])?;
            file.sync_all()?;
            (Vec::new(), HEADER_LEN)
        } else {
            read_records(&file)?
        };

        // Drop any torn tail so the next append starts on a frame boundary.
        file.set_len(good_len)?;
        let mut file = file;
        file.seek(SeekFrom::End(0))?;

        let sequence = records.last().map_or(0, |r| r.sequence);
        let journal = Self {
            path: path.to_path_buf(),
            writer: Mutex::new(JournalWriter {
                file: BufWriter::new(file),
                sequence,
            }),
        };
        Ok((journal, records))
    }

    /// Appends a mutation and syncs it to disk. Returns the sequence number.
    pub fn append(&self, op: &JournalOp) -> IoResult<u64> {
        let mut writer = self.writer.lock().expect("journal lock poisoned");
        writer.sequence += 1;
        let record = JournalRecord {
            sequence: writer.sequence,
            written_at: Utc::now(),
            op: op.clone(),
        };

        let body = serde_json::to_vec(&record)
            .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;
        let len = u32::try_from(body.len())
            .map_err(|_| Error::new(ErrorKind::InvalidData, "journal entry too large"))?;
        let crc = crc32fast::hash(&body);

        writer.file.write_all(&len.to_le_bytes())?;
        writer.file.write_all(&crc.to_le_bytes())?;
        writer.file.write_all(&body)?;
        writer.file.flush()?;
        writer.file.get_ref().sync_data()?;
        Ok(record.sequence)
    }

    /// Path the journal writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads all complete, checksummed records. Returns them with the byte
/// length of the valid prefix.
fn read_records(file: &File) -> IoResult<(Vec<JournalRecord>, u64)> {
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(0))?;

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::new(ErrorKind::InvalidData, "bad journal magic"));
    }
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != FORMAT_VERSION {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("unsupported journal version {}", version[0]),
        ));
    }

    let mut records = Vec::new();
    let mut good_len = HEADER_LEN;
    loop {
        let mut frame_header = [0u8; 8];
        match read_exact_or_eof(&mut reader, &mut frame_header)? {
            ReadOutcome::Eof => break,
            ReadOutcome::Torn => break,
            ReadOutcome::Full => {}
        }

        let len = u32::from_le_bytes(frame_header[0..4].try_into().expect("4 bytes"));
        let crc = u32::from_le_bytes(frame_header[4..8].try_into().expect("4 bytes"));
        if len > MAX_ENTRY_LEN {
            return Err(Error::new(ErrorKind::InvalidData, "journal frame too large"));
        }

        let mut body = vec![0u8; len as usize];
        match read_exact_or_eof(&mut reader, &mut body)? {
            ReadOutcome::Full => {}
            ReadOutcome::Eof | ReadOutcome::Torn => break,
        }

        if crc32fast::hash(&body) != crc {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "journal entry failed checksum",
            ));
        }

        let record: JournalRecord = serde_json::from_slice(&body)
            .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;
        records.push(record);
        good_len += 8 + u64::from(len);
    }

    Ok((records, good_len))
}

enum ReadOutcome {
    Full,
    Eof,
    Torn,
}

/// Distinguishes a clean EOF from a torn (partial) frame.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> IoResult<ReadOutcome> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            return Ok(if filled == 0 {
                ReadOutcome::Eof
            } else {
                ReadOutcome::Torn
            });
        }
        filled += n;
    }
    Ok(ReadOutcome::Full)
}
