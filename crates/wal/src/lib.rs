//! # WAL - Write-Ahead Log
//!
//! Crash-safe durability for the ordered store underneath the overlay cache.
//!
//! Every atomic write batch is serialized into **one** binary frame and
//! appended to the WAL before any in-memory state changes. A frame either
//! replays completely or not at all, which is what gives multi-key writes
//! their all-or-nothing behavior across crashes.
//!
//! ## Binary Frame Format
//!
//! ```text
//! [frame_len: u32 LE][crc32: u32 LE][body ...]
//! ```
//!
//! Body: `[seq: u64][op_count: u32][op ...]`
//!
//! Op (Put): `[op=0: u8][key_len: u32][key][val_len: u32][value]`
//! Op (Del): `[op=1: u8][key_len: u32][key]`
//!
//! `frame_len` includes the 4-byte CRC but **not** itself.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wal::{BatchOp, WalReader, WalRecord, WalWriter};
//!
//! let mut w = WalWriter::create("overlay.wal", true).unwrap();
//! w.append(&WalRecord {
//!     seq: 1,
//!     ops: vec![BatchOp::Put { key: b"hello".to_vec(), value: b"world".to_vec() }],
//! }).unwrap();
//! drop(w);
//!
//! let mut r = WalReader::open("overlay.wal").unwrap();
//! r.replay(|rec| println!("{:?}", rec)).unwrap();
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use thiserror::Error;

const OP_PUT: u8 = 0;
const OP_DEL: u8 = 1;

/// Upper bound on a single frame; anything larger is treated as corruption.
const MAX_FRAME_SIZE: u32 = 256 * 1024 * 1024;

/// One mutation inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or replace `key`.
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// Remove `key`.
    Del {
        key: Vec<u8>,
    },
}

impl BatchOp {
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Del { key } => key,
        }
    }

    /// Bytes this op occupies inside a frame body.
    pub fn encoded_len(&self) -> usize {
        match self {
            BatchOp::Put { key, value } => 1 + 4 + key.len() + 4 + value.len(),
            BatchOp::Del { key } => 1 + 4 + key.len(),
        }
    }
}

/// A single WAL frame: every op of one atomic batch, in application order.
///
/// The **sequence number** is assigned by the engine and increases by one per
/// committed batch. Recovery uses it to skip frames already covered by a
/// checkpoint snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub seq: u64,
    pub ops: Vec<BatchOp>,
}

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A frame failed CRC validation or contained an unknown op code.
    #[error("corrupt record")]
    Corrupt,
}

/// Append-only WAL writer.
///
/// Frames are serialized into an in-memory buffer, CRC-checksummed, and then
/// written to the underlying file in a single `write_all` call. When `sync` is
/// `true`, every append is followed by `sync_all()` (fsync).
///
/// A failed append leaves no bytes behind: the file is truncated back to the
/// end of the last good frame. If that truncation fails too, the writer is
/// poisoned and refuses every later append, since a frame written behind the
/// leftover bytes would be dropped as a torn tail on replay.
pub struct WalWriter {
    file: File,
    sync: bool,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
    /// End of the last frame known to be fully written.
    len: u64,
    poisoned: bool,
}

impl WalWriter {
    /// Opens (or creates) a WAL file in append mode.
    pub fn create<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, WalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            sync,
            buf: Vec::with_capacity(256),
            len,
            poisoned: false,
        })
    }

    /// Byte length of the log up to the end of the last good frame.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `true` once a failed append could not be rolled back.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Serializes `record` and appends it to the WAL file as one frame.
    ///
    /// Returns the number of bytes written, header included.
    ///
    /// On error nothing of the frame remains in the file, so the caller may
    /// treat the batch as not committed. Bytes found past the last good frame
    /// (left by an earlier failed write) are cut off before appending.
    pub fn append(&mut self, record: &WalRecord) -> Result<usize, WalError> {
        if self.poisoned {
            return Err(WalError::Io(io::Error::new(
                io::ErrorKind::Other,
                "WAL writer is poisoned by an earlier failed append",
            )));
        }
        self.buf.clear();

        // frame header (frame_len + crc), filled in below
        self.buf.extend_from_slice(&[0u8; 8]);

        self.buf.write_u64::<LittleEndian>(record.seq)?;
        self.buf.write_u32::<LittleEndian>(len_u32(record.ops.len())?)?;
        for op in &record.ops {
            match op {
                BatchOp::Put { key, value } => {
                    self.buf.write_u8(OP_PUT)?;
                    self.buf.write_u32::<LittleEndian>(len_u32(key.len())?)?;
                    self.buf.extend_from_slice(key);
                    self.buf.write_u32::<LittleEndian>(len_u32(value.len())?)?;
                    self.buf.extend_from_slice(value);
                }
                BatchOp::Del { key } => {
                    self.buf.write_u8(OP_DEL)?;
                    self.buf.write_u32::<LittleEndian>(len_u32(key.len())?)?;
                    self.buf.extend_from_slice(key);
                }
            }
        }

        let body = &self.buf[8..];

        let mut hasher = Crc32::new();
        hasher.update(body);
        let crc = hasher.finalize();

        let frame_len = (body.len() as u64) + 4;
        if frame_len > MAX_FRAME_SIZE as u64 {
            return Err(WalError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "WAL frame too large",
            )));
        }

        self.buf[0..4].copy_from_slice(&(frame_len as u32).to_le_bytes());
        self.buf[4..8].copy_from_slice(&crc.to_le_bytes());

        let start = self.len;
        if self.file.metadata()?.len() > start {
            self.rollback(start)?;
        }

        // Single write call for the entire frame
        if let Err(e) = write_frame(&mut self.file, &self.buf, self.sync) {
            // the error that matters to the caller is the write, not the rollback
            let _ = self.rollback(start);
            return Err(WalError::Io(e));
        }

        self.len = start + self.buf.len() as u64;
        Ok(self.buf.len())
    }

    /// Truncates the file back to `len` and syncs, poisoning the writer if
    /// that fails.
    fn rollback(&mut self, len: u64) -> Result<(), WalError> {
        let res = self.file.set_len(len).and_then(|_| self.file.sync_all());
        if res.is_err() {
            self.poisoned = true;
        }
        res.map_err(WalError::Io)
    }

    /// Forces all buffered data to be written to disk via `sync_all()`.
    pub fn sync_to_disk(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

fn write_frame(file: &mut File, frame: &[u8], sync: bool) -> io::Result<()> {
    file.write_all(frame)?;
    file.flush()?;
    if sync {
        file.sync_all()?;
    }
    Ok(())
}

fn len_u32(len: usize) -> Result<u32, WalError> {
    u32::try_from(len).map_err(|_| {
        WalError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "length exceeds u32::MAX",
        ))
    })
}

/// Sequential WAL reader that yields valid frames.
///
/// Generic over any `Read` implementor so tests can replay in-memory buffers.
///
/// A truncated tail frame (e.g., a crash mid-write) is treated as a clean EOF:
/// all fully-written frames before it are returned and the partial batch is
/// dropped whole.
pub struct WalReader<R: Read> {
    rdr: BufReader<R>,
}

impl WalReader<File> {
    /// Opens an existing WAL file for sequential replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<WalReader<File>, WalError> {
        let f = File::open(path)?;
        Ok(WalReader {
            rdr: BufReader::new(f),
        })
    }
}

impl<R: Read> WalReader<R> {
    pub fn from_reader(reader: R) -> Self {
        WalReader {
            rdr: BufReader::new(reader),
        }
    }

    /// Replays every valid frame in the WAL, calling `apply` for each one.
    ///
    /// Returns the byte length of the valid prefix. When it is shorter than
    /// the file, the remainder is a torn tail that must be truncated before
    /// new frames are appended behind it.
    ///
    /// # Termination
    ///
    /// - **Clean EOF** -> `Ok(valid_len)`.
    /// - **Truncated tail** -> `Ok(valid_len)` after yielding all complete frames.
    /// - **CRC mismatch** or **unknown op code** -> `Err(WalError::Corrupt)`.
    /// - **I/O error** -> `Err(WalError::Io(...))`.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<u64, WalError>
    where
        F: FnMut(WalRecord),
    {
        let mut body = Vec::with_capacity(256);
        let mut valid_len = 0u64;

        loop {
            let frame_len = match self.rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(valid_len),
                Err(e) => return Err(WalError::Io(e)),
            };

            if frame_len <= 4 || frame_len > MAX_FRAME_SIZE {
                return Err(WalError::Corrupt);
            }

            let crc = match self.rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(valid_len),
                Err(e) => return Err(WalError::Io(e)),
            };

            let body_len = (frame_len - 4) as usize;
            body.clear();
            body.resize(body_len, 0);
            match self.rdr.read_exact(&mut body) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(valid_len),
                Err(e) => return Err(WalError::Io(e)),
            }

            let mut hasher = Crc32::new();
            hasher.update(&body);
            if hasher.finalize() != crc {
                return Err(WalError::Corrupt);
            }

            apply(decode_body(&body)?);
            valid_len += 8 + body_len as u64;
        }
    }
}

/// Parses a CRC-verified frame body. Any structural problem is corruption.
fn decode_body(body: &[u8]) -> Result<WalRecord, WalError> {
    let mut br = body;
    let seq = br.read_u64::<LittleEndian>().map_err(|_| WalError::Corrupt)?;
    let op_count = br.read_u32::<LittleEndian>().map_err(|_| WalError::Corrupt)? as usize;

    // every op needs at least 5 bytes, so a bigger count cannot be genuine
    if op_count > body.len() / 5 {
        return Err(WalError::Corrupt);
    }

    let mut ops = Vec::with_capacity(op_count);
    for _ in 0..op_count {
        let op = br.read_u8().map_err(|_| WalError::Corrupt)?;
        let key = read_chunk(&mut br)?;
        match op {
            OP_PUT => {
                let value = read_chunk(&mut br)?;
                ops.push(BatchOp::Put { key, value });
            }
            OP_DEL => ops.push(BatchOp::Del { key }),
            _ => return Err(WalError::Corrupt),
        }
    }

    if !br.is_empty() {
        return Err(WalError::Corrupt);
    }

    Ok(WalRecord { seq, ops })
}

fn read_chunk(br: &mut &[u8]) -> Result<Vec<u8>, WalError> {
    let len = br.read_u32::<LittleEndian>().map_err(|_| WalError::Corrupt)? as usize;
    let whole = *br;
    if len > whole.len() {
        return Err(WalError::Corrupt);
    }
    let (chunk, rest) = whole.split_at(len);
    *br = rest;
    Ok(chunk.to_vec())
}
