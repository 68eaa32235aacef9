use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::batch::{BatchOp, WriteBatch};
use crate::error::{KvError, KvResult};
use crate::memory::{apply_ops, scan};
use crate::traits::KvStore;

/// Flush/sync strategy for the batch log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every committed batch (safest, highest latency).
    EveryBatch,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for [`LogKv`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogKvConfig {
    /// Sync strategy applied after each batch frame.
    #[serde(default)]
    pub sync: SyncMode,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Append target of the log.
///
/// Frames are written straight to the sink with no buffering, so a failed
/// append leaves nothing behind that a later append could flush.
trait LogSink: Write + Send {
    /// Cut the sink back to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Make everything written so far durable.
    fn sync(&mut self) -> io::Result<()>;
}

impl LogSink for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

struct LogWriter {
    sink: Box<dyn LogSink>,
    /// End offset of the last complete frame.
    offset: u64,
    /// Set when a failed append could not be rolled back. The file may
    /// then end in a partial frame, so further appends are refused.
    broken: Option<String>,
}

/// Append-only, crash-recoverable key-value engine.
///
/// Every committed batch becomes one frame in a single log file:
///
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized Vec<BatchOp>)]
/// ```
///
/// On open the log is replayed front-to-back into an ordered in-memory map.
/// Replay stops at the first frame that is truncated or fails its CRC; the
/// file is cut back to the last good frame, so a batch interrupted by a crash
/// disappears as a whole.
pub struct LogKv {
    path: PathBuf,
    config: LogKvConfig,
    writer: Mutex<LogWriter>,
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl LogKv {
    /// Open (or create) the log at `path` and replay it.
    pub fn open(path: &Path, config: LogKvConfig) -> KvResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (entries, good_len, frames) = replay(path)?;
        let file_len = file.metadata()?.len();
        if good_len < file_len {
            warn!(
                path = %path.display(),
                good_len,
                file_len,
                "discarding incomplete tail of batch log"
            );
            file.set_len(good_len)?;
        }

        info!(path = %path.display(), frames, keys = entries.len(), "batch log opened");
        Ok(Self {
            path: path.to_path_buf(),
            config,
            writer: Mutex::new(LogWriter {
                sink: Box::new(file),
                offset: good_len,
                broken: None,
            }),
            entries: RwLock::new(entries),
        })
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current end offset of the log.
    pub fn offset(&self) -> KvResult<u64> {
        Ok(self.lock_writer()?.offset)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if no key is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the log as a single frame holding the live key space.
    ///
    /// The new log is written next to the old one and renamed over it, so a
    /// crash during compaction leaves either the old or the new log intact.
    pub fn compact(&self) -> KvResult<()> {
        let mut w = self.lock_writer()?;
        let map = self
            .entries
            .read()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))?;

        let tmp_path = self.path.with_extension("compact");
        let mut tmp = BufWriter::new(File::create(&tmp_path)?);
        let mut offset = 0u64;
        if !map.is_empty() {
            let ops: Vec<BatchOp> = map
                .iter()
                .map(|(k, v)| BatchOp::Set {
                    key: k.clone(),
                    value: v.clone(),
                })
                .collect();
            offset = write_frame(&mut tmp, &ops)?;
        }
        tmp.flush()?;
        tmp.get_ref().sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path)?;

        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        w.sink = Box::new(file);
        w.offset = offset;
        w.broken = None;

        debug!(keys = map.len(), bytes = offset, "batch log compacted");
        Ok(())
    }

    fn lock_writer(&self) -> KvResult<MutexGuard<'_, LogWriter>> {
        self.writer
            .lock()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))
    }
}

/// Serialize `ops` into one complete frame.
fn encode_frame(ops: &[BatchOp]) -> KvResult<Vec<u8>> {
    let payload = bincode::serialize(ops).map_err(|e| KvError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len()).map_err(|_| {
        KvError::Serialization(format!("batch frame too large: {} bytes", payload.len()))
    })?;
    let crc = crc32fast::hash(&payload);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Serialize and append one frame. Returns the number of bytes written.
fn write_frame<W: Write>(out: &mut W, ops: &[BatchOp]) -> KvResult<u64> {
    let frame = encode_frame(ops)?;
    out.write_all(&frame)?;
    Ok(frame.len() as u64)
}

/// Append `frame` at `w.offset`, cutting the log back to that offset if
/// the write or the sync fails.
fn append_frame(w: &mut LogWriter, frame: &[u8], sync: SyncMode) -> KvResult<()> {
    if let Some(reason) = &w.broken {
        return Err(KvError::CorruptFrame {
            offset: w.offset,
            reason: reason.clone(),
        });
    }

    let result = w.sink.write_all(frame).and_then(|()| match sync {
        SyncMode::EveryBatch => w.sink.sync(),
        SyncMode::OsDefault => Ok(()),
    });
    let Err(e) = result else {
        return Ok(());
    };

    match w.sink.truncate(w.offset) {
        Ok(()) => warn!(offset = w.offset, error = %e, "batch append failed; frame rolled back"),
        Err(rollback) => {
            warn!(offset = w.offset, error = %e, rollback = %rollback, "batch append failed and could not be rolled back");
            w.broken = Some(format!("unrolled partial frame after: {e}"));
        }
    }
    Err(e.into())
}

/// Replay every good frame of the log.
///
/// Returns the rebuilt map, the byte length of the good prefix, and the
/// number of frames applied.
fn replay(path: &Path) -> KvResult<(BTreeMap<Vec<u8>, Vec<u8>>, u64, usize)> {
    let mut file = BufReader::new(File::open(path)?);
    let file_len = file.get_ref().metadata()?.len();
    let mut map = BTreeMap::new();
    let mut offset: u64 = 0;
    let mut frames = 0usize;

    while offset + HEADER_SIZE as u64 <= file_len {
        let mut header = [0u8; HEADER_SIZE];
        match file.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 || offset + HEADER_SIZE as u64 + length as u64 > file_len {
            warn!(offset, length, file_len, "invalid batch frame length; stopping replay");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match file.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, "truncated batch frame; stopping replay");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; stopping replay"
            );
            break;
        }

        let ops: Vec<BatchOp> = match bincode::deserialize(&payload) {
            Ok(ops) => ops,
            Err(e) => {
                warn!(offset, error = %e, "undecodable batch frame; stopping replay");
                break;
            }
        };
        apply_ops(&mut map, ops);
        frames += 1;
        offset += HEADER_SIZE as u64 + length as u64;
    }

    debug!(frames, good_len = offset, "batch log replay complete");
    Ok((map, offset, frames))
}

impl KvStore for LogKv {
    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        let map = self
            .entries
            .read()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))?;
        Ok(map.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let map = self
            .entries
            .read()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))?;
        Ok(scan(&map, prefix))
    }

    fn write_batch(&self, batch: WriteBatch) -> KvResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.into_ops();

        let frame = encode_frame(&ops)?;

        // Holding the writer lock across append and apply keeps the map in
        // log order.
        let mut w = self.lock_writer()?;
        append_frame(&mut w, &frame, self.config.sync)?;
        let frame_offset = w.offset;
        w.offset += frame.len() as u64;

        let count = ops.len();
        let mut map = self
            .entries
            .write()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))?;
        apply_ops(&mut map, ops);

        debug!(offset = frame_offset, ops = count, "batch frame committed");
        Ok(())
    }

    fn flush(&self) -> KvResult<()> {
        let mut w = self.lock_writer()?;
        w.sink.flush()?;
        w.sink.sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for LogKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogKv")
            .field("path", &self.path)
            .field("key_count", &self.len())
            .finish()
    }
}
