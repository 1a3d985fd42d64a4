use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::KvStore;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Payload prefix: 1 byte op + 2 bytes key length.
const PAYLOAD_PREFIX: usize = 3;

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

/// Longest key the framing can carry.
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Flush/sync strategy for the log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every append (safest, highest latency).
    #[default]
    EveryWrite,
    /// Flush to the OS page cache only.
    OsDefault,
}

/// Configuration for the durable log.
#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    pub sync_mode: SyncMode,
}

/// Where the live value for a key sits in the log file.
#[derive(Clone, Copy, Debug)]
struct ValueLocation {
    /// File offset of the first value byte.
    offset: u64,
    len: u32,
    /// Size of the whole frame, counted as dead once superseded.
    frame_len: u64,
}

/// Append side of the log file.
trait LogSink: Write + Send {
    fn cut(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl LogSink for File {
    fn cut(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

struct LogState {
    /// Frames go straight to the file so a failed append leaves nothing
    /// buffered behind it.
    writer: Box<dyn LogSink>,
    reader: File,
    /// Current end of the log.
    offset: u64,
    index: HashMap<Vec<u8>, ValueLocation>,
    dead_bytes: u64,
    /// Set when a failed append could not be cut off.
    wedged: bool,
}

/// Result of scanning a log file front to back.
struct Replay {
    index: HashMap<Vec<u8>, ValueLocation>,
    dead_bytes: u64,
    /// End of the last complete frame.
    valid_len: u64,
    frames: usize,
}

/// Durable, append-only key-value log.
///
/// Every `put` and `delete` appends one frame:
///
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [payload: op (u8), key length (LE u16), key, value]
/// ```
///
/// Opening the log replays it into an in-memory index of value locations;
/// values themselves stay on disk and are read on `get`. Frames that fail
/// the CRC check are skipped. A torn tail left by a crash is cut off so that
/// later appends remain reachable.
pub struct LogKvStore {
    path: PathBuf,
    config: LogConfig,
    state: Mutex<LogState>,
}

impl LogKvStore {
    /// Open (or create) the log file at `path` and replay it.
    pub fn open(path: &Path, config: LogConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let replay = replay(path)?;
        let file_len = file.metadata()?.len();
        if replay.valid_len < file_len {
            warn!(
                valid_len = replay.valid_len,
                file_len,
                "discarding torn tail of durable log"
            );
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }

        info!(
            path = %path.display(),
            keys = replay.index.len(),
            frames = replay.frames,
            dead_bytes = replay.dead_bytes,
            "durable log opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            state: Mutex::new(LogState {
                writer: Box::new(file),
                reader: File::open(path)?,
                offset: replay.valid_len,
                index: replay.index,
                dead_bytes: replay.dead_bytes,
                wedged: false,
            }),
        })
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.index.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current end-of-log offset.
    pub fn offset(&self) -> u64 {
        self.state.lock().map(|s| s.offset).unwrap_or(0)
    }

    /// Bytes held by superseded values and tombstones.
    pub fn dead_bytes(&self) -> u64 {
        self.state.lock().map(|s| s.dead_bytes).unwrap_or(0)
    }

    /// Rewrite the log with only live keys and return the bytes reclaimed.
    ///
    /// The compacted file is written beside the log, synced, and renamed over
    /// it, so a crash mid-compaction leaves the old log intact.
    pub fn compact(&self) -> StoreResult<u64> {
        let mut state = self.lock()?;
        state.writer.flush()?;

        let mut live: Vec<(Vec<u8>, ValueLocation)> = state
            .index
            .iter()
            .map(|(k, loc)| (k.clone(), *loc))
            .collect();
        live.sort_by(|(a, _), (b, _)| a.cmp(b));

        let tmp_path = self.path.with_extension("compact");
        let mut out = BufWriter::new(File::create(&tmp_path)?);
        let mut index = HashMap::with_capacity(live.len());
        let mut offset = 0u64;

        for (key, loc) in live {
            let value = read_value(&mut state.reader, loc)?;
            let frame = encode_frame(OP_PUT, &key, &value)?;
            out.write_all(&frame)?;
            let frame_len = frame.len() as u64;
            index.insert(
                key.clone(),
                ValueLocation {
                    offset: offset + (HEADER_SIZE + PAYLOAD_PREFIX + key.len()) as u64,
                    len: loc.len,
                    frame_len,
                },
            );
            offset += frame_len;
        }
        out.flush()?;
        out.get_ref().sync_all()?;
        drop(out);

        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        let reclaimed = state.dead_bytes;
        state.writer = Box::new(file);
        state.reader = File::open(&self.path)?;
        state.offset = offset;
        state.index = index;
        state.dead_bytes = 0;
        state.wedged = false;

        info!(reclaimed, size = offset, "durable log compacted");
        Ok(reclaimed)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, LogState>> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Append one frame and return its starting offset.
    ///
    /// On failure the file is cut back to where the frame began, so neither
    /// the index nor a later replay ever sees a frame whose append failed.
    fn append(&self, state: &mut LogState, frame: &[u8]) -> StoreResult<u64> {
        if state.wedged {
            return Err(StoreError::Wedged(self.path.clone()));
        }
        let entry_offset = state.offset;
        if let Err(e) = self.write_frame(state, frame) {
            warn!(offset = entry_offset, error = %e, "log append failed; cutting partial frame");
            if let Err(cut) = state.writer.cut(entry_offset) {
                warn!(offset = entry_offset, error = %cut, "cannot cut partial frame");
                state.wedged = true;
            }
            return Err(e.into());
        }
        state.offset += frame.len() as u64;
        debug!(offset = entry_offset, len = frame.len(), "log append");
        Ok(entry_offset)
    }

    fn write_frame(&self, state: &mut LogState, frame: &[u8]) -> io::Result<()> {
        state.writer.write_all(frame)?;
        state.writer.flush()?;
        if self.config.sync_mode == SyncMode::EveryWrite {
            state.writer.sync()?;
        }
        Ok(())
    }
}

impl KvStore for LogKvStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let mut state = self.lock()?;
        let Some(loc) = state.index.get(key).copied() else {
            return Ok(None);
        };
        read_value(&mut state.reader, loc).map(Some)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let frame = encode_frame(OP_PUT, key, value)?;
        let mut state = self.lock()?;
        let entry_offset = self.append(&mut state, &frame)?;
        let loc = ValueLocation {
            offset: entry_offset + (HEADER_SIZE + PAYLOAD_PREFIX + key.len()) as u64,
            len: value.len() as u32,
            frame_len: frame.len() as u64,
        };
        if let Some(old) = state.index.insert(key.to_vec(), loc) {
            state.dead_bytes += old.frame_len;
        }
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        let mut state = self.lock()?;
        if !state.index.contains_key(key) {
            return Ok(false);
        }
        let frame = encode_frame(OP_DELETE, key, &[])?;
        self.append(&mut state, &frame)?;
        if let Some(old) = state.index.remove(key) {
            state.dead_bytes += old.frame_len + frame.len() as u64;
        }
        Ok(true)
    }

    fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.lock()?.index.contains_key(key))
    }

    fn flush(&self) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.writer.flush()?;
        state.writer.sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for LogKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogKvStore")
            .field("path", &self.path)
            .field("keys", &self.len())
            .finish()
    }
}

fn encode_frame(op: u8, key: &[u8], value: &[u8]) -> StoreResult<Vec<u8>> {
    if key.len() > MAX_KEY_LEN {
        return Err(StoreError::KeyTooLong(key.len()));
    }
    let payload_len = PAYLOAD_PREFIX + key.len() + value.len();
    if payload_len > u32::MAX as usize {
        return Err(StoreError::ValueTooLong(value.len()));
    }

    let mut payload = Vec::with_capacity(payload_len);
    payload.push(op);
    payload.extend_from_slice(&(key.len() as u16).to_le_bytes());
    payload.extend_from_slice(key);
    payload.extend_from_slice(value);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload_len);
    frame.extend_from_slice(&(payload_len as u32).to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

fn read_value(reader: &mut File, loc: ValueLocation) -> StoreResult<Vec<u8>> {
    reader.seek(SeekFrom::Start(loc.offset))?;
    let mut value = vec![0u8; loc.len as usize];
    reader.read_exact(&mut value)?;
    Ok(value)
}

/// Scan the log file and rebuild the key index.
fn replay(path: &Path) -> StoreResult<Replay> {
    let mut file = BufReader::new(File::open(path)?);
    let file_len = file.get_ref().metadata()?.len();
    let mut index: HashMap<Vec<u8>, ValueLocation> = HashMap::new();
    let mut dead_bytes = 0u64;
    let mut frames = 0usize;
    let mut offset: u64 = 0;

    while offset + HEADER_SIZE as u64 <= file_len {
        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header)?;
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let frame_len = HEADER_SIZE as u64 + length as u64;

        if (length as usize) < PAYLOAD_PREFIX || offset + frame_len > file_len {
            warn!(offset, length, file_len, "invalid log frame length; stopping replay");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        file.read_exact(&mut payload)?;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping log frame"
            );
            dead_bytes += frame_len;
            offset += frame_len;
            continue;
        }

        let op = payload[0];
        let key_len = u16::from_le_bytes([payload[1], payload[2]]) as usize;
        if PAYLOAD_PREFIX + key_len > payload.len() {
            warn!(offset, key_len, "key overruns log frame; skipping");
            dead_bytes += frame_len;
            offset += frame_len;
            continue;
        }
        let key = payload[PAYLOAD_PREFIX..PAYLOAD_PREFIX + key_len].to_vec();

        match op {
            OP_PUT => {
                let loc = ValueLocation {
                    offset: offset + (HEADER_SIZE + PAYLOAD_PREFIX + key_len) as u64,
                    len: (payload.len() - PAYLOAD_PREFIX - key_len) as u32,
                    frame_len,
                };
                if let Some(old) = index.insert(key, loc) {
                    dead_bytes += old.frame_len;
                }
            }
            OP_DELETE => {
                if let Some(old) = index.remove(&key) {
                    dead_bytes += old.frame_len;
                }
                dead_bytes += frame_len;
            }
            other => {
                warn!(offset, op = other, "unknown log op; skipping");
                dead_bytes += frame_len;
            }
        }

        frames += 1;
        offset += frame_len;
    }

    debug!(frames, keys = index.len(), "log replay complete");
    Ok(Replay {
        index,
        dead_bytes,
        valid_len: offset,
        frames,
    })
}
