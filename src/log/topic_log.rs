//! File-backed topic log
//!
//! Layout: `<data_dir>/<topic>/<start_offset:020>.log`
//!
//! - Append-only, segments are never rewritten
//! - A segment rolls once the next write would push it past `segment_size`
//! - Every record carries a CRC32, see the `record` module
//! - A bulk batch is checked against its count, then written as one unit
//! - The active segment is synced per [`FlushPolicy`]

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use super::errors::{LogError, LogResult};
use super::flush::FlushPolicy;
use super::record::{self, RecordFault};
use super::TopicLog;
use crate::batch;

/// File extension of log segments.
pub const SEGMENT_EXTENSION: &str = "log";

/// Storage settings shared by every topic log of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// Soft upper bound of one segment file in bytes
    pub segment_size: u64,
    /// When the active segment is synced
    pub flush: FlushPolicy,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            segment_size: 512 * 1024 * 1024,
            flush: FlushPolicy::default(),
        }
    }
}

struct ActiveSegment {
    file: File,
    /// Log offset of the segment's first byte
    start: u64,
    /// Bytes written to the segment
    len: u64,
    last_flush: Instant,
}

/// Append-only log of one topic, stored as a directory of segments.
pub struct FileTopicLog {
    topic: String,
    dir: PathBuf,
    config: LogConfig,
    segment: Mutex<ActiveSegment>,
    /// Messages written since the last sync
    unflushed: AtomicU64,
}

impl FileTopicLog {
    /// Opens or creates the log of `topic` under `data_dir`.
    ///
    /// Appends continue at the end of the newest existing segment.
    ///
    /// # Errors
    ///
    /// Returns `ZPER_LOG_OPEN_FAILED` if the directory or segment cannot be
    /// created or opened.
    pub fn open(data_dir: &Path, topic: &str, config: LogConfig) -> LogResult<Self> {
        let dir = data_dir.join(topic);

        fs::create_dir_all(&dir).map_err(|e| {
            LogError::open_failed(format!("Failed to create log directory: {}", dir.display()), e)
                .with_topic(topic)
        })?;

        let start = list_segments(&dir)
            .map_err(|e| e.with_topic(topic))?
            .last()
            .copied()
            .unwrap_or(0);
        let path = segment_path(&dir, start);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LogError::open_failed(format!("Failed to open segment: {}", path.display()), e)
                    .with_topic(topic)
            })?;

        let len = file
            .metadata()
            .map_err(|e| {
                LogError::open_failed(format!("Failed to read segment metadata: {}", path.display()), e)
                    .with_topic(topic)
            })?
            .len();

        Ok(Self {
            topic: topic.to_string(),
            dir,
            config,
            segment: Mutex::new(ActiveSegment {
                file,
                start,
                len,
                last_flush: Instant::now(),
            }),
            unflushed: AtomicU64::new(0),
        })
    }

    /// Returns the topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the total number of bytes in the log.
    pub fn size(&self) -> LogResult<u64> {
        let segment = self.lock()?;
        Ok(segment.start + segment.len)
    }

    /// Returns the start offsets of all segments, oldest first.
    pub fn segments(&self) -> LogResult<Vec<u64>> {
        list_segments(&self.dir).map_err(|e| e.with_topic(&self.topic))
    }

    /// Syncs the active segment regardless of the flush policy.
    pub fn flush(&self) -> LogResult<()> {
        let mut segment = self.lock()?;
        self.sync(&mut segment)
    }

    /// Reads every message back, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ZPER_LOG_CORRUPTION` if a segment ends in a partial record or
    /// a record fails its checksum.
    pub fn read_all(&self) -> LogResult<Vec<Vec<u8>>> {
        let mut messages = Vec::new();

        for start in self.segments()? {
            let path = segment_path(&self.dir, start);
            let data = fs::read(&path).map_err(|e| {
                LogError::open_failed(format!("Failed to read segment: {}", path.display()), e)
                    .with_topic(&self.topic)
            })?;

            let mut records = record::decode(&data);
            messages.extend(records.by_ref().map(<[u8]>::to_vec));

            if let Some(fault) = records.fault() {
                let what = match fault {
                    RecordFault::Partial => "Partial record",
                    RecordFault::ChecksumMismatch => "Checksum mismatch",
                };
                return Err(LogError::corruption(format!(
                    "{} at log offset {}",
                    what,
                    start + records.position() as u64
                ))
                .with_topic(&self.topic));
            }
        }

        Ok(messages)
    }

    fn lock(&self) -> LogResult<std::sync::MutexGuard<'_, ActiveSegment>> {
        self.segment
            .lock()
            .map_err(|_| LogError::poisoned().with_topic(&self.topic))
    }

    fn write(&self, buf: &[u8], messages: u64) -> LogResult<()> {
        let mut segment = self.lock()?;

        if segment.len > 0 && segment.len + buf.len() as u64 > self.config.segment_size {
            self.roll(&mut segment)?;
        }

        if let Err(e) = segment.file.write_all(buf) {
            // Drop the partial record so the segment stays decodable
            let _ = segment.file.set_len(segment.len);
            return Err(LogError::append_failed(
                format!(
                    "Failed to write {} bytes at log offset {}",
                    buf.len(),
                    segment.start + segment.len
                ),
                e,
            )
            .with_topic(&self.topic));
        }
        segment.len += buf.len() as u64;

        let pending = self.unflushed.fetch_add(messages, Ordering::AcqRel) + messages;
        if self.config.flush.should_flush(pending, segment.last_flush.elapsed()) {
            self.sync(&mut segment)?;
        }

        Ok(())
    }

    fn sync(&self, segment: &mut ActiveSegment) -> LogResult<()> {
        segment.file.sync_data().map_err(|e| {
            LogError::fsync_failed(
                format!("fsync failed on segment starting at {}", segment.start),
                e,
            )
            .with_topic(&self.topic)
        })?;
        segment.last_flush = Instant::now();
        self.unflushed.store(0, Ordering::Release);
        Ok(())
    }

    fn roll(&self, segment: &mut ActiveSegment) -> LogResult<()> {
        self.sync(segment)?;

        let start = segment.start + segment.len;
        let path = segment_path(&self.dir, start);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LogError::open_failed(format!("Failed to create segment: {}", path.display()), e)
                    .with_topic(&self.topic)
            })?;

        segment.file = file;
        segment.start = start;
        segment.len = 0;
        Ok(())
    }
}

impl TopicLog for FileTopicLog {
    fn append(&self, payload: &[u8]) -> LogResult<()> {
        let mut buf = Vec::new();
        record::encode_into(&mut buf, payload, 0).map_err(|e| e.with_topic(&self.topic))?;
        self.write(&buf, 1)
    }

    fn append_bulk(&self, count: u32, batch: &[u8]) -> LogResult<()> {
        batch::validate(batch, count).map_err(|e| {
            LogError::malformed_batch(format!("Rejected bulk append: {}", e)).with_topic(&self.topic)
        })?;

        let mut buf = Vec::with_capacity(batch.len() + count as usize * record::RECORD_TRAILER_SIZE);
        let mut sub_messages = batch::decode(batch);
        while let Some((flags, data)) = sub_messages.next_record() {
            record::encode_into(&mut buf, data, flags).map_err(|e| e.with_topic(&self.topic))?;
        }
        self.write(&buf, u64::from(count))
    }

    fn flushed(&self) -> bool {
        self.unflushed.load(Ordering::Acquire) == 0
    }
}

fn segment_path(dir: &Path, start: u64) -> PathBuf {
    dir.join(format!("{:020}.{}", start, SEGMENT_EXTENSION))
}

fn list_segments(dir: &Path) -> LogResult<Vec<u64>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(LogError::open_failed(
                format!("Failed to list log directory: {}", dir.display()),
                e,
            ))
        }
    };

    let mut starts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            LogError::open_failed(format!("Failed to list log directory: {}", dir.display()), e)
        })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(SEGMENT_EXTENSION) {
            continue;
        }
        if let Some(start) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<u64>().ok())
        {
            starts.push(start);
        }
    }

    starts.sort_unstable();
    Ok(starts)
}
