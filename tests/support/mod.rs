//! Shared helpers for writer integration tests
//!
//! - `RecordingLog`: in-memory topic log recording every call
//! - `MockRegistry`: hands out one recording log per topic, with optional
//!   failing topics
//! - `start_inproc_worker`: binds an inproc endpoint, spawns a worker and
//!   accepts its connection

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use zper::envelope::build_identity;
use zper::log::{LogError, LogRegistry, LogResult, TopicLog};
use zper::observability::WorkerMetrics;
use zper::transport::{Frame, InprocPeer, TransportContext};
use zper::writer::{WorkerHandle, WriteMode, WriterWorker};

// =============================================================================
// Mock Logs
// =============================================================================

/// One call made on a topic log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogCall {
    Append(Vec<u8>),
    AppendBulk(u32, Vec<u8>),
}

/// Topic log that keeps calls in memory.
pub struct RecordingLog {
    calls: Mutex<Vec<LogCall>>,
    flushed: AtomicBool,
    fail: AtomicBool,
}

impl RecordingLog {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            flushed: AtomicBool::new(true),
            fail: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<LogCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_flushed(&self, flushed: bool) {
        self.flushed.store(flushed, Ordering::SeqCst);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: LogCall) -> LogResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LogError::append_failed(
                "Injected append failure",
                io::Error::new(io::ErrorKind::Other, "no space left on device"),
            ));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl TopicLog for RecordingLog {
    fn append(&self, payload: &[u8]) -> LogResult<()> {
        self.record(LogCall::Append(payload.to_vec()))
    }

    fn append_bulk(&self, count: u32, batch: &[u8]) -> LogResult<()> {
        self.record(LogCall::AppendBulk(count, batch.to_vec()))
    }

    fn flushed(&self) -> bool {
        self.flushed.load(Ordering::SeqCst)
    }
}

/// Registry of recording logs.
pub struct MockRegistry {
    logs: Mutex<HashMap<String, Arc<RecordingLog>>>,
    unavailable: Mutex<HashSet<String>>,
}

impl MockRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            logs: Mutex::new(HashMap::new()),
            unavailable: Mutex::new(HashSet::new()),
        })
    }

    /// Returns the log of `topic`, creating it if needed.
    pub fn log(&self, topic: &str) -> Arc<RecordingLog> {
        self.logs
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(RecordingLog::new()))
            .clone()
    }

    /// Makes `get(topic)` fail.
    pub fn make_unavailable(&self, topic: &str) {
        self.unavailable.lock().unwrap().insert(topic.to_string());
    }

    /// Topics resolved so far.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.logs.lock().unwrap().keys().cloned().collect();
        topics.sort();
        topics
    }
}

impl LogRegistry for MockRegistry {
    fn get(&self, topic: &str) -> LogResult<Arc<dyn TopicLog>> {
        if self.unavailable.lock().unwrap().contains(topic) {
            return Err(LogError::open_failed(
                "Injected open failure",
                io::Error::new(io::ErrorKind::PermissionDenied, "read-only file system"),
            )
            .with_topic(topic));
        }
        Ok(self.log(topic))
    }
}

// =============================================================================
// Worker Harness
// =============================================================================

/// A running worker and the router side of its connection.
pub struct Harness {
    pub context: TransportContext,
    pub peer: InprocPeer,
    pub handle: WorkerHandle,
    pub metrics: Arc<WorkerMetrics>,
}

/// Spawns a worker connected to a fresh inproc endpoint named `name`.
pub fn start_inproc_worker(
    name: &str,
    mode: WriteMode,
    registry: Arc<dyn LogRegistry>,
) -> Harness {
    let context = TransportContext::new();
    let listener = context
        .bind_inproc(name)
        .expect("Failed to bind inproc endpoint");

    let worker = WriterWorker::new(
        &context,
        format!("inproc://{}", name),
        format!("{}-writer", name),
        mode,
        registry,
    );
    let metrics = worker.metrics();
    let handle = worker.spawn().expect("Failed to spawn worker");
    let peer = listener.accept().expect("Worker never connected");

    Harness {
        context,
        peer,
        handle,
        metrics,
    }
}

// =============================================================================
// Frame Builders
// =============================================================================

/// Identity frame followed by more frames.
pub fn identity(ack: bool, topic: &str) -> Frame {
    Frame::more(build_identity(ack, topic))
}

/// Bulk count frame.
pub fn count(n: u32) -> Frame {
    Frame::more(Bytes::copy_from_slice(&n.to_be_bytes()))
}

/// Final frame carrying `data`.
pub fn last(data: &[u8]) -> Frame {
    Frame::last(Bytes::copy_from_slice(data))
}

/// Non-final frame carrying `data`.
pub fn more(data: &[u8]) -> Frame {
    Frame::more(Bytes::copy_from_slice(data))
}
