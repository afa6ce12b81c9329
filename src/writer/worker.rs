//! Writer worker lifecycle and frame processing

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;

use crate::batch;
use crate::envelope::{AckEnvelope, Identity};
use crate::log::{LogError, LogRegistry, TopicLog};
use crate::observability::{log_event_at, log_event_with_fields, Event, Severity, WorkerMetrics};
use crate::transport::{
    Connection, DealerOptions, Frame, Interrupt, TransportContext, TransportError,
    DEFAULT_RECV_HWM,
};

use super::errors::{WriterError, WriterResult};
use super::state::{self, Action, State};
use super::WriteMode;

/// Why a worker's receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The peer closed the connection
    EndOfStream,
    /// The worker's interrupt was triggered
    Interrupted,
    /// The shared context was terminated
    Terminated,
    /// An append failed; the failing message was not acknowledged
    StoreFailed,
}

impl WorkerExit {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerExit::EndOfStream => "end_of_stream",
            WorkerExit::Interrupted => "interrupted",
            WorkerExit::Terminated => "terminated",
            WorkerExit::StoreFailed => "store_failed",
        }
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-logical-message state.
#[derive(Default)]
struct Session {
    state: State,
    topic: String,
    log: Option<Arc<dyn TopicLog>>,
    ack: Option<AckEnvelope>,
    count: u32,
}

impl Session {
    fn open(identity_frame: Bytes, identity: Identity, log: Arc<dyn TopicLog>) -> Self {
        Self {
            state: State::Topic,
            topic: identity.topic,
            log: Some(log),
            ack: identity.ack.then(|| AckEnvelope::new(identity_frame)),
            count: 0,
        }
    }
}

enum Flow {
    Continue,
    Stop(WorkerExit),
}

/// A worker bound to one endpoint.
pub struct WriterWorker {
    context: TransportContext,
    endpoint: String,
    identity: String,
    mode: WriteMode,
    registry: Arc<dyn LogRegistry>,
    recv_hwm: usize,
    interrupt: Interrupt,
    metrics: Arc<WorkerMetrics>,
}

impl WriterWorker {
    /// Create a worker. Nothing is connected until [`run`](Self::run).
    pub fn new(
        context: &TransportContext,
        endpoint: impl Into<String>,
        identity: impl Into<String>,
        mode: WriteMode,
        registry: Arc<dyn LogRegistry>,
    ) -> Self {
        Self {
            context: context.clone(),
            endpoint: endpoint.into(),
            identity: identity.into(),
            mode,
            registry,
            recv_hwm: DEFAULT_RECV_HWM,
            interrupt: Interrupt::new(),
            metrics: Arc::new(WorkerMetrics::new()),
        }
    }

    /// Sets the inbound high-water mark.
    pub fn with_recv_hwm(mut self, recv_hwm: usize) -> Self {
        self.recv_hwm = recv_hwm;
        self
    }

    /// Shares a metrics instance, e.g. between all workers of a broker.
    pub fn with_metrics(mut self, metrics: Arc<WorkerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Routing identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Body framing mode.
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Handle that stops the receive loop.
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Counters updated by this worker.
    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Runs the worker on a dedicated thread.
    pub fn spawn(self) -> WriterResult<WorkerHandle> {
        let identity = self.identity.clone();
        let interrupt = self.interrupt.clone();
        let thread = thread::Builder::new()
            .name(format!("zper-{}", identity))
            .spawn(move || self.run())
            .map_err(WriterError::Spawn)?;

        Ok(WorkerHandle {
            identity,
            interrupt,
            thread,
        })
    }

    /// Connects and processes frames until the loop ends.
    ///
    /// Only unexpected transport faults are errors.
    pub fn run(self) -> WriterResult<WorkerExit> {
        let context = self.context.shadow();
        let options = DealerOptions::new(self.identity.clone())
            .with_recv_hwm(self.recv_hwm)
            .with_interrupt(self.interrupt.clone());

        let result = match context.connect(&self.endpoint, &options) {
            Ok(mut connection) => self.serve(connection.as_mut()),
            Err(e) if e.is_terminated() => Ok(WorkerExit::Terminated),
            Err(e) => Err(WriterError::from(e)),
        };

        // Connection was dropped by serve; close anything left on the shadow
        context.destroy();

        match &result {
            Ok(exit) => log_event_with_fields(
                Event::WorkerEnded,
                &[("identity", self.identity.as_str()), ("exit", exit.as_str())],
            ),
            Err(e) => log_event_with_fields(
                Event::TransportFault,
                &[
                    ("identity", self.identity.as_str()),
                    ("code", e.code()),
                    ("error", e.to_string().as_str()),
                ],
            ),
        }
        result
    }

    fn serve(&self, connection: &mut dyn Connection) -> WriterResult<WorkerExit> {
        log_event_with_fields(
            Event::WorkerStarted,
            &[
                ("endpoint", self.endpoint.as_str()),
                ("identity", connection.identity()),
                ("mode", self.mode.as_str()),
            ],
        );

        let mut session = Session::default();
        loop {
            if self.interrupt.is_set() {
                return Ok(WorkerExit::Interrupted);
            }

            let frame = match connection.recv() {
                Ok(Some(frame)) => frame,
                Ok(None) if self.interrupt.is_set() => return Ok(WorkerExit::Interrupted),
                Ok(None) => return Ok(WorkerExit::EndOfStream),
                Err(e) if e.is_terminated() => return Ok(WorkerExit::Terminated),
                Err(e) => return Err(e.into()),
            };

            if let Flow::Stop(exit) = self.process(&mut session, connection, frame)? {
                return Ok(exit);
            }
        }
    }

    /// Feeds one frame through the automaton.
    fn process(
        &self,
        session: &mut Session,
        connection: &mut dyn Connection,
        frame: Frame,
    ) -> WriterResult<Flow> {
        let (consumed_in, action, next) = state::resolve(session.state, self.mode, &frame);

        let next = match action {
            Action::Open(identity) => match self.registry.get(&identity.topic) {
                Ok(log) => {
                    *session = Session::open(frame.bytes(), identity, log);
                    State::Topic
                }
                Err(e) => {
                    self.store_failed(&identity.topic, &e);
                    return Ok(Flow::Stop(WorkerExit::StoreFailed));
                }
            },
            Action::Delimiter => next,
            Action::Count(count) => {
                session.count = count;
                next
            }
            Action::Drop(reason) => {
                self.frame_dropped(consumed_in, reason, None);
                next
            }
            Action::Append => {
                let Some(log) = session.log.clone() else {
                    return Ok(Flow::Continue);
                };
                if let Err(e) = log.append(frame.data()) {
                    self.store_failed(&session.topic, &e);
                    return Ok(Flow::Stop(WorkerExit::StoreFailed));
                }
                self.metrics.record_append(frame.len());

                if let Flow::Stop(exit) = self.acknowledge(session, log.as_ref(), connection, || {
                    Some(frame.bytes())
                })? {
                    return Ok(Flow::Stop(exit));
                }
                next
            }
            Action::AppendBulk => {
                let Some(log) = session.log.clone() else {
                    return Ok(Flow::Continue);
                };
                if let Err(e) = batch::validate(frame.data(), session.count) {
                    self.frame_dropped(consumed_in, "malformed batch", Some(e.to_string().as_str()));
                    if !frame.has_more() {
                        *session = Session::default();
                    }
                    return Ok(Flow::Continue);
                }
                if let Err(e) = log.append_bulk(session.count, frame.data()) {
                    self.store_failed(&session.topic, &e);
                    return Ok(Flow::Stop(WorkerExit::StoreFailed));
                }
                self.metrics.record_bulk_append(session.count, frame.len());

                let data = frame.bytes();
                if let Flow::Stop(exit) = self.acknowledge(session, log.as_ref(), connection, || {
                    batch::last(&data).map(|last| data.slice_ref(last))
                })? {
                    return Ok(Flow::Stop(exit));
                }
                next
            }
        };

        if frame.has_more() {
            session.state = next;
        } else {
            *session = Session::default();
        }
        Ok(Flow::Continue)
    }

    /// Sends an ack when the sender asked for one and the log is flushed.
    fn acknowledge<F>(
        &self,
        session: &Session,
        log: &dyn TopicLog,
        connection: &mut dyn Connection,
        echo: F,
    ) -> WriterResult<Flow>
    where
        F: FnOnce() -> Option<Bytes>,
    {
        let Some(envelope) = session.ack.as_ref() else {
            return Ok(Flow::Continue);
        };
        if !log.flushed() {
            self.metrics.increment_acks_skipped();
            return Ok(Flow::Continue);
        }
        let Some(echo) = echo() else {
            return Ok(Flow::Continue);
        };

        match connection.send(envelope.frames(echo)) {
            Ok(()) => {
                self.metrics.increment_acks_sent();
                log_event_with_fields(
                    Event::AckSent,
                    &[("identity", self.identity.as_str()), ("topic", session.topic.as_str())],
                );
                Ok(Flow::Continue)
            }
            Err(TransportError::Terminated) => Ok(Flow::Stop(WorkerExit::Terminated)),
            Err(e) => Err(e.into()),
        }
    }

    fn frame_dropped(&self, state: State, reason: &str, detail: Option<&str>) {
        self.metrics.increment_frames_dropped();
        let mut fields = vec![
            ("identity", self.identity.as_str()),
            ("reason", reason),
            ("state", state.as_str()),
        ];
        if let Some(detail) = detail {
            fields.push(("detail", detail));
        }
        log_event_with_fields(Event::FrameDropped, &fields);
    }

    fn store_failed(&self, topic: &str, error: &LogError) {
        self.metrics.increment_store_failures();
        log_event_at(
            Event::StoreFailed,
            store_failed_severity(error),
            &[
                ("code", error.code().code()),
                ("error", error.to_string().as_str()),
                ("identity", self.identity.as_str()),
                ("topic", topic),
            ],
        );
    }
}

/// A log that can no longer be trusted is reported as FATAL.
fn store_failed_severity(error: &LogError) -> Severity {
    if error.is_fatal() {
        Severity::Fatal
    } else {
        Event::StoreFailed.severity()
    }
}

/// Handle to a spawned worker.
pub struct WorkerHandle {
    identity: String,
    interrupt: Interrupt,
    thread: JoinHandle<WriterResult<WorkerExit>>,
}

impl WorkerHandle {
    /// Routing identity of the worker.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Asks the worker to leave its receive loop.
    pub fn interrupt(&self) {
        self.interrupt.trigger();
    }

    /// Waits for the worker to finish.
    pub fn join(self) -> WriterResult<WorkerExit> {
        self.thread
            .join()
            .map_err(|payload| WriterError::Panicked(panic_message(payload)))?
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
