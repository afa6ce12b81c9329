//! Dealer-style frame transport
//!
//! A connection carries multi-frame messages in both directions and is
//! addressed by the routing identity it announces when it connects.
//!
//! # Shutdown
//!
//! - End of stream: `recv()` returns `Ok(None)`
//! - Interrupt: a blocked `recv()` wakes and returns `Ok(None)`
//! - Context termination: `recv()` fails with `TransportError::Terminated`
//!
//! Receives never time out.

mod context;
mod errors;
mod frame;
mod inproc;
mod interrupt;
mod queue;
pub mod tcp;

use bytes::Bytes;

pub use context::{Endpoint, TransportContext};
pub use errors::{TransportError, TransportResult};
pub use frame::{multipart, Frame};
pub use inproc::{InprocListener, InprocPeer};
pub use interrupt::Interrupt;

/// Default receive high-water mark, in frames.
pub const DEFAULT_RECV_HWM: usize = 2000;

/// One side of an identity-addressed, bidirectional frame connection.
pub trait Connection: Send {
    /// Routing identity announced to the peer.
    fn identity(&self) -> &str;

    /// Blocks until the next inbound frame.
    ///
    /// `Ok(None)` means end of stream or interrupt.
    fn recv(&mut self) -> TransportResult<Option<Frame>>;

    /// Sends one message; `more` is set on every part but the last.
    fn send(&mut self, parts: Vec<Bytes>) -> TransportResult<()>;
}

/// Settings for connecting a dealer.
#[derive(Debug, Clone)]
pub struct DealerOptions {
    /// Routing identity
    pub identity: String,
    /// Maximum queued, unprocessed inbound frames
    pub recv_hwm: usize,
    /// Wakes a blocked receive on this connection
    pub interrupt: Interrupt,
}

impl DealerOptions {
    /// Options with the default high-water mark and a fresh interrupt.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            recv_hwm: DEFAULT_RECV_HWM,
            interrupt: Interrupt::new(),
        }
    }

    /// Sets the receive high-water mark.
    pub fn with_recv_hwm(mut self, recv_hwm: usize) -> Self {
        self.recv_hwm = recv_hwm;
        self
    }

    /// Attaches an existing interrupt.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }
}
