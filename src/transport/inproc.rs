//! In-process connections.
//!
//! A dealer connecting to `inproc://<name>` is paired with an [`InprocPeer`]
//! handed out by the [`InprocListener`] bound at that name. Each direction is
//! a bounded frame queue sized by the dealer's receive high-water mark.

use std::sync::{Arc, PoisonError};

use bytes::Bytes;

use super::context::InprocBindings;
use super::errors::{TransportError, TransportResult};
use super::frame::{multipart, Frame};
use super::queue::{Queue, Resource};
use super::{Connection, DealerOptions};

/// Dealer side of an inproc connection.
pub(crate) struct InprocDealer {
    identity: String,
    inbound: Arc<Queue<Frame>>,
    outbound: Arc<Queue<Frame>>,
}

impl InprocDealer {
    pub(crate) fn pair(options: &DealerOptions) -> (InprocDealer, InprocPeer) {
        let to_dealer = Arc::new(Queue::new(options.recv_hwm));
        let to_peer = Arc::new(Queue::new(options.recv_hwm));

        let dealer = InprocDealer {
            identity: options.identity.clone(),
            inbound: Arc::clone(&to_dealer),
            outbound: Arc::clone(&to_peer),
        };
        let peer = InprocPeer {
            identity: options.identity.clone(),
            inbound: to_peer,
            outbound: to_dealer,
        };
        (dealer, peer)
    }

    pub(crate) fn inbound(&self) -> Arc<dyn Resource> {
        self.inbound.clone()
    }
}

impl Connection for InprocDealer {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn recv(&mut self) -> TransportResult<Option<Frame>> {
        self.inbound.pop()
    }

    fn send(&mut self, parts: Vec<Bytes>) -> TransportResult<()> {
        for frame in multipart(parts) {
            self.outbound.push(frame)?;
        }
        Ok(())
    }
}

impl Drop for InprocDealer {
    fn drop(&mut self) {
        self.inbound.close();
        self.outbound.close();
    }
}

/// Router side of an inproc connection.
///
/// Dropping the peer ends the dealer's stream once it has drained the
/// frames already sent.
pub struct InprocPeer {
    identity: String,
    inbound: Arc<Queue<Frame>>,
    outbound: Arc<Queue<Frame>>,
}

impl InprocPeer {
    /// Routing identity of the connected dealer.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Sends one frame to the dealer, blocking at its high-water mark.
    pub fn send(&self, frame: Frame) -> TransportResult<()> {
        self.outbound.push(frame)
    }

    /// Sends every frame in order.
    pub fn send_all(&self, frames: impl IntoIterator<Item = Frame>) -> TransportResult<()> {
        for frame in frames {
            self.send(frame)?;
        }
        Ok(())
    }

    /// Receives the next frame from the dealer.
    ///
    /// Returns `Ok(None)` once the dealer has gone away.
    pub fn recv(&self) -> TransportResult<Option<Frame>> {
        self.inbound.pop()
    }

    /// Receives one complete message from the dealer.
    pub fn recv_message(&self) -> TransportResult<Option<Vec<Bytes>>> {
        let mut parts = Vec::new();
        while let Some(frame) = self.inbound.pop()? {
            let more = frame.has_more();
            parts.push(frame.into_bytes());
            if !more {
                return Ok(Some(parts));
            }
        }
        if parts.is_empty() {
            Ok(None)
        } else {
            Err(TransportError::Protocol(format!(
                "stream ended inside a message after {} frames",
                parts.len()
            )))
        }
    }

    /// Stops sending. The dealer sees end-of-stream after draining, while
    /// frames it sends back can still be received.
    pub fn close_send(&self) {
        self.outbound.close();
    }
}

impl Drop for InprocPeer {
    fn drop(&mut self) {
        self.outbound.close();
        self.inbound.close();
    }
}

/// Accepts dealers connecting to a bound inproc name.
///
/// Dropping the listener unbinds the name.
pub struct InprocListener {
    name: String,
    pending: Arc<Queue<InprocPeer>>,
    bindings: InprocBindings,
}

impl InprocListener {
    pub(crate) fn new(name: String, pending: Arc<Queue<InprocPeer>>, bindings: InprocBindings) -> Self {
        Self {
            name,
            pending,
            bindings,
        }
    }

    /// Bound endpoint.
    pub fn endpoint(&self) -> String {
        format!("inproc://{}", self.name)
    }

    /// Blocks until a dealer connects.
    ///
    /// Fails with `Terminated` when the context is terminated.
    pub fn accept(&self) -> TransportResult<InprocPeer> {
        self.pending.pop()?.ok_or(TransportError::Closed)
    }
}

impl Drop for InprocListener {
    fn drop(&mut self) {
        self.pending.close();
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportContext;
    use std::thread;

    #[test]
    fn test_frames_flow_both_ways() {
        let context = TransportContext::new();
        let listener = context.bind_inproc("both").unwrap();
        let mut dealer = context.connect("inproc://both", &DealerOptions::new("w1")).unwrap();
        let peer = listener.accept().unwrap();

        peer.send(Frame::more("a")).unwrap();
        peer.send(Frame::last("b")).unwrap();
        assert_eq!(dealer.recv().unwrap(), Some(Frame::more("a")));
        assert_eq!(dealer.recv().unwrap(), Some(Frame::last("b")));

        dealer
            .send(vec![Bytes::from_static(b"x"), Bytes::from_static(b"y")])
            .unwrap();
        assert_eq!(
            peer.recv_message().unwrap(),
            Some(vec![Bytes::from_static(b"x"), Bytes::from_static(b"y")])
        );
    }

    #[test]
    fn test_dropping_peer_ends_dealer_stream_after_drain() {
        let context = TransportContext::new();
        let listener = context.bind_inproc("drop").unwrap();
        let mut dealer = context.connect("inproc://drop", &DealerOptions::new("w1")).unwrap();

        let peer = listener.accept().unwrap();
        peer.send(Frame::last("tail")).unwrap();
        drop(peer);

        assert_eq!(dealer.recv().unwrap(), Some(Frame::last("tail")));
        assert_eq!(dealer.recv().unwrap(), None);
    }

    #[test]
    fn test_close_send_keeps_return_path_open() {
        let context = TransportContext::new();
        let listener = context.bind_inproc("half").unwrap();
        let mut dealer = context.connect("inproc://half", &DealerOptions::new("w1")).unwrap();
        let peer = listener.accept().unwrap();

        peer.close_send();
        assert_eq!(dealer.recv().unwrap(), None);

        dealer.send(vec![Bytes::from_static(b"ack")]).unwrap();
        assert_eq!(peer.recv().unwrap(), Some(Frame::last("ack")));
    }

    #[test]
    fn test_send_to_dropped_dealer_fails() {
        let context = TransportContext::new();
        let listener = context.bind_inproc("gone").unwrap();
        let dealer = context.connect("inproc://gone", &DealerOptions::new("w1")).unwrap();
        let peer = listener.accept().unwrap();

        drop(dealer);
        assert!(matches!(peer.send(Frame::last("x")), Err(TransportError::Closed)));
        assert_eq!(peer.recv().unwrap(), None);
    }

    #[test]
    fn test_listener_drop_unbinds() {
        let context = TransportContext::new();
        drop(context.bind_inproc("again").unwrap());
        assert!(context.bind_inproc("again").is_ok());
    }

    #[test]
    fn test_high_water_mark_bounds_queued_frames() {
        let context = TransportContext::new();
        let listener = context.bind_inproc("hwm").unwrap();
        let options = DealerOptions::new("w1").with_recv_hwm(2);
        let mut dealer = context.connect("inproc://hwm", &options).unwrap();
        let peer = listener.accept().unwrap();

        let sender = thread::spawn(move || {
            for i in 0..5u8 {
                peer.send(Frame::last(vec![i])).unwrap();
            }
            peer
        });

        for i in 0..5u8 {
            assert_eq!(dealer.recv().unwrap(), Some(Frame::last(vec![i])));
        }
        drop(sender.join().unwrap());
    }

    #[test]
    fn test_accept_fails_on_termination() {
        let context = TransportContext::new();
        let listener = context.bind_inproc("term").unwrap();
        context.terminate();
        assert!(matches!(listener.accept(), Err(TransportError::Terminated)));
    }
}
