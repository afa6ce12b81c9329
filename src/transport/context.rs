//! Shared transport context
//!
//! A context owns the connections created through it. Terminating a context
//! fails every blocked call on those connections with `Terminated`, and
//! propagates to every shadow created from it. Destroying a shadow closes
//! only the shadow's own connections.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::errors::{TransportError, TransportResult};
use super::inproc::{InprocDealer, InprocListener, InprocPeer};
use super::queue::{Queue, Resource};
use super::tcp::TcpDealer;
use super::{Connection, DealerOptions};

/// Pending inproc connections, keyed by bound name.
pub(crate) type InprocBindings = Arc<Mutex<HashMap<String, Arc<Queue<InprocPeer>>>>>;

/// Maximum inproc connections waiting to be accepted.
const ACCEPT_BACKLOG: usize = 1024;

/// Parsed connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// In-process endpoint bound on a context
    Inproc(String),
    /// TCP endpoint, `host:port`
    Tcp(String),
}

impl Endpoint {
    /// Parses `inproc://<name>` or `tcp://<host>:<port>`.
    pub fn parse(endpoint: &str) -> TransportResult<Self> {
        if let Some(name) = endpoint.strip_prefix("inproc://") {
            if !name.is_empty() {
                return Ok(Endpoint::Inproc(name.to_string()));
            }
        } else if let Some(addr) = endpoint.strip_prefix("tcp://") {
            if addr.rsplit_once(':').is_some_and(|(host, port)| {
                !host.is_empty() && port.parse::<u16>().is_ok()
            }) {
                return Ok(Endpoint::Tcp(addr.to_string()));
            }
        }
        Err(TransportError::InvalidEndpoint(endpoint.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Inproc(name) => write!(f, "inproc://{}", name),
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

struct ContextInner {
    terminated: AtomicBool,
    resources: Mutex<Vec<Weak<dyn Resource>>>,
    children: Mutex<Vec<Weak<ContextInner>>>,
    inproc: InprocBindings,
}

impl ContextInner {
    fn new(inproc: InprocBindings) -> Self {
        Self {
            terminated: AtomicBool::new(false),
            resources: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            inproc,
        }
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);

        let resources: Vec<_> = self
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for resource in resources {
            resource.terminate();
        }

        let children: Vec<_> = self
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for child in children {
            child.terminate();
        }
    }
}

/// Handle to a shared transport context. Cloning shares the context.
#[derive(Clone)]
pub struct TransportContext {
    inner: Arc<ContextInner>,
}

impl Default for TransportContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportContext {
    /// Create a root context.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner::new(Arc::new(Mutex::new(HashMap::new())))),
        }
    }

    /// Create a child context sharing this context's termination and inproc
    /// namespace, but owning its own connections.
    pub fn shadow(&self) -> TransportContext {
        let child = Arc::new(ContextInner::new(Arc::clone(&self.inner.inproc)));

        let mut children = self
            .inner
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&child));
        drop(children);

        if self.is_terminated() {
            child.terminate();
        }

        TransportContext { inner: child }
    }

    /// Whether the context has been terminated.
    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::SeqCst)
    }

    /// Terminates the context and all of its shadows.
    ///
    /// Every blocked receive on their connections returns `Terminated`.
    pub fn terminate(&self) {
        self.inner.terminate();
    }

    /// Closes the connections created through this handle.
    pub fn destroy(self) {
        let resources: Vec<_> = self
            .inner
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .filter_map(|r| r.upgrade())
            .collect();
        for resource in resources {
            resource.close();
        }
    }

    /// Binds an inproc endpoint. Dealers connecting to `inproc://<name>` are
    /// handed to the returned listener.
    pub fn bind_inproc(&self, name: &str) -> TransportResult<InprocListener> {
        if self.is_terminated() {
            return Err(TransportError::Terminated);
        }

        let pending = Arc::new(Queue::new(ACCEPT_BACKLOG));
        {
            let mut bindings = self.inner.inproc.lock().unwrap_or_else(PoisonError::into_inner);
            if bindings.contains_key(name) {
                return Err(TransportError::AddressInUse(format!("inproc://{}", name)));
            }
            bindings.insert(name.to_string(), Arc::clone(&pending));
        }

        let resource: Arc<dyn Resource> = pending.clone();
        self.register(&resource);

        Ok(InprocListener::new(name.to_string(), pending, Arc::clone(&self.inner.inproc)))
    }

    /// Connects a dealer to `endpoint`.
    pub fn connect(
        &self,
        endpoint: &str,
        options: &DealerOptions,
    ) -> TransportResult<Box<dyn Connection>> {
        if self.is_terminated() {
            return Err(TransportError::Terminated);
        }

        match Endpoint::parse(endpoint)? {
            Endpoint::Inproc(name) => {
                let pending = self
                    .inner
                    .inproc
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| TransportError::ConnectionRefused(endpoint.to_string()))?;

                let (dealer, peer) = InprocDealer::pair(options);
                let resource: Arc<dyn Resource> = dealer.inbound();
                self.register(&resource);
                options.interrupt.attach(&resource);

                pending.push(peer)?;
                Ok(Box::new(dealer))
            }
            Endpoint::Tcp(addr) => {
                let dealer = TcpDealer::connect(&addr, options)?;
                let resource = dealer.resource();
                self.register(&resource);
                options.interrupt.attach(&dealer.inbound());
                Ok(Box::new(dealer))
            }
        }
    }

    pub(crate) fn register(&self, resource: &Arc<dyn Resource>) {
        let mut resources = self
            .inner
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        resources.retain(|r| r.strong_count() > 0);
        resources.push(Arc::downgrade(resource));
        drop(resources);

        if self.is_terminated() {
            resource.terminate();
        }
    }
}

impl fmt::Debug for TransportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportContext")
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Frame;

    #[test]
    fn test_parse_endpoints() {
        assert_eq!(
            Endpoint::parse("inproc://writers").unwrap(),
            Endpoint::Inproc("writers".to_string())
        );
        assert_eq!(
            Endpoint::parse("tcp://127.0.0.1:5556").unwrap(),
            Endpoint::Tcp("127.0.0.1:5556".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_bad_endpoints() {
        for bad in ["", "inproc://", "tcp://host", "tcp://:80", "tcp://h:notaport", "udp://h:1"] {
            assert!(Endpoint::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_endpoint_display_round_trips() {
        let endpoint = Endpoint::parse("tcp://localhost:9000").unwrap();
        assert_eq!(endpoint.to_string(), "tcp://localhost:9000");
    }

    #[test]
    fn test_connect_without_bind_is_refused() {
        let context = TransportContext::new();
        let err = context
            .connect("inproc://nobody", &DealerOptions::new("w1"))
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::ConnectionRefused(_)));
    }

    #[test]
    fn test_double_bind_is_rejected() {
        let context = TransportContext::new();
        let _listener = context.bind_inproc("x").unwrap();
        assert!(matches!(
            context.bind_inproc("x"),
            Err(TransportError::AddressInUse(_))
        ));
    }

    #[test]
    fn test_shadow_shares_inproc_namespace() {
        let context = TransportContext::new();
        let listener = context.bind_inproc("shared").unwrap();

        let shadow = context.shadow();
        let _dealer = shadow.connect("inproc://shared", &DealerOptions::new("w1")).unwrap();
        assert_eq!(listener.accept().unwrap().identity(), "w1");
    }

    #[test]
    fn test_terminate_propagates_to_shadow_connections() {
        let context = TransportContext::new();
        let _listener = context.bind_inproc("t").unwrap();
        let shadow = context.shadow();
        let mut dealer = shadow.connect("inproc://t", &DealerOptions::new("w1")).unwrap();

        context.terminate();

        assert!(shadow.is_terminated());
        assert!(matches!(dealer.recv(), Err(TransportError::Terminated)));
    }

    #[test]
    fn test_destroying_shadow_leaves_parent_running() {
        let context = TransportContext::new();
        let listener = context.bind_inproc("d").unwrap();

        let shadow = context.shadow();
        let mut dealer = shadow.connect("inproc://d", &DealerOptions::new("w1")).unwrap();
        shadow.destroy();

        assert!(!context.is_terminated());
        assert_eq!(dealer.recv().unwrap(), None);

        let mut other = context.connect("inproc://d", &DealerOptions::new("w2")).unwrap();
        let peer = listener.accept().unwrap();
        let peer = if peer.identity() == "w2" { peer } else { listener.accept().unwrap() };
        peer.send(Frame::last("hi")).unwrap();
        assert_eq!(other.recv().unwrap(), Some(Frame::last("hi")));
    }

    #[test]
    fn test_shadow_of_terminated_context_is_terminated() {
        let context = TransportContext::new();
        context.terminate();
        assert!(context.shadow().is_terminated());
        assert!(matches!(
            context.connect("inproc://x", &DealerOptions::new("w")),
            Err(TransportError::Terminated)
        ));
    }
}
