//! In-process loopback transport.
//!
//! [`MemoryTransport`] plays the part of the peer-to-peer server for tests and
//! local demos: it creates [`MemorySession`]s, runs the bound [`Protocol`] for
//! each one on its own task, and exposes a [`SessionHandle`] that acts as the
//! remote end of the connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{ChatError, Result};
use crate::frame::Frame;
use crate::peer::{Node, PeerId};
use crate::session::{PeerSession, Protocol, Transport};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

type Inbound = std::result::Result<Frame, String>;

#[derive(Default)]
struct Outbox {
    written: Mutex<Vec<Frame>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

/// Local end of an in-memory connection.
pub struct MemorySession {
    id: PeerId,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
    closed: watch::Receiver<bool>,
    outbox: Arc<Outbox>,
}

impl MemorySession {
    /// Create a session for `id` and the handle that drives it.
    pub fn new(id: PeerId) -> (Arc<Self>, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        let outbox = Arc::new(Outbox::default());
        let session = Arc::new(Self {
            id,
            inbound: tokio::sync::Mutex::new(rx),
            closed: closed_rx,
            outbox: outbox.clone(),
        });
        let handle = SessionHandle {
            id,
            inbound: tx,
            closed: Arc::new(closed_tx),
            outbox,
        };
        (session, handle)
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl PeerSession for MemorySession {
    fn id(&self) -> PeerId {
        self.id
    }

    async fn closed(&self) {
        let mut rx = self.closed.clone();
        // A dropped sender means every handle is gone, which also counts as closed.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    async fn recv(&self) -> Result<Frame> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(reason)) => Err(ChatError::Read(reason)),
            None => Err(ChatError::Read("connection dropped".into())),
        }
    }

    async fn write(&self, tag: u64, payload: &[u8]) -> Result<()> {
        self.outbox.attempts.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Err(ChatError::Write("session closed".into()));
        }
        if self.outbox.fail.load(Ordering::SeqCst) {
            return Err(ChatError::Write("injected failure".into()));
        }
        lock(&self.outbox.written).push(Frame::new(tag, payload));
        Ok(())
    }
}

/// Remote end of a [`MemorySession`].
#[derive(Clone)]
pub struct SessionHandle {
    id: PeerId,
    inbound: mpsc::UnboundedSender<Inbound>,
    closed: Arc<watch::Sender<bool>>,
    outbox: Arc<Outbox>,
}

impl SessionHandle {
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Queue `frame` for the session to read.
    pub fn deliver(&self, frame: Frame) {
        let _ = self.inbound.send(Ok(frame));
    }

    /// Make the session's next read fail with `reason`.
    pub fn fail_read(&self, reason: impl Into<String>) {
        let _ = self.inbound.send(Err(reason.into()));
    }

    /// Fire the close signal.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Toggle write failure injection.
    pub fn fail_writes(&self, fail: bool) {
        self.outbox.fail.store(fail, Ordering::SeqCst);
    }

    /// Frames the session wrote successfully.
    pub fn written(&self) -> Vec<Frame> {
        lock(&self.outbox.written).clone()
    }

    /// Number of writes attempted, failed ones included.
    pub fn write_attempts(&self) -> usize {
        self.outbox.attempts.load(Ordering::SeqCst)
    }
}

/// Loopback [`Transport`] that connects peers inside the current process.
pub struct MemoryTransport {
    local: Node,
    protocol: OnceLock<Arc<dyn Protocol>>,
    peers: Mutex<HashMap<PeerId, SessionHandle>>,
    runners: Mutex<HashMap<PeerId, JoinHandle<Result<()>>>>,
}

impl MemoryTransport {
    pub fn new(local: Node) -> Self {
        Self {
            local,
            protocol: OnceLock::new(),
            peers: Mutex::new(HashMap::new()),
            runners: Mutex::new(HashMap::new()),
        }
    }

    /// Register the protocol to run for every new session. Only the first
    /// call takes effect.
    pub fn bind(&self, protocol: Arc<dyn Protocol>) -> Result<()> {
        self.protocol
            .set(protocol)
            .map_err(|_| ChatError::Transport("protocol already bound".into()))
    }

    /// Open a session to `id` and start the bound protocol on it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, id: PeerId) -> Result<SessionHandle> {
        let protocol = self
            .protocol
            .get()
            .cloned()
            .ok_or_else(|| ChatError::Transport("no protocol bound".into()))?;
        let mut peers = lock(&self.peers);
        if peers.get(&id).is_some_and(|h| !h.is_closed()) {
            return Err(ChatError::Transport(format!("already connected to {}", id.short())));
        }
        let (session, handle) = MemorySession::new(id);
        peers.insert(id, handle.clone());
        drop(peers);

        let session: Arc<dyn PeerSession> = session;
        let runner = tokio::spawn(async move { protocol.run(session).await });
        // A replaced runner belongs to a closed session and is left to finish on its own.
        lock(&self.runners).insert(id, runner);
        info!("session opened with {}", id.short());
        Ok(handle)
    }

    /// Handle for a connected peer, if any.
    pub fn handle(&self, id: &PeerId) -> Option<SessionHandle> {
        lock(&self.peers).get(id).cloned()
    }

    /// Wait for the runner of `id` to exit and return its status.
    pub async fn join(&self, id: &PeerId) -> Option<Result<()>> {
        let runner = lock(&self.runners).remove(id)?;
        Some(Self::settle(runner).await)
    }

    /// Close every session and wait for all runners to drain.
    pub async fn shutdown(&self) -> Vec<(PeerId, Result<()>)> {
        let handles: Vec<SessionHandle> = lock(&self.peers).drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.close();
        }
        let runners: Vec<_> = lock(&self.runners).drain().collect();
        let mut statuses = Vec::with_capacity(runners.len());
        for (id, runner) in runners {
            statuses.push((id, Self::settle(runner).await));
        }
        info!("transport drained {} sessions", statuses.len());
        statuses
    }

    async fn settle(runner: JoinHandle<Result<()>>) -> Result<()> {
        runner
            .await
            .map_err(|e| ChatError::Transport(format!("runner failed: {e}")))?
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn add_peer(&self, node: Node) -> Result<()> {
        if node.id == self.local.id {
            return Err(ChatError::Transport("cannot connect to self".into()));
        }
        debug!("dialing {node}");
        self.connect(node.id).map(|_| ())
    }

    async fn remove_peer(&self, id: PeerId) -> Result<()> {
        let handle = lock(&self.peers)
            .remove(&id)
            .filter(|h| !h.is_closed())
            .ok_or(ChatError::UnknownPeer(id))?;
        handle.close();
        info!("session closed with {}", id.short());
        Ok(())
    }

    fn local_node(&self) -> Node {
        self.local
    }
}
