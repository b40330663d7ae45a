use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};

use crate::console::Console;
use crate::dispatcher::{Dispatcher, Flow};
use crate::error::Result;
use crate::registry::PeerRegistry;
use crate::session::{PeerSession, Protocol};

/// The chat protocol. The transport runs one [`Protocol::run`] per peer.
pub struct ChatProtocol {
    dispatcher: Dispatcher,
}

impl ChatProtocol {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Protocol with a fresh registry and the default chat tag.
    pub fn with_console(console: Console) -> Self {
        Self::new(Dispatcher::new(Arc::new(PeerRegistry::new()), console))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        self.dispatcher.registry()
    }
}

#[async_trait]
impl Protocol for ChatProtocol {
    /// Register the peer, then read frames until it closes or a read fails.
    ///
    /// The peer is unregistered on every exit path, including cancellation
    /// of this future. Read errors are returned, not retried.
    async fn run(&self, session: Arc<dyn PeerSession>) -> Result<()> {
        let id = session.id();
        let registration = self.registry().enroll(session.clone()).map_err(|e| {
            warn!("refusing session: {e}");
            e
        })?;
        info!("peer {} connected", id.short());

        let status = loop {
            match self.dispatcher.handle_message(&*session).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Closed) => break Ok(()),
                Err(e) => {
                    warn!("peer {} read failed: {e}", id.short());
                    break Err(e);
                }
            }
        };

        drop(registration);
        info!("peer {} disconnected", id.short());
        status
    }
}
