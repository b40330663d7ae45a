//! Capabilities the chat protocol consumes from the peer-to-peer transport.
//!
//! The transport owns connections, handshakes and discovery. It hands each
//! established connection to a [`Protocol`] as a [`PeerSession`], and serves
//! administrative requests through [`Transport`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::frame::Frame;
use crate::peer::{Node, PeerId};

/// A live connection to one peer.
#[async_trait]
pub trait PeerSession: Send + Sync {
    /// Identity of the remote peer.
    fn id(&self) -> PeerId;

    /// Resolves once the transport has torn the session down.
    ///
    /// Must keep resolving immediately on every call after that.
    async fn closed(&self);

    /// Wait for the next inbound frame.
    ///
    /// An `Err` is an unrecoverable read failure for this session. Must be
    /// cancel safe: dropping the future must not lose a frame.
    async fn recv(&self) -> Result<Frame>;

    /// Send one frame to the peer.
    async fn write(&self, tag: u64, payload: &[u8]) -> Result<()>;
}

/// Administrative surface of the transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ask the transport to dial and add `node`.
    async fn add_peer(&self, node: Node) -> Result<()>;

    /// Ask the transport to disconnect the peer with `id`.
    async fn remove_peer(&self, id: PeerId) -> Result<()>;

    /// This node's identity and connect address.
    fn local_node(&self) -> Node;
}

/// Entry point the transport invokes once per newly connected peer.
#[async_trait]
pub trait Protocol: Send + Sync {
    /// Drive `session` until it closes. `Ok(())` on a clean close.
    async fn run(&self, session: Arc<dyn PeerSession>) -> Result<()>;
}
