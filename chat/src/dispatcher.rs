use std::sync::Arc;

use log::debug;

use crate::console::Console;
use crate::error::Result;
use crate::frame::CHAT_TAG;
use crate::registry::PeerRegistry;
use crate::session::PeerSession;

/// What a protocol runner should do after one read step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Closed,
}

/// Decodes inbound frames and fans chat text out to every live peer.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<PeerRegistry>,
    console: Console,
    chat_tag: u64,
}

impl Dispatcher {
    pub fn new(registry: Arc<PeerRegistry>, console: Console) -> Self {
        Self {
            registry,
            console,
            chat_tag: CHAT_TAG,
        }
    }

    /// Use `tag` instead of [`CHAT_TAG`] for chat text.
    pub fn with_chat_tag(mut self, tag: u64) -> Self {
        self.chat_tag = tag;
        self
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Wait for the session to close or deliver a frame, whichever comes
    /// first. A close that is ready together with a frame wins.
    ///
    /// Chat frames are printed as `<(aabbcc...ddeeff): text`; frames with any
    /// other tag are dropped without output.
    pub async fn handle_message(&self, session: &dyn PeerSession) -> Result<Flow> {
        tokio::select! {
            biased;
            _ = session.closed() => Ok(Flow::Closed),
            frame = session.recv() => {
                let frame = frame?;
                if frame.tag == self.chat_tag {
                    self.console
                        .line(format_args!("<({}): {}", session.id().short(), frame.text()));
                } else {
                    debug!("ignoring frame tag {} from {}", frame.tag, session.id().short());
                }
                Ok(Flow::Continue)
            }
        }
    }

    /// Send `text` to every registered peer, best effort.
    ///
    /// A failed write skips that peer and moves on. Returns how many writes
    /// succeeded.
    pub async fn broadcast(&self, text: &str) -> usize {
        let mut delivered = 0;
        for session in self.registry.snapshot() {
            match session.write(self.chat_tag, text.as_bytes()).await {
                Ok(()) => delivered += 1,
                Err(e) => debug!("broadcast to {} skipped: {e}", session.id().short()),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::memory::MemorySession;
    use crate::peer::{PeerId, NODE_ID_LEN};

    fn setup() -> (Dispatcher, crate::console::SharedBuffer) {
        let (console, buf) = Console::buffer();
        (Dispatcher::new(Arc::new(PeerRegistry::new()), console), buf)
    }

    fn edge_id() -> PeerId {
        let mut bytes = [0x11u8; NODE_ID_LEN];
        bytes[..3].copy_from_slice(&[0xaa, 0xbb, 0xcc]);
        bytes[NODE_ID_LEN - 3..].copy_from_slice(&[0xdd, 0xee, 0xff]);
        PeerId::from_bytes(bytes)
    }

    #[tokio::test]
    async fn chat_frame_is_printed_with_short_id() {
        let (dispatcher, buf) = setup();
        let (session, handle) = MemorySession::new(edge_id());
        handle.deliver(Frame::chat("hi"));
        let flow = dispatcher.handle_message(&*session).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(buf.contents(), "<(aabbcc...ddeeff): hi\n");
    }

    #[tokio::test]
    async fn other_tags_are_silent() {
        let (dispatcher, buf) = setup();
        let (session, handle) = MemorySession::new(edge_id());
        handle.deliver(Frame::new(7, "hi"));
        let flow = dispatcher.handle_message(&*session).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        assert!(buf.contents().is_empty());
        assert!(dispatcher.registry().is_empty());
    }

    #[tokio::test]
    async fn close_wins_over_pending_frame() {
        let (dispatcher, buf) = setup();
        let (session, handle) = MemorySession::new(edge_id());
        handle.deliver(Frame::chat("stale"));
        handle.close();
        let flow = dispatcher.handle_message(&*session).await.unwrap();
        assert_eq!(flow, Flow::Closed);
        assert!(buf.contents().is_empty());
    }

    #[tokio::test]
    async fn read_failure_is_returned() {
        let (dispatcher, _buf) = setup();
        let (session, handle) = MemorySession::new(edge_id());
        handle.fail_read("reset by peer");
        assert!(dispatcher.handle_message(&*session).await.is_err());
    }

    #[tokio::test]
    async fn broadcast_skips_failed_writes() {
        let (dispatcher, _buf) = setup();
        let mut handles = Vec::new();
        for n in 1..=3u8 {
            let (session, handle) = MemorySession::new(PeerId::from_bytes([n; NODE_ID_LEN]));
            dispatcher.registry().register(session).unwrap();
            handles.push(handle);
        }
        handles[1].fail_writes(true);

        let delivered = dispatcher.broadcast("hello").await;

        assert_eq!(delivered, 2);
        for handle in &handles {
            assert_eq!(handle.write_attempts(), 1);
        }
        assert_eq!(handles[0].written(), vec![Frame::chat("hello")]);
        assert!(handles[1].written().is_empty());
        assert_eq!(handles[2].written(), vec![Frame::chat("hello")]);
    }

    #[tokio::test]
    async fn custom_tag_applies_both_ways() {
        let (console, buf) = Console::buffer();
        let dispatcher = Dispatcher::new(Arc::new(PeerRegistry::new()), console).with_chat_tag(9);
        let (session, handle) = MemorySession::new(edge_id());
        dispatcher.registry().register(session.clone()).unwrap();
        handle.deliver(Frame::chat("old tag"));
        handle.deliver(Frame::new(9, "new tag"));
        dispatcher.handle_message(&*session).await.unwrap();
        dispatcher.handle_message(&*session).await.unwrap();
        assert_eq!(buf.lines(), vec!["<(aabbcc...ddeeff): new tag"]);

        dispatcher.broadcast("out").await;
        assert_eq!(handle.written(), vec![Frame::new(9, "out")]);
    }
}
