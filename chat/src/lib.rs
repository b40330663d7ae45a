//! Chat protocol for a peer-to-peer node.
//!
//! The transport hands every connected peer to [`ChatProtocol`], which keeps
//! the shared [`PeerRegistry`] in step with the live connections and prints
//! incoming chat text. The operator drives the node through an
//! [`Interpreter`]: plain lines are broadcast to every peer, `/` lines are
//! commands (see [`command`]).
//!
//! ```ignore
//! let transport = Arc::new(MemoryTransport::new(local));
//! let chat = Chat::new(ChatConfig::default(), transport.clone(), Console::stdout());
//! transport.bind(chat.protocol())?;
//! chat.run_console().await?;
//! ```

pub mod command;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod input;
pub mod logging;
pub mod memory;
pub mod peer;
pub mod protocol;
pub mod registry;
pub mod session;

use std::sync::Arc;

use tokio::io::AsyncBufRead;

pub use command::{Command, Input, Interpreter};
pub use config::ChatConfig;
pub use console::Console;
pub use dispatcher::Dispatcher;
pub use error::{ChatError, Result};
pub use frame::{Frame, CHAT_TAG};
pub use memory::{MemorySession, MemoryTransport, SessionHandle};
pub use peer::{Node, PeerId};
pub use protocol::ChatProtocol;
pub use registry::PeerRegistry;
pub use session::{PeerSession, Protocol, Transport};

/// A configured chat node: the protocol to bind to the transport plus the
/// operator console wired to the same registry.
pub struct Chat {
    config: ChatConfig,
    protocol: Arc<ChatProtocol>,
    interpreter: Interpreter,
}

impl Chat {
    pub fn new(config: ChatConfig, transport: Arc<dyn Transport>, console: Console) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(PeerRegistry::new()), console.clone())
            .with_chat_tag(config.chat_tag);
        let protocol = Arc::new(ChatProtocol::new(dispatcher.clone()));
        let interpreter = Interpreter::from_config(&config, dispatcher, transport, console);
        Self {
            config,
            protocol,
            interpreter,
        }
    }

    /// Protocol entry point for the transport to run per peer.
    pub fn protocol(&self) -> Arc<ChatProtocol> {
        self.protocol.clone()
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        self.protocol.registry()
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Run one operator line.
    pub async fn execute(&self, line: &str) {
        self.interpreter.execute(line).await
    }

    /// Read operator lines from `reader` until EOF.
    pub async fn run_input<R: AsyncBufRead + Unpin>(&self, reader: R) -> Result<()> {
        input::run_input(reader, &self.interpreter, &self.config.prompt).await
    }

    /// Read operator lines from stdin until EOF.
    pub async fn run_console(&self) -> Result<()> {
        input::run_stdin(&self.interpreter, &self.config.prompt).await
    }
}
