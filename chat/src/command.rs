//! Operator command language.
//!
//! A line starting with the command prefix (`/` by default) is a command;
//! anything else is chat text for every connected peer.
//!
//! | command | args | effect |
//! |---|---|---|
//! | `peers` | none | list registered identities |
//! | `addpeer` | `node://<hex id>@<ip>:<port>` | ask the transport to add a peer |
//! | `rmpeer` | `<hex id>` | ask the transport to drop a peer |
//! | `info` | none | print the local identity and connect URI |

use std::sync::Arc;

use log::debug;

use crate::config::ChatConfig;
use crate::console::Console;
use crate::dispatcher::Dispatcher;
use crate::peer::{Node, PeerId};
use crate::session::Transport;

/// Default command prefix.
pub const COMMAND_PREFIX: char = '/';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Peers,
    AddPeer(&'a str),
    RmPeer(&'a str),
    Info,
}

/// One classified operator line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Chat(&'a str),
    Command(Command<'a>),
    /// Prefixed line with an unknown name or the wrong number of arguments.
    Unrecognized,
}

impl<'a> Input<'a> {
    pub fn parse(line: &'a str, prefix: char) -> Self {
        let Some(rest) = line.strip_prefix(prefix) else {
            return Input::Chat(line);
        };
        let mut words = rest.split_whitespace();
        let name = words.next();
        let args: Vec<&str> = words.collect();
        let command = match (name, args.as_slice()) {
            (Some("peers"), []) => Command::Peers,
            (Some("info"), []) => Command::Info,
            (Some("addpeer"), &[uri]) => Command::AddPeer(uri),
            (Some("rmpeer"), &[id]) => Command::RmPeer(id),
            _ => return Input::Unrecognized,
        };
        Input::Command(command)
    }
}

/// Executes operator lines against the registry, transport and dispatcher.
pub struct Interpreter {
    dispatcher: Dispatcher,
    transport: Arc<dyn Transport>,
    console: Console,
    prefix: char,
}

impl Interpreter {
    pub fn new(dispatcher: Dispatcher, transport: Arc<dyn Transport>, console: Console) -> Self {
        Self {
            dispatcher,
            transport,
            console,
            prefix: COMMAND_PREFIX,
        }
    }

    pub fn from_config(
        config: &ChatConfig,
        dispatcher: Dispatcher,
        transport: Arc<dyn Transport>,
        console: Console,
    ) -> Self {
        Self::new(dispatcher, transport, console).with_prefix(config.command_prefix)
    }

    pub fn with_prefix(mut self, prefix: char) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Handle one line of operator input.
    ///
    /// Failures are reported on the console; nothing here is fatal.
    pub async fn execute(&self, line: &str) {
        match Input::parse(line, self.prefix) {
            Input::Chat(text) => {
                let delivered = self.dispatcher.broadcast(text).await;
                debug!("chat delivered to {delivered} peers");
            }
            Input::Command(command) => self.run_command(command).await,
            Input::Unrecognized => debug!("dropping unrecognized command {line:?}"),
        }
    }

    async fn run_command(&self, command: Command<'_>) {
        match command {
            Command::Peers => {
                for id in self.dispatcher.registry().ids() {
                    self.console.line(format_args!("peer id: {id}"));
                }
            }
            Command::AddPeer(uri) => {
                let added = match uri.parse::<Node>() {
                    Ok(node) => self.transport.add_peer(node).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = added {
                    self.console.line(format_args!("addpeer err: {e}"));
                }
            }
            Command::RmPeer(hex) => {
                let removed = match hex.parse::<PeerId>() {
                    Ok(id) => self.transport.remove_peer(id).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = removed {
                    self.console.line(format_args!("rmpeer err: {e}"));
                }
            }
            Command::Info => {
                let node = self.transport.local_node();
                self.console.line(format_args!("nodeId: {}", node.id));
                self.console.line(format_args!("connect url: {node}"));
            }
        }
    }
}
