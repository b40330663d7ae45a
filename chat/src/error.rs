use thiserror::Error;

use crate::peer::PeerId;

/// Errors raised by the chat protocol and its collaborators.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("read failed: {0}")]
    Read(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("peer {} is already registered", .0.short())]
    DuplicatePeer(PeerId),
    #[error("unknown peer {}", .0.short())]
    UnknownPeer(PeerId),
    #[error("invalid peer id: {0}")]
    InvalidPeerId(String),
    #[error("invalid node url: {0}")]
    InvalidNodeUrl(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
