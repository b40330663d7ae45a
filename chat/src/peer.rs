//! Peer identities and the `node://` connect address format.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use url::Url;

use crate::error::ChatError;

/// Length in bytes of a [`PeerId`].
pub const NODE_ID_LEN: usize = 64;

/// URI scheme used by [`Node`] connect addresses.
pub const NODE_SCHEME: &str = "node";

/// Fixed-length opaque identity of a peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; NODE_ID_LEN]);

impl PeerId {
    pub fn from_bytes(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// Full lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Truncated display form: first three and last three bytes in hex.
    ///
    /// ```text
    /// aabbcc...ddeeff
    /// ```
    pub fn short(&self) -> String {
        format!(
            "{}...{}",
            hex::encode(&self.0[..3]),
            hex::encode(&self.0[NODE_ID_LEN - 3..])
        )
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.short())
    }
}

impl FromStr for PeerId {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| ChatError::InvalidPeerId(e.to_string()))?;
        let bytes: [u8; NODE_ID_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            ChatError::InvalidPeerId(format!("expected {NODE_ID_LEN} bytes, got {}", b.len()))
        })?;
        Ok(Self(bytes))
    }
}

/// A reachable peer: its identity plus the socket address to dial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: PeerId,
    pub addr: SocketAddr,
}

impl Node {
    pub fn new(id: PeerId, addr: SocketAddr) -> Self {
        Self { id, addr }
    }
}

/// Renders the connect URI, `node://<hex id>@<ip>:<port>`.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{NODE_SCHEME}://{}@{}", self.id, self.addr)
    }
}

impl FromStr for Node {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| ChatError::InvalidNodeUrl(format!("{s}: {why}"));
        let url = Url::parse(s).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != NODE_SCHEME {
            return Err(invalid("scheme must be node://"));
        }
        if url.username().is_empty() {
            return Err(invalid("missing node id"));
        }
        let id: PeerId = url
            .username()
            .parse()
            .map_err(|e: ChatError| invalid(&e.to_string()))?;
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let ip: IpAddr = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|_| invalid("host must be an ip address"))?;
        let port = url.port().ok_or_else(|| invalid("missing port"))?;
        Ok(Self::new(id, SocketAddr::new(ip, port)))
    }
}
