//! Transport endpoints for the push channel.

use serde::{Deserialize, Serialize};

/// Where the push channel lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "address")]
pub enum Transport {
    /// Unix domain socket path, for same-host subscribers.
    Ipc(String),

    /// TCP endpoint for distributed deployment.
    Tcp { host: String, port: u16 },
}

impl Transport {
    pub fn ipc(path: impl Into<String>) -> Self {
        Self::Ipc(path.into())
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Generate the ZeroMQ endpoint address string.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Ipc(path) => format!("ipc://{path}"),
            Self::Tcp { host, port } => format!("tcp://{host}:{port}"),
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_endpoint() {
        let t = Transport::tcp("127.0.0.1", 5001);
        assert_eq!(t.endpoint(), "tcp://127.0.0.1:5001");
    }

    #[test]
    fn ipc_endpoint() {
        let t = Transport::ipc("/tmp/depesche/channel.sock");
        assert_eq!(t.endpoint(), "ipc:///tmp/depesche/channel.sock");
    }

    #[test]
    fn display_matches_endpoint() {
        let t = Transport::tcp("localhost", 9090);
        assert_eq!(t.to_string(), t.endpoint());
    }
}
