//! `TcpServerConnector` provides a `ServerConnector` for plaintext TCP connections

use tokio::net::TcpStream;

use crate::{
    connect::{DnsConfig, ServerConnector},
    error::ConnectError,
};

/// Connect via plaintext TCP to an XMPP server
///
/// Wrap it in a TLS-capable connector unless the path to the server is
/// already trusted.
#[derive(Debug, Clone)]
pub struct TcpServerConnector(pub DnsConfig);

impl From<DnsConfig> for TcpServerConnector {
    fn from(dns_config: DnsConfig) -> TcpServerConnector {
        Self(dns_config)
    }
}

impl ServerConnector for TcpServerConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<Self::Stream, ConnectError> {
        let stream = self.0.resolve().await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_literal_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connector = TcpServerConnector::from(DnsConfig::addr(&addr.to_string()));

        let (accepted, connected) = tokio::join!(listener.accept(), connector.connect());
        let (server_side, _) = accepted.unwrap();
        assert_eq!(connected.unwrap().local_addr().unwrap(), server_side.peer_addr().unwrap());
    }

    #[tokio::test]
    async fn rejects_garbage_address() {
        let connector = TcpServerConnector::from(DnsConfig::addr("not an address"));
        assert!(matches!(connector.connect().await, Err(ConnectError::Addr(_))));
    }
}
