//! `ServerConnector` provides transports for XMPP sessions

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ConnectError;

pub mod tcp;
pub use tcp::TcpServerConnector;

mod dns;
#[cfg(feature = "dns")]
pub use dns::CLIENT_SRV;
pub use dns::{DnsConfig, DEFAULT_CLIENT_PORT};

/// trait implemented by the transports a ServerConnector produces
pub trait AsyncReadAndWrite: AsyncRead + AsyncWrite + Unpin + Send + 'static {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> AsyncReadAndWrite for T {}

/// Trait called to open the transport of a session
///
/// Implementations are responsible for anything below the XML stream, TLS
/// included: the session starts writing its stream header as soon as
/// `connect` returns.
pub trait ServerConnector: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// The type of transport this ServerConnector produces
    type Stream: AsyncReadAndWrite;
    /// Opens a fresh transport to the server
    fn connect(
        &self,
    ) -> impl core::future::Future<Output = Result<Self::Stream, ConnectError>> + Send;
}
