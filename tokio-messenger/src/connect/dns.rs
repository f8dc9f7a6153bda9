#[cfg(feature = "dns")]
use futures::{future::select_ok, FutureExt};
#[cfg(feature = "dns")]
use hickory_resolver::{
    config::LookupIpStrategy, name_server::TokioConnectionProvider, IntoName, TokioAsyncResolver,
};
use log::debug;
#[cfg(feature = "dns")]
use std::cmp::Reverse;
#[cfg(feature = "dns")]
use std::net::IpAddr;
use std::net::SocketAddr;
use tokio::net::TcpStream;

use crate::error::ConnectError;

/// SRV service of client-to-server streams
#[cfg(feature = "dns")]
pub const CLIENT_SRV: &str = "_xmpp-client._tcp";

/// Port of client-to-server streams when no SRV record exists
pub const DEFAULT_CLIENT_PORT: u16 = 5222;

/// Where to find the server of a session
#[derive(Clone, Debug)]
pub enum DnsConfig {
    /// Use SRV record to find server host
    #[cfg(feature = "dns")]
    UseSrv {
        /// Hostname to resolve
        host: String,
        /// SRV service, eg. _xmpp-client._tcp
        srv: String,
        /// When SRV resolution fails what port to use
        fallback_port: u16,
    },

    /// Manually define server host and port
    #[cfg(feature = "dns")]
    NoSrv {
        /// Server host name
        host: String,
        /// Server port
        port: u16,
    },

    /// Manually define IP:port
    Addr {
        /// IP:port
        addr: String,
    },
}

impl std::fmt::Display for DnsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "dns")]
            Self::UseSrv { host, .. } => write!(f, "{}", host),
            #[cfg(feature = "dns")]
            Self::NoSrv { host, port } => write!(f, "{}:{}", host, port),
            Self::Addr { addr } => write!(f, "{}", addr),
        }
    }
}

impl DnsConfig {
    /// Constructor for SRV resolution of `host`, falling back to
    /// `fallback_port` on the host itself when no record exists
    #[cfg(feature = "dns")]
    pub fn srv(host: &str, srv: &str, fallback_port: u16) -> Self {
        Self::UseSrv {
            host: host.to_string(),
            srv: srv.to_string(),
            fallback_port,
        }
    }

    /// Constructor for the default SRV resolution strategy for clients
    #[cfg(feature = "dns")]
    pub fn srv_default_client(host: &str) -> Self {
        Self::srv(host, CLIENT_SRV, DEFAULT_CLIENT_PORT)
    }

    /// Constructor for DnsConfig::NoSrv variant
    #[cfg(feature = "dns")]
    pub fn no_srv(host: &str, port: u16) -> Self {
        Self::NoSrv {
            host: host.to_string(),
            port,
        }
    }

    /// Constructor for DnsConfig::Addr variant
    pub fn addr(addr: &str) -> Self {
        Self::Addr {
            addr: addr.to_string(),
        }
    }

    /// Try resolve the DnsConfig to a connected TcpStream
    pub async fn resolve(&self) -> Result<TcpStream, ConnectError> {
        match self {
            #[cfg(feature = "dns")]
            Self::UseSrv {
                host,
                srv,
                fallback_port,
            } => Self::resolve_srv(host, srv, *fallback_port).await,
            #[cfg(feature = "dns")]
            Self::NoSrv { host, port } => Self::resolve_no_srv(host, *port).await,
            Self::Addr { addr } => {
                let addr: SocketAddr = addr.parse()?;
                debug!("Attempting connection to {addr}");
                Ok(TcpStream::connect(addr).await?)
            }
        }
    }

    /// Connects straight away when `host` is an IP literal.
    #[cfg(feature = "dns")]
    async fn connect_literal(
        ascii_host: &str,
        port: u16,
    ) -> Option<Result<TcpStream, ConnectError>> {
        let ip: IpAddr = ascii_host.parse().ok()?;
        debug!("Connecting to literal address {}:{}", ip, port);
        Some(
            TcpStream::connect(SocketAddr::new(ip, port))
                .await
                .map_err(ConnectError::from),
        )
    }

    /// Tries the SRV targets of `host` by priority, heaviest first within a
    /// priority, and the host itself when it has no SRV record.
    #[cfg(feature = "dns")]
    async fn resolve_srv(
        host: &str,
        srv: &str,
        fallback_port: u16,
    ) -> Result<TcpStream, ConnectError> {
        let ascii_host = idna::domain_to_ascii(host)?;
        if let Some(result) = Self::connect_literal(&ascii_host, fallback_port).await {
            return result;
        }

        let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
        let name = format!("{}.{}.", srv, ascii_host).into_name()?;
        let lookup = match resolver.srv_lookup(name.clone()).await {
            Ok(lookup) => lookup,
            Err(e) => {
                debug!(
                    "No usable SRV record at {} ({}), using {}:{}",
                    name, e, host, fallback_port
                );
                return Self::resolve_no_srv(host, fallback_port).await;
            }
        };

        let mut targets: Vec<_> = lookup
            .iter()
            .map(|record| {
                (
                    record.priority(),
                    Reverse(record.weight()),
                    record.target().to_ascii(),
                    record.port(),
                )
            })
            .collect();
        targets.sort();
        for (_, _, target, port) in targets {
            debug!("Trying SRV target {}:{}", target, port);
            match Self::resolve_no_srv(&target, port).await {
                Ok(stream) => return Ok(stream),
                Err(e) => debug!("{}:{} unreachable: {}", target, port, e),
            }
        }
        Err(ConnectError::NoEndpoint)
    }

    /// Resolves `host` to every address it has and connects to all of them
    /// at once, keeping the first connection to succeed.
    #[cfg(feature = "dns")]
    async fn resolve_no_srv(host: &str, port: u16) -> Result<TcpStream, ConnectError> {
        let ascii_host = idna::domain_to_ascii(host)?;
        if let Some(result) = Self::connect_literal(&ascii_host, port).await {
            return result;
        }

        let (config, mut options) = hickory_resolver::system_conf::read_system_conf()?;
        options.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        let resolver = TokioAsyncResolver::new(config, options, TokioConnectionProvider::default());
        let addresses = resolver.lookup_ip(ascii_host.as_str()).await?;

        let attempts: Vec<_> = addresses
            .into_iter()
            .map(|ip| TcpStream::connect(SocketAddr::new(ip, port)).boxed())
            .collect();
        if attempts.is_empty() {
            return Err(ConnectError::NoEndpoint);
        }
        debug!("Connecting to {} addresses of {}:{}", attempts.len(), host, port);
        match select_ok(attempts).await {
            Ok((stream, _)) => Ok(stream),
            Err(e) => {
                debug!("Every address of {} failed, last error: {}", host, e);
                Err(ConnectError::NoEndpoint)
            }
        }
    }
}
