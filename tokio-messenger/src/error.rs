#[cfg(feature = "dns")]
use hickory_resolver::{
    error::ResolveError as DnsResolveError, proto::error::ProtoError as DnsProtoError,
};
use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
use std::net::AddrParseError;

use crate::{jid, minidom::Element};
use messenger_sasl::client::{FailureReason, MechanismError};

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(IoError),
    /// Could not reach the server
    Connect(ConnectError),
    /// Error parsing Jabber-Id
    JidParse(jid::Error),
    /// Protocol-level error
    Protocol(ProtocolError),
    /// Authentication error
    Auth(AuthError),
    /// The operation needs a session in the `Ready` state
    NotConnected,
    /// The server did not answer in time
    Timeout,
    /// Connection closed by the server
    Disconnected,
    /// The session was closed locally
    Closed,
    /// The session was used out of order, e.g. connected twice
    InvalidState,
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(fmt, "IO error: {}", e),
            Error::Connect(e) => write!(fmt, "connection error: {}", e),
            Error::JidParse(e) => write!(fmt, "jid parse error: {}", e),
            Error::Protocol(e) => write!(fmt, "protocol error: {}", e),
            Error::Auth(e) => write!(fmt, "authentication error: {}", e),
            Error::NotConnected => write!(fmt, "session not connected"),
            Error::Timeout => write!(fmt, "timed out waiting for the server"),
            Error::Disconnected => write!(fmt, "disconnected"),
            Error::Closed => write!(fmt, "session closed"),
            Error::InvalidState => write!(fmt, "invalid state"),
        }
    }
}

impl StdError for Error {}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<ConnectError> for Error {
    fn from(e: ConnectError) -> Self {
        Error::Connect(e)
    }
}

impl From<jid::Error> for Error {
    fn from(e: jid::Error) -> Self {
        Error::JidParse(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        ProtocolError::Parse(e).into()
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Auth(e)
    }
}

/// Errors raised while establishing the transport
#[derive(Debug)]
pub enum ConnectError {
    /// I/O error
    Io(IoError),
    /// Invalid IP/Port address
    Addr(AddrParseError),
    /// DNS protocol error
    #[cfg(feature = "dns")]
    Dns(DnsProtoError),
    /// DNS resolution error
    #[cfg(feature = "dns")]
    Resolve(DnsResolveError),
    /// DNS label conversion error, no details available from module
    /// `idna`
    #[cfg(feature = "dns")]
    Idna,
    /// Every resolved endpoint refused the connection
    NoEndpoint,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectError::Io(e) => write!(fmt, "IO error: {}", e),
            ConnectError::Addr(e) => write!(fmt, "wrong network address: {e}"),
            #[cfg(feature = "dns")]
            ConnectError::Dns(e) => write!(fmt, "{:?}", e),
            #[cfg(feature = "dns")]
            ConnectError::Resolve(e) => write!(fmt, "{:?}", e),
            #[cfg(feature = "dns")]
            ConnectError::Idna => write!(fmt, "IDNA error"),
            ConnectError::NoEndpoint => write!(fmt, "no reachable endpoint"),
        }
    }
}

impl StdError for ConnectError {}

impl From<IoError> for ConnectError {
    fn from(e: IoError) -> Self {
        ConnectError::Io(e)
    }
}

impl From<AddrParseError> for ConnectError {
    fn from(e: AddrParseError) -> Self {
        ConnectError::Addr(e)
    }
}

#[cfg(feature = "dns")]
impl From<idna::Errors> for ConnectError {
    fn from(_e: idna::Errors) -> Self {
        ConnectError::Idna
    }
}

#[cfg(feature = "dns")]
impl From<DnsResolveError> for ConnectError {
    fn from(e: DnsResolveError) -> Self {
        ConnectError::Resolve(e)
    }
}

#[cfg(feature = "dns")]
impl From<DnsProtoError> for ConnectError {
    fn from(e: DnsProtoError) -> Self {
        ConnectError::Dns(e)
    }
}

/// XMPP protocol-level error
#[derive(Debug)]
pub enum ProtocolError {
    /// An element did not have the expected shape
    Parse(ParseError),
    /// The server requires STARTTLS, which the connector did not provide
    NoTls,
    /// The server did not offer resource binding
    NoBind,
    /// Invalid response to resource binding
    InvalidBindResponse,
    /// Invalid response to legacy session establishment
    InvalidSessionResponse,
    /// Invalid response to the roster request
    InvalidRosterResponse,
    /// No xmlns attribute in <stream:stream>
    NoStreamNamespace,
    /// No id attribute in <stream:stream>
    NoStreamId,
    /// The server did not send <stream:features>
    NoStreamFeatures,
    /// Unexpected <stream:stream> (shouldn't occur)
    InvalidStreamStart,
    /// Too many stanzas arrived before negotiation finished
    TooManyPending,
    /// The server sent a stream error
    StreamError {
        /// Defined condition, e.g. `conflict`
        condition: String,
        /// Optional human-readable text
        text: Option<String>,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolError::Parse(e) => write!(fmt, "error with expected stanza schema: {}", e),
            ProtocolError::NoTls => write!(fmt, "no TLS available"),
            ProtocolError::NoBind => write!(fmt, "resource binding not offered"),
            ProtocolError::InvalidBindResponse => {
                write!(fmt, "invalid response to resource binding")
            }
            ProtocolError::InvalidSessionResponse => {
                write!(fmt, "invalid response to session establishment")
            }
            ProtocolError::InvalidRosterResponse => {
                write!(fmt, "invalid response to the roster request")
            }
            ProtocolError::NoStreamNamespace => {
                write!(fmt, "no xmlns attribute in <stream:stream>")
            }
            ProtocolError::NoStreamId => write!(fmt, "no id attribute in <stream:stream>"),
            ProtocolError::NoStreamFeatures => write!(fmt, "no <stream:features> received"),
            ProtocolError::InvalidStreamStart => write!(fmt, "unexpected <stream:stream>"),
            ProtocolError::TooManyPending => {
                write!(fmt, "too many stanzas received during negotiation")
            }
            ProtocolError::StreamError {
                condition,
                text: Some(text),
            } => write!(fmt, "stream error: {} ({})", condition, text),
            ProtocolError::StreamError {
                condition,
                text: None,
            } => write!(fmt, "stream error: {}", condition),
        }
    }
}

impl StdError for ProtocolError {}

impl From<ParseError> for ProtocolError {
    fn from(e: ParseError) -> Self {
        ProtocolError::Parse(e)
    }
}

/// Authentication error
#[derive(Debug)]
pub enum AuthError {
    /// The server does not offer the configured SASL mechanism
    NoMechanism,
    /// The mechanism could not be created from the credentials
    Mechanism(MechanismError),
    /// The negotiation failed, locally or on the server's side
    Sasl(FailureReason),
}

impl StdError for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::NoMechanism => write!(fmt, "no matching SASL mechanism available"),
            AuthError::Mechanism(e) => write!(fmt, "local SASL implementation error: {}", e),
            AuthError::Sasl(reason) => write!(fmt, "SASL negotiation failed: {}", reason),
        }
    }
}

impl From<MechanismError> for AuthError {
    fn from(e: MechanismError) -> Self {
        AuthError::Mechanism(e)
    }
}

impl From<FailureReason> for AuthError {
    fn from(e: FailureReason) -> Self {
        AuthError::Sasl(e)
    }
}

/// Error converting an [`Element`] into a typed stanza
#[derive(Debug)]
pub enum ParseError {
    /// The element is not the one expected; it is handed back untouched.
    Mismatch(Element),
    /// The element is the expected one but malformed.
    Invalid(&'static str),
    /// An address attribute is not a valid JID.
    Jid(jid::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Mismatch(elem) => {
                write!(fmt, "unexpected element {{{}}}{}", elem.ns(), elem.name())
            }
            ParseError::Invalid(reason) => write!(fmt, "{}", reason),
            ParseError::Jid(e) => write!(fmt, "invalid address: {}", e),
        }
    }
}

impl StdError for ParseError {}

impl From<jid::Error> for ParseError {
    fn from(e: jid::Error) -> Self {
        ParseError::Jid(e)
    }
}
