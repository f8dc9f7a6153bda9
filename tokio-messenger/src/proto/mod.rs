//! Low-level stream establishment
//!
//! The byte-level XML codec is supplied by the user as a [`StanzaCodec`];
//! everything above it, from the stream header to resource binding, lives
//! here and in the session.

use std::collections::HashMap;
use std::io;

use futures::{Sink, Stream};
use minidom::Element;
use tokio_util::codec::{Decoder, Encoder};

pub(crate) mod features;
#[cfg(any(test, feature = "line-codec"))]
pub mod line_codec;
pub(crate) mod sasl;
pub(crate) mod xmpp_stream;

pub use features::StreamFeatures;
pub(crate) use xmpp_stream::XmppStream;

/// Anything that can be sent or received on an XMPP stream
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// `<stream:stream>` start tag, with its attributes
    StreamStart(HashMap<String, String>),
    /// A complete top-level element
    Stanza(Element),
    /// Character data between elements, e.g. whitespace keepalives
    Text(String),
    /// `</stream:stream>` end tag
    StreamEnd,
}

/// The XML codec plugged under a session.
///
/// Decoding yields [`Packet`]s from the bytes of the transport, encoding
/// turns them back into bytes. Encoding a [`Packet::StreamStart`] opens a
/// fresh stream: the codec must reset whatever parser state it keeps, as
/// happens after authentication.
pub trait StanzaCodec:
    Decoder<Item = Packet, Error = io::Error>
    + Encoder<Packet, Error = io::Error>
    + Unpin
    + Send
    + 'static
{
}

impl<T> StanzaCodec for T where
    T: Decoder<Item = Packet, Error = io::Error>
        + Encoder<Packet, Error = io::Error>
        + Unpin
        + Send
        + 'static
{
}

/// A framed transport: a stream of decoded packets and a sink for them.
pub trait PacketStream:
    Stream<Item = Result<Packet, io::Error>>
    + Sink<Packet, Error = io::Error>
    + Unpin
    + Send
    + 'static
{
}

impl<T> PacketStream for T where
    T: Stream<Item = Result<Packet, io::Error>>
        + Sink<Packet, Error = io::Error>
        + Unpin
        + Send
        + 'static
{
}
