//! `XmppStream` drives a framed transport through stream negotiation

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, trace};
use minidom::Element;
use tokio::time::{timeout, timeout_at, Instant};

use crate::error::{Error, ProtocolError};
use crate::ns;
use crate::proto::{Packet, PacketStream, StreamFeatures};
use crate::stanza::Iq;

/// How long a local close may take before the transport is dropped anyway.
pub(crate) const LOCAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// How many stanzas may be kept for dispatch before the session is ready.
pub(crate) const MAX_PENDING: usize = 64;

/// Extracts the condition of a `<stream:error/>`, if `elem` is one.
pub(crate) fn stream_error(elem: &Element) -> Option<ProtocolError> {
    if !elem.is("error", ns::STREAM) {
        return None;
    }
    let condition = elem
        .children()
        .find(|child| child.ns() == ns::XMPP_STREAMS && child.name() != "text")
        .map_or_else(|| String::from("undefined-condition"), |c| c.name().to_owned());
    let text = elem.get_child("text", ns::XMPP_STREAMS).map(Element::text);
    Some(ProtocolError::StreamError { condition, text })
}

/// Wraps a framed transport during negotiation.
///
/// Every wait on the server is bounded by the response timeout, counted from
/// the last request sent: whitespace or unrelated elements received meanwhile
/// do not extend it. Stanzas which arrive while waiting for a specific answer
/// are kept in order, up to [`MAX_PENDING`], to be dispatched once the
/// session is ready.
pub(crate) struct XmppStream<T> {
    /// The framed transport
    pub stream: T,
    /// The domain the stream is opened to
    pub domain: String,
    /// Stream `id` attribute of the last header received
    pub id: Option<String>,
    /// `<stream:features/>` received after the last header
    pub features: StreamFeatures,
    pending: VecDeque<Element>,
    response_timeout: Duration,
    deadline: Instant,
}

impl<T: PacketStream> XmppStream<T> {
    /// Constructor
    pub fn new(stream: T, domain: String, response_timeout: Duration) -> Self {
        XmppStream {
            stream,
            domain,
            id: None,
            features: StreamFeatures::default(),
            pending: VecDeque::new(),
            response_timeout,
            deadline: Instant::now() + response_timeout,
        }
    }

    /// Sends a `<stream:stream>` start tag, then waits for the server's one
    /// and its features
    pub async fn start(&mut self) -> Result<(), Error> {
        let attrs: HashMap<String, String> = [
            ("to", self.domain.as_str()),
            ("version", "1.0"),
            ("xmlns", ns::JABBER_CLIENT),
            ("xmlns:stream", ns::STREAM),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        self.stream.send(Packet::StreamStart(attrs)).await?;
        self.arm_deadline();

        let stream_attrs = loop {
            match self.next_packet().await? {
                Packet::StreamStart(attrs) => break attrs,
                Packet::Text(_) => (),
                Packet::Stanza(elem) => {
                    return Err(stream_error(&elem)
                        .unwrap_or(ProtocolError::InvalidStreamStart)
                        .into())
                }
                Packet::StreamEnd => return Err(Error::Disconnected),
            }
        };
        match stream_attrs.get("xmlns") {
            Some(xmlns) if xmlns == ns::JABBER_CLIENT => (),
            _ => return Err(ProtocolError::NoStreamNamespace.into()),
        }
        let id = stream_attrs
            .get("id")
            .ok_or(ProtocolError::NoStreamId)?
            .clone();
        debug!("Stream {} opened to {}", id, self.domain);
        self.id = Some(id);

        let features = self.next_element().await?;
        self.features = StreamFeatures::try_from(features)
            .map_err(|_| ProtocolError::NoStreamFeatures)?;
        trace!("Stream features: {:?}", self.features);
        if self.features.starttls_required {
            return Err(ProtocolError::NoTls.into());
        }
        Ok(())
    }

    /// Re-run `start()` on the same transport, as needed after
    /// authentication
    pub async fn restart(&mut self) -> Result<(), Error> {
        self.id = None;
        self.features = StreamFeatures::default();
        self.start().await
    }

    /// Sends a single top-level element
    pub async fn send_element(&mut self, elem: Element) -> Result<(), Error> {
        self.stream.send(Packet::Stanza(elem)).await?;
        self.arm_deadline();
        Ok(())
    }

    /// The server must answer what was just sent within the response timeout.
    fn arm_deadline(&mut self) {
        self.deadline = Instant::now() + self.response_timeout;
    }

    async fn next_packet(&mut self) -> Result<Packet, Error> {
        match timeout_at(self.deadline, self.stream.next()).await {
            Err(_) => Err(Error::Timeout),
            Ok(None) => Err(Error::Disconnected),
            Ok(Some(result)) => Ok(result?),
        }
    }

    /// Waits for the next top-level element, skipping whitespace
    pub async fn next_element(&mut self) -> Result<Element, Error> {
        loop {
            match self.next_packet().await? {
                Packet::Stanza(elem) => {
                    if let Some(error) = stream_error(&elem) {
                        return Err(error.into());
                    }
                    return Ok(elem);
                }
                Packet::Text(_) => (),
                Packet::StreamStart(_) => return Err(ProtocolError::InvalidStreamStart.into()),
                Packet::StreamEnd => return Err(Error::Disconnected),
            }
        }
    }

    /// Waits for the answer to the iq request `id`, keeping anything else
    /// received meanwhile for later dispatch
    pub async fn wait_for_iq(&mut self, id: &str) -> Result<Iq, Error> {
        loop {
            let elem = self.next_element().await?;
            if elem.is("iq", ns::JABBER_CLIENT)
                && elem.attr("id") == Some(id)
                && matches!(elem.attr("type"), Some("result" | "error"))
            {
                return Ok(Iq::try_from(elem)?);
            }
            if self.pending.len() >= MAX_PENDING {
                return Err(ProtocolError::TooManyPending.into());
            }
            trace!("Keeping {} for dispatch", elem.name());
            self.pending.push_back(elem);
        }
    }

    /// Sends the end tag and closes the transport, within
    /// [`LOCAL_SHUTDOWN_TIMEOUT`]; errors are only logged
    pub async fn close(&mut self) {
        let stream = &mut self.stream;
        let result = timeout(LOCAL_SHUTDOWN_TIMEOUT, async {
            stream.send(Packet::StreamEnd).await?;
            stream.close().await
        })
        .await;
        match result {
            Ok(Ok(())) => debug!("Stream closed"),
            Ok(Err(e)) => debug!("Error while closing the stream: {}", e),
            Err(_) => debug!("Stream did not close in time, dropping it"),
        }
    }

    /// Unwraps the transport and the stanzas kept for dispatch
    pub fn into_parts(self) -> (T, VecDeque<Element>) {
        (self.stream, self.pending)
    }
}
