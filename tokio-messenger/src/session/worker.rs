// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use futures::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, trace, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::dispatch::{Context, DispatchRouter, StanzaKind};
use crate::error::{Error, ParseError, ProtocolError};
use crate::minidom::Element;
use crate::ns;
use crate::proto::xmpp_stream::{stream_error, LOCAL_SHUTDOWN_TIMEOUT};
use crate::proto::Packet;
use crate::roster::RosterQuery;
use crate::stanza::{InboundStanza, Iq, IqType};

use super::{read_lock, write_lock, Inner};

pub(super) enum WriteRequest {
    /// Write one packet and report how it went.
    Send {
        packet: Packet,
        done: oneshot::Sender<io::Result<()>>,
    },

    /// Send the stream footer, close the transport and stop.
    Close { done: oneshot::Sender<()> },
}

/// Spawns the single task writing to `sink`.
///
/// Requests are written one at a time in queue order. The task stops after
/// a close request or once every sender is gone, closing the stream either
/// way.
pub(super) fn spawn_writer<W>(mut sink: W, depth: usize) -> mpsc::Sender<WriteRequest>
where
    W: Sink<Packet, Error = io::Error> + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel(depth.max(1));
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            match request {
                WriteRequest::Send { packet, done } => {
                    let result = sink.send(packet).await;
                    if let Err(e) = &result {
                        debug!("Write failed: {}", e);
                    }
                    // The sender may have given up waiting.
                    let _ = done.send(result);
                }
                WriteRequest::Close { done } => {
                    close_sink(&mut sink).await;
                    let _ = done.send(());
                    return;
                }
            }
        }
        close_sink(&mut sink).await;
    });
    tx
}

async fn close_sink<W>(sink: &mut W)
where
    W: Sink<Packet, Error = io::Error> + Unpin,
{
    let result = timeout(LOCAL_SHUTDOWN_TIMEOUT, async {
        sink.send(Packet::StreamEnd).await?;
        sink.close().await
    })
    .await;
    match result {
        Ok(Ok(())) => debug!("Stream closed"),
        Ok(Err(e)) => debug!("Error while closing the stream: {}", e),
        Err(_) => debug!("Stream did not close in time, dropping it"),
    }
}

/// Asks the writer to close the stream and waits until it did.
pub(super) async fn close_writer(writer: &mpsc::Sender<WriteRequest>) {
    let (done, closed) = oneshot::channel();
    if writer.send(WriteRequest::Close { done }).await.is_ok() {
        let _ = closed.await;
    }
}

struct Receiver<'a> {
    inner: &'a Inner,
    router: &'a DispatchRouter,
}

impl Receiver<'_> {
    /// A roster push is a set of the roster query from the server itself.
    fn roster_push(&self, iq: &Iq) -> Option<Result<RosterQuery, ParseError>> {
        let IqType::Set(payload) = &iq.payload else {
            return None;
        };
        if !payload.is("query", ns::ROSTER) {
            return None;
        }
        if let Some(from) = &iq.from {
            let own = self.inner.bound_jid.get().map(|jid| jid.to_bare());
            if own.as_ref() != Some(&from.to_bare()) {
                warn!("Ignoring roster push from {}", from);
                return None;
            }
        }
        Some(RosterQuery::try_from(payload.clone()))
    }

    async fn process(&self, elem: Element) -> Result<(), Error> {
        if let Some(error) = stream_error(&elem) {
            return Err(error.into());
        }
        let stanza = match InboundStanza::try_from(elem) {
            Ok(stanza) => stanza,
            Err(ParseError::Mismatch(elem)) => {
                debug!("Ignoring unknown element {{{}}}{}", elem.ns(), elem.name());
                return Ok(());
            }
            Err(e) => {
                warn!("Ignoring malformed stanza: {}", e);
                return Ok(());
            }
        };

        let mut changes = Vec::new();
        let mut reply = None;
        if let InboundStanza::Iq(iq) = &stanza {
            match self.roster_push(iq) {
                Some(Ok(query)) => {
                    changes = write_lock(&self.inner.roster).apply(query);
                    reply = Some(Iq::from_result(iq.id.clone(), None));
                }
                Some(Err(e)) => {
                    warn!("Malformed roster push: {}", e);
                    reply = Some(iq.error_reply("modify", "bad-request"));
                }
                None if iq.is_request() && !self.router.has_handlers(StanzaKind::Iq) => {
                    reply = Some(iq.service_unavailable());
                }
                None => (),
            }
        }
        for change in &changes {
            trace!("Roster change: {:?}", change);
        }

        let outcome = {
            let roster = read_lock(&self.inner.roster);
            self.router
                .route(&stanza, &Context::new(&roster, &changes))
        };
        trace!(
            "{} routed to {} handlers, {} failed",
            stanza.kind(),
            outcome.invoked,
            outcome.failed
        );

        if let Some(reply) = reply {
            if let Err(e) = self.inner.write(reply.into()).await {
                debug!("Could not answer iq {:?}: {}", stanza.id(), e);
            }
        }
        Ok(())
    }
}

/// Reads until the stream ends, routing every stanza once.
///
/// Stanzas kept during negotiation go first. A stream error, the stream
/// footer or a transport error closes the session with that reason.
pub(super) async fn receive_loop<S>(
    inner: Arc<Inner>,
    mut source: S,
    pending: VecDeque<Element>,
    router: DispatchRouter,
) where
    S: Stream<Item = Result<Packet, io::Error>> + Unpin + Send,
{
    let receiver = Receiver {
        inner: &inner,
        router: &router,
    };
    let result: Result<(), Error> = async {
        for elem in pending {
            receiver.process(elem).await?;
        }
        loop {
            let packet = tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => return Ok(()),
                packet = source.next() => packet,
            };
            match packet {
                Some(Ok(Packet::Stanza(elem))) => receiver.process(elem).await?,
                Some(Ok(Packet::Text(_))) => trace!("Received whitespace keepalive"),
                Some(Ok(Packet::StreamStart(_))) => {
                    return Err(ProtocolError::InvalidStreamStart.into())
                }
                Some(Ok(Packet::StreamEnd)) | None => return Err(Error::Disconnected),
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
    .await;

    match result {
        Ok(()) => trace!("Receive loop stopped"),
        Err(e) => inner.shutdown(Some(e)).await,
    }
}
