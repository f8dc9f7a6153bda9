// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The session state machine.
//!
//! ```text
//! Disconnected -> Connecting -> Authenticating -> Binding -> RosterLoading -> Ready
//!       \              \               \              \             \           \
//!        `--------------`---------------`--------------`-------------`-----------`--> Closed
//! ```
//!
//! Negotiation runs inside [`Session::connect`]. Once ready, two tasks own
//! the transport: the writer, fed through a bounded queue so concurrent
//! sends never interleave on the wire, and the receiver, which keeps the
//! roster in sync and routes every stanza.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::sync::{RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use messenger_sasl::client::mechanisms::MessengerOAuth2;
use messenger_sasl::client::{MechanismError, Negotiator};
use messenger_sasl::common::Token;

use crate::connect::ServerConnector;
use crate::dispatch::DispatchRouter;
use crate::error::Error;
use crate::jid::{BareJid, FullJid, Jid};
use crate::minidom::Element;
use crate::proto::{Packet, PacketStream, StanzaCodec, XmppStream};
use crate::roster::{RosterCache, RosterEntry, RosterQuery};
use crate::stanza::{make_id, Message, Presence};

mod bind;
mod login;
mod roster;
#[cfg(test)]
mod tests;
mod worker;

use worker::WriteRequest;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock<T>(rwlock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rwlock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(rwlock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rwlock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, `connect` not called yet.
    Disconnected,
    /// Opening the transport and the stream.
    Connecting,
    /// Running the SASL exchange.
    Authenticating,
    /// Binding a resource.
    Binding,
    /// Fetching the roster.
    RosterLoading,
    /// Stanzas flow both ways.
    Ready,
    /// Terminal; a session is never reused.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, fmt)
    }
}

/// Deadlines applied while connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// How long opening the transport may take.
    pub connect: Duration,
    /// How long the server may take to answer any single request.
    pub response: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::new(30, 0),
            response: Duration::new(60, 0),
        }
    }
}

impl Timeouts {
    /// Tight timeouts suitable for communicating on a fast LAN or localhost.
    pub fn tight() -> Self {
        Self {
            connect: Duration::new(5, 0),
            response: Duration::new(5, 0),
        }
    }
}

/// Everything a session needs besides its handlers.
#[derive(Debug)]
pub struct SessionConfig {
    domain: String,
    resource: Option<String>,
    timeouts: Timeouts,
    queue_depth: usize,
    negotiator: Negotiator,
}

impl SessionConfig {
    /// Depth of the outbound queue unless configured otherwise.
    pub const DEFAULT_QUEUE_DEPTH: usize = 64;

    /// Creates a configuration authenticating with `negotiator` to `domain`.
    pub fn new<D: Into<String>>(domain: D, negotiator: Negotiator) -> SessionConfig {
        SessionConfig {
            domain: domain.into(),
            resource: None,
            timeouts: Timeouts::default(),
            queue_depth: Self::DEFAULT_QUEUE_DEPTH,
            negotiator,
        }
    }

    /// Creates a configuration authenticating with `X-MESSENGER-OAUTH2`.
    pub fn with_token<D: Into<String>, T: Into<Token>>(
        domain: D,
        token: T,
    ) -> Result<SessionConfig, MechanismError> {
        let mechanism = MessengerOAuth2::new(token)?;
        Ok(SessionConfig::new(domain, Negotiator::new(mechanism)))
    }

    /// Asks the server for this resource when binding.
    pub fn set_resource<R: Into<String>>(mut self, resource: R) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Replaces the default timeouts.
    pub fn set_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets how many outbound stanzas may wait for the writer.
    pub fn set_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }
}

struct Online {
    jid: FullJid,
    roster: RosterQuery,
}

pub(crate) struct Inner {
    domain: String,
    resource: Option<String>,
    timeouts: Timeouts,
    queue_depth: usize,
    negotiator: Mutex<Option<Negotiator>>,
    router: Mutex<Option<DispatchRouter>>,
    state: watch::Sender<SessionState>,
    bound_jid: OnceLock<FullJid>,
    roster: RwLock<RosterCache>,
    writer: Mutex<Option<mpsc::Sender<WriteRequest>>>,
    cancel: CancellationToken,
    closing: AtomicBool,
    close_reason: Mutex<Option<Error>>,
}

impl Inner {
    /// Moves to `next` unless the session is closing.
    fn advance(&self, next: SessionState) -> bool {
        let advanced = self.state.send_if_modified(|state| {
            if *state == SessionState::Closed || self.closing.load(Ordering::SeqCst) {
                false
            } else {
                *state = next;
                true
            }
        });
        if advanced {
            debug!("Session {}", next);
        }
        advanced
    }

    /// Marks the session closed when no writer was ever installed.
    fn mark_closed(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        self.state.send_replace(SessionState::Closed);
    }

    /// Closes the session once; later calls return immediately.
    async fn shutdown(&self, reason: Option<Error>) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(reason) = reason {
            warn!("Session lost: {}", reason);
            *lock(&self.close_reason) = Some(reason);
        }
        self.cancel.cancel();
        let writer = lock(&self.writer).take();
        if let Some(writer) = writer {
            worker::close_writer(&writer).await;
        }
        self.state.send_replace(SessionState::Closed);
        debug!("Session {}", SessionState::Closed);
    }

    /// Queues an element and waits until it was written.
    async fn write(&self, elem: Element) -> Result<(), Error> {
        let writer = lock(&self.writer).clone().ok_or(Error::NotConnected)?;
        let (done, written) = tokio::sync::oneshot::channel();
        writer
            .send(WriteRequest::Send {
                packet: Packet::Stanza(elem),
                done,
            })
            .await
            .map_err(|_| Error::NotConnected)?;
        written.await.map_err(|_| Error::NotConnected)??;
        Ok(())
    }
}

/// A client session with an XMPP server.
///
/// Clones share the same session. Call [`Session::close`] when done: the
/// background tasks keep it alive until then or until the server closes the
/// stream.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("domain", &self.inner.domain)
            .field("state", &self.state())
            .field("bound_jid", &self.bound_jid())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a disconnected session.
    ///
    /// The router is fixed from here on.
    pub fn new(config: SessionConfig, router: DispatchRouter) -> Session {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Session {
            inner: Arc::new(Inner {
                domain: config.domain,
                resource: config.resource,
                timeouts: config.timeouts,
                queue_depth: config.queue_depth,
                negotiator: Mutex::new(Some(config.negotiator)),
                router: Mutex::new(Some(router)),
                state,
                bound_jid: OnceLock::new(),
                roster: RwLock::new(RosterCache::new()),
                writer: Mutex::new(None),
                cancel: CancellationToken::new(),
                closing: AtomicBool::new(false),
                close_reason: Mutex::new(None),
            }),
        }
    }

    /// Connects, authenticates, binds and loads the roster.
    ///
    /// Returns once the session is `Ready`. On failure the transport is
    /// released and the session is `Closed`; a session connects only once.
    pub async fn connect<C: ServerConnector, K: StanzaCodec>(
        &self,
        connector: C,
        codec: K,
    ) -> Result<(), Error> {
        let inner = &self.inner;
        let started = inner.state.send_if_modified(|state| {
            if *state == SessionState::Disconnected {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(Error::InvalidState);
        }
        let negotiator = lock(&inner.negotiator).take();
        let router = lock(&inner.router).take();
        let (Some(negotiator), Some(router)) = (negotiator, router) else {
            inner.mark_closed();
            return Err(Error::InvalidState);
        };

        debug!("Connecting to {} through {:?}", inner.domain, connector);
        let mut slot = None;
        let result = tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => Err(Error::Closed),
            result = self.negotiate(&mut slot, connector, codec, negotiator) => result,
        };
        let online = match result {
            Ok(online) => online,
            Err(e) => {
                if let Some(mut stream) = slot.take() {
                    stream.close().await;
                }
                inner.mark_closed();
                return Err(e);
            }
        };
        let Some(stream) = slot else {
            inner.mark_closed();
            return Err(Error::InvalidState);
        };
        self.go_online(stream, online, router).await
    }

    async fn negotiate<C: ServerConnector, K: StanzaCodec>(
        &self,
        slot: &mut Option<XmppStream<Framed<C::Stream, K>>>,
        connector: C,
        codec: K,
        mut negotiator: Negotiator,
    ) -> Result<Online, Error> {
        let inner = &self.inner;
        let transport = timeout(inner.timeouts.connect, connector.connect())
            .await
            .map_err(|_| Error::Timeout)??;
        let stream = slot.insert(XmppStream::new(
            Framed::new(transport, codec),
            inner.domain.clone(),
            inner.timeouts.response,
        ));
        stream.start().await?;

        inner.advance(SessionState::Authenticating);
        login::auth(stream, &mut negotiator).await?;
        stream.restart().await?;

        inner.advance(SessionState::Binding);
        let jid = bind::bind(stream, inner.resource.as_deref()).await?;
        bind::establish_session(stream).await?;

        inner.advance(SessionState::RosterLoading);
        let roster = roster::load(stream).await?;
        Ok(Online { jid, roster })
    }

    async fn go_online<T: PacketStream>(
        &self,
        stream: XmppStream<T>,
        online: Online,
        router: DispatchRouter,
    ) -> Result<(), Error> {
        let inner = &self.inner;
        let stream_id = stream.id.clone().unwrap_or_default();
        let (transport, pending) = stream.into_parts();
        let (sink, source) = transport.split::<Packet>();
        let writer = worker::spawn_writer(sink, inner.queue_depth);

        write_lock(&inner.roster).load(online.roster);
        // Set once: a session connects only once.
        let _ = inner.bound_jid.set(online.jid.clone());

        let installed = {
            let mut slot = lock(&inner.writer);
            if inner.cancel.is_cancelled() {
                false
            } else {
                *slot = Some(writer.clone());
                true
            }
        };
        if !installed || !inner.advance(SessionState::Ready) {
            worker::close_writer(&writer).await;
            inner.mark_closed();
            return Err(Error::Closed);
        }
        debug!("Session ready as {} on stream {}", online.jid, stream_id);

        tokio::spawn(worker::receive_loop(
            self.inner.clone(),
            source,
            pending,
            router,
        ));
        Ok(())
    }

    /// The current state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Watches state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// The full JID the server bound, once past `Binding`.
    pub fn bound_jid(&self) -> Option<&FullJid> {
        self.inner.bound_jid.get()
    }

    /// The bare JID of the account, once past `Binding`.
    pub fn local_jid(&self) -> Option<BareJid> {
        self.bound_jid().map(|jid| jid.to_bare())
    }

    /// Looks a contact up in the roster.
    pub fn roster_entry(&self, jid: &BareJid) -> Option<RosterEntry> {
        read_lock(&self.inner.roster).entry(jid).cloned()
    }

    /// A copy of the whole roster.
    pub fn roster_snapshot(&self) -> RosterCache {
        read_lock(&self.inner.roster).clone()
    }

    fn ensure_ready(&self) -> Result<(), Error> {
        match self.state() {
            SessionState::Ready => Ok(()),
            _ => Err(Error::NotConnected),
        }
    }

    /// Sends a chat message.
    pub async fn send_message(&self, to: Jid, text: &str) -> Result<(), Error> {
        self.ensure_ready()?;
        self.inner.write(Message::chat(to, text).into()).await
    }

    /// Sends a presence.
    pub async fn send_presence(&self, presence: Presence) -> Result<(), Error> {
        self.ensure_ready()?;
        self.inner.write(presence.into()).await
    }

    /// Sends any top-level element, giving stanzas an id if they lack one.
    pub async fn send_stanza(&self, mut stanza: Element) -> Result<(), Error> {
        self.ensure_ready()?;
        if ["iq", "message", "presence"]
            .iter()
            .any(|name| stanza.is(*name, crate::ns::JABBER_CLIENT))
            && stanza.attr("id").is_none()
        {
            stanza.set_attr("id", make_id());
        }
        self.inner.write(stanza).await
    }

    /// Closes the stream, from any state; returns once `Closed`.
    ///
    /// Calling it again is a no-op.
    pub async fn close(&self) {
        self.inner.shutdown(None).await;
        let mut state = self.subscribe();
        let _ = state
            .wait_for(|state| *state == SessionState::Closed)
            .await;
    }

    /// Waits until the session is `Closed`, returning why if the server or
    /// the transport caused it. The reason is handed out only once.
    pub async fn wait_closed(&self) -> Option<Error> {
        let mut state = self.subscribe();
        let _ = state
            .wait_for(|state| *state == SessionState::Closed)
            .await;
        lock(&self.inner.close_reason).take()
    }
}
