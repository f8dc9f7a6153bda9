// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Routing of incoming stanzas to the handlers registered for their kind.
//!
//! The router is assembled before the session connects and does not change
//! afterwards. Handlers of one kind run in registration order, each exactly
//! once per stanza; an error or a panic in one handler is reported to the
//! [`ErrorSink`] and does not keep the others from running.
//!
//! Roster observers see every change a roster push applies, before the
//! handlers for the push run. Registering one does not count as handling
//! iq stanzas.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::warn;

use crate::jid::Jid;
use crate::roster::{RosterCache, RosterChange};
use crate::stanza::InboundStanza;

/// The three stanza kinds handlers can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaKind {
    /// `<message/>`
    Message,
    /// `<presence/>`
    Presence,
    /// `<iq/>`
    Iq,
}

impl fmt::Display for StanzaKind {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match self {
            StanzaKind::Message => "message",
            StanzaKind::Presence => "presence",
            StanzaKind::Iq => "iq",
        })
    }
}

/// Failure of a single handler invocation.
#[derive(Debug)]
pub enum HandlerError {
    /// The handler returned an error.
    Failed(Box<dyn StdError + Send + Sync>),
    /// The handler panicked; this is the panic message.
    Panicked(String),
}

impl HandlerError {
    /// Wraps any error, or a plain message.
    pub fn new<E: Into<Box<dyn StdError + Send + Sync>>>(error: E) -> HandlerError {
        HandlerError::Failed(error.into())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HandlerError::Failed(e) => write!(fmt, "handler failed: {}", e),
            HandlerError::Panicked(message) => write!(fmt, "handler panicked: {}", message),
        }
    }
}

impl StdError for HandlerError {}

/// What handlers get to see besides the stanza itself.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    roster: &'a RosterCache,
    roster_changes: &'a [RosterChange],
}

impl<'a> Context<'a> {
    /// Creates a context over a roster, with the changes the current stanza
    /// made to it.
    pub fn new(roster: &'a RosterCache, roster_changes: &'a [RosterChange]) -> Context<'a> {
        Context {
            roster,
            roster_changes,
        }
    }

    /// The roster, already updated if the current stanza is a roster push.
    pub fn roster(&self) -> &'a RosterCache {
        self.roster
    }

    /// The changes a roster push just applied; empty for other stanzas.
    pub fn roster_changes(&self) -> &'a [RosterChange] {
        self.roster_changes
    }

    /// The roster name of the bare JID of `jid`.
    pub fn contact_name(&self, jid: &Jid) -> Option<&'a str> {
        self.roster.name_of(&jid.to_bare())
    }
}

/// A handler for incoming stanzas.
///
/// Closures with the matching signature are handlers too; use
/// [`DispatchRouter::register`] for them.
pub trait Handler: Send + Sync + 'static {
    /// Handles one stanza.
    fn handle(&self, stanza: &InboundStanza, context: &Context<'_>) -> Result<(), HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&InboundStanza, &Context<'_>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    fn handle(&self, stanza: &InboundStanza, context: &Context<'_>) -> Result<(), HandlerError> {
        self(stanza, context)
    }
}

/// Where handler failures end up.
pub trait ErrorSink: Send + Sync + 'static {
    /// Reports that the `index`th handler registered for `kind` failed.
    fn report(&self, kind: StanzaKind, index: usize, error: &HandlerError);
}

/// The default sink, logging every failure as a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, kind: StanzaKind, index: usize, error: &HandlerError) {
        warn!("{} handler #{} failed: {}", kind, index, error);
    }
}

impl<F> ErrorSink for F
where
    F: Fn(StanzaKind, usize, &HandlerError) + Send + Sync + 'static,
{
    fn report(&self, kind: StanzaKind, index: usize, error: &HandlerError) {
        self(kind, index, error)
    }
}

/// How a stanza went through the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteOutcome {
    /// Handlers that ran.
    pub invoked: usize,
    /// Handlers among them that failed.
    pub failed: usize,
}

type RosterObserver = Box<dyn Fn(&RosterChange) + Send + Sync>;

/// Per-kind ordered lists of handlers.
pub struct DispatchRouter {
    handlers: HashMap<StanzaKind, Vec<Box<dyn Handler>>>,
    observers: Vec<RosterObserver>,
    sink: Box<dyn ErrorSink>,
}

impl fmt::Debug for DispatchRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<_, _> = self.handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("DispatchRouter")
            .field("handlers", &counts)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl Default for DispatchRouter {
    fn default() -> DispatchRouter {
        DispatchRouter::new()
    }
}

impl DispatchRouter {
    /// Creates a router without handlers, logging failures.
    pub fn new() -> DispatchRouter {
        DispatchRouter {
            handlers: HashMap::new(),
            observers: Vec::new(),
            sink: Box::new(LogSink),
        }
    }

    /// Replaces the sink handler failures are reported to.
    pub fn with_error_sink<S: ErrorSink>(mut self, sink: S) -> DispatchRouter {
        self.sink = Box::new(sink);
        self
    }

    /// Appends a closure to the handlers of `kind`.
    pub fn register<F>(&mut self, kind: StanzaKind, handler: F) -> &mut DispatchRouter
    where
        F: Fn(&InboundStanza, &Context<'_>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register_handler(kind, handler)
    }

    /// Appends a [`Handler`] to the handlers of `kind`.
    pub fn register_handler<H: Handler>(
        &mut self,
        kind: StanzaKind,
        handler: H,
    ) -> &mut DispatchRouter {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
        self
    }

    /// Calls `observer` with every roster change, in order.
    pub fn on_roster_change<F>(&mut self, observer: F) -> &mut DispatchRouter
    where
        F: Fn(&RosterChange) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
        self
    }

    /// Whether anything is registered for `kind`.
    pub fn has_handlers(&self, kind: StanzaKind) -> bool {
        self.handlers.get(&kind).is_some_and(|list| !list.is_empty())
    }

    /// Runs every handler registered for the stanza's kind, in order.
    pub fn route(&self, stanza: &InboundStanza, context: &Context<'_>) -> RouteOutcome {
        for change in context.roster_changes() {
            for (index, observer) in self.observers.iter().enumerate() {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| observer(change))) {
                    warn!(
                        "Roster observer #{} panicked: {}",
                        index,
                        panic_message(&*payload)
                    );
                }
            }
        }
        let kind = stanza.kind();
        let mut outcome = RouteOutcome::default();
        let Some(handlers) = self.handlers.get(&kind) else {
            return outcome;
        };
        for (index, handler) in handlers.iter().enumerate() {
            outcome.invoked += 1;
            let result = catch_unwind(AssertUnwindSafe(|| handler.handle(stanza, context)))
                .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(&*payload))));
            if let Err(error) = result {
                outcome.failed += 1;
                self.sink.report(kind, index, &error);
            }
        }
        outcome
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        String::from(*message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("<non-string panic payload>")
    }
}
