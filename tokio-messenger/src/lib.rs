//! Low-level [XMPP](https://xmpp.org/) session core with asynchronous I/O using [tokio](https://tokio.rs/), for services which authenticate with an OAuth2 access token.
//!
//! For an easier, batteries-included experience, try the [messenger crate](https://docs.rs/messenger).
//!
//! # Getting started
//!
//! A [`Session`] is created from a [`SessionConfig`], which carries the SASL
//! mechanism to use, and a [`DispatchRouter`], which carries the handlers for
//! incoming stanzas. Calling [`Session::connect`] with a
//! [`connect::ServerConnector`] and a [`proto::StanzaCodec`] then walks the
//! session through authentication, resource binding and roster loading. Once
//! it returns, stanzas are routed to the handlers in arrival order and
//! messages can be sent from any clone of the session.
//!
//! # Scope
//!
//! The byte-level XML codec is not part of this crate: any codec producing
//! [`proto::Packet`]s can be plugged in. TLS is the connector's business.
//!
//! Supported transports:
//! - [x] Plaintext TCP (IPv4/IPv6, with SRV resolution and
//!   [happy eyeballs](https://en.wikipedia.org/wiki/Happy_Eyeballs) support)
//! - [x] Custom connectors via the [`connect::ServerConnector`] trait

#![deny(unsafe_code, missing_docs, bare_trait_objects)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod connect;
pub mod dispatch;
pub mod ns;
pub mod proto;
pub mod roster;
mod session;
pub mod stanza;

pub use dispatch::{Context, DispatchRouter, Handler, HandlerError, StanzaKind};
pub use roster::{RosterCache, RosterChange, RosterEntry, Subscription};
pub use session::{Session, SessionConfig, SessionState, Timeouts};
pub use stanza::InboundStanza;

/// Detailed error types
pub mod error;

#[doc(inline)]
/// Generic tokio_messenger Error
pub use crate::error::Error;

// Re-exports
pub use jid;
pub use messenger_sasl as sasl;
pub use minidom;
