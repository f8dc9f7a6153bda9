// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A batteries-included client for messaging services speaking XMPP behind
//! an OAuth2 access token.
//!
//! ```no_run
//! # async fn run<K: messenger::tokio_messenger::proto::StanzaCodec>(codec: K) -> Result<(), messenger::Error> {
//! use messenger::{ClientBuilder, Event};
//!
//! let mut client = ClientBuilder::new("EwBAAq1DBAAU...").build(codec)?;
//! client.log_in().await?;
//! loop {
//!     let events = client.wait_for_events().await;
//!     if events.is_empty() {
//!         break;
//!     }
//!     for event in events {
//!         if let Event::ChatMessage(from, name, body) = event {
//!             println!("{} ({:?}): {}", from, name, body);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![deny(bare_trait_objects)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use tokio_messenger;
pub use tokio_messenger::jid;
pub use tokio_messenger::minidom;

#[macro_use]
extern crate log;

pub mod builder;
pub mod client;
pub mod event;
mod event_loop;
pub mod message;
pub mod presence;
mod roster;

pub use builder::ClientBuilder;
pub use client::MessengerClient;
pub use event::Event;

pub type Error = tokio_messenger::Error;

/// Service domain the account lives on.
pub const DEFAULT_SERVICE: &str = "messenger.live.com";

/// Host accepting client connections for [`DEFAULT_SERVICE`].
pub const DEFAULT_HOST: &str = "xmpp.messenger.live.com";

/// Port of [`DEFAULT_HOST`].
pub const DEFAULT_PORT: u16 = 5222;

#[cfg(test)]
mod tests {
    #[test]
    fn reexports() {
        #[allow(unused_imports)]
        use crate::jid;
        #[allow(unused_imports)]
        use crate::minidom;
        #[allow(unused_imports)]
        use crate::tokio_messenger;
    }
}
