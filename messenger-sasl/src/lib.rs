// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! This crate provides the client side of token-based SASL authentication,
//! as used by XMPP services which accept an OAuth2 access token instead of a
//! password.
//!
//! A [`Mechanism`][`client::Mechanism`] produces the bytes for each step of
//! the exchange, and a [`Negotiator`][`client::Negotiator`] drives it,
//! enforcing that only one challenge is ever pending and turning every
//! outcome into a [`Step`][`client::Step`].
//!
//! # Example
//!
//! ```rust
//! use messenger_sasl::client::mechanisms::MessengerOAuth2;
//! use messenger_sasl::client::{Mechanism, Negotiator, Step};
//! use messenger_sasl::common::Credentials;
//!
//! let creds = Credentials::default().with_token("EwA4Aq1DBAAUGCCXc8wU");
//! let mechanism = MessengerOAuth2::from_credentials(creds).unwrap();
//! let mut negotiator = Negotiator::new(mechanism);
//!
//! assert_eq!(negotiator.mechanism_name(), "X-MESSENGER-OAUTH2");
//! let initial = negotiator.start().unwrap();
//! assert_eq!(initial, b"EwA4Aq1DBAAUGCCXc8wU");
//! assert_eq!(negotiator.success(b""), Step::Done);
//! ```

extern crate alloc;

pub mod client;
pub mod common;
