// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tokio_messenger::jid::Jid;
use tokio_messenger::roster::RosterEntry;
use tokio_messenger::stanza::Presence;

use crate::Error;

#[derive(Debug)]
pub enum Event {
    /// Logged in and available. Stanzas the server sent during the login may
    /// be reported before it.
    Online,
    /// The session is closed for good, for this reason. Nothing follows.
    Disconnected(Error),
    /// A presence was received.
    /// - The [`Jid`] is the sender, with its resource.
    /// - The name is the sender's roster name, if it is a contact.
    /// - The [`Presence`] is the stanza itself.
    Presence(Jid, Option<String>, Presence),
    /// A chat message with a body was received.
    /// - The [`Jid`] is the sender, with its resource.
    /// - The name is the sender's roster name, if it is a contact.
    /// - The [`String`] is the message body.
    ChatMessage(Jid, Option<String>, String),
    ContactAdded(RosterEntry),
    ContactChanged(RosterEntry),
    /// The contact as it was before its removal.
    ContactRemoved(RosterEntry),
}
