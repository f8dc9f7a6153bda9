// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tokio::sync::mpsc::UnboundedSender;
use tokio_messenger::{Context, HandlerError, InboundStanza};

use crate::Event;

/// Translate a `Presence` stanza into an [`Event::Presence`].
///
/// Every presence with a sender is reported, whatever its type; senders
/// missing from the roster get no name.
pub fn handle_presence(
    events: &UnboundedSender<Event>,
    stanza: &InboundStanza,
    context: &Context<'_>,
) -> Result<(), HandlerError> {
    let InboundStanza::Presence(presence) = stanza else {
        return Ok(());
    };
    let Some(from) = presence.from.clone() else {
        debug!("Ignoring presence without sender: {:?}", presence);
        return Ok(());
    };
    let name = context.contact_name(&from).map(String::from);
    events
        .send(Event::Presence(from, name, presence.clone()))
        .map_err(|_| HandlerError::new("event receiver dropped"))
}
