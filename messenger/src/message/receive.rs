// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tokio::sync::mpsc::UnboundedSender;
use tokio_messenger::stanza::MessageType;
use tokio_messenger::{Context, HandlerError, InboundStanza};

use crate::Event;

/// Translate a chat message into an [`Event::ChatMessage`].
///
/// Only `type='chat'` messages with a body count; typing notifications and
/// other bodiless messages are dropped here.
pub fn handle_message(
    events: &UnboundedSender<Event>,
    stanza: &InboundStanza,
    context: &Context<'_>,
) -> Result<(), HandlerError> {
    let InboundStanza::Message(message) = stanza else {
        return Ok(());
    };
    if message.type_ != MessageType::Chat {
        trace!("Ignoring {:?} message", message.type_);
        return Ok(());
    }
    let (Some(from), Some(body)) = (&message.from, &message.body) else {
        debug!("Received chat message without sender or body:\n{:#?}", message);
        return Ok(());
    };
    let name = context.contact_name(from).map(String::from);
    events
        .send(Event::ChatMessage(from.clone(), name, body.clone()))
        .map_err(|_| HandlerError::new("event receiver dropped"))
}
