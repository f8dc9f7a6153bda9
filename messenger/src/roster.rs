// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tokio::sync::mpsc::UnboundedSender;
use tokio_messenger::roster::RosterChange;

use crate::Event;

/// Translate a roster change into the matching contact `Event`.
pub(crate) fn handle_change(events: &UnboundedSender<Event>, change: &RosterChange) {
    let event = match change.clone() {
        RosterChange::Added(entry) => Event::ContactAdded(entry),
        RosterChange::Updated(entry) => Event::ContactChanged(entry),
        RosterChange::Removed(entry) => Event::ContactRemoved(entry),
    };
    if events.send(event).is_err() {
        trace!("Client gone, dropping roster change");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio_messenger::jid::BareJid;
    use tokio_messenger::roster::RosterEntry;

    #[test]
    fn changes_map_to_events() {
        let (tx, mut rx) = unbounded_channel();
        let bob = RosterEntry::new(BareJid::new("bob@example.com").unwrap());
        handle_change(&tx, &RosterChange::Added(bob.clone()));
        handle_change(&tx, &RosterChange::Updated(bob.clone().with_name("Bob")));
        handle_change(&tx, &RosterChange::Removed(bob.clone()));

        assert!(matches!(rx.try_recv(), Ok(Event::ContactAdded(e)) if e == bob));
        assert!(matches!(
            rx.try_recv(),
            Ok(Event::ContactChanged(e)) if e.name.as_deref() == Some("Bob")
        ));
        assert!(matches!(rx.try_recv(), Ok(Event::ContactRemoved(e)) if e == bob));
        assert!(rx.try_recv().is_err());
    }
}
