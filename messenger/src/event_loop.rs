// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tokio::sync::mpsc::UnboundedReceiver;

use crate::Event;

/// Wait for at least one event and take every other one already queued.
///
/// The handlers and the disconnect watcher hold the senders, so the channel
/// closes only after the session is gone.
pub(crate) async fn wait_for_events(receiver: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let Some(first) = receiver.recv().await else {
        return Vec::new();
    };
    let mut events = vec![first];
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
