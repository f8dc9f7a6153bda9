// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tokio_messenger::stanza::Presence;

/// The available presence broadcast right after logging in.
pub fn make_initial_presence(status: Option<&str>) -> Presence {
    let presence = Presence::available();
    match status {
        Some(status) => presence.with_status(status),
        None => presence,
    }
}
