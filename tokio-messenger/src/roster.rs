// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The local copy of the server-side contact list.
//!
//! The cache is filled once by the initial roster request and then kept in
//! sync by roster pushes. It never talks to the network itself.

use std::collections::HashMap;

use crate::error::ParseError;
use crate::jid::BareJid;
use crate::minidom::Element;
use crate::ns;

/// The subscription state of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subscription {
    /// Neither side sees the other's presence.
    #[default]
    None,
    /// The contact sees our presence.
    From,
    /// We see the contact's presence.
    To,
    /// Both sides see each other's presence.
    Both,
    /// Only found in pushes: the contact is gone.
    Remove,
}

impl Subscription {
    fn from_attr(value: Option<&str>) -> Result<Subscription, ParseError> {
        Ok(match value {
            None | Some("none") => Subscription::None,
            Some("from") => Subscription::From,
            Some("to") => Subscription::To,
            Some("both") => Subscription::Both,
            Some("remove") => Subscription::Remove,
            Some(_) => return Err(ParseError::Invalid("unknown roster subscription")),
        })
    }

    fn as_attr(self) -> Option<&'static str> {
        match self {
            Subscription::None => None,
            Subscription::From => Some("from"),
            Subscription::To => Some("to"),
            Subscription::Both => Some("both"),
            Subscription::Remove => Some("remove"),
        }
    }
}

/// One contact of the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Address of the contact.
    pub jid: BareJid,
    /// Display name chosen by the user.
    pub name: Option<String>,
    /// Subscription state.
    pub subscription: Subscription,
    /// Whether a subscription request is pending.
    pub ask: bool,
    /// Groups the contact belongs to.
    pub groups: Vec<String>,
}

impl RosterEntry {
    /// Creates an entry without name, subscription or groups.
    pub fn new(jid: BareJid) -> RosterEntry {
        RosterEntry {
            jid,
            name: None,
            subscription: Subscription::None,
            ask: false,
            groups: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> RosterEntry {
        self.name = Some(name.into());
        self
    }

    /// Sets the subscription state.
    pub fn with_subscription(mut self, subscription: Subscription) -> RosterEntry {
        self.subscription = subscription;
        self
    }
}

impl TryFrom<Element> for RosterEntry {
    type Error = ParseError;

    fn try_from(elem: Element) -> Result<RosterEntry, ParseError> {
        if !elem.is("item", ns::ROSTER) {
            return Err(ParseError::Mismatch(elem));
        }
        let Some(jid) = elem.attr("jid") else {
            return Err(ParseError::Invalid("roster item without jid"));
        };
        let groups = elem
            .children()
            .filter(|child| child.is("group", ns::ROSTER))
            .map(Element::text)
            .collect();
        Ok(RosterEntry {
            jid: BareJid::new(jid)?,
            name: elem.attr("name").map(String::from),
            subscription: Subscription::from_attr(elem.attr("subscription"))?,
            ask: elem.attr("ask") == Some("subscribe"),
            groups,
        })
    }
}

impl From<RosterEntry> for Element {
    fn from(entry: RosterEntry) -> Element {
        Element::builder("item", ns::ROSTER)
            .attr("jid", entry.jid.to_string())
            .attr("name", entry.name)
            .attr("subscription", entry.subscription.as_attr())
            .attr("ask", entry.ask.then_some("subscribe"))
            .append_all(
                entry
                    .groups
                    .into_iter()
                    .map(|group| Element::builder("group", ns::ROSTER).append(group)),
            )
            .build()
    }
}

/// The `jabber:iq:roster` query, in requests, results and pushes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterQuery {
    /// Roster version, when the server supports versioning.
    pub ver: Option<String>,
    /// The items.
    pub items: Vec<RosterEntry>,
}

impl TryFrom<Element> for RosterQuery {
    type Error = ParseError;

    fn try_from(elem: Element) -> Result<RosterQuery, ParseError> {
        if !elem.is("query", ns::ROSTER) {
            return Err(ParseError::Mismatch(elem));
        }
        let items = elem
            .children()
            .filter(|child| child.is("item", ns::ROSTER))
            .cloned()
            .map(RosterEntry::try_from)
            .collect::<Result<_, _>>()?;
        Ok(RosterQuery {
            ver: elem.attr("ver").map(String::from),
            items,
        })
    }
}

impl From<RosterQuery> for Element {
    fn from(query: RosterQuery) -> Element {
        Element::builder("query", ns::ROSTER)
            .attr("ver", query.ver)
            .append_all(query.items.into_iter().map(Element::from))
            .build()
    }
}

/// What a roster push did to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    /// A contact appeared.
    Added(RosterEntry),
    /// An existing contact changed; this is its new state.
    Updated(RosterEntry),
    /// A contact was removed; this was its last state.
    Removed(RosterEntry),
}

/// Bare JID keyed roster.
///
/// Every bare JID appears at most once, and entries with a `remove`
/// subscription are never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterCache {
    entries: HashMap<BareJid, RosterEntry>,
    version: Option<String>,
}

impl RosterCache {
    /// Creates an empty roster.
    pub fn new() -> RosterCache {
        RosterCache::default()
    }

    /// Looks a contact up.
    pub fn entry(&self, jid: &BareJid) -> Option<&RosterEntry> {
        self.entries.get(jid)
    }

    /// The display name of a contact, if it is known and has one.
    pub fn name_of(&self, jid: &BareJid) -> Option<&str> {
        self.entry(jid)?.name.as_deref()
    }

    /// Number of contacts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the roster has no contacts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the contacts, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.values()
    }

    /// The roster version last received.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Replaces the whole content with the result of a roster request.
    pub fn load(&mut self, query: RosterQuery) {
        self.entries = query
            .items
            .into_iter()
            .filter(|item| item.subscription != Subscription::Remove)
            .map(|item| (item.jid.clone(), item))
            .collect();
        self.version = query.ver;
    }

    /// Applies one pushed item: insert, replace, or remove.
    ///
    /// Returns `None` when the push changed nothing, e.g. removing an
    /// unknown contact or re-sending an identical item.
    pub fn apply_push(&mut self, item: RosterEntry) -> Option<RosterChange> {
        if item.subscription == Subscription::Remove {
            return self.entries.remove(&item.jid).map(RosterChange::Removed);
        }
        match self.entries.insert(item.jid.clone(), item.clone()) {
            None => Some(RosterChange::Added(item)),
            Some(previous) if previous == item => None,
            Some(_) => Some(RosterChange::Updated(item)),
        }
    }

    /// Applies a whole push query, returning the resulting changes in order.
    pub fn apply(&mut self, query: RosterQuery) -> Vec<RosterChange> {
        if query.ver.is_some() {
            self.version = query.ver;
        }
        query
            .items
            .into_iter()
            .filter_map(|item| self.apply_push(item))
            .collect()
    }
}
