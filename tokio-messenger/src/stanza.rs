// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Typed views of the three stanza kinds exchanged once a session is ready.
//!
//! Every type converts from a [`minidom::Element`] with [`TryFrom`] and back
//! with [`From`]. Children this crate does not understand are kept as
//! `payloads` so nothing gets lost on the way through.

use rand::{thread_rng, Rng};

use crate::dispatch::StanzaKind;
use crate::error::ParseError;
use crate::jid::Jid;
use crate::minidom::Element;
use crate::ns;

/// Creates a fresh random stanza id.
pub fn make_id() -> String {
    let id: u64 = thread_rng().gen();
    format!("{}", id)
}

fn parse_addr(elem: &Element, attr: &str) -> Result<Option<Jid>, ParseError> {
    match elem.attr(attr) {
        Some(value) => Ok(Some(Jid::new(value)?)),
        None => Ok(None),
    }
}

fn child_text(elem: &Element, name: &str) -> Option<String> {
    elem.get_child(name, ns::JABBER_CLIENT).map(Element::text)
}

/// The `type` attribute of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    /// One-to-one conversation.
    Chat,
    /// Error reply to a previously sent message.
    Error,
    /// Multi-user chat.
    Groupchat,
    /// Alert or notification.
    Headline,
    /// Standalone message, the default.
    #[default]
    Normal,
}

impl MessageType {
    fn from_attr(value: Option<&str>) -> MessageType {
        match value {
            Some("chat") => MessageType::Chat,
            Some("error") => MessageType::Error,
            Some("groupchat") => MessageType::Groupchat,
            Some("headline") => MessageType::Headline,
            // RFC 6121 section 5.2.2: unknown types are handled as normal.
            _ => MessageType::Normal,
        }
    }

    fn as_attr(self) -> Option<&'static str> {
        match self {
            MessageType::Chat => Some("chat"),
            MessageType::Error => Some("error"),
            MessageType::Groupchat => Some("groupchat"),
            MessageType::Headline => Some("headline"),
            MessageType::Normal => None,
        }
    }
}

/// A `<message/>` stanza.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Sender, filled in by the server.
    pub from: Option<Jid>,
    /// Recipient.
    pub to: Option<Jid>,
    /// Stanza id.
    pub id: Option<String>,
    /// Message type.
    pub type_: MessageType,
    /// Text of the first `<body/>`.
    pub body: Option<String>,
    /// Other children.
    pub payloads: Vec<Element>,
}

impl Message {
    /// Creates an empty normal message.
    pub fn new(to: Option<Jid>) -> Message {
        Message {
            from: None,
            to,
            id: None,
            type_: MessageType::Normal,
            body: None,
            payloads: Vec::new(),
        }
    }

    /// Creates a chat message carrying `body`, with a fresh id.
    pub fn chat<B: Into<String>>(to: Jid, body: B) -> Message {
        Message {
            id: Some(make_id()),
            type_: MessageType::Chat,
            body: Some(body.into()),
            ..Message::new(Some(to))
        }
    }
}

impl TryFrom<Element> for Message {
    type Error = ParseError;

    fn try_from(elem: Element) -> Result<Message, ParseError> {
        if !elem.is("message", ns::JABBER_CLIENT) {
            return Err(ParseError::Mismatch(elem));
        }
        let from = parse_addr(&elem, "from")?;
        let to = parse_addr(&elem, "to")?;
        let body = child_text(&elem, "body");
        let payloads = elem
            .children()
            .filter(|child| !child.is("body", ns::JABBER_CLIENT))
            .cloned()
            .collect();
        Ok(Message {
            from,
            to,
            id: elem.attr("id").map(String::from),
            type_: MessageType::from_attr(elem.attr("type")),
            body,
            payloads,
        })
    }
}

impl From<Message> for Element {
    fn from(message: Message) -> Element {
        Element::builder("message", ns::JABBER_CLIENT)
            .attr("from", message.from.map(|jid| jid.to_string()))
            .attr("to", message.to.map(|jid| jid.to_string()))
            .attr("id", message.id)
            .attr("type", message.type_.as_attr())
            .append_all(
                message
                    .body
                    .map(|body| Element::builder("body", ns::JABBER_CLIENT).append(body)),
            )
            .append_all(message.payloads)
            .build()
    }
}

/// The `type` attribute of a presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceType {
    /// No `type` attribute: the entity is available.
    #[default]
    None,
    /// Error reply.
    Error,
    /// Request for the current presence.
    Probe,
    /// Subscription request.
    Subscribe,
    /// Subscription approval.
    Subscribed,
    /// The entity is going offline.
    Unavailable,
    /// Unsubscription request.
    Unsubscribe,
    /// Subscription revocation.
    Unsubscribed,
}

impl PresenceType {
    fn from_attr(value: Option<&str>) -> Result<PresenceType, ParseError> {
        Ok(match value {
            None => PresenceType::None,
            Some("error") => PresenceType::Error,
            Some("probe") => PresenceType::Probe,
            Some("subscribe") => PresenceType::Subscribe,
            Some("subscribed") => PresenceType::Subscribed,
            Some("unavailable") => PresenceType::Unavailable,
            Some("unsubscribe") => PresenceType::Unsubscribe,
            Some("unsubscribed") => PresenceType::Unsubscribed,
            Some(_) => return Err(ParseError::Invalid("unknown presence type")),
        })
    }

    fn as_attr(self) -> Option<&'static str> {
        match self {
            PresenceType::None => None,
            PresenceType::Error => Some("error"),
            PresenceType::Probe => Some("probe"),
            PresenceType::Subscribe => Some("subscribe"),
            PresenceType::Subscribed => Some("subscribed"),
            PresenceType::Unavailable => Some("unavailable"),
            PresenceType::Unsubscribe => Some("unsubscribe"),
            PresenceType::Unsubscribed => Some("unsubscribed"),
        }
    }
}

/// The `<show/>` of an available presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Show {
    /// Temporarily away.
    Away,
    /// Interested in chatting.
    Chat,
    /// Do not disturb.
    Dnd,
    /// Away for an extended period.
    Xa,
}

impl Show {
    fn from_text(text: &str) -> Result<Show, ParseError> {
        Ok(match text {
            "away" => Show::Away,
            "chat" => Show::Chat,
            "dnd" => Show::Dnd,
            "xa" => Show::Xa,
            _ => return Err(ParseError::Invalid("unknown presence show")),
        })
    }

    fn as_text(self) -> &'static str {
        match self {
            Show::Away => "away",
            Show::Chat => "chat",
            Show::Dnd => "dnd",
            Show::Xa => "xa",
        }
    }
}

/// A `<presence/>` stanza.
#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    /// Sender, filled in by the server.
    pub from: Option<Jid>,
    /// Recipient, absent for broadcasts.
    pub to: Option<Jid>,
    /// Stanza id.
    pub id: Option<String>,
    /// Presence type.
    pub type_: PresenceType,
    /// Availability sub-state.
    pub show: Option<Show>,
    /// Free-form status text.
    pub status: Option<String>,
    /// Resource priority.
    pub priority: i8,
    /// Other children.
    pub payloads: Vec<Element>,
}

impl Presence {
    /// Creates a presence of the given type.
    pub fn new(type_: PresenceType) -> Presence {
        Presence {
            from: None,
            to: None,
            id: None,
            type_,
            show: None,
            status: None,
            priority: 0,
            payloads: Vec::new(),
        }
    }

    /// Creates an available presence.
    pub fn available() -> Presence {
        Presence::new(PresenceType::None)
    }

    /// Creates an unavailable presence.
    pub fn unavailable() -> Presence {
        Presence::new(PresenceType::Unavailable)
    }

    /// Sets the recipient.
    pub fn with_to<J: Into<Jid>>(mut self, to: J) -> Presence {
        self.to = Some(to.into());
        self
    }

    /// Sets the availability sub-state.
    pub fn with_show(mut self, show: Show) -> Presence {
        self.show = Some(show);
        self
    }

    /// Sets the status text.
    pub fn with_status<S: Into<String>>(mut self, status: S) -> Presence {
        self.status = Some(status.into());
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i8) -> Presence {
        self.priority = priority;
        self
    }

    /// Whether the sender is online.
    pub fn is_available(&self) -> bool {
        self.type_ == PresenceType::None
    }
}

impl TryFrom<Element> for Presence {
    type Error = ParseError;

    fn try_from(elem: Element) -> Result<Presence, ParseError> {
        if !elem.is("presence", ns::JABBER_CLIENT) {
            return Err(ParseError::Mismatch(elem));
        }
        let show = match child_text(&elem, "show") {
            Some(text) => Some(Show::from_text(text.trim())?),
            None => None,
        };
        let priority = match child_text(&elem, "priority") {
            Some(text) => text
                .trim()
                .parse()
                .map_err(|_| ParseError::Invalid("invalid presence priority"))?,
            None => 0,
        };
        let payloads = elem
            .children()
            .filter(|child| {
                !(child.is("show", ns::JABBER_CLIENT)
                    || child.is("status", ns::JABBER_CLIENT)
                    || child.is("priority", ns::JABBER_CLIENT))
            })
            .cloned()
            .collect();
        Ok(Presence {
            from: parse_addr(&elem, "from")?,
            to: parse_addr(&elem, "to")?,
            id: elem.attr("id").map(String::from),
            type_: PresenceType::from_attr(elem.attr("type"))?,
            show,
            status: child_text(&elem, "status"),
            priority,
            payloads,
        })
    }
}

impl From<Presence> for Element {
    fn from(presence: Presence) -> Element {
        let priority = (presence.priority != 0).then(|| {
            Element::builder("priority", ns::JABBER_CLIENT).append(presence.priority.to_string())
        });
        Element::builder("presence", ns::JABBER_CLIENT)
            .attr("from", presence.from.map(|jid| jid.to_string()))
            .attr("to", presence.to.map(|jid| jid.to_string()))
            .attr("id", presence.id)
            .attr("type", presence.type_.as_attr())
            .append_all(
                presence
                    .show
                    .map(|show| Element::builder("show", ns::JABBER_CLIENT).append(show.as_text())),
            )
            .append_all(
                presence
                    .status
                    .map(|status| Element::builder("status", ns::JABBER_CLIENT).append(status)),
            )
            .append_all(priority)
            .append_all(presence.payloads)
            .build()
    }
}

/// The type and payload of an iq.
#[derive(Debug, Clone, PartialEq)]
pub enum IqType {
    /// A request for information.
    Get(Element),
    /// A request to change something.
    Set(Element),
    /// A successful answer, with an optional payload.
    Result(Option<Element>),
    /// An error answer, holding the `<error/>` element.
    Error(Element),
}

/// An `<iq/>` stanza.
#[derive(Debug, Clone, PartialEq)]
pub struct Iq {
    /// Sender, filled in by the server.
    pub from: Option<Jid>,
    /// Recipient.
    pub to: Option<Jid>,
    /// Stanza id, mandatory for iqs.
    pub id: String,
    /// Type and payload.
    pub payload: IqType,
}

impl Iq {
    /// Creates a get request.
    pub fn from_get<S: Into<String>, P: Into<Element>>(id: S, payload: P) -> Iq {
        Iq::new(id, IqType::Get(payload.into()))
    }

    /// Creates a set request.
    pub fn from_set<S: Into<String>, P: Into<Element>>(id: S, payload: P) -> Iq {
        Iq::new(id, IqType::Set(payload.into()))
    }

    /// Creates a successful answer.
    pub fn from_result<S: Into<String>>(id: S, payload: Option<Element>) -> Iq {
        Iq::new(id, IqType::Result(payload))
    }

    /// Creates an error answer carrying `error`.
    pub fn from_error<S: Into<String>>(id: S, error: Element) -> Iq {
        Iq::new(id, IqType::Error(error))
    }

    fn new<S: Into<String>>(id: S, payload: IqType) -> Iq {
        Iq {
            from: None,
            to: None,
            id: id.into(),
            payload,
        }
    }

    /// Sets the recipient.
    pub fn with_to<J: Into<Jid>>(mut self, to: J) -> Iq {
        self.to = Some(to.into());
        self
    }

    /// Whether this iq expects an answer.
    pub fn is_request(&self) -> bool {
        matches!(self.payload, IqType::Get(_) | IqType::Set(_))
    }

    /// An error answer to this iq, e.g. `("cancel", "item-not-found")`.
    pub fn error_reply(&self, type_: &str, condition: &str) -> Iq {
        let error = Element::builder("error", ns::JABBER_CLIENT)
            .attr("type", type_)
            .append(Element::builder(condition, ns::XMPP_STANZAS))
            .build();
        let reply = Iq::from_error(self.id.clone(), error);
        match &self.from {
            Some(from) => reply.with_to(from.clone()),
            None => reply,
        }
    }

    /// The answer sent to a request nothing handles.
    pub fn service_unavailable(&self) -> Iq {
        self.error_reply("cancel", "service-unavailable")
    }
}

impl TryFrom<Element> for Iq {
    type Error = ParseError;

    fn try_from(elem: Element) -> Result<Iq, ParseError> {
        if !elem.is("iq", ns::JABBER_CLIENT) {
            return Err(ParseError::Mismatch(elem));
        }
        let Some(id) = elem.attr("id") else {
            return Err(ParseError::Invalid("iq without id"));
        };
        let mut children = elem.children();
        let first = children.next().cloned();
        let payload = match (elem.attr("type"), first) {
            (Some("get"), Some(payload)) if children.next().is_none() => IqType::Get(payload),
            (Some("set"), Some(payload)) if children.next().is_none() => IqType::Set(payload),
            (Some("get" | "set"), _) => {
                return Err(ParseError::Invalid("iq request without exactly one payload"))
            }
            (Some("result"), payload) => IqType::Result(payload),
            (Some("error"), _) => match elem.get_child("error", ns::JABBER_CLIENT) {
                Some(error) => IqType::Error(error.clone()),
                None => return Err(ParseError::Invalid("iq error without error element")),
            },
            _ => return Err(ParseError::Invalid("unknown iq type")),
        };
        Ok(Iq {
            from: parse_addr(&elem, "from")?,
            to: parse_addr(&elem, "to")?,
            id: id.to_owned(),
            payload,
        })
    }
}

impl From<Iq> for Element {
    fn from(iq: Iq) -> Element {
        let (type_, payload) = match iq.payload {
            IqType::Get(payload) => ("get", Some(payload)),
            IqType::Set(payload) => ("set", Some(payload)),
            IqType::Result(payload) => ("result", payload),
            IqType::Error(error) => ("error", Some(error)),
        };
        Element::builder("iq", ns::JABBER_CLIENT)
            .attr("from", iq.from.map(|jid| jid.to_string()))
            .attr("to", iq.to.map(|jid| jid.to_string()))
            .attr("id", iq.id)
            .attr("type", type_)
            .append_all(payload)
            .build()
    }
}

/// A stanza received once the session is ready.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundStanza {
    /// A `<message/>`.
    Message(Message),
    /// A `<presence/>`.
    Presence(Presence),
    /// An `<iq/>`.
    Iq(Iq),
}

impl InboundStanza {
    /// The kind handlers register for.
    pub fn kind(&self) -> StanzaKind {
        match self {
            InboundStanza::Message(_) => StanzaKind::Message,
            InboundStanza::Presence(_) => StanzaKind::Presence,
            InboundStanza::Iq(_) => StanzaKind::Iq,
        }
    }

    /// The sender, if the server filled it in.
    pub fn from(&self) -> Option<&Jid> {
        match self {
            InboundStanza::Message(message) => message.from.as_ref(),
            InboundStanza::Presence(presence) => presence.from.as_ref(),
            InboundStanza::Iq(iq) => iq.from.as_ref(),
        }
    }

    /// The stanza id, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            InboundStanza::Message(message) => message.id.as_deref(),
            InboundStanza::Presence(presence) => presence.id.as_deref(),
            InboundStanza::Iq(iq) => Some(&iq.id),
        }
    }
}

impl TryFrom<Element> for InboundStanza {
    type Error = ParseError;

    fn try_from(elem: Element) -> Result<InboundStanza, ParseError> {
        if elem.ns() != ns::JABBER_CLIENT {
            return Err(ParseError::Mismatch(elem));
        }
        match elem.name() {
            "message" => Message::try_from(elem).map(InboundStanza::Message),
            "presence" => Presence::try_from(elem).map(InboundStanza::Presence),
            "iq" => Iq::try_from(elem).map(InboundStanza::Iq),
            _ => Err(ParseError::Mismatch(elem)),
        }
    }
}

impl From<InboundStanza> for Element {
    fn from(stanza: InboundStanza) -> Element {
        match stanza {
            InboundStanza::Message(message) => message.into(),
            InboundStanza::Presence(presence) => presence.into(),
            InboundStanza::Iq(iq) => iq.into(),
        }
    }
}

impl From<Message> for InboundStanza {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl From<Presence> for InboundStanza {
    fn from(presence: Presence) -> Self {
        Self::Presence(presence)
    }
}

impl From<Iq> for InboundStanza {
    fn from(iq: Iq) -> Self {
        Self::Iq(iq)
    }
}
