// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_messenger::connect::ServerConnector;
use tokio_messenger::jid::{BareJid, Jid};
use tokio_messenger::proto::StanzaCodec;
use tokio_messenger::stanza::Presence;
use tokio_messenger::{RosterCache, Session, SessionState};

use crate::{event_loop, presence, Error, Event};

/// A messaging account, once built by a [`ClientBuilder`](crate::ClientBuilder).
pub struct MessengerClient<C, K> {
    pub(crate) session: Session,
    pub(crate) pending: Option<(C, K)>,
    pub(crate) status: Option<String>,
    pub(crate) events: Option<UnboundedSender<Event>>,
    pub(crate) receiver: UnboundedReceiver<Event>,
}

impl<C: ServerConnector, K: StanzaCodec> MessengerClient<C, K> {
    /// Connects, authenticates and loads the contact list, then tells the
    /// contacts we are online.
    ///
    /// A client logs in only once; on failure, build a new one. Events only
    /// flow after a successful login.
    pub async fn log_in(&mut self) -> Result<(), Error> {
        let (Some((connector, codec)), Some(events)) = (self.pending.take(), self.events.take())
        else {
            return Err(Error::InvalidState);
        };
        self.session.connect(connector, codec).await?;
        if let Some(jid) = self.session.bound_jid() {
            info!("Logged in as {}", jid);
        }

        let initial = presence::send::make_initial_presence(self.status.as_deref());
        self.session.send_presence(initial).await?;

        let _ = events.send(Event::Online);
        let session = self.session.clone();
        tokio::spawn(async move {
            let reason = session.wait_closed().await.unwrap_or(Error::Closed);
            debug!("Disconnected: {}", reason);
            let _ = events.send(Event::Disconnected(reason));
        });
        Ok(())
    }
}

impl<C, K> MessengerClient<C, K> {
    /// Sends a chat message.
    pub async fn send_message(&self, recipient: Jid, text: &str) -> Result<(), Error> {
        self.session.send_message(recipient, text).await
    }

    /// Sends a presence, to a contact or broadcast.
    pub async fn send_presence(&self, presence: Presence) -> Result<(), Error> {
        self.session.send_presence(presence).await
    }

    /// Copy of the contact list as it stands.
    pub fn roster(&self) -> RosterCache {
        self.session.roster_snapshot()
    }

    /// Bare JID of the account, once logged in.
    pub fn local_jid(&self) -> Option<BareJid> {
        self.session.local_jid()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The underlying session, for lower-level access.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Closes the stream. An [`Event::Disconnected`] follows.
    pub async fn disconnect(&self) {
        self.session.close().await
    }

    /// Wait for new events.
    ///
    /// Returns an empty list once the session is closed and every event
    /// was handed out.
    pub async fn wait_for_events(&mut self) -> Vec<Event> {
        event_loop::wait_for_events(&mut self.receiver).await
    }
}

impl<C, K> Drop for MessengerClient<C, K> {
    fn drop(&mut self) {
        if self.session.state() == SessionState::Closed {
            return;
        }
        // The background tasks would otherwise keep the stream open.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let session = self.session.clone();
            runtime.spawn(async move { session.close().await });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::{SinkExt, StreamExt};
    use tokio::io::DuplexStream;
    use tokio_messenger::error::ConnectError;
    use tokio_messenger::minidom::Element;
    use tokio_messenger::proto::line_codec::LineCodec;
    use tokio_messenger::proto::Packet;
    use tokio_messenger::Timeouts;
    use tokio_util::codec::Framed;

    use super::*;
    use crate::ClientBuilder;

    #[derive(Debug, Clone)]
    struct DuplexConnector(Arc<Mutex<Option<DuplexStream>>>);

    impl ServerConnector for DuplexConnector {
        type Stream = DuplexStream;

        async fn connect(&self) -> Result<DuplexStream, ConnectError> {
            let stream = self.0.lock().unwrap().take();
            stream.ok_or(ConnectError::NoEndpoint)
        }
    }

    struct Server(Framed<DuplexStream, LineCodec>);

    impl Server {
        async fn recv(&mut self) -> Option<Packet> {
            self.0.next().await.map(|packet| packet.unwrap())
        }

        async fn recv_element(&mut self) -> Element {
            match self.recv().await {
                Some(Packet::Stanza(elem)) => elem,
                other => panic!("expected an element, got {:?}", other),
            }
        }

        async fn send_xml(&mut self, xml: &str) {
            self.0.send(Packet::Stanza(xml.parse().unwrap())).await.unwrap();
        }

        async fn open_stream(&mut self, features: &str) {
            assert!(matches!(self.recv().await, Some(Packet::StreamStart(_))));
            let attrs = [
                ("xmlns", "jabber:client"),
                ("xmlns:stream", "http://etherx.jabber.org/streams"),
                ("id", "c2s-1"),
                ("version", "1.0"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
            self.0.send(Packet::StreamStart(attrs)).await.unwrap();
            self.send_xml(features).await;
        }

        async fn log_in(&mut self) {
            self.open_stream(
                "<features xmlns='http://etherx.jabber.org/streams'>\
                   <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
                     <mechanism>X-MESSENGER-OAUTH2</mechanism>\
                   </mechanisms>\
                 </features>",
            )
            .await;
            assert_eq!(self.recv_element().await.name(), "auth");
            self.send_xml("<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>")
                .await;

            self.open_stream(
                "<features xmlns='http://etherx.jabber.org/streams'>\
                   <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>\
                 </features>",
            )
            .await;
            let bind = self.recv_element().await;
            self.send_xml(&format!(
                "<iq xmlns='jabber:client' type='result' id='{}'>\
                   <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'>\
                     <jid>me@messenger.live.com/bot</jid>\
                   </bind>\
                 </iq>",
                bind.attr("id").unwrap()
            ))
            .await;

            let roster = self.recv_element().await;
            self.send_xml(&format!(
                "<iq xmlns='jabber:client' type='result' id='{}'>\
                   <query xmlns='jabber:iq:roster'>\
                     <item jid='alice@example.com' name='Alice' subscription='both'/>\
                   </query>\
                 </iq>",
                roster.attr("id").unwrap()
            ))
            .await;
        }
    }

    fn client() -> (MessengerClient<DuplexConnector, LineCodec>, Server) {
        let _ = env_logger::builder().is_test(true).try_init();
        let (client, server) = tokio::io::duplex(64 * 1024);
        let connector = DuplexConnector(Arc::new(Mutex::new(Some(client))));
        let client = ClientBuilder::new("EwBAAq1DBAAUGCCXc8wU")
            .set_resource("bot")
            .set_status("around")
            .set_timeouts(Timeouts::tight())
            .build_with(connector, LineCodec::new())
            .unwrap();
        (client, Server(Framed::new(server, LineCodec::new())))
    }

    #[tokio::test]
    async fn events_after_login() {
        let (mut client, mut server) = client();
        let (logged_in, ()) = tokio::join!(client.log_in(), server.log_in());
        logged_in.unwrap();
        assert_eq!(
            client.local_jid(),
            Some(BareJid::new("me@messenger.live.com").unwrap())
        );
        assert_eq!(client.roster().len(), 1);

        let presence = server.recv_element().await;
        assert_eq!(presence.name(), "presence");
        assert_eq!(presence.attr("type"), None);
        assert!(matches!(client.wait_for_events().await[..], [Event::Online]));

        server
            .send_xml(
                "<message xmlns='jabber:client' type='chat' from='alice@example.com/pc'>\
                   <body>hi bot</body>\
                 </message>",
            )
            .await;
        server
            .send_xml(
                "<iq xmlns='jabber:client' type='set' id='push'>\
                   <query xmlns='jabber:iq:roster'><item jid='bob@example.com' name='Bob'/></query>\
                 </iq>",
            )
            .await;
        assert_eq!(server.recv_element().await.attr("id"), Some("push"));

        let mut events = Vec::new();
        while events.len() < 2 {
            events.extend(client.wait_for_events().await);
        }
        assert!(matches!(
            &events[0],
            Event::ChatMessage(_, Some(name), body) if name == "Alice" && body == "hi bot"
        ));
        assert!(matches!(
            &events[1],
            Event::ContactAdded(entry) if entry.name.as_deref() == Some("Bob")
        ));

        client
            .send_message(Jid::new("alice@example.com").unwrap(), "hello")
            .await
            .unwrap();
        let message = server.recv_element().await;
        assert_eq!(message.name(), "message");

        client.disconnect().await;
        assert_eq!(server.recv().await, Some(Packet::StreamEnd));
        assert!(matches!(
            client.wait_for_events().await[..],
            [Event::Disconnected(Error::Closed)]
        ));
        assert!(client.wait_for_events().await.is_empty());
    }

    #[tokio::test]
    async fn failed_login_ends_events() {
        let (mut client, server) = client();
        drop(server);
        assert!(client.log_in().await.is_err());
        assert!(matches!(client.log_in().await, Err(Error::InvalidState)));
        assert!(client.wait_for_events().await.is_empty());
        assert_eq!(client.state(), SessionState::Closed);
    }
}
