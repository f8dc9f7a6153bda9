use std::collections::HashSet;

use base64::{engine::general_purpose::STANDARD as Base64, Engine};
use futures::{SinkExt, StreamExt};
use messenger_sasl::client::FailureReason;
use tokio::io::DuplexStream;
use tokio::sync::mpsc::unbounded_channel;

use super::*;
use crate::dispatch::{HandlerError, StanzaKind};
use crate::error::{AuthError, ConnectError, ProtocolError};
use crate::ns;
use crate::proto::line_codec::LineCodec;
use crate::roster::RosterChange;
use crate::stanza::InboundStanza;

const TOKEN: &str = "EwBAAq1DBAAUGCCXc8wU/zFu9QnLdZXy+YnElFkAAQ";
const DOMAIN: &str = "messenger.live.com";
const FULL_JID: &str = "user@messenger.live.com/phone";

const SASL_FEATURES: &str = "<features xmlns='http://etherx.jabber.org/streams'>\
      <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
        <mechanism>X-MESSENGER-OAUTH2</mechanism>\
      </mechanisms>\
    </features>";

const BIND_FEATURES: &str = "<features xmlns='http://etherx.jabber.org/streams'>\
      <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>\
    </features>";

const ALICE: &str = "<item jid='alice@example.com' name='Alice' subscription='both'/>";

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> SessionConfig {
    SessionConfig::with_token(DOMAIN, TOKEN)
        .unwrap()
        .set_resource("phone")
        .set_timeouts(Timeouts::tight())
}

fn bare(jid: &str) -> BareJid {
    BareJid::new(jid).unwrap()
}

#[derive(Debug, Clone)]
struct DuplexConnector(Arc<Mutex<Option<DuplexStream>>>);

impl ServerConnector for DuplexConnector {
    type Stream = DuplexStream;

    async fn connect(&self) -> Result<DuplexStream, ConnectError> {
        let stream = lock(&self.0).take();
        stream.ok_or(ConnectError::NoEndpoint)
    }
}

/// Never manages to connect.
#[derive(Debug, Clone)]
struct PendingConnector;

impl ServerConnector for PendingConnector {
    type Stream = DuplexStream;

    async fn connect(&self) -> Result<DuplexStream, ConnectError> {
        futures::future::pending().await
    }
}

/// The server side of an in-memory connection.
struct Server {
    framed: Framed<DuplexStream, LineCodec>,
}

fn pair() -> (DuplexConnector, Server) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    (
        DuplexConnector(Arc::new(Mutex::new(Some(client)))),
        Server {
            framed: Framed::new(server, LineCodec::new()),
        },
    )
}

impl Server {
    async fn recv(&mut self) -> Option<Packet> {
        self.framed.next().await.map(|packet| packet.unwrap())
    }

    async fn recv_element(&mut self) -> Element {
        match self.recv().await {
            Some(Packet::Stanza(elem)) => elem,
            other => panic!("expected an element, got {:?}", other),
        }
    }

    async fn send(&mut self, packet: Packet) {
        self.framed.send(packet).await.unwrap();
    }

    async fn send_xml(&mut self, xml: &str) {
        self.send(Packet::Stanza(xml.parse().unwrap())).await;
    }

    async fn expect_header(&mut self) {
        match self.recv().await {
            Some(Packet::StreamStart(attrs)) => {
                assert_eq!(attrs.get("to").map(String::as_str), Some(DOMAIN));
                assert_eq!(attrs.get("xmlns").map(String::as_str), Some(ns::JABBER_CLIENT));
            }
            other => panic!("expected a stream header, got {:?}", other),
        }
    }

    async fn open_stream(&mut self, features: &str) {
        self.expect_header().await;
        let attrs = [
            ("xmlns", ns::JABBER_CLIENT),
            ("xmlns:stream", ns::STREAM),
            ("id", "c2s-1"),
            ("version", "1.0"),
            ("from", DOMAIN),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        self.send(Packet::StreamStart(attrs)).await;
        self.send_xml(features).await;
    }

    async fn expect_auth(&mut self) {
        let auth = self.recv_element().await;
        assert!(auth.is("auth", ns::SASL));
        assert_eq!(auth.attr("mechanism"), Some("X-MESSENGER-OAUTH2"));
        assert_eq!(Base64.decode(auth.text()).unwrap(), TOKEN.as_bytes());
    }

    async fn authenticate(&mut self) {
        self.open_stream(SASL_FEATURES).await;
        self.expect_auth().await;
        self.send_xml("<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>")
            .await;
    }

    async fn expect_bind(&mut self) -> String {
        self.open_stream(BIND_FEATURES).await;
        let iq = self.recv_element().await;
        assert!(iq.is("iq", ns::JABBER_CLIENT));
        assert_eq!(iq.attr("type"), Some("set"));
        let bind = iq.get_child("bind", ns::BIND).unwrap();
        assert_eq!(bind.get_child("resource", ns::BIND).unwrap().text(), "phone");
        iq.attr("id").unwrap().to_owned()
    }

    async fn answer_bind(&mut self, id: &str) {
        self.send_xml(&format!(
            "<iq xmlns='jabber:client' type='result' id='{}'>\
               <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'><jid>{}</jid></bind>\
             </iq>",
            id, FULL_JID
        ))
        .await;
    }

    async fn serve_roster(&mut self, items: &str) {
        let iq = self.recv_element().await;
        assert_eq!(iq.attr("type"), Some("get"));
        assert!(iq.has_child("query", ns::ROSTER));
        self.send_xml(&format!(
            "<iq xmlns='jabber:client' type='result' id='{}'>\
               <query xmlns='jabber:iq:roster'>{}</query>\
             </iq>",
            iq.attr("id").unwrap(),
            items
        ))
        .await;
    }

    async fn handshake(&mut self, roster: &str) {
        self.authenticate().await;
        let id = self.expect_bind().await;
        self.answer_bind(&id).await;
        self.serve_roster(roster).await;
    }
}

async fn ready_session(router: DispatchRouter, roster: &'static str) -> (Session, Server) {
    init();
    let (connector, mut server) = pair();
    let session = Session::new(config(), router);
    let script = tokio::spawn(async move {
        server.handshake(roster).await;
        server
    });
    session.connect(connector, LineCodec::new()).await.unwrap();
    (session, script.await.unwrap())
}

#[tokio::test]
async fn reaches_ready() {
    let (session, mut server) = ready_session(DispatchRouter::new(), ALICE).await;
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.bound_jid().unwrap().to_string(), FULL_JID);
    assert_eq!(session.local_jid(), Some(bare("user@messenger.live.com")));
    let alice = session.roster_entry(&bare("alice@example.com")).unwrap();
    assert_eq!(alice.name.as_deref(), Some("Alice"));
    assert!(session.roster_entry(&bare("nobody@example.com")).is_none());

    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(server.recv().await, Some(Packet::StreamEnd));
}

#[tokio::test]
async fn presence_handlers_see_roster_names() {
    let (tx, mut rx) = unbounded_channel();
    let mut router = DispatchRouter::new();
    router.register(StanzaKind::Presence, move |stanza, ctx| {
        let from = stanza.from().ok_or_else(|| HandlerError::new("no sender"))?;
        tx.send(ctx.contact_name(from).map(String::from))
            .map_err(HandlerError::new)?;
        Ok(())
    });
    let (session, mut server) = ready_session(router, ALICE).await;

    server
        .send_xml("<presence xmlns='jabber:client' from='alice@example.com/pc'/>")
        .await;
    server
        .send_xml("<presence xmlns='jabber:client' from='stranger@example.com/pc'/>")
        .await;
    assert_eq!(rx.recv().await.unwrap().as_deref(), Some("Alice"));
    assert_eq!(rx.recv().await.unwrap(), None);

    session.close().await;
}

#[tokio::test]
async fn sending_needs_a_ready_session() {
    init();
    let session = Session::new(config(), DispatchRouter::new());
    let alice = Jid::new("alice@example.com").unwrap();
    assert!(matches!(
        session.send_message(alice.clone(), "hi").await,
        Err(Error::NotConnected)
    ));

    let connecting = session.clone();
    let connect =
        tokio::spawn(async move { connecting.connect(PendingConnector, LineCodec::new()).await });
    let mut state = session.subscribe();
    state
        .wait_for(|state| *state == SessionState::Connecting)
        .await
        .unwrap();
    assert!(matches!(
        session.send_message(alice, "hi").await,
        Err(Error::NotConnected)
    ));

    session.close().await;
    assert!(matches!(connect.await.unwrap(), Err(Error::Closed)));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn concurrent_sends_do_not_interleave() {
    let (session, mut server) = ready_session(DispatchRouter::new(), "").await;

    let sends: Vec<_> = (0..16)
        .map(|i| {
            let session = session.clone();
            tokio::spawn(async move {
                let to = Jid::new("alice@example.com").unwrap();
                session.send_message(to, &format!("message {}", i)).await
            })
        })
        .collect();
    for send in sends {
        send.await.unwrap().unwrap();
    }

    let mut bodies = HashSet::new();
    for _ in 0..16 {
        let message = server.recv_element().await;
        assert!(message.is("message", ns::JABBER_CLIENT));
        assert_eq!(message.attr("type"), Some("chat"));
        bodies.insert(message.get_child("body", ns::JABBER_CLIENT).unwrap().text());
    }
    let expected: HashSet<_> = (0..16).map(|i| format!("message {}", i)).collect();
    assert_eq!(bodies, expected);

    session.close().await;
}

#[tokio::test]
async fn close_is_idempotent() {
    let (session, mut server) = ready_session(DispatchRouter::new(), "").await;
    session.close().await;
    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(server.recv().await, Some(Packet::StreamEnd));
    assert_eq!(server.recv().await, None);
    assert!(matches!(
        session.send_presence(Presence::available()).await,
        Err(Error::NotConnected)
    ));
    assert!(session.wait_closed().await.is_none());
}

#[tokio::test]
async fn connect_only_once() {
    let (session, _server) = ready_session(DispatchRouter::new(), "").await;
    let (connector, _) = pair();
    assert!(matches!(
        session.connect(connector, LineCodec::new()).await,
        Err(Error::InvalidState)
    ));
    session.close().await;
}

#[tokio::test]
async fn rejected_token() {
    init();
    let (connector, mut server) = pair();
    let session = Session::new(config(), DispatchRouter::new());
    let script = tokio::spawn(async move {
        server.open_stream(SASL_FEATURES).await;
        server.expect_auth().await;
        server
            .send_xml(
                "<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
                   <not-authorized/><text>token expired</text>\
                 </failure>",
            )
            .await;
        server
    });

    let err = session
        .connect(connector, LineCodec::new())
        .await
        .unwrap_err();
    let Error::Auth(AuthError::Sasl(reason)) = &err else {
        panic!("unexpected error {:?}", err);
    };
    assert_eq!(
        reason,
        &FailureReason::Rejected {
            condition: String::from("not-authorized"),
            text: Some(String::from("token expired")),
        }
    );
    let shown = format!("{} {:?} {:?}", err, err, session);
    assert!(!shown.contains(TOKEN));
    assert_eq!(session.state(), SessionState::Closed);

    let mut server = script.await.unwrap();
    assert_eq!(server.recv().await, Some(Packet::StreamEnd));
}

#[tokio::test]
async fn challenge_is_aborted() {
    init();
    let (connector, mut server) = pair();
    let session = Session::new(config(), DispatchRouter::new());
    let script = tokio::spawn(async move {
        server.open_stream(SASL_FEATURES).await;
        server.expect_auth().await;
        server
            .send_xml("<challenge xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>aGk=</challenge>")
            .await;
        let abort = server.recv_element().await;
        assert!(abort.is("abort", ns::SASL));
        server
    });

    let err = session
        .connect(connector, LineCodec::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Auth(AuthError::Sasl(FailureReason::UnexpectedChallenge))
    ));
    let mut server = script.await.unwrap();
    assert_eq!(server.recv().await, Some(Packet::StreamEnd));
}

#[tokio::test]
async fn mechanism_not_offered() {
    init();
    let (connector, mut server) = pair();
    let session = Session::new(config(), DispatchRouter::new());
    let script = tokio::spawn(async move {
        server
            .open_stream(
                "<features xmlns='http://etherx.jabber.org/streams'>\
                   <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
                     <mechanism>SCRAM-SHA-1</mechanism>\
                   </mechanisms>\
                 </features>",
            )
            .await;
        server
    });
    assert!(matches!(
        session.connect(connector, LineCodec::new()).await,
        Err(Error::Auth(AuthError::NoMechanism))
    ));
    script.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn silent_server_times_out() {
    init();
    let (connector, mut server) = pair();
    let session = Session::new(config(), DispatchRouter::new());
    let connect = session.connect(connector, LineCodec::new());
    let (result, ()) = tokio::join!(connect, server.expect_header());
    assert!(matches!(result, Err(Error::Timeout)));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn keepalives_do_not_extend_the_deadline() {
    init();
    let (connector, mut server) = pair();
    let session = Session::new(config(), DispatchRouter::new());
    let connect = async {
        let started = tokio::time::Instant::now();
        let result = session.connect(connector, LineCodec::new()).await;
        (result, started.elapsed())
    };
    let script = async {
        server.open_stream(SASL_FEATURES).await;
        server.expect_auth().await;
        for _ in 0..30 {
            tokio::time::sleep(Duration::from_secs(4)).await;
            if server.framed.send(Packet::Text(String::from(" "))).await.is_err() {
                break;
            }
        }
    };
    let ((result, elapsed), ()) = tokio::join!(connect, script);
    assert!(matches!(result, Err(Error::Timeout)));
    assert!(elapsed < Duration::from_secs(10), "took {:?}", elapsed);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn sends_during_login_write_nothing() {
    init();
    let (connector, mut server) = pair();
    let session = Session::new(config(), DispatchRouter::new());
    let (authenticating, wait_auth) = tokio::sync::oneshot::channel();
    let (reject, wait_reject) = tokio::sync::oneshot::channel::<()>();
    let script = tokio::spawn(async move {
        server.open_stream(SASL_FEATURES).await;
        server.expect_auth().await;
        authenticating.send(()).unwrap();
        wait_reject.await.unwrap();
        server
            .send_xml(
                "<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
                   <not-authorized/>\
                 </failure>",
            )
            .await;
        let mut rest = Vec::new();
        while let Some(packet) = server.recv().await {
            rest.push(packet);
        }
        rest
    });
    let connecting = session.clone();
    let connect =
        tokio::spawn(async move { connecting.connect(connector, LineCodec::new()).await });

    wait_auth.await.unwrap();
    assert_eq!(session.state(), SessionState::Authenticating);
    let alice = Jid::new("alice@example.com").unwrap();
    assert!(matches!(
        session.send_message(alice, "hi").await,
        Err(Error::NotConnected)
    ));
    assert!(matches!(
        session.send_presence(Presence::available()).await,
        Err(Error::NotConnected)
    ));
    reject.send(()).unwrap();

    assert!(matches!(connect.await.unwrap(), Err(Error::Auth(_))));
    let rest = script.await.unwrap();
    assert_eq!(rest, vec![Packet::StreamEnd]);
}

#[tokio::test]
async fn too_many_early_stanzas_fail_the_login() {
    init();
    let (connector, mut server) = pair();
    let session = Session::new(config(), DispatchRouter::new());
    let script = tokio::spawn(async move {
        server.authenticate().await;
        server.expect_bind().await;
        for i in 0..=crate::proto::xmpp_stream::MAX_PENDING {
            let xml = format!(
                "<message xmlns='jabber:client' type='chat' from='alice@example.com/pc'>\
                   <body>{}</body>\
                 </message>",
                i
            );
            server.send_xml(&xml).await;
        }
        server
    });

    let err = session
        .connect(connector, LineCodec::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Protocol(ProtocolError::TooManyPending)),
        "unexpected error {:?}",
        err
    );
    assert_eq!(session.state(), SessionState::Closed);
    let _server = script.await.unwrap();
}

#[tokio::test]
async fn early_stanzas_are_dispatched_after_ready() {
    init();
    let (tx, mut rx) = unbounded_channel();
    let mut router = DispatchRouter::new();
    router.register(StanzaKind::Message, move |stanza, _| {
        if let InboundStanza::Message(message) = stanza {
            let _ = tx.send(message.body.clone());
        }
        Ok(())
    });
    let (connector, mut server) = pair();
    let session = Session::new(config(), router);
    let script = tokio::spawn(async move {
        server.authenticate().await;
        let id = server.expect_bind().await;
        server
            .send_xml(
                "<message xmlns='jabber:client' type='chat' from='alice@example.com/pc'>\
                   <body>early</body>\
                 </message>",
            )
            .await;
        server.answer_bind(&id).await;
        server.serve_roster(ALICE).await;
        server
    });
    session.connect(connector, LineCodec::new()).await.unwrap();
    let _server = script.await.unwrap();
    assert_eq!(rx.recv().await.unwrap().as_deref(), Some("early"));
    session.close().await;
}

#[tokio::test]
async fn roster_pushes_update_the_cache() {
    let (tx, mut rx) = unbounded_channel();
    let mut router = DispatchRouter::new();
    router.register(StanzaKind::Iq, move |_, ctx| {
        let _ = tx.send(ctx.roster_changes().to_vec());
        Ok(())
    });
    let (session, mut server) = ready_session(router, ALICE).await;
    let bob = bare("bob@example.com");

    server
        .send_xml(
            "<iq xmlns='jabber:client' type='set' id='push1'>\
               <query xmlns='jabber:iq:roster'>\
                 <item jid='bob@example.com' name='Bob' subscription='both'/>\
               </query>\
             </iq>",
        )
        .await;
    let ack = server.recv_element().await;
    assert_eq!(ack.attr("type"), Some("result"));
    assert_eq!(ack.attr("id"), Some("push1"));
    assert_eq!(
        session.roster_entry(&bob).and_then(|entry| entry.name),
        Some(String::from("Bob"))
    );
    let changes = rx.recv().await.unwrap();
    assert!(matches!(&changes[..], [RosterChange::Added(entry)] if entry.jid == bob));

    server
        .send_xml(
            "<iq xmlns='jabber:client' type='set' id='push2' from='user@messenger.live.com'>\
               <query xmlns='jabber:iq:roster'>\
                 <item jid='bob@example.com' subscription='remove'/>\
               </query>\
             </iq>",
        )
        .await;
    let ack = server.recv_element().await;
    assert_eq!(ack.attr("id"), Some("push2"));
    assert!(session.roster_entry(&bob).is_none());
    assert_eq!(session.roster_snapshot().len(), 1);

    session.close().await;
}

#[tokio::test]
async fn foreign_roster_push_is_ignored() {
    let (session, mut server) = ready_session(DispatchRouter::new(), "").await;
    server
        .send_xml(
            "<iq xmlns='jabber:client' type='set' id='evil' from='mallory@example.com/x'>\
               <query xmlns='jabber:iq:roster'><item jid='mallory@example.com'/></query>\
             </iq>",
        )
        .await;
    let reply = server.recv_element().await;
    assert_eq!(reply.attr("type"), Some("error"));
    assert!(session.roster_snapshot().is_empty());
    session.close().await;
}

#[tokio::test]
async fn unhandled_requests_get_service_unavailable() {
    let (session, mut server) = ready_session(DispatchRouter::new(), "").await;
    server
        .send_xml(
            "<iq xmlns='jabber:client' type='get' id='v1' from='alice@example.com/pc'>\
               <query xmlns='jabber:iq:version'/>\
             </iq>",
        )
        .await;
    let reply = server.recv_element().await;
    assert_eq!(reply.attr("type"), Some("error"));
    assert_eq!(reply.attr("id"), Some("v1"));
    assert_eq!(reply.attr("to"), Some("alice@example.com/pc"));
    let error = reply.get_child("error", ns::JABBER_CLIENT).unwrap();
    assert!(error.has_child("service-unavailable", ns::XMPP_STANZAS));
    session.close().await;
}

#[tokio::test]
async fn stream_error_closes_the_session() {
    let (session, mut server) = ready_session(DispatchRouter::new(), "").await;
    server.send(Packet::Text(String::from(" "))).await;
    server
        .send_xml(
            "<error xmlns='http://etherx.jabber.org/streams'>\
               <conflict xmlns='urn:ietf:params:xml:ns:xmpp-streams'/>\
             </error>",
        )
        .await;
    let reason = session.wait_closed().await;
    assert!(matches!(
        reason,
        Some(Error::Protocol(ProtocolError::StreamError { ref condition, .. }))
            if condition == "conflict"
    ));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(server.recv().await, Some(Packet::StreamEnd));
}

#[tokio::test]
async fn server_hangup_closes_the_session() {
    let (session, mut server) = ready_session(DispatchRouter::new(), "").await;
    server.send(Packet::StreamEnd).await;
    assert!(matches!(session.wait_closed().await, Some(Error::Disconnected)));
    // A local close afterwards has nothing left to do.
    session.close().await;
}
