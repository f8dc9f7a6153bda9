// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tokio::sync::mpsc::unbounded_channel;
use tokio_messenger::connect::ServerConnector;
#[cfg(feature = "dns")]
use tokio_messenger::connect::{DnsConfig, TcpServerConnector};
use tokio_messenger::error::AuthError;
use tokio_messenger::proto::StanzaCodec;
use tokio_messenger::sasl::common::Token;
use tokio_messenger::{DispatchRouter, Session, SessionConfig, StanzaKind, Timeouts};

use crate::{message, presence, roster, Error, MessengerClient};
#[cfg(feature = "dns")]
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use crate::DEFAULT_SERVICE;

/// Assembles a [`MessengerClient`] for one account.
pub struct ClientBuilder {
    token: Token,
    service: String,
    server: Option<(String, u16)>,
    resource: Option<String>,
    status: Option<String>,
    timeouts: Timeouts,
    router: DispatchRouter,
}

impl ClientBuilder {
    /// Starts from the account's OAuth2 access token and the default service.
    pub fn new<T: Into<Token>>(token: T) -> ClientBuilder {
        ClientBuilder {
            token: token.into(),
            service: String::from(DEFAULT_SERVICE),
            server: None,
            resource: None,
            status: None,
            timeouts: Timeouts::default(),
            router: DispatchRouter::new(),
        }
    }

    /// Service domain the account lives on.
    pub fn set_service(mut self, service: &str) -> Self {
        self.service = String::from(service);
        self
    }

    /// Connects to this host and port instead of resolving the service.
    pub fn set_server(mut self, host: &str, port: u16) -> Self {
        self.server = Some((String::from(host), port));
        self
    }

    pub fn set_resource(mut self, resource: &str) -> Self {
        self.resource = Some(String::from(resource));
        self
    }

    /// Status text of the presence sent after logging in.
    pub fn set_status(mut self, status: &str) -> Self {
        self.status = Some(String::from(status));
        self
    }

    pub fn set_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Handlers of your own, run before the ones producing events.
    pub fn set_router(mut self, router: DispatchRouter) -> Self {
        self.router = router;
        self
    }

    /// Where the default connector goes.
    ///
    /// An explicit server wins. The default service is reached on its
    /// well-known host, any other service through its SRV records.
    #[cfg(feature = "dns")]
    fn dns_config(&self) -> DnsConfig {
        match &self.server {
            Some((host, port)) => DnsConfig::no_srv(host, *port),
            None if self.service == DEFAULT_SERVICE => {
                DnsConfig::no_srv(DEFAULT_HOST, DEFAULT_PORT)
            }
            None => DnsConfig::srv_default_client(&self.service),
        }
    }

    /// Builds a client connecting over plain TCP.
    ///
    /// Fails if the token is empty.
    #[cfg(feature = "dns")]
    pub fn build<K: StanzaCodec>(
        self,
        codec: K,
    ) -> Result<MessengerClient<TcpServerConnector, K>, Error> {
        let connector = TcpServerConnector::from(self.dns_config());
        self.build_with(connector, codec)
    }

    /// Builds a client using a custom connector.
    ///
    /// Fails if the token is empty.
    pub fn build_with<C: ServerConnector, K: StanzaCodec>(
        self,
        connector: C,
        codec: K,
    ) -> Result<MessengerClient<C, K>, Error> {
        let mut config = SessionConfig::with_token(self.service, self.token)
            .map_err(|e| Error::Auth(AuthError::Mechanism(e)))?
            .set_timeouts(self.timeouts);
        if let Some(resource) = self.resource {
            config = config.set_resource(resource);
        }

        let (events, receiver) = unbounded_channel();
        let mut router = self.router;
        let presence_events = events.clone();
        router.register(StanzaKind::Presence, move |stanza, context| {
            presence::receive::handle_presence(&presence_events, stanza, context)
        });
        let message_events = events.clone();
        router.register(StanzaKind::Message, move |stanza, context| {
            message::receive::handle_message(&message_events, stanza, context)
        });
        let roster_events = events.clone();
        router.on_roster_change(move |change| roster::handle_change(&roster_events, change));

        Ok(MessengerClient {
            session: Session::new(config, router),
            pending: Some((connector, codec)),
            status: self.status,
            events: Some(events),
            receiver,
        })
    }
}
