use log::debug;

use crate::error::{Error, ProtocolError};
use crate::jid::FullJid;
use crate::minidom::Element;
use crate::ns;
use crate::proto::{PacketStream, XmppStream};
use crate::stanza::{Iq, IqType};

const BIND_REQ_ID: &str = "resource-bind";
const SESSION_REQ_ID: &str = "session-establish";

/// Binds a resource, the requested one if any, and returns the full JID the
/// server assigned.
pub(crate) async fn bind<T: PacketStream>(
    stream: &mut XmppStream<T>,
    resource: Option<&str>,
) -> Result<FullJid, Error> {
    if !stream.features.can_bind {
        return Err(ProtocolError::NoBind.into());
    }

    let query = Element::builder("bind", ns::BIND)
        .append_all(
            resource.map(|resource| Element::builder("resource", ns::BIND).append(resource)),
        )
        .build();
    stream
        .send_element(Iq::from_set(BIND_REQ_ID, query).into())
        .await?;

    let iq = stream.wait_for_iq(BIND_REQ_ID).await?;
    let IqType::Result(Some(payload)) = iq.payload else {
        return Err(ProtocolError::InvalidBindResponse.into());
    };
    let jid = payload
        .get_child("jid", ns::BIND)
        .filter(|_| payload.is("bind", ns::BIND))
        .ok_or(ProtocolError::InvalidBindResponse)?
        .text();
    let jid = FullJid::new(jid.trim()).map_err(|_| ProtocolError::InvalidBindResponse)?;
    debug!("Bound to {}", jid);
    Ok(jid)
}

/// Establishes the legacy session, when the server still requires it.
pub(crate) async fn establish_session<T: PacketStream>(
    stream: &mut XmppStream<T>,
) -> Result<(), Error> {
    if !stream.features.session_required {
        return Ok(());
    }

    let query = Element::builder("session", ns::SESSION).build();
    stream
        .send_element(Iq::from_set(SESSION_REQ_ID, query).into())
        .await?;
    match stream.wait_for_iq(SESSION_REQ_ID).await?.payload {
        IqType::Result(_) => Ok(()),
        _ => Err(ProtocolError::InvalidSessionResponse.into()),
    }
}
