use log::debug;

use crate::error::{Error, ProtocolError};
use crate::proto::{PacketStream, XmppStream};
use crate::roster::RosterQuery;
use crate::stanza::{Iq, IqType};

const ROSTER_REQ_ID: &str = "roster-load";

/// Requests the whole roster.
pub(crate) async fn load<T: PacketStream>(
    stream: &mut XmppStream<T>,
) -> Result<RosterQuery, Error> {
    stream
        .send_element(Iq::from_get(ROSTER_REQ_ID, RosterQuery::default()).into())
        .await?;
    let query = match stream.wait_for_iq(ROSTER_REQ_ID).await?.payload {
        // An empty result is an empty roster.
        IqType::Result(None) => RosterQuery::default(),
        IqType::Result(Some(payload)) => RosterQuery::try_from(payload)?,
        _ => return Err(ProtocolError::InvalidRosterResponse.into()),
    };
    debug!("Roster loaded with {} contacts", query.items.len());
    Ok(query)
}
