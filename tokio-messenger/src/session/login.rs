use log::{debug, trace};
use messenger_sasl::client::{FailureReason, Negotiator, Step};

use crate::{
    error::{AuthError, Error, ParseError},
    proto::{sasl, sasl::ServerNonza, PacketStream, XmppStream},
};

/// Runs the SASL exchange with `negotiator` on a freshly opened stream.
///
/// On success the caller must restart the stream.
pub(crate) async fn auth<T: PacketStream>(
    stream: &mut XmppStream<T>,
    negotiator: &mut Negotiator,
) -> Result<(), Error> {
    if !stream.features.offers_mechanism(negotiator.mechanism_name()) {
        return Err(AuthError::NoMechanism.into());
    }

    let initial = negotiator.start().map_err(AuthError::Sasl)?;
    debug!("Authenticating with {}", negotiator.mechanism_name());
    stream
        .send_element(sasl::auth(negotiator.mechanism_name(), &initial))
        .await?;

    loop {
        let step = match ServerNonza::try_from(stream.next_element().await?) {
            Ok(ServerNonza::Challenge(challenge)) => negotiator.step(&challenge),
            Ok(ServerNonza::Success(data)) => negotiator.success(&data),
            Ok(ServerNonza::Failure { condition, text }) => {
                negotiator.failure(&condition, text.as_deref())
            }
            Err(ParseError::Mismatch(elem)) => {
                // ignore and loop
                trace!("Ignoring {} during authentication", elem.name());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        match step {
            Step::Response(response) => stream.send_element(sasl::response(&response)).await?,
            Step::Done => {
                debug!("Authenticated");
                return Ok(());
            }
            Step::Fail(reason) => {
                // The server is still waiting on us unless it said no itself.
                if !matches!(reason, FailureReason::Rejected { .. }) {
                    if let Err(e) = stream.send_element(sasl::abort()).await {
                        debug!("Could not abort the authentication: {}", e);
                    }
                }
                return Err(AuthError::Sasl(reason).into());
            }
        }
    }
}
