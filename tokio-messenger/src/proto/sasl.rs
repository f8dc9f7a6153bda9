//! The SASL nonzas of RFC 6120 section 6.4, with their base64 payloads.

use base64::{engine::general_purpose::STANDARD as Base64, Engine};
use minidom::Element;

use crate::error::ParseError;
use crate::ns;

/// An empty payload is sent as a single `=`, to tell it apart from an
/// absent one.
fn encode(data: &[u8]) -> String {
    if data.is_empty() {
        String::from("=")
    } else {
        Base64.encode(data)
    }
}

fn decode(elem: &Element) -> Result<Vec<u8>, ParseError> {
    let text = elem.text();
    let text = text.trim();
    if text.is_empty() || text == "=" {
        return Ok(Vec::new());
    }
    Base64
        .decode(text)
        .map_err(|_| ParseError::Invalid("invalid base64 in SASL payload"))
}

pub(crate) fn auth(mechanism: &str, initial: &[u8]) -> Element {
    Element::builder("auth", ns::SASL)
        .attr("mechanism", mechanism)
        .append(encode(initial))
        .build()
}

pub(crate) fn response(data: &[u8]) -> Element {
    Element::builder("response", ns::SASL)
        .append(encode(data))
        .build()
}

pub(crate) fn abort() -> Element {
    Element::builder("abort", ns::SASL).build()
}

/// What the server sends while authenticating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ServerNonza {
    Challenge(Vec<u8>),
    Success(Vec<u8>),
    Failure {
        condition: String,
        text: Option<String>,
    },
}

impl TryFrom<Element> for ServerNonza {
    type Error = ParseError;

    fn try_from(elem: Element) -> Result<ServerNonza, ParseError> {
        if elem.ns() != ns::SASL {
            return Err(ParseError::Mismatch(elem));
        }
        match elem.name() {
            "challenge" => Ok(ServerNonza::Challenge(decode(&elem)?)),
            "success" => Ok(ServerNonza::Success(decode(&elem)?)),
            "failure" => {
                let condition = elem
                    .children()
                    .find(|child| child.ns() == ns::SASL && child.name() != "text")
                    .map_or_else(|| String::from("undefined-condition"), |c| c.name().to_owned());
                let text = elem.get_child("text", ns::SASL).map(Element::text);
                Ok(ServerNonza::Failure { condition, text })
            }
            _ => Err(ParseError::Mismatch(elem)),
        }
    }
}
