//! `<stream:features/>`, reduced to what a client session acts on.

use minidom::Element;

use crate::error::ParseError;
use crate::ns;

/// The features announced by the server after each stream header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFeatures {
    /// SASL mechanisms offered, in server order.
    pub sasl_mechanisms: Vec<String>,
    /// Whether resource binding is offered.
    pub can_bind: bool,
    /// Whether the legacy session must be established after binding.
    pub session_required: bool,
    /// Whether the server refuses to go on without STARTTLS.
    pub starttls_required: bool,
}

impl StreamFeatures {
    /// Whether `mechanism` is among the offered SASL mechanisms.
    pub fn offers_mechanism(&self, mechanism: &str) -> bool {
        self.sasl_mechanisms.iter().any(|offered| offered == mechanism)
    }
}

impl TryFrom<Element> for StreamFeatures {
    type Error = ParseError;

    fn try_from(elem: Element) -> Result<StreamFeatures, ParseError> {
        if !elem.is("features", ns::STREAM) {
            return Err(ParseError::Mismatch(elem));
        }
        let sasl_mechanisms = elem
            .get_child("mechanisms", ns::SASL)
            .map(|mechanisms| {
                mechanisms
                    .children()
                    .filter(|child| child.is("mechanism", ns::SASL))
                    .map(|child| child.text().trim().to_owned())
                    .collect()
            })
            .unwrap_or_default();
        // RFC 3921 made sessions mandatory; later servers mark them optional.
        let session_required = elem
            .get_child("session", ns::SESSION)
            .is_some_and(|session| !session.has_child("optional", ns::SESSION));
        let starttls_required = elem
            .get_child("starttls", ns::TLS)
            .is_some_and(|starttls| starttls.has_child("required", ns::TLS));
        Ok(StreamFeatures {
            sasl_mechanisms,
            can_bind: elem.has_child("bind", ns::BIND),
            session_required,
            starttls_required,
        })
    }
}
