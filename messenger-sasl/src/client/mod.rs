//! Provides the client side of SASL: mechanisms and the negotiator driving
//! them.

use alloc::vec::Vec;
use core::fmt;

use crate::common::Credentials;

pub mod mechanisms;
mod negotiator;

pub use self::negotiator::{FailureReason, Negotiator, Step};

/// An error produced by a mechanism while building a response.
///
/// None of the variants carries credential material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MechanismError {
    /// The mechanism requires a token, and none (or an empty one) was given.
    MissingToken,

    /// The server sent a challenge, which this mechanism never expects.
    UnexpectedChallenge,

    /// The server sent additional data with its success, which this
    /// mechanism never expects.
    UnexpectedSuccessData,
}

impl fmt::Display for MechanismError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MechanismError::MissingToken => write!(fmt, "no token provided"),
            MechanismError::UnexpectedChallenge => write!(fmt, "unexpected challenge"),
            MechanismError::UnexpectedSuccessData => {
                write!(fmt, "unexpected additional data on success")
            }
        }
    }
}

impl core::error::Error for MechanismError {}

/// A trait which defines SASL mechanisms.
pub trait Mechanism {
    /// The name of the mechanism, as advertised by the server.
    fn name(&self) -> &str;

    /// Creates this mechanism from `Credentials`.
    fn from_credentials(credentials: Credentials) -> Result<Self, MechanismError>
    where
        Self: Sized;

    /// Provides initial payload of the SASL mechanism.
    fn initial(&mut self) -> Vec<u8> {
        Vec::new()
    }

    /// Creates a response to the SASL challenge.
    fn response(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        Ok(Vec::new())
    }

    /// Verifies the server success response, if there is one.
    fn success(&mut self, _data: &[u8]) -> Result<(), MechanismError> {
        Ok(())
    }
}
