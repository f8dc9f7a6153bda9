// Copyright (c) 2026 messenger-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use super::{Mechanism, MechanismError};

/// Why a negotiation failed.
///
/// The `Display` implementation is safe to show to users: it never includes
/// the credentials the mechanism was created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// A challenge arrived although the mechanism does not expect any more.
    UnexpectedChallenge,

    /// The server attached data to its success which the mechanism cannot
    /// verify.
    UnexpectedSuccessData,

    /// The server rejected the authentication.
    Rejected {
        /// The defined condition sent by the server, e.g. `not-authorized`.
        condition: String,
        /// The optional human-readable text sent along with it.
        text: Option<String>,
    },

    /// The negotiator was driven out of order, e.g. `step` before `start`.
    InvalidState,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FailureReason::UnexpectedChallenge => write!(fmt, "unexpected challenge"),
            FailureReason::UnexpectedSuccessData => {
                write!(fmt, "unexpected additional data on success")
            }
            FailureReason::Rejected {
                condition,
                text: Some(text),
            } => write!(fmt, "rejected by the server: {} ({})", condition, text),
            FailureReason::Rejected {
                condition,
                text: None,
            } => write!(fmt, "rejected by the server: {}", condition),
            FailureReason::InvalidState => write!(fmt, "negotiation driven out of order"),
        }
    }
}

impl core::error::Error for FailureReason {}

impl From<MechanismError> for FailureReason {
    fn from(e: MechanismError) -> FailureReason {
        match e {
            MechanismError::UnexpectedChallenge => FailureReason::UnexpectedChallenge,
            MechanismError::UnexpectedSuccessData => FailureReason::UnexpectedSuccessData,
            MechanismError::MissingToken => FailureReason::InvalidState,
        }
    }
}

/// The outcome of feeding a server message into a [`Negotiator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Bytes to send back to the server; the negotiation goes on.
    Response(Vec<u8>),

    /// The negotiation succeeded.
    Done,

    /// The negotiation failed.
    Fail(FailureReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Pending,
    Done,
    Failed,
}

/// Drives a single SASL exchange for one [`Mechanism`].
///
/// The negotiator keeps exactly one exchange in flight: `start` opens it,
/// every server message is answered by exactly one [`Step`], and once it
/// resolved to [`Step::Done`] or [`Step::Fail`] it never produces bytes
/// again.
pub struct Negotiator {
    mechanism: Box<dyn Mechanism + Send>,
    state: State,
}

impl fmt::Debug for Negotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Negotiator")
            .field("mechanism", &self.mechanism.name())
            .field("state", &self.state)
            .finish()
    }
}

impl Negotiator {
    /// Creates a negotiator for `mechanism`.
    pub fn new<M: Mechanism + Send + 'static>(mechanism: M) -> Negotiator {
        Negotiator::from_boxed(Box::new(mechanism))
    }

    /// Creates a negotiator for an already boxed mechanism.
    pub fn from_boxed(mechanism: Box<dyn Mechanism + Send>) -> Negotiator {
        Negotiator {
            mechanism,
            state: State::Idle,
        }
    }

    /// The name of the mechanism, as it must be advertised by the server.
    pub fn mechanism_name(&self) -> &str {
        self.mechanism.name()
    }

    /// Whether the negotiation reached a final outcome.
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, State::Done | State::Failed)
    }

    /// Opens the exchange, returning the initial response to send in the
    /// `<auth/>` element.
    ///
    /// Fails with [`FailureReason::InvalidState`] if called twice.
    pub fn start(&mut self) -> Result<Vec<u8>, FailureReason> {
        if self.state != State::Idle {
            return Err(FailureReason::InvalidState);
        }
        self.state = State::Pending;
        Ok(self.mechanism.initial())
    }

    /// Answers a challenge sent by the server.
    pub fn step(&mut self, challenge: &[u8]) -> Step {
        match self.state {
            State::Idle | State::Failed => Step::Fail(FailureReason::InvalidState),
            State::Done => {
                self.state = State::Failed;
                Step::Fail(FailureReason::UnexpectedChallenge)
            }
            State::Pending => match self.mechanism.response(challenge) {
                Ok(response) => Step::Response(response),
                Err(e) => {
                    self.state = State::Failed;
                    Step::Fail(e.into())
                }
            },
        }
    }

    /// Handles the server's `<success/>`, with its additional data if any.
    pub fn success(&mut self, data: &[u8]) -> Step {
        if self.state != State::Pending {
            return Step::Fail(FailureReason::InvalidState);
        }
        match self.mechanism.success(data) {
            Ok(()) => {
                self.state = State::Done;
                Step::Done
            }
            Err(e) => {
                self.state = State::Failed;
                Step::Fail(e.into())
            }
        }
    }

    /// Handles the server's `<failure/>`.
    pub fn failure(&mut self, condition: &str, text: Option<&str>) -> Step {
        self.state = State::Failed;
        Step::Fail(FailureReason::Rejected {
            condition: condition.to_string(),
            text: text.map(ToString::to_string),
        })
    }
}
