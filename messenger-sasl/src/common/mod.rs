//! Provides the common types used by SASL mechanisms.

use alloc::string::String;
use core::fmt;

/// An opaque bearer token, such as an OAuth2 access token.
///
/// The token's value never shows up in `Debug` output, so a `Token` can be
/// embedded into structures which get logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wraps a token value.
    pub fn new<T: Into<String>>(token: T) -> Token {
        Token(token.into())
    }

    /// Whether the token is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw bytes of the token, as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

impl From<String> for Token {
    fn from(token: String) -> Token {
        Token(token)
    }
}

impl From<&str> for Token {
    fn from(token: &str) -> Token {
        Token(String::from(token))
    }
}

/// A identity to authenticate as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identity {
    /// No identity is provided, the server derives it from the secret.
    None,

    /// A username.
    Username(String),
}

/// A secret to authenticate with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Secret {
    /// No secret is provided.
    None,

    /// A bearer token.
    Token(Token),
}

/// A struct containing SASL credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    /// The requested identity.
    pub identity: Identity,
    /// The secret used to authenticate.
    pub secret: Secret,
}

impl Default for Credentials {
    fn default() -> Credentials {
        Credentials {
            identity: Identity::None,
            secret: Secret::None,
        }
    }
}

impl Credentials {
    /// Creates a new Credentials with the specified username.
    pub fn with_username<N: Into<String>>(mut self, username: N) -> Credentials {
        self.identity = Identity::Username(username.into());
        self
    }

    /// Creates a new Credentials with the specified bearer token.
    pub fn with_token<T: Into<Token>>(mut self, token: T) -> Credentials {
        self.secret = Secret::Token(token.into());
        self
    }
}
