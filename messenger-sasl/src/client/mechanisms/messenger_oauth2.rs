//! Provides the `X-MESSENGER-OAUTH2` SASL mechanism.

use alloc::vec::Vec;

use crate::client::{Mechanism, MechanismError};
use crate::common::{Credentials, Secret, Token};

/// A struct for the `X-MESSENGER-OAUTH2` mechanism.
///
/// The initial response is the raw access token; the server then answers
/// with either success or failure, without ever sending a challenge.
#[derive(Debug)]
pub struct MessengerOAuth2 {
    token: Token,
}

impl MessengerOAuth2 {
    /// Constructs a new struct for authenticating using the access token.
    ///
    /// Fails with [`MechanismError::MissingToken`] on an empty token.
    pub fn new<T: Into<Token>>(token: T) -> Result<MessengerOAuth2, MechanismError> {
        let token = token.into();
        if token.is_empty() {
            return Err(MechanismError::MissingToken);
        }
        Ok(MessengerOAuth2 { token })
    }
}

impl Mechanism for MessengerOAuth2 {
    fn name(&self) -> &str {
        "X-MESSENGER-OAUTH2"
    }

    fn from_credentials(credentials: Credentials) -> Result<MessengerOAuth2, MechanismError> {
        match credentials.secret {
            Secret::Token(token) => MessengerOAuth2::new(token),
            Secret::None => Err(MechanismError::MissingToken),
        }
    }

    fn initial(&mut self) -> Vec<u8> {
        self.token.as_bytes().to_vec()
    }

    fn response(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        Err(MechanismError::UnexpectedChallenge)
    }

    fn success(&mut self, data: &[u8]) -> Result<(), MechanismError> {
        if data.is_empty() {
            Ok(())
        } else {
            Err(MechanismError::UnexpectedSuccessData)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn initial_is_the_token() {
        let creds = Credentials::default()
            .with_username("ignored")
            .with_token("EwA4Aq1DBAAU");
        let mut mech = MessengerOAuth2::from_credentials(creds).unwrap();
        assert_eq!(mech.name(), "X-MESSENGER-OAUTH2");
        assert_eq!(mech.initial(), b"EwA4Aq1DBAAU");
        assert_eq!(
            mech.response(b"anything"),
            Err(MechanismError::UnexpectedChallenge)
        );
        assert_eq!(mech.success(b""), Ok(()));
    }

    #[test]
    fn missing_token() {
        assert_eq!(
            MessengerOAuth2::from_credentials(Credentials::default()).unwrap_err(),
            MechanismError::MissingToken
        );
        assert_eq!(
            MessengerOAuth2::new("").unwrap_err(),
            MechanismError::MissingToken
        );
    }

    #[test]
    fn debug_does_not_leak() {
        let mech = MessengerOAuth2::new("hunter2-token").unwrap();
        assert!(!format!("{:?}", mech).contains("hunter2"));
    }
}
