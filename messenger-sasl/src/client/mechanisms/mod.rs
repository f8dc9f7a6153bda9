//! Provides a few SASL mechanisms.

mod messenger_oauth2;

pub use self::messenger_oauth2::MessengerOAuth2;
