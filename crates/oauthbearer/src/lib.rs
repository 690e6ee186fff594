//! # OAuthBearer - SASL OAUTHBEARER Mechanism
//!
//! Client and server exchanges for the SASL OAUTHBEARER mechanism
//! (RFC 7628), with signed JWT bearer tokens validated by
//! [`oauthbearer_auth`] and messages encoded by [`oauthbearer_wire`].
//!
//! ## Architecture
//!
//! - [`client`] - [`ClientExchange`] state machine
//! - [`server`] - [`ServerExchange`] state machine
//! - [`callback`] - [`Callback`] requests the exchanges make of the
//!   application, and the [`CallbackHandler`] trait that answers them
//! - [`handler`] - Stock handlers: [`TokenCallbackHandler`] (client) and
//!   [`JwtCallbackHandler`] (server)
//! - [`extensions`] - [`ExtensionNegotiator`] with pluggable
//!   [`ExtensionPolicy`]
//! - [`factory`] - [`OAuthBearerClientFactory`] and
//!   [`OAuthBearerServerFactory`]
//! - [`error`] - [`SaslError`]
//!
//! ## Handshake
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use oauthbearer::{ClientExchange, JwtCallbackHandler, ServerExchange, TokenCallbackHandler};
//! use oauthbearer_auth::ValidatorOptions;
//!
//! # async fn run() -> Result<(), oauthbearer::SaslError> {
//! let options = ValidatorOptions {
//!     jwks_uri: Some("https://auth.example.com/.well-known/jwks.json".into()),
//!     ..Default::default()
//! };
//! let mut server = ServerExchange::new(Arc::new(JwtCallbackHandler::from_options(&options)?));
//! let mut client = ClientExchange::new(Arc::new(TokenCallbackHandler::new("eyJ...")));
//!
//! let initial = client.evaluate_challenge(&[]).await?.unwrap_or_default();
//! let reply = server.evaluate_response(&initial).await?;
//! client.evaluate_challenge(&reply).await?;
//!
//! if server.is_complete() {
//!     println!("authenticated as {}", server.authorization_id()?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod client;
pub mod error;
pub mod extensions;
pub mod factory;
pub mod handler;
pub mod server;

pub use callback::{Callback, CallbackError, CallbackHandler, CallbackResponse};
pub use client::{ClientExchange, ClientState};
pub use error::{SaslError, SaslResult};
pub use extensions::{
    AcceptAll, AllowList, ExtensionNegotiator, ExtensionPolicy, ExtensionsVerdict,
};
pub use factory::{
    MECHANISM_NAME, OAuthBearerClientFactory, OAuthBearerServerFactory, SaslClientFactory,
    SaslProperties, SaslServerFactory,
};
pub use handler::{JwtCallbackHandler, TokenCallbackHandler};
pub use server::{CREDENTIAL_LIFETIME_MS, ServerExchange, ServerState};

pub use oauthbearer_wire::SaslExtensions;
