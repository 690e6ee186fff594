//! Boundary between the exchanges and the application
//!
//! The exchanges never obtain tokens or make policy decisions themselves.
//! They ask a [`CallbackHandler`] with a [`Callback`] and act on the
//! [`CallbackResponse`]. A handler answers only the requests it supports;
//! everything else is [`CallbackError::Unsupported`].

use async_trait::async_trait;
use oauthbearer_auth::{BearerToken, TokenValidationFailure};
use oauthbearer_wire::SaslExtensions;
use secrecy::SecretString;
use thiserror::Error;

use crate::extensions::ExtensionsVerdict;

/// A request from an exchange to the application
#[derive(Debug, Clone, Copy)]
pub enum Callback<'a> {
    /// Client: supply the bearer token
    Token,
    /// Client: supply extensions to send with the token
    Extensions,
    /// Server: validate the token the client sent
    Validation { token_value: &'a str },
    /// Server: decide which offered extensions to accept. Validated names
    /// outside `extensions` are ignored.
    ExtensionsValidation {
        token: &'a BearerToken,
        extensions: &'a SaslExtensions,
    },
}

impl Callback<'_> {
    /// Short name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Extensions => "extensions",
            Self::Validation { .. } => "validation",
            Self::ExtensionsValidation { .. } => "extensions-validation",
        }
    }
}

/// The answer to a [`Callback`], one variant per request kind
#[derive(Debug)]
pub enum CallbackResponse {
    Token(SecretString),
    Extensions(SaslExtensions),
    Validation(Result<BearerToken, TokenValidationFailure>),
    ExtensionsValidation(ExtensionsVerdict),
}

impl CallbackResponse {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::Extensions(_) => "extensions",
            Self::Validation(_) => "validation",
            Self::ExtensionsValidation(_) => "extensions-validation",
        }
    }
}

/// Handler failures
#[derive(Error, Debug)]
pub enum CallbackError {
    /// Handler does not answer this kind of request
    #[error("Unsupported callback: {0}")]
    Unsupported(&'static str),

    /// Handler tried and failed
    #[error("{0}")]
    Failed(String),
}

/// Application side of the exchanges. Shared between exchanges, so it must
/// be `Send + Sync`.
#[async_trait]
pub trait CallbackHandler: Send + Sync {
    /// Answer one request.
    ///
    /// # Errors
    ///
    /// [`CallbackError::Unsupported`] for requests this handler does not
    /// serve, [`CallbackError::Failed`] otherwise.
    async fn handle(&self, callback: Callback<'_>) -> Result<CallbackResponse, CallbackError>;
}
