//! Error types for the OAUTHBEARER exchanges

use oauthbearer_auth::ConfigError;
use oauthbearer_wire::CodecError;
use thiserror::Error;

/// Message prefix for server-side callback failures
pub const INTERNAL_ERROR_ON_SERVER: &str =
    "Authentication could not be performed due to an internal error on the server";

/// Every way a SASL exchange can fail.
///
/// All variants are fatal: once returned, the exchange is finished and the
/// connection should be closed. A rejected token is not an error on the
/// server side; it is answered with an error body and only becomes
/// [`SaslError::AuthenticationFailed`] after the client acknowledges it.
#[derive(Error, Debug)]
pub enum SaslError {
    /// Invalid mechanism configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Peer message could not be decoded, or an outgoing one encoded
    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] CodecError),

    /// Message arrived in a state that does not accept it
    #[error("Protocol state error: {0}")]
    ProtocolState(String),

    /// Client asked to act as someone other than the token's principal
    #[error(
        "Authentication failed: Client requested an authorization id ({requested}) that is different from the token's principal name ({principal})"
    )]
    AuthorizationMismatch { requested: String, principal: String },

    /// One or more offered extensions were rejected
    #[error(
        "Authentication failed: {} extensions are invalid! They are: {}",
        .rejected.len(),
        format_rejections(.rejected)
    )]
    ExtensionsRejected { rejected: Vec<(String, String)> },

    /// Token was rejected and the error round trip is over
    #[error("{0}")]
    AuthenticationFailed(String),

    /// A callback handler failed or answered with the wrong response
    #[error("{0}")]
    Internal(String),

    /// Identity, properties, or wrap/unwrap used before completion
    #[error("Authentication exchange has not completed")]
    NotComplete,
}

impl SaslError {
    pub(crate) fn protocol_state(message: impl Into<String>) -> Self {
        Self::ProtocolState(message.into())
    }

    pub(crate) fn internal_on_server(detail: impl std::fmt::Display) -> Self {
        Self::Internal(format!("{INTERNAL_ERROR_ON_SERVER}: {detail}"))
    }
}

/// `name: reason; name2: reason2`, in rejection order
pub fn format_rejections(rejected: &[(String, String)]) -> String {
    rejected
        .iter()
        .map(|(name, reason)| format!("{name}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for SASL operations
pub type SaslResult<T> = Result<T, SaslError>;
