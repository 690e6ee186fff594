//! # OAUTHBEARER Wire Format Codec
//!
//! This crate encodes and decodes the messages exchanged by the SASL
//! OAUTHBEARER mechanism (RFC 7628). It knows nothing about tokens beyond
//! their opaque string value; validation lives in `oauthbearer-auth`.
//!
//! ## Messages
//!
//! | Direction | Message | Bytes |
//! |-----------|---------|-------|
//! | client → server | initial response | `n,a=<authzid>,\x01auth=Bearer <token>\x01k=v\x01\x01` |
//! | client → server | error acknowledgment | `\x01` |
//! | server → client | error body | `{"status":"invalid_token",...}` |
//! | server → client | success | empty |
//!
//! ## Usage
//!
//! ```rust
//! use oauthbearer_wire::{ClientInitialResponse, SaslExtensions};
//!
//! let mut extensions = SaslExtensions::new();
//! extensions.insert("traceId", "abc123").unwrap();
//!
//! let response = ClientInitialResponse::new("eyJhbGciOi.eyJzdWIi.c2ln", Some("alice"), extensions).unwrap();
//! let bytes = response.to_bytes();
//!
//! let decoded = ClientInitialResponse::from_bytes(&bytes).unwrap();
//! assert_eq!(decoded, response);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error_body;
mod extensions;
mod initial;
mod message;

pub use error_body::ErrorBody;
pub use extensions::SaslExtensions;
pub use initial::ClientInitialResponse;
pub use message::SaslMessage;

use thiserror::Error;

/// Field separator of the initial response, and the whole of the client's
/// error acknowledgment.
pub const SEPARATOR: u8 = 0x01;

/// Single-byte message a client sends after receiving an error body.
pub const CONTINUATION_ACK: [u8; 1] = [SEPARATOR];

/// Version of the initial-response layout implemented by this crate.
///
/// Version 1 is the RFC 7628 §3.1 layout with RFC 5801 `saslname` escaping
/// of the authorization id.
pub const WIRE_VERSION: u8 = 1;

/// Wire format codec error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The bytes do not form a valid message
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A value cannot be represented on the wire
    #[error("cannot encode: {0}")]
    Unencodable(String),

    /// An extension name or value violates the extension grammar
    #[error("invalid extension '{name}': {reason}")]
    InvalidExtension {
        /// Offending extension name
        name: String,
        /// Why it was rejected
        reason: String,
    },
}

impl CodecError {
    /// Create a decoding error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Create an encoding error
    pub fn unencodable(message: impl Into<String>) -> Self {
        Self::Unencodable(message.into())
    }
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Check whether `bytes` is exactly the client's error acknowledgment.
pub fn is_continuation_ack(bytes: &[u8]) -> bool {
    bytes == CONTINUATION_ACK
}
