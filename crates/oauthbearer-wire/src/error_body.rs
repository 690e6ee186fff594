//! Server error body (RFC 7628 §3.2.2).

use serde::{Deserialize, Serialize};

use crate::{CodecError, CodecResult};

/// JSON object a server sends when it rejects the client's token.
///
/// ```json
/// {"status":"invalid_token","scope":"read write","openid-configuration":"https://..."}
/// ```
///
/// `scope` and `openid-configuration` are omitted when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error status, e.g. `invalid_token` or `insufficient_scope`
    pub status: String,

    /// Scope the client would need
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// URL of the authorization server's OpenID configuration document
    #[serde(
        rename = "openid-configuration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub openid_configuration: Option<String>,
}

impl ErrorBody {
    /// `invalid_token`, the status for any token failure other than scope
    pub const INVALID_TOKEN: &'static str = "invalid_token";

    /// `insufficient_scope`, the status for a missing required scope
    pub const INSUFFICIENT_SCOPE: &'static str = "insufficient_scope";

    /// Create an error body with only a status
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            scope: None,
            openid_configuration: None,
        }
    }

    /// Set the scope field
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the openid-configuration field
    pub fn with_openid_configuration(mut self, url: impl Into<String>) -> Self {
        self.openid_configuration = Some(url.into());
        self
    }

    /// Encode as compact UTF-8 JSON
    pub fn to_bytes(&self) -> Vec<u8> {
        // A struct of strings always serializes
        serde_json::to_vec(self).unwrap_or_else(|_| b"{\"status\":\"invalid_token\"}".to_vec())
    }

    /// Decode from UTF-8 JSON
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] if the bytes are not a JSON object
    /// with a string `status` member.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| CodecError::malformed(format!("invalid error body: {e}")))
    }
}
