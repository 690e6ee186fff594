//! Error types for token validation and key resolution

use std::fmt;

use thiserror::Error;

/// Category of a token validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Not a 3-part compact serialization, or a section is not encoded JSON
    Malformed,
    /// Signature did not verify, or the token is unsigned / uses a disallowed algorithm
    SignatureInvalid,
    /// No verification key could be resolved for the token
    KeyNotFound,
    /// Missing `exp` claim
    NoExpiration,
    /// Missing, blank or non-string principal claim
    NoPrincipal,
    /// A claim has a type the validator cannot use
    WrongClaimType,
    /// Token lifetime has ended
    Expired,
    /// Token start time (`iat`/`nbf`) is in the future
    NotYetValid,
    /// Token expires at or before it was issued
    InconsistentLifetime,
    /// `aud` does not name this service
    AudienceMismatch,
    /// `iss` is not the expected issuer
    IssuerMismatch,
    /// Token scope lacks a required element
    InsufficientScope,
}

impl FailureKind {
    /// Stable kebab-case name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::SignatureInvalid => "signature-invalid",
            Self::KeyNotFound => "key-not-found",
            Self::NoExpiration => "no-expiration",
            Self::NoPrincipal => "no-principal",
            Self::WrongClaimType => "wrong-claim-type",
            Self::Expired => "expired",
            Self::NotYetValid => "not-yet-valid",
            Self::InconsistentLifetime => "inconsistent-lifetime",
            Self::AudienceMismatch => "audience-mismatch",
            Self::IssuerMismatch => "issuer-mismatch",
            Self::InsufficientScope => "insufficient-scope",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a token was rejected.
///
/// This is the failure arm of token validation. It carries everything the
/// server needs to build the RFC 7628 error body: `scope` is set only for
/// scope-insufficiency failures, and `openid_configuration` when the
/// deployment advertises a discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{description}")]
pub struct TokenValidationFailure {
    kind: FailureKind,
    description: String,
    scope: Option<String>,
    openid_configuration: Option<String>,
}

impl TokenValidationFailure {
    /// Status for every failure other than insufficient scope
    pub const INVALID_TOKEN: &'static str = "invalid_token";
    /// Status for a failure that names the scope the client lacks
    pub const INSUFFICIENT_SCOPE: &'static str = "insufficient_scope";

    /// Create a failure. A blank description is replaced by the kind name.
    pub fn new(kind: FailureKind, description: impl Into<String>) -> Self {
        let description = description.into();
        let description = if description.trim().is_empty() {
            kind.as_str().to_string()
        } else {
            description
        };
        Self {
            kind,
            description,
            scope: None,
            openid_configuration: None,
        }
    }

    /// Token could not be parsed
    pub fn malformed(description: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, description)
    }

    /// Signature or algorithm problem
    pub fn signature_invalid(description: impl Into<String>) -> Self {
        Self::new(FailureKind::SignatureInvalid, description)
    }

    /// A claim was present but unusable
    pub fn wrong_claim_type(description: impl Into<String>) -> Self {
        Self::new(FailureKind::WrongClaimType, description)
    }

    /// Attach the scope the client would need
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Attach the authorization server's OpenID configuration URL
    pub fn with_openid_configuration(mut self, url: impl Into<String>) -> Self {
        self.openid_configuration = Some(url.into());
        self
    }

    /// Failure category
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Human-readable reason, never empty
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Scope the client lacks, if this is a scope failure
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// OpenID configuration URL to advertise
    pub fn openid_configuration(&self) -> Option<&str> {
        self.openid_configuration.as_deref()
    }

    /// RFC 6750 error code for the server's error body
    pub fn status(&self) -> &'static str {
        if self.scope.is_some() {
            Self::INSUFFICIENT_SCOPE
        } else {
            Self::INVALID_TOKEN
        }
    }
}

/// Failure to produce a verification key for a token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyResolveError {
    /// The key source has no key with this id
    #[error("No key with id '{0}' in the key set")]
    UnknownKeyId(String),

    /// Token carries no key id and the key source cannot pick one
    #[error("Token has no key id and the key set holds {0} keys")]
    AmbiguousKey(usize),

    /// Remote key source could not be read
    #[error("Key source unavailable: {0}")]
    Unavailable(String),

    /// Key material exists but cannot verify this token
    #[error("Unusable key material: {0}")]
    InvalidKey(String),
}

impl From<KeyResolveError> for TokenValidationFailure {
    fn from(err: KeyResolveError) -> Self {
        Self::new(FailureKind::KeyNotFound, err.to_string())
    }
}
