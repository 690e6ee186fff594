//! The validated bearer token

use std::collections::BTreeSet;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::claims::ClaimSet;
use crate::error::{FailureKind, TokenValidationFailure};
use crate::scope::scope_from_claims;

/// Default claim holding the principal name
pub const DEFAULT_PRINCIPAL_CLAIM_NAME: &str = "sub";
/// Default claim holding the scope
pub const DEFAULT_SCOPE_CLAIM_NAME: &str = "scope";

/// Which claims hold the principal and the scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimNames {
    pub principal: String,
    pub scope: String,
}

impl ClaimNames {
    /// Blank names fall back to `sub` / `scope`
    pub fn new(principal: impl Into<String>, scope: impl Into<String>) -> Self {
        let or_default = |name: String, default: &str| {
            if name.trim().is_empty() {
                default.to_string()
            } else {
                name.trim().to_string()
            }
        };
        Self {
            principal: or_default(principal.into(), DEFAULT_PRINCIPAL_CLAIM_NAME),
            scope: or_default(scope.into(), DEFAULT_SCOPE_CLAIM_NAME),
        }
    }
}

impl Default for ClaimNames {
    fn default() -> Self {
        Self::new(DEFAULT_PRINCIPAL_CLAIM_NAME, DEFAULT_SCOPE_CLAIM_NAME)
    }
}

/// An OAuth 2 bearer token whose claims passed validation.
///
/// Immutable once built. The compact serialization is held as a
/// [`SecretString`] and zeroed when the token is dropped.
pub struct BearerToken {
    value: SecretString,
    principal_name: String,
    scope: BTreeSet<String>,
    lifetime_ms: i64,
    start_time_ms: Option<i64>,
    claims: ClaimSet,
}

impl BearerToken {
    /// Build a token from its verified claims.
    ///
    /// Checks run in a fixed order so the reported failure is stable:
    /// expiration, principal, scope, issued-at.
    ///
    /// # Errors
    ///
    /// `no-expiration` without an `exp` claim, `no-principal` when the
    /// principal claim is missing, blank or not a string, and
    /// `wrong-claim-type` for unusable `exp`, `iat` or scope claims.
    pub fn from_claims(
        value: impl Into<String>,
        claims: ClaimSet,
        names: &ClaimNames,
    ) -> Result<Self, TokenValidationFailure> {
        let lifetime_ms = claims.time_ms("exp")?.ok_or_else(|| {
            TokenValidationFailure::new(
                FailureKind::NoExpiration,
                "No expiration time (exp) claim in the token",
            )
        })?;

        let principal_name = match claims.get(&names.principal).and_then(|v| v.as_str()) {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => {
                return Err(TokenValidationFailure::new(
                    FailureKind::NoPrincipal,
                    format!(
                        "No principal name in the '{}' claim of the token",
                        names.principal
                    ),
                ));
            }
        };

        let scope = scope_from_claims(&claims, &names.scope)?;
        let start_time_ms = claims.time_ms("iat")?;

        Ok(Self {
            value: SecretString::new(value.into()),
            principal_name,
            scope,
            lifetime_ms,
            start_time_ms,
            claims,
        })
    }

    /// The compact serialization
    pub fn value(&self) -> &SecretString {
        &self.value
    }

    /// The compact serialization as text
    pub fn expose_value(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn principal_name(&self) -> &str {
        &self.principal_name
    }

    pub fn scope(&self) -> &BTreeSet<String> {
        &self.scope
    }

    /// Expiry, epoch milliseconds
    pub fn lifetime_ms(&self) -> i64 {
        self.lifetime_ms
    }

    /// Issuance, epoch milliseconds
    pub fn start_time_ms(&self) -> Option<i64> {
        self.start_time_ms
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }
}

impl Clone for BearerToken {
    fn clone(&self) -> Self {
        Self {
            value: SecretString::new(self.value.expose_secret().clone()),
            principal_name: self.principal_name.clone(),
            scope: self.scope.clone(),
            lifetime_ms: self.lifetime_ms,
            start_time_ms: self.start_time_ms,
            claims: self.claims.clone(),
        }
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"[REDACTED]")
            .field("principal_name", &self.principal_name)
            .field("scope", &self.scope)
            .field("lifetime_ms", &self.lifetime_ms)
            .field("start_time_ms", &self.start_time_ms)
            .finish_non_exhaustive()
    }
}
