//! Server-side extension negotiation

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use oauthbearer_auth::BearerToken;
use oauthbearer_wire::SaslExtensions;
use tracing::{debug, warn};

use crate::error::{SaslError, SaslResult};

/// Decides whether a single offered extension is acceptable
pub trait ExtensionPolicy: Send + Sync + fmt::Debug {
    /// Accept the extension, or reject it with a reason.
    ///
    /// # Errors
    ///
    /// The rejection reason, reported back in the aggregate error.
    fn validate(&self, token: &BearerToken, name: &str, value: &str) -> Result<(), String>;
}

/// Accepts every extension as offered
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ExtensionPolicy for AcceptAll {
    fn validate(&self, _token: &BearerToken, _name: &str, _value: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Accepts only the named extensions
#[derive(Debug, Default, Clone)]
pub struct AllowList {
    allowed: BTreeSet<String>,
}

impl AllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl ExtensionPolicy for AllowList {
    fn validate(&self, _token: &BearerToken, name: &str, _value: &str) -> Result<(), String> {
        if self.allowed.contains(name) {
            Ok(())
        } else {
            Err("extension is not supported".to_string())
        }
    }
}

/// Outcome of validating a set of offered extensions.
///
/// Either everything offered was validated, or at least one name was
/// rejected and nothing counts as validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionsVerdict {
    validated: SaslExtensions,
    rejected: Vec<(String, String)>,
}

impl ExtensionsVerdict {
    /// Accept these extensions. The server keeps only names the client
    /// offered; anything else is dropped.
    pub fn accept(validated: SaslExtensions) -> Self {
        Self {
            validated,
            rejected: Vec::new(),
        }
    }

    /// Reject with `(name, reason)` pairs in rejection order
    pub fn reject(rejected: Vec<(String, String)>) -> Self {
        Self {
            validated: SaslExtensions::new(),
            rejected,
        }
    }

    pub fn validated(&self) -> &SaslExtensions {
        &self.validated
    }

    pub fn rejected(&self) -> &[(String, String)] {
        &self.rejected
    }

    pub fn is_rejected(&self) -> bool {
        !self.rejected.is_empty()
    }

    /// Drop validated names the client never offered
    pub fn limited_to(mut self, offered: &SaslExtensions) -> Self {
        let unoffered: Vec<String> = self
            .validated
            .iter()
            .filter(|(name, _)| !offered.contains(name))
            .map(|(name, _)| name.to_string())
            .collect();
        for name in unoffered {
            warn!(extension = %name, "Dropping validated extension the client did not offer");
            self.validated.remove(&name);
        }
        self
    }

    /// The validated extensions, or every rejection.
    ///
    /// # Errors
    ///
    /// [`SaslError::ExtensionsRejected`] if anything was rejected.
    pub fn into_result(self) -> SaslResult<SaslExtensions> {
        if self.rejected.is_empty() {
            Ok(self.validated)
        } else {
            Err(SaslError::ExtensionsRejected {
                rejected: self.rejected,
            })
        }
    }
}

/// Runs an [`ExtensionPolicy`] over every offered extension
#[derive(Debug, Clone)]
pub struct ExtensionNegotiator {
    policy: Arc<dyn ExtensionPolicy>,
}

impl Default for ExtensionNegotiator {
    fn default() -> Self {
        Self::new(Arc::new(AcceptAll))
    }
}

impl ExtensionNegotiator {
    pub fn new(policy: Arc<dyn ExtensionPolicy>) -> Self {
        Self { policy }
    }

    /// Check each offered extension in name order. Any rejection empties
    /// the validated set.
    pub fn verdict(&self, token: &BearerToken, offered: &SaslExtensions) -> ExtensionsVerdict {
        let rejected: Vec<(String, String)> = offered
            .iter()
            .filter_map(|(name, value)| {
                self.policy
                    .validate(token, name, value)
                    .err()
                    .map(|reason| (name.to_string(), reason))
            })
            .collect();

        if rejected.is_empty() {
            debug!(count = offered.len(), "Extensions validated");
            ExtensionsVerdict::accept(offered.clone())
        } else {
            warn!(
                rejected = rejected.len(),
                offered = offered.len(),
                "Extensions rejected"
            );
            ExtensionsVerdict::reject(rejected)
        }
    }

    /// Validate offered extensions.
    ///
    /// # Errors
    ///
    /// [`SaslError::ExtensionsRejected`] naming every rejected extension.
    pub fn negotiate(
        &self,
        token: &BearerToken,
        offered: &SaslExtensions,
    ) -> SaslResult<SaslExtensions> {
        self.verdict(token, offered).into_result()
    }
}
