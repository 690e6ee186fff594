//! JWT validation producing a [`BearerToken`]

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, warn};

use super::compact::CompactJwt;
use crate::config::ValidatorConfig;
use crate::error::TokenValidationFailure;
use crate::token::BearerToken;

/// Current time in epoch milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Validates compact JWTs against a [`ValidatorConfig`].
///
/// Steps, each with its own failure kind:
///
/// 1. split and decode header and payload (`malformed`)
/// 2. check the algorithm is signed and allowed (`signature-invalid`)
/// 3. resolve the verification key (`key-not-found`)
/// 4. verify the signature (`signature-invalid`)
/// 5. build the [`BearerToken`] from the claims (`no-expiration`,
///    `no-principal`, `wrong-claim-type`)
/// 6. apply the [`crate::ValidationPolicy`]
///
/// The configured OpenID configuration URL is attached to every failure.
/// Cloning shares the key resolver.
///
/// ```
/// use std::sync::Arc;
/// use oauthbearer_auth::{
///     Algorithm, DecodingKey, FailureKind, StaticKeyResolver, TokenValidator, ValidatorConfig,
/// };
///
/// # tokio_test::block_on(async {
/// let resolver = StaticKeyResolver::new(DecodingKey::from_secret(b"secret"));
/// let validator = TokenValidator::new(
///     ValidatorConfig::new(Arc::new(resolver)).with_allowed_algorithms(vec![Algorithm::HS256]),
/// );
///
/// let failure = validator.validate("not-a-jwt").await.unwrap_err();
/// assert_eq!(failure.kind(), FailureKind::Malformed);
/// assert_eq!(failure.status(), "invalid_token");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TokenValidator {
    config: ValidatorConfig,
}

impl TokenValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a token at the current time.
    ///
    /// # Errors
    ///
    /// The [`TokenValidationFailure`] of the first failing step.
    pub async fn validate(&self, token_value: &str) -> Result<BearerToken, TokenValidationFailure> {
        self.validate_at(token_value, now_ms()).await
    }

    /// Validate a token as of `now_ms` (epoch milliseconds).
    ///
    /// # Errors
    ///
    /// The [`TokenValidationFailure`] of the first failing step.
    pub async fn validate_at(
        &self,
        token_value: &str,
        now_ms: i64,
    ) -> Result<BearerToken, TokenValidationFailure> {
        let result = self.validate_inner(token_value, now_ms).await;
        match &result {
            Err(failure) => warn!(
                kind = %failure.kind(),
                token_len = token_value.len(),
                error = %failure,
                "Token validation failed"
            ),
            Ok(token) => debug!(
                principal = %token.principal_name(),
                lifetime_ms = token.lifetime_ms(),
                "Token validated"
            ),
        }
        result.map_err(|failure| match &self.config.openid_configuration {
            Some(url) if failure.openid_configuration().is_none() => {
                failure.with_openid_configuration(url.clone())
            }
            _ => failure,
        })
    }

    async fn validate_inner(
        &self,
        token_value: &str,
        now_ms: i64,
    ) -> Result<BearerToken, TokenValidationFailure> {
        if token_value.is_empty() {
            return Err(TokenValidationFailure::malformed("Empty token"));
        }

        let jwt = CompactJwt::parse(token_value)?;
        let algorithm = jwt.algorithm()?;
        if !self.config.allowed_algorithms.contains(&algorithm) {
            return Err(TokenValidationFailure::signature_invalid(format!(
                "signing algorithm {algorithm:?} is not allowed"
            )));
        }

        let key = self
            .config
            .key_resolver
            .resolve(jwt.key_id(), algorithm)
            .await?;
        verify_signature(token_value, &key, algorithm)?;

        let token = BearerToken::from_claims(token_value, jwt.into_claims(), &self.config.claim_names)?;
        self.config.policy.check(&token, now_ms)?;
        Ok(token)
    }
}

/// Verify the signature only; every claim check is ours
fn verify_signature(
    token_value: &str,
    key: &DecodingKey,
    algorithm: jsonwebtoken::Algorithm,
) -> Result<(), TokenValidationFailure> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<serde_json::Value>(token_value, key, &validation)
        .map(|_| ())
        .map_err(|e| {
            TokenValidationFailure::signature_invalid(format!(
                "JWT signature verification failed: {e}"
            ))
        })
}
