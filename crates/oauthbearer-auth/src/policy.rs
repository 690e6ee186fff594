//! Time, audience, issuer and scope checks applied to a built token

use crate::error::{FailureKind, TokenValidationFailure};
use crate::token::BearerToken;

/// Which optional checks run after a token's claims are extracted.
///
/// The defaults verify expiration and not-before with no clock skew and no
/// audience, issuer or scope requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub verify_expiration: bool,
    pub verify_not_before: bool,
    /// Reject tokens that expire at or before their issued-at time
    pub verify_time_consistency: bool,
    pub allowable_clock_skew_ms: u64,
    /// At least one of these must appear in `aud`; empty disables the check
    pub expected_audience: Vec<String>,
    pub expected_issuer: Option<String>,
    /// Every element must be in the token's scope
    pub required_scope: Vec<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            verify_expiration: true,
            verify_not_before: true,
            verify_time_consistency: true,
            allowable_clock_skew_ms: 0,
            expected_audience: Vec::new(),
            expected_issuer: None,
            required_scope: Vec::new(),
        }
    }
}

impl ValidationPolicy {
    /// A policy that checks nothing
    pub fn permissive() -> Self {
        Self {
            verify_expiration: false,
            verify_not_before: false,
            verify_time_consistency: false,
            ..Self::default()
        }
    }

    /// Run every enabled check against `token` at `now_ms`.
    ///
    /// # Errors
    ///
    /// The first failing check, in the order expiration, not-before, time
    /// consistency, audience, issuer, scope.
    pub fn check(&self, token: &BearerToken, now_ms: i64) -> Result<(), TokenValidationFailure> {
        let skew = i64::try_from(self.allowable_clock_skew_ms).unwrap_or(i64::MAX);

        if self.verify_expiration {
            check_expiration(token, now_ms, skew)?;
        }
        if self.verify_not_before {
            check_not_before(token, now_ms, skew)?;
        }
        if self.verify_time_consistency {
            check_time_consistency(token)?;
        }
        if !self.expected_audience.is_empty() {
            check_audience(token, &self.expected_audience)?;
        }
        if let Some(issuer) = &self.expected_issuer {
            check_issuer(token, issuer)?;
        }
        if !self.required_scope.is_empty() {
            check_required_scope(token, &self.required_scope)?;
        }
        Ok(())
    }
}

/// Fails when `now - skew >= lifetime`
pub fn check_expiration(
    token: &BearerToken,
    now_ms: i64,
    skew_ms: i64,
) -> Result<(), TokenValidationFailure> {
    if now_ms.saturating_sub(skew_ms) >= token.lifetime_ms() {
        return Err(TokenValidationFailure::new(
            FailureKind::Expired,
            format!(
                "The indicated time ({now_ms} ms) minus allowable clock skew ({skew_ms} ms) \
                 was on or after the token's expiration time ({} ms)",
                token.lifetime_ms()
            ),
        ));
    }
    Ok(())
}

/// Fails when `iat` or `nbf` is later than `now + skew`
pub fn check_not_before(
    token: &BearerToken,
    now_ms: i64,
    skew_ms: i64,
) -> Result<(), TokenValidationFailure> {
    let latest = now_ms.saturating_add(skew_ms);
    let not_before = token.claims().time_ms("nbf")?;
    for (claim, start) in [("iat", token.start_time_ms()), ("nbf", not_before)] {
        if let Some(start) = start
            && start > latest
        {
            return Err(TokenValidationFailure::new(
                FailureKind::NotYetValid,
                format!(
                    "The indicated time ({now_ms} ms) plus allowable clock skew ({skew_ms} ms) \
                     was before the token's {claim} time ({start} ms)"
                ),
            ));
        }
    }
    Ok(())
}

/// Fails when the token expires at or before it starts
pub fn check_time_consistency(token: &BearerToken) -> Result<(), TokenValidationFailure> {
    if let Some(start) = token.start_time_ms()
        && token.lifetime_ms() <= start
    {
        return Err(TokenValidationFailure::new(
            FailureKind::InconsistentLifetime,
            format!(
                "The token's expiration time ({} ms) is not after its start time ({start} ms)",
                token.lifetime_ms()
            ),
        ));
    }
    Ok(())
}

pub fn check_audience(
    token: &BearerToken,
    expected: &[String],
) -> Result<(), TokenValidationFailure> {
    let audience = token.claims().strings("aud")?;
    if audience
        .iter()
        .any(|aud| expected.iter().any(|e| e == aud))
    {
        return Ok(());
    }
    Err(TokenValidationFailure::new(
        FailureKind::AudienceMismatch,
        format!(
            "The token's audience {audience:?} does not contain any of the expected values {expected:?}"
        ),
    ))
}

pub fn check_issuer(token: &BearerToken, expected: &str) -> Result<(), TokenValidationFailure> {
    match token.claims().string("iss")? {
        Some(issuer) if issuer == expected => Ok(()),
        actual => Err(TokenValidationFailure::new(
            FailureKind::IssuerMismatch,
            format!("The token's issuer {actual:?} is not the expected issuer '{expected}'"),
        )),
    }
}

/// Fails with `failureScope` set to the required scope joined by spaces
pub fn check_required_scope(
    token: &BearerToken,
    required: &[String],
) -> Result<(), TokenValidationFailure> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|s| !token.scope().contains(s.as_str()))
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(TokenValidationFailure::new(
        FailureKind::InsufficientScope,
        format!(
            "The provided scope {:?} was missing a required scope {:?}",
            token.scope(),
            missing
        ),
    )
    .with_scope(required.join(" ")))
}
