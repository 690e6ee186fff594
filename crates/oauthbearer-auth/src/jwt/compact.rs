//! Compact JWS serialization: `header.payload.signature`

use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::Algorithm;
use serde::Deserialize;

use crate::claims::ClaimSet;
use crate::error::TokenValidationFailure;

/// JOSE header members the validator reads
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JoseHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub typ: Option<String>,
}

/// A compact JWT split into its decoded sections. The signature is not
/// verified here.
#[derive(Debug, Clone)]
pub struct CompactJwt {
    header: JoseHeader,
    claims: ClaimSet,
    signature: String,
}

impl CompactJwt {
    /// Split and decode a compact serialization.
    ///
    /// # Errors
    ///
    /// A `malformed` failure unless the token has exactly three sections and
    /// the first two are base64url-encoded JSON objects.
    pub fn parse(token: &str) -> Result<Self, TokenValidationFailure> {
        let sections: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = sections.as_slice() else {
            return Err(TokenValidationFailure::malformed(format!(
                "JWT must have 3 dot-separated sections, found {}",
                sections.len()
            )));
        };

        let header_bytes = decode_section("header", header)?;
        let header: JoseHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
            TokenValidationFailure::malformed(format!("malformed JSON header: {e}"))
        })?;

        let claims = ClaimSet::from_slice(&decode_section("payload", payload)?)?;

        Ok(Self {
            header,
            claims,
            signature: (*signature).to_string(),
        })
    }

    pub fn header(&self) -> &JoseHeader {
        &self.header
    }

    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    pub fn into_claims(self) -> ClaimSet {
        self.claims
    }

    /// The declared signing algorithm.
    ///
    /// # Errors
    ///
    /// `signature-invalid` for an unsigned token (`alg: none` or an empty
    /// signature) or an algorithm name this library does not implement.
    pub fn algorithm(&self) -> Result<Algorithm, TokenValidationFailure> {
        if self.header.alg.eq_ignore_ascii_case("none") || self.signature.is_empty() {
            return Err(TokenValidationFailure::signature_invalid(
                "JWT is not in a signed state",
            ));
        }
        Algorithm::from_str(&self.header.alg).map_err(|_| {
            TokenValidationFailure::signature_invalid(format!(
                "unsupported signing algorithm '{}'",
                self.header.alg
            ))
        })
    }
}

fn decode_section(name: &str, section: &str) -> Result<Vec<u8>, TokenValidationFailure> {
    URL_SAFE_NO_PAD.decode(section).map_err(|e| {
        TokenValidationFailure::malformed(format!("malformed base64url {name} section: {e}"))
    })
}
