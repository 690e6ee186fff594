//! Signing-key resolution
//!
//! A [`KeyResolver`] turns a token's key id and algorithm into a
//! [`DecodingKey`]. Resolvers are shared by every exchange on a server, so
//! they are `Send + Sync` and resolution is async: fetching a remote key set
//! never blocks unrelated connections.

use std::fmt;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey};
use tracing::{debug, warn};

use super::jwks::JwksClient;
use crate::error::KeyResolveError;

/// Source of JWT verification keys
#[async_trait]
pub trait KeyResolver: Send + Sync + fmt::Debug {
    /// Produce the key that verifies a token with this key id and algorithm.
    ///
    /// # Errors
    ///
    /// [`KeyResolveError`] when no usable key exists or the source is
    /// unreachable.
    async fn resolve(
        &self,
        key_id: Option<&str>,
        algorithm: Algorithm,
    ) -> Result<DecodingKey, KeyResolveError>;
}

/// A single fixed key, used for every token regardless of key id
#[derive(Clone)]
pub struct StaticKeyResolver {
    key: DecodingKey,
}

impl StaticKeyResolver {
    pub fn new(key: DecodingKey) -> Self {
        Self { key }
    }

    /// Load a public key from PEM.
    ///
    /// Accepts a complete `PUBLIC KEY` or `RSA PUBLIC KEY` document, or
    /// only its base64 body (line breaks optional). RSA, EC and Ed25519
    /// keys are recognized.
    ///
    /// # Errors
    ///
    /// [`KeyResolveError::InvalidKey`] if the text is not a supported
    /// public key.
    pub fn from_pem(pem: &str) -> Result<Self, KeyResolveError> {
        let document = normalize_pem(pem)?;
        let bytes = document.as_bytes();

        let key = DecodingKey::from_rsa_pem(bytes)
            .or_else(|_| DecodingKey::from_ec_pem(bytes))
            .or_else(|_| DecodingKey::from_ed_pem(bytes))
            .map_err(|e| KeyResolveError::InvalidKey(format!("unsupported public key PEM: {e}")))?;
        Ok(Self::new(key))
    }
}

impl fmt::Debug for StaticKeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyResolver").finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve(
        &self,
        _key_id: Option<&str>,
        _algorithm: Algorithm,
    ) -> Result<DecodingKey, KeyResolveError> {
        Ok(self.key.clone())
    }
}

/// Wrap a bare base64 body in `PUBLIC KEY` armor, re-flowed to 64 columns
fn normalize_pem(pem: &str) -> Result<String, KeyResolveError> {
    let trimmed = pem.trim();
    if trimmed.starts_with("-----BEGIN") {
        return Ok(trimmed.to_string());
    }

    let body: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if body.is_empty() {
        return Err(KeyResolveError::InvalidKey("empty public key".to_string()));
    }

    let mut document = String::from("-----BEGIN PUBLIC KEY-----\n");
    for line in body.as_bytes().chunks(64) {
        // base64 text is ASCII so every chunk is valid UTF-8
        document.push_str(&String::from_utf8_lossy(line));
        document.push('\n');
    }
    document.push_str("-----END PUBLIC KEY-----\n");
    Ok(document)
}

/// An immutable, in-memory JWK set
#[derive(Debug, Clone)]
pub struct JwkSetResolver {
    jwks: JwkSet,
}

impl JwkSetResolver {
    pub fn new(jwks: JwkSet) -> Self {
        Self { jwks }
    }

    /// Parse a JWK set document.
    ///
    /// # Errors
    ///
    /// [`KeyResolveError::InvalidKey`] if the JSON is not a JWK set.
    pub fn from_json(json: &str) -> Result<Self, KeyResolveError> {
        serde_json::from_str(json)
            .map(Self::new)
            .map_err(|e| KeyResolveError::InvalidKey(format!("invalid JWK set: {e}")))
    }

    pub fn jwks(&self) -> &JwkSet {
        &self.jwks
    }
}

#[async_trait]
impl KeyResolver for JwkSetResolver {
    async fn resolve(
        &self,
        key_id: Option<&str>,
        _algorithm: Algorithm,
    ) -> Result<DecodingKey, KeyResolveError> {
        decoding_key(select_key(&self.jwks, key_id)?)
    }
}

/// Keys fetched from a JWKS endpoint through a caching [`JwksClient`]
#[derive(Debug, Clone)]
pub struct RemoteJwksResolver {
    client: JwksClient,
}

impl RemoteJwksResolver {
    pub fn new(client: JwksClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &JwksClient {
        &self.client
    }
}

#[async_trait]
impl KeyResolver for RemoteJwksResolver {
    async fn resolve(
        &self,
        key_id: Option<&str>,
        _algorithm: Algorithm,
    ) -> Result<DecodingKey, KeyResolveError> {
        let jwks = self.client.get_jwks().await?;
        match select_key(&jwks, key_id) {
            Ok(jwk) => decoding_key(jwk),
            Err(KeyResolveError::UnknownKeyId(kid)) => {
                // Signing key may have rotated since the cache was filled
                debug!(
                    jwks_uri = %self.client.jwks_uri(),
                    kid = %kid,
                    "Key id not in cached JWKS, refreshing"
                );
                let jwks = self.client.refresh().await?;
                decoding_key(select_key(&jwks, key_id)?)
            }
            Err(e) => Err(e),
        }
    }
}

/// Pick the key for `key_id`; without one the set must hold exactly one key
fn select_key<'a>(jwks: &'a JwkSet, key_id: Option<&str>) -> Result<&'a Jwk, KeyResolveError> {
    match key_id {
        Some(kid) => jwks.find(kid).ok_or_else(|| {
            warn!(kid = %kid, "Key id not found in JWKS");
            KeyResolveError::UnknownKeyId(kid.to_string())
        }),
        None => match jwks.keys.as_slice() {
            [only] => Ok(only),
            keys => Err(KeyResolveError::AmbiguousKey(keys.len())),
        },
    }
}

fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, KeyResolveError> {
    DecodingKey::from_jwk(jwk)
        .map_err(|e| KeyResolveError::InvalidKey(format!("unusable JWK: {e}")))
}
