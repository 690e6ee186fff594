//! Validator configuration
//!
//! [`ValidatorOptions`] is the raw option surface. It can be filled from a
//! string option map (camelCase keys, as a SASL login module receives
//! them), from a TOML/YAML/JSON file with environment overrides, or
//! directly in code. [`ValidatorOptions::build`] checks it and produces the
//! immutable [`ValidatorConfig`] a [`crate::TokenValidator`] runs with.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::KeyResolveError;
use crate::jwt::{
    DEFAULT_JWKS_CACHE_TTL, JwkSetResolver, JwksClient, KeyResolver, RemoteJwksResolver,
    StaticKeyResolver,
};
use crate::policy::ValidationPolicy;
use crate::scope::parse_space_delimited;
use crate::token::ClaimNames;

/// Algorithms accepted when none are configured
pub const DEFAULT_ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

/// Environment variable prefix for [`ValidatorOptions::from_file`]
pub const ENV_PREFIX: &str = "OAUTHBEARER";

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Option value could not be parsed
    #[error("Invalid value for option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },

    #[error("Allowable clock skew millis must not be negative: {0}")]
    NegativeClockSkew(i64),

    #[error("No signing key source configured (set one of publicKeyPem, jwks, jwksUri)")]
    MissingKeySource,

    #[error("Only one signing key source may be configured, found: {0}")]
    ConflictingKeySources(String),

    #[error("Invalid signing key source: {0}")]
    InvalidKeySource(#[from] KeyResolveError),

    #[error("Unsupported JWS algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),
}

/// Raw validator options. Every field is optional; unset fields take the
/// documented defaults in [`ValidatorOptions::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorOptions {
    /// Claim holding the principal name (default `sub`)
    pub principal_claim_name: Option<String>,
    /// Claim holding the scope (default `scope`)
    pub scope_claim_name: Option<String>,
    /// Space-delimited scope every token must carry
    pub required_scope: Option<String>,
    pub allowable_clock_skew_ms: Option<i64>,
    /// PEM public key, full document or bare base64 body
    pub public_key_pem: Option<String>,
    /// Inline JWK set JSON
    pub jwks: Option<String>,
    pub jwks_uri: Option<String>,
    pub jwks_cache_ttl_secs: Option<u64>,
    /// Space-delimited accepted `aud` values
    pub expected_audience: Option<String>,
    pub expected_issuer: Option<String>,
    /// OpenID configuration URL advertised in error bodies
    pub openid_configuration: Option<String>,
    /// Space-delimited JWS algorithm names
    pub allowed_algorithms: Option<String>,
    pub verify_expiration: Option<bool>,
    pub verify_not_before: Option<bool>,
}

impl ValidatorOptions {
    /// Read options from a string map with camelCase keys
    /// (`principalClaimName`, `allowableClockSkewMs`, ...). Unknown keys are
    /// ignored and blank values count as unset.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidOption`] for an unparsable integer or boolean.
    pub fn from_map(options: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut parsed = Self::default();
        for (key, value) in options {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let text = Some(value.to_string());
            match key.as_str() {
                "principalClaimName" => parsed.principal_claim_name = text,
                "scopeClaimName" => parsed.scope_claim_name = text,
                "requiredScope" => parsed.required_scope = text,
                "allowableClockSkewMs" => {
                    parsed.allowable_clock_skew_ms = Some(parse_option(key, value)?);
                }
                "publicKeyPem" => parsed.public_key_pem = text,
                "jwks" => parsed.jwks = text,
                "jwksUri" => parsed.jwks_uri = text,
                "jwksCacheTtlSecs" => parsed.jwks_cache_ttl_secs = Some(parse_option(key, value)?),
                "expectedAudience" => parsed.expected_audience = text,
                "expectedIssuer" => parsed.expected_issuer = text,
                "openidConfiguration" => parsed.openid_configuration = text,
                "allowedAlgorithms" => parsed.allowed_algorithms = text,
                "verifyExpiration" => parsed.verify_expiration = Some(parse_option(key, value)?),
                "verifyNotBefore" => parsed.verify_not_before = Some(parse_option(key, value)?),
                other => debug!(option = %other, "Ignoring unrecognized option"),
            }
        }
        Ok(parsed)
    }

    /// Load options from a file (TOML, YAML, or JSON)
    ///
    /// The format is picked from the file extension. Environment variables
    /// with the `OAUTHBEARER_` prefix override file settings, for example
    /// `OAUTHBEARER_ALLOWABLE_CLOCK_SKEW_MS=30000`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, the format is
    /// unsupported, or the contents do not match the option types.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Self::load(path.as_ref(), None)
    }

    /// Same as [`ValidatorOptions::from_file`], with overrides read from
    /// `env` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Same as [`ValidatorOptions::from_file`].
    pub fn from_file_with_env(
        path: impl AsRef<std::path::Path>,
        env: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        Self::load(path.as_ref(), Some(env))
    }

    fn load(
        path: &std::path::Path,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        use config::{Config, Environment, File, FileFormat};

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml" | "yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        // OAUTHBEARER_ALLOWABLE_CLOCK_SKEW_MS -> allowable_clock_skew_ms
        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env.map(|vars| vars.into_iter().collect()));

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(environment)
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validate and resolve into a [`ValidatorConfig`].
    ///
    /// Exactly one of `public_key_pem`, `jwks` and `jwks_uri` must be set.
    /// No I/O happens here; a remote key set is first fetched on use.
    ///
    /// # Errors
    ///
    /// A [`ConfigError`] for negative clock skew, missing or conflicting key
    /// sources, unusable key material, or unknown algorithm names.
    pub fn build(&self) -> Result<ValidatorConfig, ConfigError> {
        let skew = match self.allowable_clock_skew_ms {
            None => 0,
            Some(ms) if ms < 0 => return Err(ConfigError::NegativeClockSkew(ms)),
            Some(ms) => ms as u64,
        };

        let claim_names = ClaimNames::new(
            self.principal_claim_name.clone().unwrap_or_default(),
            self.scope_claim_name.clone().unwrap_or_default(),
        );

        let policy = ValidationPolicy {
            verify_expiration: self.verify_expiration.unwrap_or(true),
            verify_not_before: self.verify_not_before.unwrap_or(true),
            verify_time_consistency: true,
            allowable_clock_skew_ms: skew,
            expected_audience: parse_space_delimited(
                self.expected_audience.as_deref().unwrap_or_default(),
            ),
            expected_issuer: non_blank(self.expected_issuer.as_deref()),
            required_scope: parse_space_delimited(
                self.required_scope.as_deref().unwrap_or_default(),
            ),
        };

        let allowed_algorithms = match non_blank(self.allowed_algorithms.as_deref()) {
            None => DEFAULT_ALLOWED_ALGORITHMS.to_vec(),
            Some(names) => parse_algorithms(&names)?,
        };

        Ok(ValidatorConfig {
            claim_names,
            policy,
            allowed_algorithms,
            openid_configuration: non_blank(self.openid_configuration.as_deref()),
            key_resolver: self.key_resolver()?,
        })
    }

    fn key_resolver(&self) -> Result<Arc<dyn KeyResolver>, ConfigError> {
        let pem = non_blank(self.public_key_pem.as_deref());
        let jwks = non_blank(self.jwks.as_deref());
        let jwks_uri = non_blank(self.jwks_uri.as_deref());

        let configured: Vec<&str> = [
            ("publicKeyPem", pem.is_some()),
            ("jwks", jwks.is_some()),
            ("jwksUri", jwks_uri.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect();
        if configured.len() > 1 {
            return Err(ConfigError::ConflictingKeySources(configured.join(", ")));
        }

        if let Some(pem) = pem {
            return Ok(Arc::new(StaticKeyResolver::from_pem(&pem)?));
        }
        if let Some(jwks) = jwks {
            return Ok(Arc::new(JwkSetResolver::from_json(&jwks)?));
        }
        if let Some(uri) = jwks_uri {
            let ttl = self
                .jwks_cache_ttl_secs
                .map_or(DEFAULT_JWKS_CACHE_TTL, Duration::from_secs);
            let client = JwksClient::new(uri)?.with_ttl(ttl);
            return Ok(Arc::new(RemoteJwksResolver::new(client)));
        }
        Err(ConfigError::MissingKeySource)
    }
}

fn parse_option<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidOption {
        name: name.to_string(),
        reason: format!("'{value}': {e}"),
    })
}

fn parse_algorithms(names: &str) -> Result<Vec<Algorithm>, ConfigError> {
    names
        .split_whitespace()
        .map(|name| {
            Algorithm::from_str(name).map_err(|_| ConfigError::UnsupportedAlgorithm(name.to_string()))
        })
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolved, immutable validator settings. Cheap to clone; the key resolver
/// is shared.
#[derive(Clone)]
pub struct ValidatorConfig {
    pub claim_names: ClaimNames,
    pub policy: ValidationPolicy,
    pub allowed_algorithms: Vec<Algorithm>,
    pub openid_configuration: Option<String>,
    pub key_resolver: Arc<dyn KeyResolver>,
}

impl ValidatorConfig {
    /// Default claim names, default policy and algorithms, with the given
    /// key source
    pub fn new(key_resolver: Arc<dyn KeyResolver>) -> Self {
        Self {
            claim_names: ClaimNames::default(),
            policy: ValidationPolicy::default(),
            allowed_algorithms: DEFAULT_ALLOWED_ALGORITHMS.to_vec(),
            openid_configuration: None,
            key_resolver,
        }
    }

    pub fn with_claim_names(mut self, claim_names: ClaimNames) -> Self {
        self.claim_names = claim_names;
        self
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_allowed_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    pub fn with_openid_configuration(mut self, url: impl Into<String>) -> Self {
        self.openid_configuration = Some(url.into());
        self
    }
}

impl fmt::Debug for ValidatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorConfig")
            .field("claim_names", &self.claim_names)
            .field("policy", &self.policy)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("openid_configuration", &self.openid_configuration)
            .field("key_resolver", &self.key_resolver)
            .finish()
    }
}
