//! # OAuthBearer Auth - Token Validation
//!
//! Validation of signed JWT bearer tokens for the SASL OAUTHBEARER
//! mechanism (RFC 7628).
//!
//! ## Architecture
//!
//! - [`jwt`] - Compact JWT parsing, [`TokenValidator`], and signing-key
//!   resolvers (static PEM, inline JWK set, remote JWKS with caching)
//! - [`claims`] - [`ClaimSet`], the decoded payload narrowed to string,
//!   number and list values
//! - [`token`] - [`BearerToken`], the immutable result of a successful
//!   validation
//! - [`scope`] - Scope claim computation
//! - [`policy`] - Expiration, not-before, audience, issuer and required
//!   scope checks
//! - [`config`] - [`ValidatorOptions`] loading and [`ValidatorConfig`]
//! - [`error`] - [`TokenValidationFailure`], [`KeyResolveError`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oauthbearer_auth::{TokenValidator, ValidatorOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ValidatorOptions {
//!     jwks_uri: Some("https://auth.example.com/.well-known/jwks.json".into()),
//!     required_scope: Some("kafka".into()),
//!     ..Default::default()
//! };
//! let validator = TokenValidator::new(options.build()?);
//!
//! match validator.validate("eyJ...").await {
//!     Ok(token) => println!("authenticated {}", token.principal_name()),
//!     Err(failure) => println!("rejected ({}): {failure}", failure.status()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod claims;
pub mod config;
pub mod error;
pub mod jwt;
pub mod policy;
pub mod scope;
pub mod token;

pub use claims::{ClaimSet, ClaimValue};
pub use config::{ConfigError, DEFAULT_ALLOWED_ALGORITHMS, ValidatorConfig, ValidatorOptions};
pub use error::{FailureKind, KeyResolveError, TokenValidationFailure};
pub use jwt::{
    JwkSetResolver, JwksClient, KeyResolver, RemoteJwksResolver, StaticKeyResolver,
    TokenValidator,
};
pub use policy::ValidationPolicy;
pub use token::{BearerToken, ClaimNames};

/// Re-exported so callers can build keys and name algorithms without a
/// direct dependency
pub use jsonwebtoken::{Algorithm, DecodingKey};
