//! JWT parsing, signing-key resolution and validation

mod compact;
mod jwks;
mod keys;
mod validator;

pub use compact::{CompactJwt, JoseHeader};
pub use jwks::{DEFAULT_JWKS_CACHE_TTL, DEFAULT_MIN_REFRESH_INTERVAL, JwksClient, is_allowed_jwks_uri};
pub use keys::{JwkSetResolver, KeyResolver, RemoteJwksResolver, StaticKeyResolver};
pub use validator::{TokenValidator, now_ms};
