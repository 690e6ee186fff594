//! Shared helpers for handshake tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use oauthbearer::{
    ClientExchange, ExtensionPolicy, JwtCallbackHandler, SaslError, ServerExchange,
    TokenCallbackHandler,
};
use oauthbearer_auth::{DecodingKey, StaticKeyResolver, TokenValidator, ValidatorConfig};
use serde_json::{Value, json};

pub const SECRET: &[u8] = b"handshake_test_secret_at_least_32_bytes";

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs() as i64
}

pub fn mint(claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(SECRET),
    )
    .expect("encode JWT")
}

pub fn valid_token(sub: &str) -> String {
    let now = now_secs();
    mint(&json!({"sub": sub, "iat": now, "exp": now + 3600, "scope": "kafka"}))
}

pub fn expired_token(sub: &str) -> String {
    let now = now_secs();
    mint(&json!({"sub": sub, "iat": now - 7200, "exp": now - 3600}))
}

pub fn validator_config() -> ValidatorConfig {
    ValidatorConfig::new(Arc::new(StaticKeyResolver::new(DecodingKey::from_secret(
        SECRET,
    ))))
    .with_allowed_algorithms(vec![Algorithm::HS256])
}

pub fn server_handler() -> JwtCallbackHandler {
    JwtCallbackHandler::new(TokenValidator::new(validator_config()))
}

pub fn server() -> ServerExchange {
    ServerExchange::new(Arc::new(server_handler()))
}

pub fn server_with_policy(policy: Arc<dyn ExtensionPolicy>) -> ServerExchange {
    ServerExchange::new(Arc::new(server_handler().with_extension_policy(policy)))
}

pub fn client(token: String) -> ClientExchange {
    ClientExchange::new(Arc::new(TokenCallbackHandler::new(token)))
}

/// Drive both sides until one fails or the client completes.
///
/// Returns the first fatal error from either side.
pub async fn run_handshake(
    client: &mut ClientExchange,
    server: &mut ServerExchange,
) -> Result<(), SaslError> {
    let mut challenge = Vec::new();
    loop {
        let Some(response) = client.evaluate_challenge(&challenge).await? else {
            return Ok(());
        };
        challenge = server.evaluate_response(&response).await?;
    }
}
