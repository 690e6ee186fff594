//! Common test utilities for integration tests
//!
//! Fixture RSA keys, token minting, and a mock JWKS endpoint.

#![allow(dead_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const PRIMARY_PRIVATE_PEM: &str = include_str!("../fixtures/primary_private.pem");
pub const PRIMARY_PUBLIC_PEM: &str = include_str!("../fixtures/primary_public.pem");
pub const OTHER_PRIVATE_PEM: &str = include_str!("../fixtures/other_private.pem");
pub const PRIMARY_JWK: &str = include_str!("../fixtures/primary_jwk.json");

pub const HMAC_SECRET: &[u8] = b"test_secret_key_at_least_32_bytes_long_12345678";

/// Current Unix timestamp in seconds
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs() as i64
}

/// Claims for a token valid for the next hour
pub fn valid_claims(sub: &str) -> Value {
    let now = current_timestamp();
    json!({
        "sub": sub,
        "iat": now - 10,
        "exp": now + 3600,
        "scope": ["read", "write"],
    })
}

/// RS256 token signed with a fixture private key
pub fn mint_rs256(private_pem: &str, kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("fixture key");
    encode(&header, claims, &key).expect("encode JWT")
}

/// HS256 token signed with [`HMAC_SECRET`]
pub fn mint_hs256(claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(HMAC_SECRET),
    )
    .expect("encode JWT")
}

/// The primary public key as a JWK carrying `kid`
pub fn primary_jwk(kid: &str) -> Value {
    let mut jwk: Value = serde_json::from_str(PRIMARY_JWK).expect("fixture JWK");
    jwk["kid"] = json!(kid);
    jwk
}

/// PEM body without armor or line breaks
pub fn bare_pem_body(pem: &str) -> String {
    pem.lines()
        .filter(|line| !line.starts_with("-----"))
        .collect::<String>()
}

/// Mock JWKS endpoint
pub struct MockJwksServer {
    pub server: MockServer,
    pub jwks_uri: String,
}

impl MockJwksServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let jwks_uri = format!("{}/jwks", server.uri());
        Self { server, jwks_uri }
    }

    /// Serve `keys` for at most `times` requests (unbounded if `None`)
    pub async fn serve_keys(&self, keys: Vec<Value>, times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })));
        let mock = match times {
            Some(n) => mock.up_to_n_times(n),
            None => mock,
        };
        mock.mount(&self.server).await;
    }

    /// Answer with `status` for at most `times` requests (unbounded if `None`)
    pub async fn serve_status(&self, status: u16, times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(status));
        let mock = match times {
            Some(n) => mock.up_to_n_times(n),
            None => mock,
        };
        mock.mount(&self.server).await;
    }

    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}
