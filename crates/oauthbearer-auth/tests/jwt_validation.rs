//! End-to-end token validation tests
//!
//! Tokens are minted with fixture RSA keys and HMAC secrets and run through
//! the full validator: parsing, key resolution, signature verification,
//! claim extraction and policy.

mod common;

use std::sync::Arc;

use common::*;
use oauthbearer_auth::{
    Algorithm, ClaimNames, DecodingKey, FailureKind, JwkSetResolver, StaticKeyResolver,
    TokenValidator, ValidationPolicy, ValidatorConfig, ValidatorOptions,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn rsa_validator() -> TokenValidator {
    let options = ValidatorOptions {
        public_key_pem: Some(PRIMARY_PUBLIC_PEM.to_string()),
        ..Default::default()
    };
    TokenValidator::new(options.build().expect("valid options"))
}

fn hmac_validator(policy: ValidationPolicy) -> TokenValidator {
    let resolver = StaticKeyResolver::new(DecodingKey::from_secret(HMAC_SECRET));
    TokenValidator::new(
        ValidatorConfig::new(Arc::new(resolver))
            .with_allowed_algorithms(vec![Algorithm::HS256])
            .with_policy(policy),
    )
}

#[tokio::test]
async fn test_valid_rs256_token() {
    let validator = rsa_validator();
    let token_value = mint_rs256(PRIMARY_PRIVATE_PEM, None, &valid_claims("alice"));

    let token = validator.validate(&token_value).await.expect("valid token");

    assert_eq!(token.principal_name(), "alice");
    assert_eq!(token.expose_value(), token_value);
    assert_eq!(
        token.scope().iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["read", "write"]
    );
    assert!(token.start_time_ms().is_some());
}

#[tokio::test]
async fn test_bare_pem_body_is_accepted() {
    let options = ValidatorOptions {
        public_key_pem: Some(bare_pem_body(PRIMARY_PUBLIC_PEM)),
        ..Default::default()
    };
    let validator = TokenValidator::new(options.build().expect("valid options"));
    let token_value = mint_rs256(PRIMARY_PRIVATE_PEM, None, &valid_claims("alice"));

    assert!(validator.validate(&token_value).await.is_ok());
}

#[tokio::test]
async fn test_wrong_signing_key() {
    // GIVEN: a token signed by a key the server does not trust
    let token_value = mint_rs256(OTHER_PRIVATE_PEM, None, &valid_claims("mallory"));

    // WHEN: validated against the primary key
    let failure = rsa_validator().validate(&token_value).await.unwrap_err();

    // THEN: signature failure, reported as invalid_token
    assert_eq!(failure.kind(), FailureKind::SignatureInvalid);
    assert_eq!(failure.status(), "invalid_token");
}

#[tokio::test]
async fn test_tampered_payload() {
    let token_value = mint_rs256(PRIMARY_PRIVATE_PEM, None, &valid_claims("alice"));
    let forged_payload = mint_rs256(PRIMARY_PRIVATE_PEM, None, &valid_claims("admin"));

    let mut parts: Vec<&str> = token_value.split('.').collect();
    parts[1] = forged_payload.split('.').nth(1).unwrap();
    let tampered = parts.join(".");

    let failure = rsa_validator().validate(&tampered).await.unwrap_err();
    assert_eq!(failure.kind(), FailureKind::SignatureInvalid);
}

#[tokio::test]
async fn test_hmac_token_rejected_by_default_algorithms() {
    // GIVEN: an HS256 token presented to an RSA deployment (algorithm confusion)
    let token_value = mint_hs256(&valid_claims("alice"));

    let failure = rsa_validator().validate(&token_value).await.unwrap_err();
    assert_eq!(failure.kind(), FailureKind::SignatureInvalid);
}

#[tokio::test]
async fn test_unsigned_token() {
    let token_value = mint_hs256(&valid_claims("alice"));
    let mut parts: Vec<&str> = token_value.split('.').collect();
    let none_header = "eyJhbGciOiJub25lIn0"; // {"alg":"none"}
    parts[0] = none_header;
    parts[2] = "";
    let unsigned = parts.join(".");

    let failure = hmac_validator(ValidationPolicy::default())
        .validate(&unsigned)
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), FailureKind::SignatureInvalid);
}

#[tokio::test]
async fn test_malformed_tokens() {
    let validator = hmac_validator(ValidationPolicy::default());
    for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.sig"] {
        let failure = validator.validate(token).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Malformed, "token {token:?}");
    }
}

#[tokio::test]
async fn test_missing_exp_fails_regardless_of_other_claims() {
    let validator = hmac_validator(ValidationPolicy::default());
    let claims_without_exp = [
        json!({"sub": "alice"}),
        json!({"sub": "alice", "scope": "read", "iat": current_timestamp()}),
        json!({"scope": 12}),
    ];

    for claims in claims_without_exp {
        let failure = validator.validate(&mint_hs256(&claims)).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::NoExpiration, "claims {claims}");
    }
}

#[tokio::test]
async fn test_expired_beyond_skew() {
    let now = current_timestamp();
    let validator = hmac_validator(ValidationPolicy {
        allowable_clock_skew_ms: 30_000,
        ..ValidationPolicy::default()
    });

    for seconds_ago in [31, 120, 86_400] {
        let claims = json!({"sub": "alice", "exp": now - seconds_ago});
        let failure = validator.validate(&mint_hs256(&claims)).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Expired, "expired {seconds_ago}s ago");
    }

    let within_skew = json!({"sub": "alice", "exp": now - 5});
    assert!(validator.validate(&mint_hs256(&within_skew)).await.is_ok());
}

#[tokio::test]
async fn test_validate_at_fixed_time() {
    let validator = hmac_validator(ValidationPolicy::default());
    let token_value = mint_hs256(&json!({"sub": "alice", "iat": 1_000, "exp": 2_000}));

    assert!(validator.validate_at(&token_value, 1_500_000).await.is_ok());
    assert_eq!(
        validator
            .validate_at(&token_value, 2_000_000)
            .await
            .unwrap_err()
            .kind(),
        FailureKind::Expired
    );
    assert_eq!(
        validator
            .validate_at(&token_value, 500_000)
            .await
            .unwrap_err()
            .kind(),
        FailureKind::NotYetValid
    );
}

#[tokio::test]
async fn test_custom_claim_names() {
    let validator = TokenValidator::new(
        ValidatorConfig::new(Arc::new(StaticKeyResolver::new(DecodingKey::from_secret(
            HMAC_SECRET,
        ))))
        .with_allowed_algorithms(vec![Algorithm::HS256])
        .with_claim_names(ClaimNames::new("client_id", "scp")),
    );
    let claims = json!({
        "client_id": "svc-ingest",
        "exp": current_timestamp() + 60,
        "scp": " produce ",
    });

    let token = validator.validate(&mint_hs256(&claims)).await.unwrap();
    assert_eq!(token.principal_name(), "svc-ingest");
    assert!(token.scope().contains("produce"));
}

#[tokio::test]
async fn test_insufficient_scope_carries_required_scope() {
    let options = ValidatorOptions {
        public_key_pem: Some(PRIMARY_PUBLIC_PEM.to_string()),
        required_scope: Some("read admin".to_string()),
        openid_configuration: Some(
            "https://auth.example.com/.well-known/openid-configuration".to_string(),
        ),
        ..Default::default()
    };
    let validator = TokenValidator::new(options.build().unwrap());
    let token_value = mint_rs256(PRIMARY_PRIVATE_PEM, None, &valid_claims("alice"));

    let failure = validator.validate(&token_value).await.unwrap_err();

    assert_eq!(failure.kind(), FailureKind::InsufficientScope);
    assert_eq!(failure.status(), "insufficient_scope");
    assert_eq!(failure.scope(), Some("read admin"));
    assert_eq!(
        failure.openid_configuration(),
        Some("https://auth.example.com/.well-known/openid-configuration")
    );
}

#[tokio::test]
async fn test_openid_configuration_on_every_failure() {
    let validator = TokenValidator::new(
        rsa_validator()
            .config()
            .clone()
            .with_openid_configuration("https://auth.example.com/oidc"),
    );

    let failure = validator.validate("not-a-jwt").await.unwrap_err();
    assert_eq!(failure.kind(), FailureKind::Malformed);
    assert_eq!(failure.openid_configuration(), Some("https://auth.example.com/oidc"));
    assert_eq!(failure.scope(), None);
}

#[tokio::test]
async fn test_audience_and_issuer_options() {
    let options = ValidatorOptions {
        public_key_pem: Some(PRIMARY_PUBLIC_PEM.to_string()),
        expected_audience: Some("kafka-cluster".to_string()),
        expected_issuer: Some("https://auth.example.com".to_string()),
        ..Default::default()
    };
    let validator = TokenValidator::new(options.build().unwrap());

    let mut claims = valid_claims("alice");
    claims["aud"] = json!(["web", "kafka-cluster"]);
    claims["iss"] = json!("https://auth.example.com");
    let good = mint_rs256(PRIMARY_PRIVATE_PEM, None, &claims);
    assert!(validator.validate(&good).await.is_ok());

    claims["aud"] = json!("web");
    let wrong_audience = mint_rs256(PRIMARY_PRIVATE_PEM, None, &claims);
    assert_eq!(
        validator.validate(&wrong_audience).await.unwrap_err().kind(),
        FailureKind::AudienceMismatch
    );
}

#[tokio::test]
async fn test_inline_jwk_set() {
    let jwks = json!({ "keys": [primary_jwk("k-2024")] }).to_string();
    let validator = TokenValidator::new(
        ValidatorConfig::new(Arc::new(JwkSetResolver::from_json(&jwks).unwrap())),
    );

    let token_value = mint_rs256(PRIMARY_PRIVATE_PEM, Some("k-2024"), &valid_claims("alice"));
    assert!(validator.validate(&token_value).await.is_ok());

    let unknown_kid = mint_rs256(PRIMARY_PRIVATE_PEM, Some("k-1999"), &valid_claims("alice"));
    let failure = validator.validate(&unknown_kid).await.unwrap_err();
    assert_eq!(failure.kind(), FailureKind::KeyNotFound);
    assert_eq!(failure.status(), "invalid_token");
}

#[tokio::test]
async fn test_shared_validator_across_tasks() {
    let validator = Arc::new(rsa_validator());
    let mut handles = Vec::new();

    for i in 0..8 {
        let validator = Arc::clone(&validator);
        handles.push(tokio::spawn(async move {
            let user = format!("user{i}");
            let token_value = mint_rs256(PRIMARY_PRIVATE_PEM, None, &valid_claims(&user));
            let token = validator.validate(&token_value).await.unwrap();
            assert_eq!(token.principal_name(), user);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}
