//! Server exchange edge cases: state errors, handler failures, disposal

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use oauthbearer::{
    Callback, CallbackError, CallbackHandler, CallbackResponse, ExtensionsVerdict, SaslError,
    SaslExtensions, ServerExchange, ServerState,
};
use oauthbearer_auth::TokenValidator;
use oauthbearer_wire::ClientInitialResponse;

fn initial(token: &str, authzid: Option<&str>, extensions: SaslExtensions) -> Vec<u8> {
    ClientInitialResponse::new(token, authzid, extensions)
        .unwrap()
        .to_bytes()
}

/// Validates tokens but does not handle extension validation
struct ValidationOnly(TokenValidator);

#[async_trait]
impl CallbackHandler for ValidationOnly {
    async fn handle(&self, callback: Callback<'_>) -> Result<CallbackResponse, CallbackError> {
        match callback {
            Callback::Validation { token_value } => {
                Ok(CallbackResponse::Validation(self.0.validate(token_value).await))
            }
            other => Err(CallbackError::Unsupported(other.name())),
        }
    }
}

/// Fails every request
struct Broken;

#[async_trait]
impl CallbackHandler for Broken {
    async fn handle(&self, _callback: Callback<'_>) -> Result<CallbackResponse, CallbackError> {
        Err(CallbackError::Failed("key store offline".to_string()))
    }
}

/// Answers validation with the wrong response kind
struct Confused;

#[async_trait]
impl CallbackHandler for Confused {
    async fn handle(&self, _callback: Callback<'_>) -> Result<CallbackResponse, CallbackError> {
        Ok(CallbackResponse::Extensions(SaslExtensions::new()))
    }
}

/// Validates tokens and accepts extensions beyond those offered
struct OverAccepting(TokenValidator);

#[async_trait]
impl CallbackHandler for OverAccepting {
    async fn handle(&self, callback: Callback<'_>) -> Result<CallbackResponse, CallbackError> {
        match callback {
            Callback::Validation { token_value } => {
                Ok(CallbackResponse::Validation(self.0.validate(token_value).await))
            }
            Callback::ExtensionsValidation { extensions, .. } => {
                let mut validated = extensions.clone();
                validated.insert("role", "admin").unwrap();
                Ok(CallbackResponse::ExtensionsValidation(ExtensionsVerdict::accept(
                    validated,
                )))
            }
            other => Err(CallbackError::Unsupported(other.name())),
        }
    }
}

#[tokio::test]
async fn test_malformed_initial_response_is_fatal() {
    let mut server = server();
    let err = server.evaluate_response(b"not a sasl message").await.unwrap_err();
    assert!(matches!(err, SaslError::MalformedMessage(_)));
    assert_eq!(server.state(), ServerState::Failed);
}

#[tokio::test]
async fn test_ack_without_pending_error() {
    let mut server = server();
    let err = server.evaluate_response(&[0x01]).await.unwrap_err();
    assert!(matches!(err, SaslError::ProtocolState(_)));
    assert_eq!(server.state(), ServerState::Failed);
}

#[tokio::test]
async fn test_new_initial_response_clears_pending_error() {
    let mut server = server();

    let body = server
        .evaluate_response(&initial(&expired_token("alice"), None, SaslExtensions::new()))
        .await
        .unwrap();
    assert!(!body.is_empty());

    // A fresh token instead of the acknowledgment is evaluated normally
    let reply = server
        .evaluate_response(&initial(&valid_token("alice"), None, SaslExtensions::new()))
        .await
        .unwrap();
    assert!(reply.is_empty());
    assert!(server.is_complete());
}

#[tokio::test]
async fn test_garbage_token_gets_error_body() {
    let mut server = server();
    let body = server
        .evaluate_response(&initial("not-a-jwt", None, SaslExtensions::new()))
        .await
        .unwrap();
    assert_eq!(body, br#"{"status":"invalid_token"}"#.to_vec());
}

#[tokio::test]
async fn test_reevaluating_complete_exchange_is_an_error() {
    let mut server = server();
    let message = initial(&valid_token("alice"), None, SaslExtensions::new());
    server.evaluate_response(&message).await.unwrap();

    let err = server.evaluate_response(&message).await.unwrap_err();
    assert!(matches!(err, SaslError::ProtocolState(_)));
    // The completed authentication is kept
    assert_eq!(server.state(), ServerState::Complete);
    assert_eq!(server.authorization_id().unwrap(), "alice");
}

#[tokio::test]
async fn test_reevaluating_failed_exchange_is_an_error() {
    let mut server = server();
    server.evaluate_response(b"garbage").await.unwrap_err();

    let err = server
        .evaluate_response(&initial(&valid_token("alice"), None, SaslExtensions::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, SaslError::ProtocolState(_)));
    assert_eq!(server.state(), ServerState::Failed);
}

#[tokio::test]
async fn test_dispose_clears_state() {
    let mut extensions = SaslExtensions::new();
    extensions.insert("traceId", "1").unwrap();

    let mut server = server();
    server
        .evaluate_response(&initial(&valid_token("alice"), None, extensions))
        .await
        .unwrap();
    assert!(server.is_complete());

    server.dispose();
    assert_eq!(server.state(), ServerState::Disposed);
    assert!(matches!(server.authorization_id(), Err(SaslError::NotComplete)));
    assert!(server.negotiated_extensions().is_err());
    assert!(server.wrap(b"x").is_err());

    // Disposing twice is harmless, and a disposed exchange takes no input
    server.dispose();
    assert!(matches!(
        server.evaluate_response(&[0x01]).await,
        Err(SaslError::ProtocolState(_))
    ));
}

#[tokio::test]
async fn test_wrap_unwrap_pass_through_after_completion() {
    let mut server = server();
    assert!(matches!(server.unwrap(b"data"), Err(SaslError::NotComplete)));

    server
        .evaluate_response(&initial(&valid_token("alice"), None, SaslExtensions::new()))
        .await
        .unwrap();
    assert_eq!(server.wrap(b"data").unwrap(), b"data".to_vec());
    assert_eq!(server.unwrap(b"data").unwrap(), b"data".to_vec());
}

#[tokio::test]
async fn test_unsupported_extension_validation_negotiates_nothing() {
    let handler = ValidationOnly(TokenValidator::new(validator_config()));
    let mut server = ServerExchange::new(Arc::new(handler));

    let mut extensions = SaslExtensions::new();
    extensions.insert("traceId", "1").unwrap();
    let reply = server
        .evaluate_response(&initial(&valid_token("alice"), None, extensions))
        .await
        .unwrap();

    assert!(reply.is_empty());
    assert!(server.negotiated_extensions().unwrap().is_empty());
}

#[tokio::test]
async fn test_handler_failure_is_internal_error() {
    let mut server = ServerExchange::new(Arc::new(Broken));
    let err = server
        .evaluate_response(&initial("a.b.c", None, SaslExtensions::new()))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Authentication could not be performed due to an internal error on the server: key store offline"
    );
    assert_eq!(server.state(), ServerState::Failed);
}

#[tokio::test]
async fn test_wrong_response_kind_is_internal_error() {
    let mut server = ServerExchange::new(Arc::new(Confused));
    let err = server
        .evaluate_response(&initial("a.b.c", None, SaslExtensions::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, SaslError::Internal(_)));
}

#[tokio::test]
async fn test_only_offered_extensions_are_negotiated() {
    let handler = OverAccepting(TokenValidator::new(validator_config()));
    let mut server = ServerExchange::new(Arc::new(handler));

    let mut extensions = SaslExtensions::new();
    extensions.insert("traceId", "1").unwrap();
    let reply = server
        .evaluate_response(&initial(&valid_token("alice"), None, extensions.clone()))
        .await
        .unwrap();

    assert!(reply.is_empty());
    assert_eq!(server.negotiated_extensions().unwrap(), &extensions);
    assert_eq!(server.negotiated_property("role").unwrap(), None);
}
