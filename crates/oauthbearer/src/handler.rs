//! Stock callback handlers

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use oauthbearer_auth::{TokenValidator, ValidatorOptions};
use oauthbearer_wire::SaslExtensions;
use secrecy::{ExposeSecret, SecretString};

use crate::callback::{Callback, CallbackError, CallbackHandler, CallbackResponse};
use crate::error::SaslResult;
use crate::extensions::{ExtensionNegotiator, ExtensionPolicy};

/// Client handler that supplies a fixed token and extensions
pub struct TokenCallbackHandler {
    token: SecretString,
    extensions: SaslExtensions,
}

impl TokenCallbackHandler {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            extensions: SaslExtensions::new(),
        }
    }

    pub fn with_extensions(mut self, extensions: SaslExtensions) -> Self {
        self.extensions = extensions;
        self
    }
}

impl fmt::Debug for TokenCallbackHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCallbackHandler")
            .field("token", &"[REDACTED]")
            .field("extensions", &self.extensions)
            .finish()
    }
}

#[async_trait]
impl CallbackHandler for TokenCallbackHandler {
    async fn handle(&self, callback: Callback<'_>) -> Result<CallbackResponse, CallbackError> {
        match callback {
            Callback::Token => Ok(CallbackResponse::Token(SecretString::new(
                self.token.expose_secret().clone(),
            ))),
            Callback::Extensions => Ok(CallbackResponse::Extensions(self.extensions.clone())),
            other => Err(CallbackError::Unsupported(other.name())),
        }
    }
}

/// Server handler: validates tokens with a [`TokenValidator`] and
/// extensions with an [`ExtensionNegotiator`]
#[derive(Debug, Clone)]
pub struct JwtCallbackHandler {
    validator: TokenValidator,
    negotiator: ExtensionNegotiator,
}

impl JwtCallbackHandler {
    /// Accepts every offered extension
    pub fn new(validator: TokenValidator) -> Self {
        Self {
            validator,
            negotiator: ExtensionNegotiator::default(),
        }
    }

    /// Build from raw validator options.
    ///
    /// # Errors
    ///
    /// [`crate::SaslError::Configuration`] if the options do not build.
    pub fn from_options(options: &ValidatorOptions) -> SaslResult<Self> {
        Ok(Self::new(TokenValidator::new(options.build()?)))
    }

    pub fn with_extension_policy(mut self, policy: Arc<dyn ExtensionPolicy>) -> Self {
        self.negotiator = ExtensionNegotiator::new(policy);
        self
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }
}

#[async_trait]
impl CallbackHandler for JwtCallbackHandler {
    async fn handle(&self, callback: Callback<'_>) -> Result<CallbackResponse, CallbackError> {
        match callback {
            Callback::Validation { token_value } => Ok(CallbackResponse::Validation(
                self.validator.validate(token_value).await,
            )),
            Callback::ExtensionsValidation { token, extensions } => Ok(
                CallbackResponse::ExtensionsValidation(self.negotiator.verdict(token, extensions)),
            ),
            other => Err(CallbackError::Unsupported(other.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_handler_answers_client_requests_only() {
        let mut extensions = SaslExtensions::new();
        extensions.insert("traceId", "7").unwrap();
        let handler = TokenCallbackHandler::new("abc").with_extensions(extensions.clone());

        match handler.handle(Callback::Token).await.unwrap() {
            CallbackResponse::Token(token) => assert_eq!(token.expose_secret(), "abc"),
            other => panic!("unexpected response: {other:?}"),
        }
        match handler.handle(Callback::Extensions).await.unwrap() {
            CallbackResponse::Extensions(ext) => assert_eq!(ext, extensions),
            other => panic!("unexpected response: {other:?}"),
        }
        assert!(matches!(
            handler
                .handle(Callback::Validation { token_value: "abc" })
                .await,
            Err(CallbackError::Unsupported("validation"))
        ));
    }

    #[test]
    fn test_token_handler_debug_redacts() {
        let handler = TokenCallbackHandler::new("super-secret");
        assert!(!format!("{handler:?}").contains("super-secret"));
    }

    #[tokio::test]
    async fn test_jwt_handler_rejects_client_requests() {
        let options = ValidatorOptions {
            jwks: Some(r#"{"keys":[{"kty":"oct","kid":"k","k":"c2VjcmV0"}]}"#.into()),
            ..Default::default()
        };
        let handler = JwtCallbackHandler::from_options(&options).unwrap();
        assert!(matches!(
            handler.handle(Callback::Token).await,
            Err(CallbackError::Unsupported("token"))
        ));
    }

    #[test]
    fn test_jwt_handler_reports_config_errors() {
        let err = JwtCallbackHandler::from_options(&ValidatorOptions::default()).unwrap_err();
        assert!(matches!(err, crate::SaslError::Configuration(_)));
    }
}
