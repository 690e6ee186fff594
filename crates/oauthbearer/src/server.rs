//! Server side of the OAUTHBEARER exchange
//!
//! One call to [`ServerExchange::evaluate_response`] per client message.
//! A rejected token is answered with a JSON error body and the exchange
//! waits for the client's `0x01` acknowledgment, which then fails it.

use std::fmt;
use std::sync::Arc;

use oauthbearer_auth::BearerToken;
use oauthbearer_wire::{ClientInitialResponse, ErrorBody, SaslExtensions, SaslMessage};
use tracing::{debug, error, info};

use crate::callback::{Callback, CallbackError, CallbackHandler, CallbackResponse};
use crate::error::{SaslError, SaslResult};
use crate::factory::MECHANISM_NAME;

/// Negotiated property holding the token's expiry in epoch milliseconds
pub const CREDENTIAL_LIFETIME_MS: &str = "CREDENTIAL.LIFETIME.MS";

/// Server exchange states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    AwaitingInitial,
    Complete,
    Failed,
    Disposed,
}

/// One server-side authentication exchange, for one connection
pub struct ServerExchange {
    handler: Arc<dyn CallbackHandler>,
    state: ServerState,
    /// Error body sent to the client, awaiting its acknowledgment
    pending_error: Option<String>,
    token: Option<BearerToken>,
    extensions: SaslExtensions,
}

impl ServerExchange {
    pub fn new(handler: Arc<dyn CallbackHandler>) -> Self {
        Self {
            handler,
            state: ServerState::AwaitingInitial,
            pending_error: None,
            token: None,
            extensions: SaslExtensions::new(),
        }
    }

    pub fn mechanism_name(&self) -> &'static str {
        MECHANISM_NAME
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ServerState::Complete
    }

    /// Process one client message and return the bytes to send back.
    ///
    /// An empty response means success. A non-empty response is an error
    /// body; the exchange stays open for the client's acknowledgment.
    ///
    /// # Errors
    ///
    /// Fatal failures move the exchange to [`ServerState::Failed`]:
    /// [`SaslError::AuthenticationFailed`] on the acknowledgment of an error
    /// body, [`SaslError::MalformedMessage`],
    /// [`SaslError::AuthorizationMismatch`],
    /// [`SaslError::ExtensionsRejected`], and [`SaslError::Internal`] for
    /// handler failures. Calling this on a finished or disposed exchange is
    /// a [`SaslError::ProtocolState`] error that leaves the state as is.
    pub async fn evaluate_response(&mut self, response: &[u8]) -> SaslResult<Vec<u8>> {
        if self.state != ServerState::AwaitingInitial {
            return Err(SaslError::protocol_state(format!(
                "Response received in state {:?}",
                self.state
            )));
        }

        let result = self.step(response).await;
        if let Err(e) = &result {
            error!(error = %e, "OAUTHBEARER server exchange failed");
            self.state = ServerState::Failed;
            self.pending_error = None;
        }
        result
    }

    async fn step(&mut self, response: &[u8]) -> SaslResult<Vec<u8>> {
        let message = SaslMessage::decode_client(response);

        if let Some(pending) = self.pending_error.take()
            && matches!(message, Ok(SaslMessage::ContinuationAck))
        {
            info!("Received 0x01 response from client after it received our error");
            return Err(SaslError::AuthenticationFailed(pending));
        }

        let initial = match message {
            Ok(SaslMessage::InitialResponse(initial)) => initial,
            Ok(SaslMessage::ContinuationAck) => {
                return Err(SaslError::protocol_state(
                    "Continuation byte received with no error pending",
                ));
            }
            Ok(other) => {
                return Err(SaslError::protocol_state(format!(
                    "Unexpected server message from client: {other:?}"
                )));
            }
            Err(e) => {
                error!(error = %e, "Unable to parse client initial response");
                return Err(e.into());
            }
        };

        self.process(initial).await
    }

    async fn process(&mut self, initial: ClientInitialResponse) -> SaslResult<Vec<u8>> {
        let (token_value, authorization_id, offered) = initial.into_parts();
        debug!(
            token_len = token_value.len(),
            extensions = offered.len(),
            "Validating client token"
        );

        let validation = self
            .handler
            .handle(Callback::Validation {
                token_value: &token_value,
            })
            .await;
        let token = match validation {
            Ok(CallbackResponse::Validation(Ok(token))) => token,
            Ok(CallbackResponse::Validation(Err(failure))) => {
                let mut body = ErrorBody::new(failure.status());
                if let Some(scope) = failure.scope() {
                    body = body.with_scope(scope);
                }
                if let Some(url) = failure.openid_configuration() {
                    body = body.with_openid_configuration(url);
                }
                let bytes = body.to_bytes();
                let text = String::from_utf8_lossy(&bytes).into_owned();
                info!(
                    kind = %failure.kind(),
                    reason = %failure.description(),
                    body = %text,
                    "Token rejected, sending error body"
                );
                self.pending_error = Some(text);
                return Ok(bytes);
            }
            Ok(other) => {
                return Err(SaslError::internal_on_server(format!(
                    "validation callback answered with a {} response",
                    other.name()
                )));
            }
            Err(e) => return Err(SaslError::internal_on_server(e)),
        };

        if let Some(requested) = authorization_id
            && requested != token.principal_name()
        {
            return Err(SaslError::AuthorizationMismatch {
                requested,
                principal: token.principal_name().to_string(),
            });
        }

        let extensions = self.negotiate_extensions(&token, &offered).await?;

        info!(
            principal = %token.principal_name(),
            extensions = extensions.len(),
            "Successfully authenticated"
        );
        self.token = Some(token);
        self.extensions = extensions;
        self.state = ServerState::Complete;
        Ok(Vec::new())
    }

    async fn negotiate_extensions(
        &self,
        token: &BearerToken,
        offered: &SaslExtensions,
    ) -> SaslResult<SaslExtensions> {
        let verdict = self
            .handler
            .handle(Callback::ExtensionsValidation {
                token,
                extensions: offered,
            })
            .await;
        match verdict {
            Ok(CallbackResponse::ExtensionsValidation(verdict)) => {
                verdict.limited_to(offered).into_result()
            }
            // Handler does not validate extensions: none are negotiated
            Err(CallbackError::Unsupported(_)) => Ok(SaslExtensions::new()),
            Ok(other) => Err(SaslError::internal_on_server(format!(
                "extensions callback answered with a {} response",
                other.name()
            ))),
            Err(e) => Err(SaslError::internal_on_server(e)),
        }
    }

    /// The authenticated principal name.
    ///
    /// # Errors
    ///
    /// [`SaslError::NotComplete`] before completion.
    pub fn authorization_id(&self) -> SaslResult<&str> {
        self.token().map(BearerToken::principal_name)
    }

    /// The validated token.
    ///
    /// # Errors
    ///
    /// [`SaslError::NotComplete`] before completion.
    pub fn token(&self) -> SaslResult<&BearerToken> {
        match (&self.token, self.state) {
            (Some(token), ServerState::Complete) => Ok(token),
            _ => Err(SaslError::NotComplete),
        }
    }

    /// Extensions accepted during the exchange.
    ///
    /// # Errors
    ///
    /// [`SaslError::NotComplete`] before completion.
    pub fn negotiated_extensions(&self) -> SaslResult<&SaslExtensions> {
        self.token()?;
        Ok(&self.extensions)
    }

    /// [`CREDENTIAL_LIFETIME_MS`] yields the token expiry; any other name
    /// is looked up among the negotiated extensions.
    ///
    /// # Errors
    ///
    /// [`SaslError::NotComplete`] before completion.
    pub fn negotiated_property(&self, name: &str) -> SaslResult<Option<String>> {
        let token = self.token()?;
        if name == CREDENTIAL_LIFETIME_MS {
            return Ok(Some(token.lifetime_ms().to_string()));
        }
        Ok(self.extensions.get(name).map(str::to_string))
    }

    /// Pass-through once complete.
    ///
    /// # Errors
    ///
    /// [`SaslError::NotComplete`] before completion.
    pub fn wrap(&self, outgoing: &[u8]) -> SaslResult<Vec<u8>> {
        self.token()?;
        Ok(outgoing.to_vec())
    }

    /// Pass-through once complete.
    ///
    /// # Errors
    ///
    /// [`SaslError::NotComplete`] before completion.
    pub fn unwrap(&self, incoming: &[u8]) -> SaslResult<Vec<u8>> {
        self.token()?;
        Ok(incoming.to_vec())
    }

    /// Drop the token and extensions. Never fails; the exchange cannot be
    /// used afterwards.
    pub fn dispose(&mut self) {
        self.token = None;
        self.extensions.clear();
        self.pending_error = None;
        self.state = ServerState::Disposed;
        debug!("OAUTHBEARER server exchange disposed");
    }
}

impl fmt::Debug for ServerExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerExchange")
            .field("state", &self.state)
            .field("pending_error", &self.pending_error.is_some())
            .field("token", &self.token)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}
