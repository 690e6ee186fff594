//! Client side of the OAUTHBEARER exchange
//!
//! ```text
//! Init ──(empty challenge)──▶ AwaitingFirstServerMessage ──(empty)──▶ Complete
//!                                        │
//!                                  (error body)
//!                                        ▼
//!                         AwaitingServerMessageAfterFailure ──(any)──▶ Failed
//! ```
//!
//! Any other combination of state and challenge fails the exchange.

use std::fmt;
use std::sync::Arc;

use oauthbearer_wire::{CONTINUATION_ACK, ClientInitialResponse, ErrorBody, SaslExtensions};
use secrecy::ExposeSecret;
use tracing::{debug, error, info, warn};

use crate::callback::{Callback, CallbackError, CallbackHandler, CallbackResponse};
use crate::error::{SaslError, SaslResult};
use crate::factory::MECHANISM_NAME;

/// Client exchange states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Init,
    AwaitingFirstServerMessage,
    AwaitingServerMessageAfterFailure,
    Complete,
    Failed,
}

/// One client-side authentication exchange, for one connection
///
/// ```
/// use std::sync::Arc;
/// use oauthbearer::{ClientExchange, ClientState, TokenCallbackHandler};
///
/// # tokio_test::block_on(async {
/// let mut client = ClientExchange::new(Arc::new(TokenCallbackHandler::new("h.p.s")));
///
/// let initial = client.evaluate_challenge(&[]).await.unwrap().unwrap();
/// assert!(initial.starts_with(b"n,,\x01auth=Bearer h.p.s"));
///
/// // Server rejected the token: acknowledge with a single 0x01
/// let ack = client
///     .evaluate_challenge(br#"{"status":"invalid_token"}"#)
///     .await
///     .unwrap();
/// assert_eq!(ack, Some(vec![0x01]));
/// assert_eq!(client.state(), ClientState::AwaitingServerMessageAfterFailure);
/// # });
/// ```
pub struct ClientExchange {
    handler: Arc<dyn CallbackHandler>,
    authorization_id: Option<String>,
    state: ClientState,
    server_error: Option<String>,
}

impl ClientExchange {
    pub fn new(handler: Arc<dyn CallbackHandler>) -> Self {
        Self {
            handler,
            authorization_id: None,
            state: ClientState::Init,
            server_error: None,
        }
    }

    /// Ask to act as `authorization_id`. Blank means none.
    pub fn with_authorization_id(mut self, authorization_id: impl Into<String>) -> Self {
        let authorization_id = authorization_id.into();
        self.authorization_id = (!authorization_id.is_empty()).then_some(authorization_id);
        self
    }

    pub fn mechanism_name(&self) -> &'static str {
        MECHANISM_NAME
    }

    /// The client speaks first
    pub fn has_initial_response(&self) -> bool {
        true
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ClientState::Complete
    }

    /// Error body text the server sent, once one has been received
    pub fn server_error(&self) -> Option<&str> {
        self.server_error.as_deref()
    }

    /// Process a server challenge, returning the bytes to send back, or
    /// `None` once the exchange is complete and nothing more is sent.
    ///
    /// # Errors
    ///
    /// Every error is fatal and leaves the exchange [`ClientState::Failed`]:
    /// [`SaslError::ProtocolState`] for a challenge the current state does
    /// not accept, [`SaslError::AuthenticationFailed`] when the server
    /// answers the acknowledgment of its error, [`SaslError::Internal`] when
    /// the handler cannot supply a token.
    pub async fn evaluate_challenge(&mut self, challenge: &[u8]) -> SaslResult<Option<Vec<u8>>> {
        let result = self.step(challenge).await;
        if let Err(e) = &result {
            error!(state = ?self.state, error = %e, "OAUTHBEARER client exchange failed");
            self.state = ClientState::Failed;
        }
        result
    }

    async fn step(&mut self, challenge: &[u8]) -> SaslResult<Option<Vec<u8>>> {
        match self.state {
            ClientState::Init => {
                if !challenge.is_empty() {
                    return Err(SaslError::protocol_state(format!(
                        "Expected empty challenge, received {} bytes",
                        challenge.len()
                    )));
                }
                let initial = self.initial_response().await?;
                self.state = ClientState::AwaitingFirstServerMessage;
                debug!("Sent initial response, awaiting server message");
                Ok(Some(initial))
            }
            ClientState::AwaitingFirstServerMessage => {
                if challenge.is_empty() {
                    self.state = ClientState::Complete;
                    info!("OAUTHBEARER client authentication complete");
                    return Ok(None);
                }

                let text = String::from_utf8_lossy(challenge).into_owned();
                match ErrorBody::from_bytes(challenge) {
                    Ok(body) => warn!(
                        status = %body.status,
                        scope = ?body.scope,
                        "Server rejected token, acknowledging"
                    ),
                    Err(e) => warn!(error = %e, "Server sent an unparsable error body, acknowledging"),
                }
                self.server_error = Some(text);
                self.state = ClientState::AwaitingServerMessageAfterFailure;
                Ok(Some(CONTINUATION_ACK.to_vec()))
            }
            ClientState::AwaitingServerMessageAfterFailure => {
                Err(SaslError::AuthenticationFailed(format!(
                    "Authentication failed: server rejected the token: {}",
                    self.server_error.as_deref().unwrap_or_default()
                )))
            }
            ClientState::Complete | ClientState::Failed => Err(SaslError::protocol_state(format!(
                "Challenge received in terminal state {:?}",
                self.state
            ))),
        }
    }

    async fn initial_response(&self) -> SaslResult<Vec<u8>> {
        let token = match self.handler.handle(Callback::Token).await {
            Ok(CallbackResponse::Token(token)) => token,
            Ok(other) => {
                return Err(SaslError::Internal(format!(
                    "Token callback answered with a {} response",
                    other.name()
                )));
            }
            Err(e) => return Err(SaslError::Internal(format!("Token callback failed: {e}"))),
        };

        let extensions = match self.handler.handle(Callback::Extensions).await {
            Ok(CallbackResponse::Extensions(extensions)) => extensions,
            // No extensions to offer
            Err(CallbackError::Unsupported(_)) => SaslExtensions::new(),
            Ok(other) => {
                return Err(SaslError::Internal(format!(
                    "Extensions callback answered with a {} response",
                    other.name()
                )));
            }
            Err(e) => {
                return Err(SaslError::Internal(format!(
                    "Extensions callback failed: {e}"
                )));
            }
        };

        let response = ClientInitialResponse::new(
            token.expose_secret().as_str(),
            self.authorization_id.as_deref(),
            extensions,
        )?;
        debug!(
            token_len = response.token_value().len(),
            extensions = response.extensions().len(),
            has_authzid = response.authorization_id().is_some(),
            "Encoding initial client response"
        );
        Ok(response.to_bytes())
    }

    /// Pass-through once complete.
    ///
    /// # Errors
    ///
    /// [`SaslError::NotComplete`] before completion.
    pub fn wrap(&self, outgoing: &[u8]) -> SaslResult<Vec<u8>> {
        self.ensure_complete()?;
        Ok(outgoing.to_vec())
    }

    /// Pass-through once complete.
    ///
    /// # Errors
    ///
    /// [`SaslError::NotComplete`] before completion.
    pub fn unwrap(&self, incoming: &[u8]) -> SaslResult<Vec<u8>> {
        self.ensure_complete()?;
        Ok(incoming.to_vec())
    }

    /// Forget any server error text. Never fails.
    pub fn dispose(&mut self) {
        self.server_error = None;
        if self.state != ClientState::Complete {
            self.state = ClientState::Failed;
        }
    }

    fn ensure_complete(&self) -> SaslResult<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(SaslError::NotComplete)
        }
    }
}

impl fmt::Debug for ClientExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientExchange")
            .field("authorization_id", &self.authorization_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
