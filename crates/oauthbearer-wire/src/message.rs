//! Tagged view over every message the mechanism exchanges.

use crate::{
    CONTINUATION_ACK, ClientInitialResponse, CodecResult, ErrorBody, is_continuation_ack,
};

/// A single OAUTHBEARER handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslMessage {
    /// Client's first message carrying the token
    InitialResponse(ClientInitialResponse),
    /// Client's `0x01` acknowledgment of a server error
    ContinuationAck,
    /// Server's rejection of the token
    ErrorBody(ErrorBody),
    /// Server's empty success response
    EmptySuccess,
}

impl SaslMessage {
    /// Decode a client → server message.
    ///
    /// The single byte `0x01` is recognized before any attempt to parse an
    /// initial response.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::CodecError`] if the bytes are neither the
    /// acknowledgment nor a valid initial response.
    pub fn decode_client(bytes: &[u8]) -> CodecResult<Self> {
        if is_continuation_ack(bytes) {
            return Ok(Self::ContinuationAck);
        }
        ClientInitialResponse::from_bytes(bytes).map(Self::InitialResponse)
    }

    /// Decode a server → client message.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::CodecError`] if a non-empty message is not a valid
    /// JSON error body.
    pub fn decode_server(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::EmptySuccess);
        }
        ErrorBody::from_bytes(bytes).map(Self::ErrorBody)
    }

    /// Encode to wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::InitialResponse(response) => response.to_bytes(),
            Self::ContinuationAck => CONTINUATION_ACK.to_vec(),
            Self::ErrorBody(body) => body.to_bytes(),
            Self::EmptySuccess => Vec::new(),
        }
    }

    /// Whether the message originates from the client
    pub fn is_client_message(&self) -> bool {
        matches!(self, Self::InitialResponse(_) | Self::ContinuationAck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SaslExtensions;

    #[test]
    fn test_decode_client_ack_first() {
        assert_eq!(
            SaslMessage::decode_client(&[0x01]).unwrap(),
            SaslMessage::ContinuationAck
        );
    }

    #[test]
    fn test_decode_client_initial_response() {
        let response = ClientInitialResponse::new("a.b.c", None, SaslExtensions::new()).unwrap();
        let message = SaslMessage::InitialResponse(response);
        let decoded = SaslMessage::decode_client(&message.to_bytes()).unwrap();
        assert_eq!(decoded, message);
        assert!(decoded.is_client_message());
    }

    #[test]
    fn test_decode_server_messages() {
        assert_eq!(
            SaslMessage::decode_server(&[]).unwrap(),
            SaslMessage::EmptySuccess
        );

        let body = ErrorBody::new(ErrorBody::INVALID_TOKEN);
        let decoded = SaslMessage::decode_server(&body.to_bytes()).unwrap();
        assert_eq!(decoded, SaslMessage::ErrorBody(body));
        assert!(!decoded.is_client_message());
    }

    #[test]
    fn test_empty_success_encodes_to_nothing() {
        assert!(SaslMessage::EmptySuccess.to_bytes().is_empty());
        assert_eq!(SaslMessage::ContinuationAck.to_bytes(), vec![0x01]);
    }
}
