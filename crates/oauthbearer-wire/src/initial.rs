//! The client's initial response (RFC 7628 §3.1).
//!
//! ```text
//! gs2-header  = ("n" / "y") "," ["a=" saslname] ","
//! message     = gs2-header %x01 "auth=Bearer " token *(%x01 key "=" value) %x01 %x01
//! ```
//!
//! The authorization id is a `saslname` (RFC 5801): `,` travels as `=2C`
//! and `=` as `=3D`.

use std::fmt;

use tracing::debug;

use crate::extensions::{AUTH_KEY, validate_name};
use crate::{CodecError, CodecResult, SEPARATOR, SaslExtensions};

const SEP: char = SEPARATOR as char;
const TERMINATOR: &str = "\u{1}\u{1}";
const BEARER_SCHEME: &str = "Bearer";

/// Decoded (or to-be-encoded) initial client message.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientInitialResponse {
    token_value: String,
    authorization_id: Option<String>,
    extensions: SaslExtensions,
}

// Manual Debug impl so the bearer token never reaches logs
impl fmt::Debug for ClientInitialResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientInitialResponse")
            .field(
                "token_value",
                &format_args!("<redacted {} bytes>", self.token_value.len()),
            )
            .field("authorization_id", &self.authorization_id)
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl ClientInitialResponse {
    /// Build an initial response.
    ///
    /// An empty authorization id is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Unencodable`] if the token is empty or contains
    /// the `0x01` separator.
    pub fn new(
        token_value: impl Into<String>,
        authorization_id: Option<&str>,
        extensions: SaslExtensions,
    ) -> CodecResult<Self> {
        let token_value = token_value.into();
        if token_value.is_empty() {
            return Err(CodecError::unencodable("token value must not be empty"));
        }
        if token_value.contains(SEP) {
            return Err(CodecError::unencodable(
                "token value must not contain the 0x01 separator",
            ));
        }

        Ok(Self {
            token_value,
            authorization_id: authorization_id
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            extensions,
        })
    }

    /// The bearer token, verbatim
    pub fn token_value(&self) -> &str {
        &self.token_value
    }

    /// The requested authorization id, if any
    pub fn authorization_id(&self) -> Option<&str> {
        self.authorization_id.as_deref()
    }

    /// The offered extensions
    pub fn extensions(&self) -> &SaslExtensions {
        &self.extensions
    }

    /// Split into `(token_value, authorization_id, extensions)`
    pub fn into_parts(self) -> (String, Option<String>, SaslExtensions) {
        (self.token_value, self.authorization_id, self.extensions)
    }

    /// Encode to wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut message = String::with_capacity(self.token_value.len() + 32);
        message.push_str("n,");
        if let Some(authzid) = &self.authorization_id {
            message.push_str("a=");
            message.push_str(&escape_saslname(authzid));
        }
        message.push(',');
        message.push(SEP);
        message.push_str(AUTH_KEY);
        message.push('=');
        message.push_str(BEARER_SCHEME);
        message.push(' ');
        message.push_str(&self.token_value);
        for (name, value) in self.extensions.iter() {
            message.push(SEP);
            message.push_str(name);
            message.push('=');
            message.push_str(value);
        }
        message.push(SEP);
        message.push(SEP);
        message.into_bytes()
    }

    /// Decode wire bytes
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] if the bytes are not a well-formed
    /// initial response, or [`CodecError::InvalidExtension`] if an extension
    /// violates the extension grammar.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| CodecError::malformed("initial response is not valid UTF-8"))?;

        let (authorization_id, rest) = parse_gs2_header(text)?;

        let body = rest
            .strip_prefix(SEP)
            .and_then(|r| r.strip_suffix(TERMINATOR))
            .ok_or_else(|| {
                CodecError::malformed("initial response must be framed by 0x01 separators")
            })?;

        let mut token_value = None;
        let mut extensions = SaslExtensions::new();
        for pair in body.split(SEP) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| CodecError::malformed("expected key=value pair"))?;

            if key == AUTH_KEY {
                if token_value.is_some() {
                    return Err(CodecError::malformed("duplicate auth field"));
                }
                token_value = Some(parse_auth_value(value)?);
                continue;
            }

            validate_name(key)?;
            if extensions.contains(key) {
                return Err(CodecError::malformed(format!("duplicate extension '{key}'")));
            }
            extensions.insert(key, value)?;
        }

        let token_value =
            token_value.ok_or_else(|| CodecError::malformed("missing auth field"))?;

        debug!(
            token_len = token_value.len(),
            has_authzid = authorization_id.is_some(),
            extension_count = extensions.len(),
            "Decoded client initial response"
        );

        Ok(Self {
            token_value,
            authorization_id,
            extensions,
        })
    }
}

fn parse_gs2_header(text: &str) -> CodecResult<(Option<String>, &str)> {
    let rest = match text.strip_prefix("n,").or_else(|| text.strip_prefix("y,")) {
        Some(rest) => rest,
        None if text.starts_with("p=") => {
            return Err(CodecError::malformed("channel binding is not supported"));
        }
        None => return Err(CodecError::malformed("missing GS2 header")),
    };

    if let Some(after) = rest.strip_prefix("a=") {
        let end = after
            .find(',')
            .ok_or_else(|| CodecError::malformed("GS2 header is not terminated"))?;
        let authzid = unescape_saslname(&after[..end])?;
        let authzid = (!authzid.is_empty()).then_some(authzid);
        return Ok((authzid, &after[end + 1..]));
    }

    let rest = rest
        .strip_prefix(',')
        .ok_or_else(|| CodecError::malformed("GS2 header is not terminated"))?;
    Ok((None, rest))
}

fn parse_auth_value(value: &str) -> CodecResult<String> {
    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| CodecError::malformed("auth field must be '<scheme> <token>'"))?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(CodecError::malformed(format!(
            "unsupported auth scheme '{scheme}'"
        )));
    }
    if token.is_empty() {
        return Err(CodecError::malformed("empty bearer token"));
    }
    Ok(token.to_string())
}

fn escape_saslname(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            ',' => escaped.push_str("=2C"),
            '=' => escaped.push_str("=3D"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn unescape_saslname(name: &str) -> CodecResult<String> {
    let mut unescaped = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(pos) = rest.find('=') {
        unescaped.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 3);
        match code {
            Some("2C") => unescaped.push(','),
            Some("3D") => unescaped.push('='),
            _ => {
                return Err(CodecError::malformed(
                    "invalid escape sequence in authorization id",
                ));
            }
        }
        rest = &rest[pos + 3..];
    }
    unescaped.push_str(rest);
    Ok(unescaped)
}
