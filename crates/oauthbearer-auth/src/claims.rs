//! Decoded JWT payload.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::error::TokenValidationFailure;

/// A single claim value.
///
/// JSON payload members are narrowed to three shapes. Booleans and nested
/// objects become their JSON text, array elements that are not strings
/// likewise, and `null` members are dropped entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimValue {
    String(String),
    Number(Number),
    List(Vec<String>),
}

impl ClaimValue {
    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::String(s)),
            Value::Number(n) => Some(Self::Number(n)),
            Value::Bool(b) => Some(Self::String(b.to_string())),
            Value::Array(items) => Some(Self::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            object @ Value::Object(_) => Some(Self::String(object.to_string())),
        }
    }

    /// Name of the shape, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::List(_) => "list",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Claims of a token, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    claims: BTreeMap<String, ClaimValue>,
}

impl ClaimSet {
    /// Build from a JSON object
    pub fn from_json_object(object: Map<String, Value>) -> Self {
        let claims = object
            .into_iter()
            .filter_map(|(name, value)| ClaimValue::from_json(value).map(|v| (name, v)))
            .collect();
        Self { claims }
    }

    /// Parse a decoded payload section.
    ///
    /// # Errors
    ///
    /// Returns a `malformed` failure if the bytes are not a JSON object.
    pub fn from_slice(payload: &[u8]) -> Result<Self, TokenValidationFailure> {
        match serde_json::from_slice::<Value>(payload) {
            Ok(Value::Object(object)) => Ok(Self::from_json_object(object)),
            Ok(_) => Err(TokenValidationFailure::malformed(
                "JWT payload is not a JSON object",
            )),
            Err(e) => Err(TokenValidationFailure::malformed(format!(
                "malformed JSON payload: {e}"
            ))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.claims.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.claims.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClaimValue)> {
        self.claims.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Read a string claim.
    ///
    /// # Errors
    ///
    /// `wrong-claim-type` if the claim exists with another shape.
    pub fn string(&self, name: &str) -> Result<Option<&str>, TokenValidationFailure> {
        match self.claims.get(name) {
            None => Ok(None),
            Some(ClaimValue::String(s)) => Ok(Some(s)),
            Some(other) => Err(wrong_type(name, "string", other)),
        }
    }

    /// Read a claim that may be a single string or a list of strings,
    /// such as `aud`.
    ///
    /// # Errors
    ///
    /// `wrong-claim-type` for a numeric claim.
    pub fn strings(&self, name: &str) -> Result<Vec<&str>, TokenValidationFailure> {
        match self.claims.get(name) {
            None => Ok(Vec::new()),
            Some(ClaimValue::String(s)) => Ok(vec![s.as_str()]),
            Some(ClaimValue::List(items)) => Ok(items.iter().map(String::as_str).collect()),
            Some(other) => Err(wrong_type(name, "string or list", other)),
        }
    }

    /// Read a NumericDate claim (seconds since the epoch) as epoch
    /// milliseconds. Fractional seconds round to the nearest millisecond.
    ///
    /// # Errors
    ///
    /// `wrong-claim-type` if the claim is not a number or does not fit.
    pub fn time_ms(&self, name: &str) -> Result<Option<i64>, TokenValidationFailure> {
        let number = match self.claims.get(name) {
            None => return Ok(None),
            Some(ClaimValue::Number(n)) => n,
            Some(other) => return Err(wrong_type(name, "number", other)),
        };

        let millis = if let Some(secs) = number.as_i64() {
            secs.checked_mul(1000)
        } else {
            number
                .as_f64()
                .map(|secs| (secs * 1000.0).round())
                .filter(|ms| ms.is_finite() && *ms >= i64::MIN as f64 && *ms <= i64::MAX as f64)
                .map(|ms| ms as i64)
        };

        millis.map(Some).ok_or_else(|| {
            TokenValidationFailure::wrong_claim_type(format!(
                "claim '{name}' is out of range: {number}"
            ))
        })
    }
}

fn wrong_type(name: &str, expected: &str, actual: &ClaimValue) -> TokenValidationFailure {
    TokenValidationFailure::wrong_claim_type(format!(
        "claim '{name}' must be a {expected}, found a {}",
        actual.type_name()
    ))
}
