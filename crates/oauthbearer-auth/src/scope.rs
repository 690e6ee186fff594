//! Scope claim handling

use std::collections::BTreeSet;

use crate::claims::{ClaimSet, ClaimValue};
use crate::error::TokenValidationFailure;

/// Compute a token's scope from its claims.
///
/// A string claim is one scope element: the whole trimmed string, not split
/// on whitespace. A list claim contributes each trimmed element. Blank
/// strings and elements are dropped and a missing claim gives an empty set.
///
/// # Errors
///
/// `wrong-claim-type` when the claim is a number.
pub fn scope_from_claims(
    claims: &ClaimSet,
    scope_claim_name: &str,
) -> Result<BTreeSet<String>, TokenValidationFailure> {
    let mut scope = BTreeSet::new();
    match claims.get(scope_claim_name) {
        None => {}
        Some(ClaimValue::String(s)) => insert_trimmed(&mut scope, s),
        Some(ClaimValue::List(items)) => {
            for item in items {
                insert_trimmed(&mut scope, item);
            }
        }
        Some(other) => {
            return Err(TokenValidationFailure::wrong_claim_type(format!(
                "scope claim '{scope_claim_name}' must be a string or list, found a {}",
                other.type_name()
            )));
        }
    }
    Ok(scope)
}

fn insert_trimmed(scope: &mut BTreeSet<String>, element: &str) {
    let element = element.trim();
    if !element.is_empty() {
        scope.insert(element.to_string());
    }
}

/// Split a space-delimited option value (such as `requiredScope`) into its
/// distinct elements, keeping first-seen order.
pub fn parse_space_delimited(value: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    value
        .split_whitespace()
        .filter(|item| seen.insert(*item))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use serde_json::json;

    fn claims(value: serde_json::Value) -> ClaimSet {
        ClaimSet::from_slice(value.to_string().as_bytes()).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_string_scope_is_single_element() {
        let scope = scope_from_claims(&claims(json!({"scope": " read write "})), "scope").unwrap();
        assert_eq!(scope, set(&["read write"]));
    }

    #[test]
    fn test_list_scope_is_trimmed_per_element() {
        let scope =
            scope_from_claims(&claims(json!({"scope": ["read", " write ", "  "]})), "scope")
                .unwrap();
        assert_eq!(scope, set(&["read", "write"]));
    }

    #[test]
    fn test_blank_or_missing_scope_is_empty() {
        assert!(
            scope_from_claims(&claims(json!({"scope": "   "})), "scope")
                .unwrap()
                .is_empty()
        );
        assert!(
            scope_from_claims(&claims(json!({"scope": []})), "scope")
                .unwrap()
                .is_empty()
        );
        assert!(scope_from_claims(&claims(json!({})), "scope").unwrap().is_empty());
    }

    #[test]
    fn test_custom_claim_name() {
        let scope = scope_from_claims(&claims(json!({"scp": ["admin"]})), "scp").unwrap();
        assert_eq!(scope, set(&["admin"]));
    }

    #[test]
    fn test_numeric_scope_is_wrong_type() {
        let err = scope_from_claims(&claims(json!({"scope": 5})), "scope").unwrap_err();
        assert_eq!(err.kind(), FailureKind::WrongClaimType);
    }

    #[test]
    fn test_parse_space_delimited() {
        assert_eq!(
            parse_space_delimited("  read  write read\tadmin "),
            vec!["read", "write", "admin"]
        );
        assert!(parse_space_delimited("   ").is_empty());
    }
}
