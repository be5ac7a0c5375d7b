//! Template resolution against session state
//!
//! Two substitution forms are supported:
//!
//! - **Whole-value placeholders**: a value that is exactly `{{key}}` is replaced
//!   by the session value for `key`. Used for query parameters and body fields,
//!   where the session value keeps its JSON type.
//! - **Interpolation**: every `{{key}}` occurrence inside a larger string is
//!   replaced by the string form of the session value. Used for headers and URLs.
//!
//! A placeholder whose key is absent from the session is left as literal text.

use crate::types::{value_to_string, SessionState};
use serde_json::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Return the key if `template` is exactly one `{{key}}` placeholder
pub fn placeholder_key(template: &str) -> Option<&str> {
    let inner = template.strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    let key = inner.trim();
    if key.is_empty() || key.contains('{') || key.contains('}') {
        return None;
    }
    Some(key)
}

/// Resolve a whole-value template to a JSON value
pub fn resolve_value(template: &str, session: &SessionState) -> Value {
    match placeholder_key(template).and_then(|key| session.get(key)) {
        Some(value) => value.clone(),
        None => {
            if let Some(key) = placeholder_key(template) {
                tracing::debug!(key, "Placeholder has no session value, sending literal");
            }
            Value::String(template.to_string())
        }
    }
}

/// Resolve a whole-value template to its string form
pub fn resolve_string(template: &str, session: &SessionState) -> String {
    match placeholder_key(template).and_then(|key| session.get(key)) {
        Some(value) => value_to_string(value),
        None => template.to_string(),
    }
}

/// Replace every `{{key}}` occurrence found in the session
pub fn interpolate(template: &str, session: &SessionState) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };

        out.push_str(&rest[..start]);
        let key = after_open[..end].trim();
        match session.get(key) {
            Some(value) if !key.is_empty() => out.push_str(&value_to_string(value)),
            _ => out.push_str(&rest[start..start + OPEN.len() + end + CLOSE.len()]),
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn session() -> SessionState {
        let mut session = SessionState::new();
        session.insert("token", json!("abc123"));
        session.insert("amount", json!(25));
        session.insert("walletAddr", json!("0xdead"));
        session
    }

    #[test]
    fn test_placeholder_key() {
        assert_eq!(placeholder_key("{{token}}"), Some("token"));
        assert_eq!(placeholder_key("{{ token }}"), Some("token"));
        assert_eq!(placeholder_key("token"), None);
        assert_eq!(placeholder_key("Bearer {{token}}"), None);
        assert_eq!(placeholder_key("{{a}}-{{b}}"), None);
        assert_eq!(placeholder_key("{{}}"), None);
    }

    #[test]
    fn test_resolve_value_keeps_json_type() {
        let session = session();
        assert_eq!(resolve_value("{{amount}}", &session), json!(25));
        assert_eq!(resolve_value("{{token}}", &session), json!("abc123"));
        assert_eq!(resolve_value("literal", &session), json!("literal"));
    }

    #[test]
    fn test_missing_placeholder_stays_literal() {
        let session = session();
        assert_eq!(resolve_value("{{nonce}}", &session), json!("{{nonce}}"));
        assert_eq!(resolve_string("{{nonce}}", &session), "{{nonce}}");
        assert_eq!(interpolate("id={{nonce}}", &session), "id={{nonce}}");
    }

    #[test]
    fn test_resolve_string() {
        let session = session();
        assert_eq!(resolve_string("{{amount}}", &session), "25");
        assert_eq!(resolve_string("{{walletAddr}}", &session), "0xdead");
    }

    #[test]
    fn test_interpolate_mixed_segments() {
        let session = session();
        assert_eq!(interpolate("Bearer {{token}}", &session), "Bearer abc123");
        assert_eq!(
            interpolate("/users/{{walletAddr}}/stake/{{amount}}", &session),
            "/users/0xdead/stake/25"
        );
        assert_eq!(interpolate("{{token}}{{token}}", &session), "abc123abc123");
    }

    #[test]
    fn test_interpolate_unclosed_placeholder() {
        let session = session();
        assert_eq!(interpolate("{{token}} and {{oops", &session), "abc123 and {{oops");
    }

    #[test]
    fn test_interpolate_does_not_reexpand_values() {
        let mut session = SessionState::new();
        session.insert("a", json!("{{b}}"));
        session.insert("b", json!("boom"));
        assert_eq!(interpolate("{{a}}", &session), "{{b}}");
    }

    proptest! {
        #[test]
        fn prop_literal_templates_are_unchanged(text in "[^{}]*") {
            let session = session();
            prop_assert_eq!(interpolate(&text, &session), text.clone());
            prop_assert_eq!(resolve_string(&text, &session), text.clone());
            prop_assert_eq!(resolve_value(&text, &session), Value::String(text));
        }
    }
}
