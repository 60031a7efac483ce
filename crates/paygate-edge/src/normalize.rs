//! Turning backend auth responses into JSON, whatever the backend sent.

use serde_json::{Map, Value};

/// A backend response body, decoded according to its declared content type.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamBody {
    Json(Value),
    Text(String),
}

impl UpstreamBody {
    /// Declared JSON that fails to parse is demoted to text.
    pub fn decode(content_type: Option<&str>, body: &[u8]) -> Self {
        let declared_json = content_type
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false);

        if declared_json {
            if let Ok(value) = serde_json::from_slice(body) {
                return UpstreamBody::Json(value);
            }
        }
        UpstreamBody::Text(String::from_utf8_lossy(body).into_owned())
    }

    /// Text that happens to be JSON is parsed; anything else becomes `{message}`.
    pub fn into_json(self) -> Value {
        match self {
            UpstreamBody::Json(value) => value,
            UpstreamBody::Text(text) => serde_json::from_str(&text)
                .unwrap_or_else(|_| serde_json::json!({ "message": text })),
        }
    }
}

/// Decode any backend auth response body into JSON.
pub fn read_json_body(content_type: Option<&str>, body: &[u8]) -> Value {
    UpstreamBody::decode(content_type, body).into_json()
}

/// Build the JSON error payload relayed to the caller for a failed auth call.
///
/// The backend's fields are kept; a `message` is guaranteed.
pub fn normalize_error(content_type: Option<&str>, body: &[u8], fallback: &str) -> Value {
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        read_json_body(content_type, body)
    };
    ensure_message(value, fallback)
}

fn ensure_message(value: Value, fallback: &str) -> Value {
    match value {
        Value::Object(mut map) => {
            if !map.get("message").map(Value::is_string).unwrap_or(false) {
                let derived = ["error_description", "error"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str))
                    .filter(|s| !s.is_empty())
                    .unwrap_or(fallback)
                    .to_string();
                map.insert("message".to_string(), Value::String(derived));
            }
            Value::Object(map)
        }
        Value::Null => serde_json::json!({ "message": fallback }),
        Value::String(s) if s.is_empty() => serde_json::json!({ "message": fallback }),
        Value::String(s) => serde_json::json!({ "message": s }),
        other => {
            let mut map = Map::new();
            map.insert("message".to_string(), Value::String(fallback.to_string()));
            map.insert("details".to_string(), other);
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_text_wrapped() {
        let v = normalize_error(Some("text/plain"), b"unsupported grant type", "Login failed");
        assert_eq!(v, json!({"message": "unsupported grant type"}));
    }

    #[test]
    fn test_text_that_is_json_is_parsed() {
        let v = normalize_error(
            Some("text/plain; charset=utf-8"),
            br#"{"message":"bad creds","code":7}"#,
            "Login failed",
        );
        assert_eq!(v, json!({"message": "bad creds", "code": 7}));
    }

    #[test]
    fn test_json_relayed_as_is() {
        let v = normalize_error(
            Some("application/json"),
            br#"{"message":"email taken"}"#,
            "Registration failed",
        );
        assert_eq!(v, json!({"message": "email taken"}));
    }

    #[test]
    fn test_oauth_error_gets_message() {
        let v = normalize_error(
            Some("application/json"),
            br#"{"error":"invalid_grant","error_description":"wrong password"}"#,
            "Login failed",
        );
        assert_eq!(v["error"], "invalid_grant");
        assert_eq!(v["message"], "wrong password");
    }

    #[test]
    fn test_malformed_declared_json_falls_back_to_text() {
        let v = normalize_error(Some("application/json"), b"oops <html>", "Login failed");
        assert_eq!(v, json!({"message": "oops <html>"}));
    }

    #[test]
    fn test_empty_body_uses_fallback() {
        let v = normalize_error(None, b"", "Registration failed");
        assert_eq!(v, json!({"message": "Registration failed"}));
    }

    #[test]
    fn test_non_object_json() {
        let v = normalize_error(Some("application/json"), b"[1,2]", "Login failed");
        assert_eq!(v["message"], "Login failed");
        assert_eq!(v["details"], json!([1, 2]));

        let v = normalize_error(Some("application/json"), br#""nope""#, "Login failed");
        assert_eq!(v, json!({"message": "nope"}));
    }

    #[test]
    fn test_read_json_body_success_shapes() {
        let v = read_json_body(Some("application/json"), br#"{"access_token":"t"}"#);
        assert_eq!(v["access_token"], "t");
        let v = read_json_body(None, br#"{"token":"t2"}"#);
        assert_eq!(v["token"], "t2");
    }
}
