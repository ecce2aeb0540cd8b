//! Classification of RPC bodies into typed errors

use reqwest::StatusCode;
use serde_json::Value;

use pocket_core::RpcError;

/// Recognize an error envelope in an otherwise successful body.
///
/// Accepts `{"code": .., "message": ..}` and `{"error": {"code": .., "message": ..}}`.
pub fn error_envelope(value: &Value) -> Option<RpcError> {
    let object = value.as_object()?;

    if let Some(inner) = object.get("error") {
        return match inner {
            Value::Object(_) => code_and_message(inner),
            Value::String(text) => Some(from_text(text)),
            _ => None,
        };
    }

    code_and_message(value)
}

fn code_and_message(value: &Value) -> Option<RpcError> {
    let object = value.as_object()?;
    let code = object.get("code")?;
    let message = object.get("message")?;

    let code = match code {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    let message = match message {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(RpcError::new(code, message))
}

/// Pull the number out of a `Code: N` token in free text
pub fn extract_code(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let start = lower.find("code:")? + "code:".len();
    let digits: String = text[start..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Free-text failure: use an embedded code if there is one
pub fn from_text(text: &str) -> RpcError {
    match extract_code(text) {
        Some(code) => RpcError::new(code, text),
        None => RpcError::unknown(text),
    }
}

/// Classify a non-2xx response
pub fn classify_failure(status: StatusCode, body: &str) -> RpcError {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(err) = error_envelope(&value) {
            return err;
        }
    }

    let text = if body.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        body.trim().to_string()
    };
    from_text(&text)
}

/// Classify a failure that never produced a response
pub fn classify_transport(err: &reqwest::Error, timeout_ms: u128) -> RpcError {
    if err.is_timeout() {
        return RpcError::unknown(format!("request timed out after {}ms", timeout_ms));
    }
    RpcError::unknown(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_envelope() {
        let err = error_envelope(&json!({"code": 60, "message": "sealed"})).unwrap();
        assert_eq!(err, RpcError::new("60", "sealed"));
    }

    #[test]
    fn test_nested_envelope() {
        let err = error_envelope(&json!({
            "error": {"code": "14", "codespace": "pocketcore", "message": "invalid session"}
        }))
        .unwrap();
        assert_eq!(err.code, "14");
        assert_eq!(err.message, "invalid session");
    }

    #[test]
    fn test_error_string_envelope() {
        let err = error_envelope(&json!({"error": "ERROR: Code: 75 bad relay"})).unwrap();
        assert_eq!(err.code, "75");
    }

    #[test]
    fn test_success_body_is_not_envelope() {
        assert!(error_envelope(&json!({"signature": "ab", "response": "{}", "proof": {}})).is_none());
        assert!(error_envelope(&json!({"code": 1})).is_none());
        assert!(error_envelope(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_extract_code() {
        assert_eq!(extract_code("ERROR:\nCodespace: pocketcore\nCode: 22\nMessage: x"), Some("22".to_string()));
        assert_eq!(extract_code("code:7"), Some("7".to_string()));
        assert_eq!(extract_code("no code here"), None);
        assert_eq!(extract_code("Code: abc"), None);
    }

    #[test]
    fn test_classify_failure_structured() {
        let err = classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"code": 400, "message": "bad request"}"#,
        );
        assert_eq!(err, RpcError::new("400", "bad request"));
    }

    #[test]
    fn test_classify_failure_free_text() {
        let err = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "ERROR: Code: 3 oops");
        assert_eq!(err.code, "3");
        assert_eq!(err.message, "ERROR: Code: 3 oops");
    }

    #[test]
    fn test_classify_failure_default_code() {
        let err = classify_failure(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.code, "0");
        assert!(err.message.contains("502"));
    }
}
