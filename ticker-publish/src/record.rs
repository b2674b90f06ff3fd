//! Webhook payload normalisation.
//!
//! The database trigger delivers either a JSON object or a JSON-encoded
//! string containing one. The changed document is the object itself when it
//! carries an identity field (`$id`), otherwise it sits under `data`.

use crate::target::PublishError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The one piece of state this service moves around: the updated document,
/// reduced to the fields the display needs. Derived per request, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub text: String,
    /// ISO-8601 timestamp of the update, when the trigger supplied one.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Decode a webhook body into a [`DocumentRecord`].
///
/// Fails with [`PublishError::InvalidPayload`] when the body does not decode,
/// the record cannot be located, or the `text` field is missing or empty.
pub fn parse_webhook_body(body: &str) -> Result<DocumentRecord, PublishError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| PublishError::InvalidPayload(format!("body is not JSON: {e}")))?;

    // A string body is JSON-encoded a second time.
    let value = match value {
        Value::String(inner) => serde_json::from_str::<Value>(&inner)
            .map_err(|e| PublishError::InvalidPayload(format!("string body is not JSON: {e}")))?,
        other => other,
    };

    let object = value
        .as_object()
        .ok_or_else(|| PublishError::InvalidPayload("payload is not an object".into()))?;

    let record = if object.contains_key("$id") {
        &value
    } else {
        object
            .get("data")
            .ok_or_else(|| PublishError::InvalidPayload("no document found in payload".into()))?
    };

    let record: DocumentRecord = serde_json::from_value(record.clone())
        .map_err(|e| PublishError::InvalidPayload(format!("document shape: {e}")))?;

    if record.text.trim().is_empty() {
        return Err(PublishError::InvalidPayload(
            "no text field found in updated document".into(),
        ));
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_with_id_is_the_record() {
        let rec = parse_webhook_body(r#"{"$id":"doc1","text":"hello","timestamp":"2025-07-01T12:00:00Z"}"#)
            .unwrap();
        assert_eq!(rec.text, "hello");
        assert_eq!(rec.timestamp.as_deref(), Some("2025-07-01T12:00:00Z"));
    }

    #[test]
    fn nested_data_is_the_record() {
        let rec = parse_webhook_body(r#"{"event":"update","data":{"text":"hi"}}"#).unwrap();
        assert_eq!(rec.text, "hi");
        assert!(rec.timestamp.is_none());
    }

    #[test]
    fn string_encoded_body_is_decoded_twice() {
        let body = serde_json::to_string(r#"{"data":{"text":"wrapped"}}"#).unwrap();
        let rec = parse_webhook_body(&body).unwrap();
        assert_eq!(rec.text, "wrapped");
    }

    #[test]
    fn missing_text_is_rejected() {
        let err = parse_webhook_body(r#"{"data":{"timestamp":"2025-07-01T12:00:00Z"}}"#).unwrap_err();
        assert!(matches!(err, PublishError::InvalidPayload(_)));
    }

    #[test]
    fn empty_text_is_rejected() {
        let err = parse_webhook_body(r#"{"$id":"doc1","text":"   "}"#).unwrap_err();
        assert!(matches!(err, PublishError::InvalidPayload(_)));
    }

    #[test]
    fn non_json_body_is_rejected() {
        assert!(parse_webhook_body("not json").is_err());
    }

    #[test]
    fn array_body_is_rejected() {
        assert!(parse_webhook_body("[1,2,3]").is_err());
    }
}
