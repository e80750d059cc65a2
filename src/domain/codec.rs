//! Wire codec: one JSON array per message.
//!
//! The first element is the event name, the rest are its positional
//! arguments: `["evPing"]`, `["saveState", {"count": 3}]`.

use serde_json::Value;

use super::Event;
use crate::error::CodecError;

/// Encodes `name` and `args` into a single transport string.
///
/// # Errors
///
/// Returns [`CodecError::EmptyEventName`] if `name` is empty, or
/// [`CodecError::Malformed`] if serialization fails.
pub fn encode(name: &str, args: &[Value]) -> Result<String, CodecError> {
    if name.is_empty() {
        return Err(CodecError::EmptyEventName);
    }
    let mut envelope = Vec::with_capacity(args.len() + 1);
    envelope.push(Value::String(name.to_string()));
    envelope.extend(args.iter().cloned());
    Ok(serde_json::to_string(&envelope)?)
}

/// Decodes a transport string into an [`Event`] with no source.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if `payload` is not valid JSON, or
/// [`CodecError::InvalidEnvelope`] if it is not an array whose first
/// element is a non-empty string.
pub fn decode(payload: &str) -> Result<Event, CodecError> {
    let value: Value = serde_json::from_str(payload)?;
    let Value::Array(items) = value else {
        return Err(CodecError::InvalidEnvelope("expected a JSON array"));
    };
    let mut items = items.into_iter();
    let name = match items.next() {
        Some(Value::String(name)) if !name.is_empty() => name,
        Some(Value::String(_)) => return Err(CodecError::EmptyEventName),
        Some(_) => return Err(CodecError::InvalidEnvelope("event name must be a string")),
        None => return Err(CodecError::InvalidEnvelope("empty array")),
    };
    Ok(Event::new(name, items.collect()))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn encodes_name_only() {
        assert_eq!(encode("evPing", &[]).ok().as_deref(), Some(r#"["evPing"]"#));
    }

    #[test]
    fn encodes_object_argument() {
        let out = encode("saveState", &[json!({"count": 3})]);
        assert_eq!(out.ok().as_deref(), Some(r#"["saveState",{"count":3}]"#));
    }

    #[test]
    fn decode_reverses_encode() {
        let args = vec![json!("world"), json!(null), json!([1, 2.5, true]), json!({"k": "v"})];
        let Ok(wire) = encode("greet", &args) else {
            panic!("encode failed");
        };
        let Ok(event) = decode(&wire) else {
            panic!("decode failed");
        };
        assert_eq!(event.name, "greet");
        assert_eq!(event.args, args);
        assert_eq!(event.source, None);
    }

    #[test]
    fn rejects_empty_name() {
        assert!(matches!(encode("", &[]), Err(CodecError::EmptyEventName)));
        assert!(matches!(decode(r#"[""]"#), Err(CodecError::EmptyEventName)));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(decode("[\"greet\""), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn rejects_non_array_envelopes() {
        assert!(matches!(decode(r#"{"a":1}"#), Err(CodecError::InvalidEnvelope(_))));
        assert!(matches!(decode("[]"), Err(CodecError::InvalidEnvelope(_))));
        assert!(matches!(decode("[42, 1]"), Err(CodecError::InvalidEnvelope(_))));
    }
}
