//! Request and response framing.
//!
//! ```text
//! request:  <operation>\n<control JSON>\n<payload bytes...>
//! response: <result JSON>\n<payload bytes...>
//! ```
//!
//! Only the first two (request) or first one (response) `\n` are
//! significant. The payload is taken verbatim and may contain newlines.

use crate::domain::error::{ApiError, ApiResult};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

const DELIMITER: u8 = b'\n';

/// Decoded request body
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFrame {
    /// Operation name from the first line
    pub operation: String,
    /// Control object from the second line
    pub control: Map<String, Value>,
    /// Everything after the second delimiter
    pub payload: Bytes,
}

impl RequestFrame {
    /// Split a request body into its three segments.
    ///
    /// Fewer than two delimiters, an empty operation name or an empty
    /// control segment is a framing error. A control segment that is not a
    /// JSON object is a client error.
    pub fn decode(body: Bytes) -> ApiResult<Self> {
        let first = find_delimiter(&body, 0)
            .ok_or_else(|| ApiError::framing("request is missing the operation delimiter"))?;
        let second = find_delimiter(&body, first + 1)
            .ok_or_else(|| ApiError::framing("request is missing the control delimiter"))?;

        let operation = std::str::from_utf8(&body[..first])
            .map_err(|_| ApiError::framing("operation name is not UTF-8"))?
            .trim_end_matches('\r');
        if operation.is_empty() {
            return Err(ApiError::framing("empty operation name"));
        }

        let control_bytes = &body[first + 1..second];
        if control_bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ApiError::framing("empty control segment"));
        }
        let control = match serde_json::from_slice::<Value>(control_bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(ApiError::client("control segment must be a JSON object")),
            Err(_) => return Err(ApiError::client("control segment is not valid JSON")),
        };

        Ok(Self {
            operation: operation.to_string(),
            control,
            payload: body.slice(second + 1..),
        })
    }

    /// Encode a request body (used by clients and tests).
    pub fn encode(operation: &str, control: &Value, payload: &[u8]) -> Vec<u8> {
        let control = serde_json::to_vec(control).unwrap_or_default();
        let mut out = Vec::with_capacity(operation.len() + control.len() + payload.len() + 2);
        out.extend_from_slice(operation.as_bytes());
        out.push(DELIMITER);
        out.extend_from_slice(&control);
        out.push(DELIMITER);
        out.extend_from_slice(payload);
        out
    }
}

/// Result object plus binary payload
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    /// Result object; never embeds the payload
    pub result: Value,
    /// Binary payload
    pub payload: Vec<u8>,
}

impl ResponseFrame {
    /// Result with an empty payload.
    pub fn json<T: Serialize>(result: &T) -> ApiResult<Self> {
        Ok(Self {
            result: serde_json::to_value(result)?,
            payload: Vec::new(),
        })
    }

    /// Result with a payload.
    pub fn with_payload<T: Serialize>(result: &T, payload: Vec<u8>) -> ApiResult<Self> {
        Ok(Self {
            result: serde_json::to_value(result)?,
            payload,
        })
    }

    /// Serialize as `<result>\n<payload>`.
    pub fn encode(&self) -> ApiResult<Vec<u8>> {
        let mut out = serde_json::to_vec(&self.result)?;
        out.reserve(self.payload.len() + 1);
        out.push(DELIMITER);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parse `<result>\n<payload>` (client side).
    pub fn decode(body: &[u8]) -> ApiResult<Self> {
        let split = find_delimiter(body, 0)
            .ok_or_else(|| ApiError::framing("response is missing the result delimiter"))?;
        let result = serde_json::from_slice(&body[..split])
            .map_err(|_| ApiError::framing("response result is not valid JSON"))?;
        Ok(Self {
            result,
            payload: body[split + 1..].to_vec(),
        })
    }
}

fn find_delimiter(body: &[u8], from: usize) -> Option<usize> {
    body.get(from..)?
        .iter()
        .position(|b| *b == DELIMITER)
        .map(|i| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_request() {
        let frame = RequestFrame::decode(Bytes::from_static(b"version\n{}\n")).unwrap();
        assert_eq!(frame.operation, "version");
        assert!(frame.control.is_empty());
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_payload_newlines_are_not_delimiters() {
        let body = RequestFrame::encode("encryptMsg", &json!({"pubKeys": ["k"]}), b"a\nb\n\nc");
        let frame = RequestFrame::decode(Bytes::from(body)).unwrap();
        assert_eq!(frame.operation, "encryptMsg");
        assert_eq!(frame.control["pubKeys"][0], "k");
        assert_eq!(&frame.payload[..], b"a\nb\n\nc");
    }

    #[test]
    fn test_binary_payload_preserved() {
        let payload: Vec<u8> = (0..=255).collect();
        let body = RequestFrame::encode("decryptFile", &json!({}), &payload);
        let frame = RequestFrame::decode(Bytes::from(body)).unwrap();
        assert_eq!(frame.payload.to_vec(), payload);
    }

    #[test]
    fn test_missing_delimiters_is_framing_error() {
        for body in [&b"version"[..], b"version\n{}", b""] {
            let err = RequestFrame::decode(Bytes::copy_from_slice(body)).unwrap_err();
            assert_eq!(err.kind, crate::domain::error::ErrorKind::Framing);
        }
    }

    #[test]
    fn test_empty_segments_are_framing_errors() {
        let err = RequestFrame::decode(Bytes::from_static(b"\n{}\n")).unwrap_err();
        assert_eq!(err.kind, crate::domain::error::ErrorKind::Framing);
        let err = RequestFrame::decode(Bytes::from_static(b"version\n\n")).unwrap_err();
        assert_eq!(err.kind, crate::domain::error::ErrorKind::Framing);
    }

    #[test]
    fn test_non_object_control_is_client_error() {
        for control in [&b"[1,2]"[..], b"\"str\"", b"{not json"] {
            let mut body = b"version\n".to_vec();
            body.extend_from_slice(control);
            body.push(b'\n');
            let err = RequestFrame::decode(Bytes::from(body)).unwrap_err();
            assert_eq!(err.kind, crate::domain::error::ErrorKind::Client);
        }
    }

    #[test]
    fn test_response_encode_decode() {
        let frame = ResponseFrame::with_payload(&json!({"success": true}), b"x\ny".to_vec()).unwrap();
        let encoded = frame.encode().unwrap();
        assert_eq!(encoded, b"{\"success\":true}\nx\ny");
        assert_eq!(ResponseFrame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn test_response_without_delimiter_is_framing_error() {
        let err = ResponseFrame::decode(b"{}").unwrap_err();
        assert_eq!(err.kind, crate::domain::error::ErrorKind::Framing);
    }
}
