use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

pub const DECODE_ERROR_TEXT: &str = "Error decoding output";

pub fn encode(text: &str) -> String {
    BASE64.encode(text.as_bytes())
}

/// Decodes a base64 payload from the execution service. The service wraps
/// long payloads across lines, so whitespace is stripped first.
pub fn decode_output(encoded: &str) -> String {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| DECODE_ERROR_TEXT.to_string())
}
