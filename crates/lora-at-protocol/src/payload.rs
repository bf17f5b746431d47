//! Uplink/downlink payload encodings.
//!
//! The mDot carries payloads as raw text on the command line. The RN2903 takes
//! and reports hex strings.

use crate::codec::CONTROL_MAX;
use crate::error::{ProtocolError, ProtocolResult};

/// How payload bytes are rendered on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// Raw text.
    Text,
    /// Lowercase hex, two digits per byte.
    Hex,
}

impl PayloadEncoding {
    /// Render payload bytes for a send command.
    ///
    /// Text payloads must be UTF-8 and free of control bytes, which would end the
    /// command line early.
    pub fn encode(&self, payload: &[u8]) -> ProtocolResult<String> {
        match self {
            PayloadEncoding::Hex => Ok(hex::encode(payload)),
            PayloadEncoding::Text => {
                if let Some(&byte) = payload.iter().find(|&&b| b <= CONTROL_MAX) {
                    return Err(ProtocolError::UnencodablePayload(format!(
                        "control byte 0x{:02X} in text payload",
                        byte
                    )));
                }
                String::from_utf8(payload.to_vec())
                    .map_err(|e| ProtocolError::UnencodablePayload(e.to_string()))
            }
        }
    }

    /// Recover payload bytes from a downlink line.
    pub fn decode(&self, line: &str) -> ProtocolResult<Vec<u8>> {
        match self {
            PayloadEncoding::Hex => {
                let digits = line.trim();
                hex::decode(digits).map_err(|e| ProtocolError::InvalidHex {
                    payload: digits.to_string(),
                    reason: e.to_string(),
                })
            }
            // Tokens carry one char per received byte.
            PayloadEncoding::Text => Ok(line
                .chars()
                .flat_map(|c| match u8::try_from(u32::from(c)) {
                    Ok(byte) => vec![byte],
                    Err(_) => c.to_string().into_bytes(),
                })
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_encode_pads_low_bytes() {
        assert_eq!(PayloadEncoding::Hex.encode(&[0x07, 0xAB]).unwrap(), "07ab");
    }

    #[test]
    fn test_hex_decode_rejects_garbage() {
        let err = PayloadEncoding::Hex.decode("xyz").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidHex { .. }));
    }

    #[test]
    fn test_text_rejects_control_bytes() {
        let err = PayloadEncoding::Text.encode(b"line\r\nAT+JOIN").unwrap_err();
        assert!(matches!(err, ProtocolError::UnencodablePayload(_)));
    }

    #[test]
    fn test_text_decode_latin1_tokens() {
        let bytes = PayloadEncoding::Text.decode("caf\u{c3}\u{a9}").unwrap();
        assert_eq!(bytes, "café".as_bytes());
    }
}
