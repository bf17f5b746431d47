//! Token codec for the serial reply stream.
//!
//! Both module families answer with ASCII lines separated by control characters
//! (usually `\r\n`). The codec does not look for a particular terminator: every
//! byte above 31 is part of the current token, every byte at or below 31 ends it.
//! Empty tokens are never produced, so `\r\n` pairs and blank lines collapse.

use bytes::BytesMut;

/// Line terminator appended to every outbound command.
pub const COMMAND_TERMINATOR: &[u8] = b"\r\n";

/// Highest byte value treated as a control character.
pub const CONTROL_MAX: u8 = 31;

/// Splits inbound bytes into text tokens.
///
/// The working buffer survives across [`TokenCodec::push`] calls, so a token
/// split over several reads is reassembled.
#[derive(Debug, Default)]
pub struct TokenCodec {
    /// Bytes of the token currently being received.
    working: BytesMut,
}

impl TokenCodec {
    /// Create a new token codec.
    pub fn new() -> Self {
        TokenCodec {
            working: BytesMut::with_capacity(128),
        }
    }

    /// Feed received bytes, appending every completed token to `out`.
    ///
    /// Returns the number of tokens completed by this call.
    pub fn push(&mut self, data: &[u8], out: &mut Vec<String>) -> usize {
        let mut completed = 0;
        for &byte in data {
            if byte > CONTROL_MAX {
                self.working.extend_from_slice(&[byte]);
            } else if !self.working.is_empty() {
                out.push(Self::token_text(&self.working.split()));
                completed += 1;
            }
        }
        completed
    }

    /// Bytes are mapped one-to-one onto chars so non-ASCII noise on the line
    /// cannot make a token fail to decode.
    fn token_text(bytes: &[u8]) -> String {
        bytes.iter().map(|&b| b as char).collect()
    }

    /// Number of bytes of the unfinished token.
    pub fn pending_len(&self) -> usize {
        self.working.len()
    }

    /// Drop the unfinished token.
    pub fn clear(&mut self) {
        self.working.clear();
    }

    /// Encode a command for transmission.
    ///
    /// Appends the `\r\n` terminator.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + COMMAND_TERMINATOR.len());
        buf.extend_from_slice(cmd.as_bytes());
        buf.extend_from_slice(COMMAND_TERMINATOR);
        buf
    }
}
