//! Shell output framing
//!
//! In text mode output is decoded as UTF-8. A multi-byte character split
//! across two reads is carried over to the next read instead of being
//! replaced, so only genuinely invalid bytes turn into U+FFFD.

use webssh_core::OutputMode;

use crate::transport::Frame;

/// Turns raw shell output into WebSocket frames
#[derive(Debug)]
pub struct OutputEncoder {
    mode: OutputMode,
    /// Incomplete trailing UTF-8 sequence from the previous read (at most 3 bytes)
    carry: Vec<u8>,
}

impl OutputEncoder {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            carry: Vec::new(),
        }
    }

    /// Frame for `bytes`, or `None` when nothing is ready to send yet
    pub fn encode(&mut self, bytes: &[u8]) -> Option<Frame> {
        match self.mode {
            OutputMode::Binary if bytes.is_empty() => None,
            OutputMode::Binary => Some(Frame::Binary(bytes.to_vec())),
            OutputMode::Text => {
                let text = self.decode(bytes);
                (!text.is_empty()).then_some(Frame::Text(text))
            }
        }
    }

    /// Flush a dangling partial character at end of stream
    pub fn finish(&mut self) -> Option<Frame> {
        if self.carry.is_empty() {
            return None;
        }
        self.carry.clear();
        Some(Frame::Text(char::REPLACEMENT_CHARACTER.to_string()))
    }

    fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(bytes);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.carry = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }
}
