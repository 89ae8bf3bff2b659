// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Wire codec primitives: variable-byte remaining length, length-prefixed
//! UTF-8 strings, and fixed-header assembly.

use crate::mqtt_ep::connection_error::MqttError;
use crate::mqtt_ep::packet::PacketType;

/// Largest value representable by the four-byte variable-length encoding.
pub const MAX_REMAINING_LENGTH: u32 = 268_435_455;

/// Encode a remaining-length value into 1-4 continuation bytes.
///
/// Returns the byte array and the number of significant bytes. Values above
/// [`MAX_REMAINING_LENGTH`] are rejected before anything is sent.
pub fn encode_remaining_length(mut value: u32) -> Result<([u8; 4], usize), MqttError> {
    if value > MAX_REMAINING_LENGTH {
        return Err(MqttError::RemainingLengthOverflow);
    }
    let mut bytes = [0u8; 4];
    let mut len = 0;
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        bytes[len] = byte;
        len += 1;
        if value == 0 {
            return Ok((bytes, len));
        }
    }
}

/// Incremental remaining-length accumulator.
///
/// Fed one byte at a time by the receive pipeline; yields the decoded value
/// when the continuation bit clears and fails after a fifth continuation
/// byte.
#[derive(Debug, Default)]
pub struct RemainingLengthDecoder {
    value: u32,
    multiplier: u32,
}

impl RemainingLengthDecoder {
    pub fn new() -> Self {
        Self {
            value: 0,
            multiplier: 1,
        }
    }

    /// Consume one length byte. `Ok(Some(value))` once complete,
    /// `Ok(None)` while more bytes are expected.
    pub fn feed(&mut self, byte: u8) -> Result<Option<u32>, MqttError> {
        // multiplier runs 1, 128, 128^2, 128^3; a byte arriving beyond that
        // means a fifth length byte was sent
        if self.multiplier > 128 * 128 * 128 {
            return Err(MqttError::RemainingLengthOverflow);
        }
        self.value += u32::from(byte & 0x7F) * self.multiplier;
        self.multiplier *= 128;
        if byte & 0x80 == 0 {
            Ok(Some(self.value))
        } else {
            Ok(None)
        }
    }
}

/// Decode a complete remaining-length field from a byte slice.
///
/// Returns the value and the number of bytes consumed. Used by tests and by
/// callers that already hold the whole header; the receive pipeline uses
/// [`RemainingLengthDecoder`] byte by byte.
pub fn decode_remaining_length(bytes: &[u8]) -> Result<(u32, usize), MqttError> {
    let mut decoder = RemainingLengthDecoder::new();
    for (i, &byte) in bytes.iter().enumerate() {
        if let Some(value) = decoder.feed(byte)? {
            return Ok((value, i + 1));
        }
    }
    Err(MqttError::MessageSize)
}

/// Check string contents against MQTT v3.1.1 section 1.5.3.
///
/// Rejects U+0000, C0 and C1 control characters (including U+007F), and the
/// Unicode non-characters (U+FDD0..=U+FDEF and the two final code points of
/// every plane).
pub fn is_valid_utf8_contents(s: &str) -> bool {
    s.chars().all(|c| {
        let cp = c as u32;
        !(cp == 0x0000
            || (0x0001..=0x001F).contains(&cp)
            || (0x007F..=0x009F).contains(&cp)
            || (0xFDD0..=0xFDEF).contains(&cp)
            || (cp & 0xFFFE) == 0xFFFE)
    })
}

/// Validate an outbound UTF-8 string field: 16-bit length, legal contents.
pub fn validate_mqtt_string(s: &str) -> Result<(), MqttError> {
    if s.len() > u16::MAX as usize {
        return Err(MqttError::Utf8LengthError);
    }
    if !is_valid_utf8_contents(s) {
        return Err(MqttError::Utf8ContentsError);
    }
    Ok(())
}

/// Assemble the fixed-header byte: type nibble shifted high, flags nibble low.
pub fn make_fixed_header(packet_type: PacketType, flags: u8) -> u8 {
    ((packet_type as u8) << 4) | (flags & 0x0F)
}

/// Combine two big-endian bytes into a u16.
pub fn make_u16(b1: u8, b2: u8) -> u16 {
    (u16::from(b1) << 8) | u16::from(b2)
}
