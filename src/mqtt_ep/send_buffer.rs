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

//! Outbound frame assembly.
//!
//! A [`SendBuffer`] accumulates the variable header and payload, then
//! [`SendBuffer::finalize`] writes the fixed header and remaining-length
//! bytes into reserved headroom so the body never relocates.

use std::sync::Arc;

use crate::mqtt_ep::codec;
use crate::mqtt_ep::connection_error::MqttError;

/// Headroom for the fixed header (1 byte) plus the longest remaining-length
/// encoding (4 bytes).
const HEADER_RESERVE: usize = 5;

/// A finished wire frame.
///
/// The byte block is reference counted: the same frame may sit in the
/// transmit queue and in the outbound store at once, and for QoS >= 1 it
/// outlives the write until the terminal acknowledgment arrives.
/// [`Frame::set_dup`] copies on write only if another holder still shares
/// the block.
#[derive(Debug, Clone)]
pub struct Frame {
    bytes: Arc<Vec<u8>>,
    start: usize,
}

impl Frame {
    /// Rebuild a frame from raw wire bytes, as captured by
    /// [`StorePacket`](crate::mqtt_ep::store::StorePacket) for session
    /// restoration.
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
            start: 0,
        }
    }

    /// The wire bytes: fixed header, remaining length, payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[self.start..]
    }

    pub fn len(&self) -> usize {
        self.bytes.len() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// OR the DUP bit into the fixed header for retransmission.
    pub(crate) fn set_dup(&mut self) {
        let start = self.start;
        Arc::make_mut(&mut self.bytes)[start] |= 0b0000_1000;
    }
}

/// Assembles one control packet body, fixed header last.
///
/// Fields are appended in wire order; `finalize` computes the
/// remaining-length bytes for the accumulated body, writes the fixed header
/// immediately before them, and hands back the [`Frame`] spanning header
/// through payload.
#[derive(Debug)]
pub(crate) struct SendBuffer {
    buf: Vec<u8>,
}

impl SendBuffer {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; HEADER_RESERVE],
        }
    }

    pub fn push_u8(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn push_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a length-prefixed UTF-8 string, validating length and
    /// contents first.
    pub fn push_mqtt_string(&mut self, s: &str) -> Result<(), MqttError> {
        codec::validate_mqtt_string(s)?;
        self.push_u16(s.len() as u16);
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    /// Append length-prefixed opaque binary data (password field).
    pub fn push_binary(&mut self, bytes: &[u8]) -> Result<(), MqttError> {
        if bytes.len() > u16::MAX as usize {
            return Err(MqttError::PasswordLengthError);
        }
        self.push_u16(bytes.len() as u16);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn payload_len(&self) -> usize {
        self.buf.len() - HEADER_RESERVE
    }

    /// Write remaining length and fixed header into the headroom and return
    /// the completed frame.
    pub fn finalize(mut self, fixed_header: u8) -> Result<Frame, MqttError> {
        let (rl_bytes, rl_len) = codec::encode_remaining_length(self.payload_len() as u32)?;
        let start = HEADER_RESERVE - 1 - rl_len;
        self.buf[start] = fixed_header;
        self.buf[start + 1..start + 1 + rl_len].copy_from_slice(&rl_bytes[..rl_len]);
        Ok(Frame {
            bytes: Arc::new(self.buf),
            start,
        })
    }
}
