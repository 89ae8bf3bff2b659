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

//! Incremental frame reassembly for the receive pipeline.
//!
//! The transport delivers arbitrary chunks; the decoder walks the three
//! stages of the MQTT framing - fixed-header byte, variable-length
//! remaining length, payload - and yields one complete [`RawFrame`] at a
//! time so packets are handled strictly in arrival order.

use crate::mqtt_ep::codec::RemainingLengthDecoder;
use crate::mqtt_ep::connection_error::MqttError;
use crate::mqtt_ep::packet::RawFrame;

enum DecodeState {
    FixedHeader,
    RemainingLength(RemainingLengthDecoder),
    Payload { needed: usize },
}

pub(crate) struct FrameDecoder {
    state: DecodeState,
    fixed_header: u8,
    payload: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::FixedHeader,
            fixed_header: 0,
            payload: Vec::new(),
        }
    }

    /// Consume bytes from `input` until one frame completes or the input
    /// runs out. Returns the number of bytes consumed and, possibly, a
    /// complete frame. Call again with the unconsumed tail to continue.
    pub fn feed(&mut self, input: &[u8]) -> (usize, Result<Option<RawFrame>, MqttError>) {
        let mut pos = 0;
        while pos < input.len() {
            match &mut self.state {
                DecodeState::FixedHeader => {
                    self.fixed_header = input[pos];
                    pos += 1;
                    self.payload.clear();
                    self.state = DecodeState::RemainingLength(RemainingLengthDecoder::new());
                }
                DecodeState::RemainingLength(decoder) => {
                    match decoder.feed(input[pos]) {
                        Ok(None) => pos += 1,
                        Ok(Some(len)) => {
                            pos += 1;
                            if len == 0 {
                                // zero-length payload: the frame is already
                                // complete, skip the payload stage
                                self.state = DecodeState::FixedHeader;
                                return (pos, Ok(Some(self.take_frame())));
                            }
                            self.payload.reserve(len as usize);
                            self.state = DecodeState::Payload {
                                needed: len as usize,
                            };
                        }
                        Err(e) => return (pos, Err(e)),
                    }
                }
                DecodeState::Payload { needed } => {
                    let take = (*needed).min(input.len() - pos);
                    self.payload.extend_from_slice(&input[pos..pos + take]);
                    pos += take;
                    *needed -= take;
                    if *needed == 0 {
                        self.state = DecodeState::FixedHeader;
                        return (pos, Ok(Some(self.take_frame())));
                    }
                }
            }
        }
        (pos, Ok(None))
    }

    fn take_frame(&mut self) -> RawFrame {
        RawFrame {
            fixed_header: self.fixed_header,
            payload: std::mem::take(&mut self.payload),
        }
    }
}
