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

use super::{ConnectReturnCode, Reader};
use crate::mqtt_ep::codec::make_fixed_header;
use crate::mqtt_ep::connection_error::MqttError;
use crate::mqtt_ep::packet::PacketType;
use crate::mqtt_ep::send_buffer::{Frame, SendBuffer};

/// CONNACK packet: session-present flag and the connect return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connack {
    pub session_present: bool,
    pub return_code: ConnectReturnCode,
}

impl Connack {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self, MqttError> {
        if reader.remaining() != 2 {
            return Err(MqttError::MessageSize);
        }
        let ack_flags = reader.read_u8()?;
        let return_code = ConnectReturnCode::from_u8(reader.read_u8()?)?;
        Ok(Connack {
            session_present: ack_flags & 0b0000_0001 != 0,
            return_code,
        })
    }

    pub(crate) fn to_frame(&self) -> Result<Frame, MqttError> {
        let mut sb = SendBuffer::new();
        sb.push_u8(u8::from(self.session_present));
        sb.push_u8(self.return_code as u8);
        sb.finalize(make_fixed_header(PacketType::Connack, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt_ep::packet::{parse, Packet, RawFrame};

    #[test]
    fn accepted_with_session_present() {
        let frame = Connack {
            session_present: true,
            return_code: ConnectReturnCode::Accepted,
        }
        .to_frame()
        .unwrap();
        assert_eq!(frame.as_bytes(), &[0x20, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let raw = RawFrame {
            fixed_header: 0x20,
            payload: vec![0x00],
        };
        assert_eq!(parse(&raw), Err(MqttError::MessageSize));
        let raw = RawFrame {
            fixed_header: 0x20,
            payload: vec![0x00, 0x00, 0x00],
        };
        assert_eq!(parse(&raw), Err(MqttError::MessageSize));
    }

    #[test]
    fn parse_return_codes() {
        let raw = RawFrame {
            fixed_header: 0x20,
            payload: vec![0x00, 0x05],
        };
        match parse(&raw).unwrap() {
            Packet::Connack(c) => {
                assert!(!c.session_present);
                assert_eq!(c.return_code, ConnectReturnCode::NotAuthorized);
            }
            other => panic!("expected CONNACK, got {other:?}"),
        }
    }
}
