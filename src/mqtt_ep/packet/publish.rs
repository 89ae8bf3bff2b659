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

use super::{Qos, Reader};
use crate::mqtt_ep::codec::make_fixed_header;
use crate::mqtt_ep::connection_error::MqttError;
use crate::mqtt_ep::packet::PacketType;
use crate::mqtt_ep::send_buffer::{Frame, SendBuffer};

const FLAG_RETAIN: u8 = 0b0001;
const FLAG_DUP: u8 = 0b1000;
const QOS_SHIFT: u8 = 1;

/// PUBLISH packet. DUP, QoS and RETAIN ride in the fixed-header flag
/// nibble; the packet identifier is present iff QoS > 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub dup: bool,
    pub qos: Qos,
    pub retain: bool,
    pub topic_name: String,
    pub packet_id: Option<u16>,
    pub payload: Vec<u8>,
}

impl Publish {
    pub(crate) fn parse(flags: u8, reader: &mut Reader<'_>) -> Result<Self, MqttError> {
        let qos = Qos::from_u8((flags >> QOS_SHIFT) & 0b11)?;
        let topic_name = reader.read_string()?;
        let packet_id = if qos != Qos::AtMostOnce {
            Some(reader.read_u16()?)
        } else {
            None
        };
        Ok(Publish {
            dup: flags & FLAG_DUP != 0,
            qos,
            retain: flags & FLAG_RETAIN != 0,
            topic_name,
            packet_id,
            payload: reader.read_rest().to_vec(),
        })
    }

    pub(crate) fn flags(&self) -> u8 {
        let mut flags = (self.qos as u8) << QOS_SHIFT;
        if self.retain {
            flags |= FLAG_RETAIN;
        }
        if self.dup {
            flags |= FLAG_DUP;
        }
        flags
    }

    pub(crate) fn to_frame(&self) -> Result<Frame, MqttError> {
        let mut sb = SendBuffer::new();
        sb.push_mqtt_string(&self.topic_name)?;
        if self.qos != Qos::AtMostOnce {
            // the delivery engine always allocates an id before encoding
            let packet_id = self.packet_id.ok_or(MqttError::ProtocolError)?;
            sb.push_u16(packet_id);
        }
        sb.push_bytes(&self.payload);
        sb.finalize(make_fixed_header(PacketType::Publish, self.flags()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt_ep::packet::{parse, Packet, RawFrame};

    #[test]
    fn qos0_wire_bytes() {
        let frame = Publish {
            dup: false,
            qos: Qos::AtMostOnce,
            retain: false,
            topic_name: "a/b".into(),
            packet_id: None,
            payload: b"hi".to_vec(),
        }
        .to_frame()
        .unwrap();
        assert_eq!(
            frame.as_bytes(),
            &[0x30, 0x07, 0x00, 0x03, 0x61, 0x2F, 0x62, 0x68, 0x69]
        );
    }

    #[test]
    fn qos1_wire_bytes_with_packet_id() {
        let frame = Publish {
            dup: false,
            qos: Qos::AtLeastOnce,
            retain: false,
            topic_name: "a/b".into(),
            packet_id: Some(1),
            payload: b"hi".to_vec(),
        }
        .to_frame()
        .unwrap();
        assert_eq!(
            frame.as_bytes(),
            &[0x32, 0x09, 0x00, 0x03, 0x61, 0x2F, 0x62, 0x00, 0x01, 0x68, 0x69]
        );
    }

    #[test]
    fn parse_qos2_with_dup_and_retain() {
        let raw = RawFrame {
            fixed_header: 0x3D,
            payload: vec![0x00, 0x01, b't', 0x00, 0x07, b'x'],
        };
        match parse(&raw).unwrap() {
            Packet::Publish(p) => {
                assert!(p.dup);
                assert!(p.retain);
                assert_eq!(p.qos, Qos::ExactlyOnce);
                assert_eq!(p.packet_id, Some(7));
                assert_eq!(p.topic_name, "t");
                assert_eq!(p.payload, b"x");
            }
            other => panic!("expected PUBLISH, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_qos3() {
        let raw = RawFrame {
            fixed_header: 0x36,
            payload: vec![0x00, 0x01, b't', 0x00, 0x07],
        };
        assert_eq!(parse(&raw), Err(MqttError::ProtocolError));
    }

    #[test]
    fn parse_qos1_missing_packet_id_is_message_size() {
        let raw = RawFrame {
            fixed_header: 0x32,
            payload: vec![0x00, 0x01, b't'],
        };
        assert_eq!(parse(&raw), Err(MqttError::MessageSize));
    }

    #[test]
    fn qos0_empty_payload_allowed() {
        let raw = RawFrame {
            fixed_header: 0x30,
            payload: vec![0x00, 0x01, b't'],
        };
        match parse(&raw).unwrap() {
            Packet::Publish(p) => {
                assert_eq!(p.packet_id, None);
                assert!(p.payload.is_empty());
            }
            other => panic!("expected PUBLISH, got {other:?}"),
        }
    }
}
