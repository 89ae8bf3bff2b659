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

use super::{Qos, Reader, SubackReturnCode};
use crate::mqtt_ep::codec::make_fixed_header;
use crate::mqtt_ep::connection_error::MqttError;
use crate::mqtt_ep::packet::PacketType;
use crate::mqtt_ep::send_buffer::{Frame, SendBuffer};

/// One SUBSCRIBE entry: topic filter and requested QoS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubEntry {
    pub topic_filter: String,
    pub qos: Qos,
}

impl SubEntry {
    pub fn new(topic_filter: impl Into<String>, qos: Qos) -> Self {
        Self {
            topic_filter: topic_filter.into(),
            qos,
        }
    }
}

/// SUBSCRIBE packet: packet identifier and a non-empty filter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub packet_id: u16,
    pub entries: Vec<SubEntry>,
}

impl Subscribe {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self, MqttError> {
        let packet_id = reader.read_u16()?;
        let mut entries = Vec::new();
        while reader.remaining() > 0 {
            let topic_filter = reader.read_string()?;
            let qos = Qos::from_u8(reader.read_u8()? & 0b11)?;
            entries.push(SubEntry { topic_filter, qos });
        }
        if entries.is_empty() {
            return Err(MqttError::ProtocolError);
        }
        Ok(Subscribe { packet_id, entries })
    }

    pub(crate) fn to_frame(&self) -> Result<Frame, MqttError> {
        let mut sb = SendBuffer::new();
        sb.push_u16(self.packet_id);
        for entry in &self.entries {
            sb.push_mqtt_string(&entry.topic_filter)?;
            sb.push_u8(entry.qos as u8);
        }
        sb.finalize(make_fixed_header(PacketType::Subscribe, 0b0010))
    }
}

/// SUBACK packet: packet identifier and one return code per filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suback {
    pub packet_id: u16,
    pub return_codes: Vec<SubackReturnCode>,
}

impl Suback {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self, MqttError> {
        let packet_id = reader.read_u16()?;
        let mut return_codes = Vec::new();
        while reader.remaining() > 0 {
            return_codes.push(SubackReturnCode::from_u8(reader.read_u8()?)?);
        }
        Ok(Suback {
            packet_id,
            return_codes,
        })
    }

    pub(crate) fn to_frame(&self) -> Result<Frame, MqttError> {
        let mut sb = SendBuffer::new();
        sb.push_u16(self.packet_id);
        for code in &self.return_codes {
            sb.push_u8(*code as u8);
        }
        sb.finalize(make_fixed_header(PacketType::Suback, 0))
    }
}

/// UNSUBSCRIBE packet: packet identifier and a non-empty filter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscribe {
    pub packet_id: u16,
    pub topic_filters: Vec<String>,
}

impl Unsubscribe {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self, MqttError> {
        let packet_id = reader.read_u16()?;
        let mut topic_filters = Vec::new();
        while reader.remaining() > 0 {
            topic_filters.push(reader.read_string()?);
        }
        if topic_filters.is_empty() {
            return Err(MqttError::ProtocolError);
        }
        Ok(Unsubscribe {
            packet_id,
            topic_filters,
        })
    }

    pub(crate) fn to_frame(&self) -> Result<Frame, MqttError> {
        let mut sb = SendBuffer::new();
        sb.push_u16(self.packet_id);
        for filter in &self.topic_filters {
            sb.push_mqtt_string(filter)?;
        }
        sb.finalize(make_fixed_header(PacketType::Unsubscribe, 0b0010))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt_ep::packet::{parse, Packet, RawFrame};

    #[test]
    fn subscribe_round_trip() {
        let subscribe = Subscribe {
            packet_id: 42,
            entries: vec![
                SubEntry::new("a/b", Qos::AtLeastOnce),
                SubEntry::new("c/#", Qos::ExactlyOnce),
            ],
        };
        let frame = subscribe.to_frame().unwrap();
        let bytes = frame.as_bytes();
        assert_eq!(bytes[0], 0x82);
        let raw = RawFrame {
            fixed_header: bytes[0],
            payload: bytes[2..].to_vec(),
        };
        match parse(&raw).unwrap() {
            Packet::Subscribe(s) => assert_eq!(s, subscribe),
            other => panic!("expected SUBSCRIBE, got {other:?}"),
        }
    }

    #[test]
    fn subscribe_masks_reserved_qos_bits() {
        // qos byte 0x41: upper bits ignored, low two bits = 1
        let raw = RawFrame {
            fixed_header: 0x82,
            payload: vec![0x00, 0x01, 0x00, 0x01, b'a', 0x41],
        };
        match parse(&raw).unwrap() {
            Packet::Subscribe(s) => assert_eq!(s.entries[0].qos, Qos::AtLeastOnce),
            other => panic!("expected SUBSCRIBE, got {other:?}"),
        }
    }

    #[test]
    fn empty_subscribe_rejected() {
        let raw = RawFrame {
            fixed_header: 0x82,
            payload: vec![0x00, 0x01],
        };
        assert_eq!(parse(&raw), Err(MqttError::ProtocolError));
    }

    #[test]
    fn suback_failure_code_round_trip() {
        let suback = Suback {
            packet_id: 7,
            return_codes: vec![
                SubackReturnCode::SuccessMaximumQos1,
                SubackReturnCode::Failure,
            ],
        };
        let frame = suback.to_frame().unwrap();
        let bytes = frame.as_bytes();
        assert_eq!(bytes, &[0x90, 0x04, 0x00, 0x07, 0x01, 0x80]);
        let raw = RawFrame {
            fixed_header: bytes[0],
            payload: bytes[2..].to_vec(),
        };
        match parse(&raw).unwrap() {
            Packet::Suback(s) => assert_eq!(s, suback),
            other => panic!("expected SUBACK, got {other:?}"),
        }
    }

    #[test]
    fn unsubscribe_round_trip() {
        let unsubscribe = Unsubscribe {
            packet_id: 9,
            topic_filters: vec!["a/b".into(), "c".into()],
        };
        let frame = unsubscribe.to_frame().unwrap();
        let bytes = frame.as_bytes();
        assert_eq!(bytes[0], 0xA2);
        let raw = RawFrame {
            fixed_header: bytes[0],
            payload: bytes[2..].to_vec(),
        };
        match parse(&raw).unwrap() {
            Packet::Unsubscribe(u) => assert_eq!(u, unsubscribe),
            other => panic!("expected UNSUBSCRIBE, got {other:?}"),
        }
    }

    #[test]
    fn truncated_filter_is_message_size() {
        let raw = RawFrame {
            fixed_header: 0xA2,
            payload: vec![0x00, 0x09, 0x00, 0x05, b'a', b'b'],
        };
        assert_eq!(parse(&raw), Err(MqttError::MessageSize));
    }
}
