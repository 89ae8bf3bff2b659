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

//! MQTT v3.1.1 control packet types, parsers and frame builders.

mod ack;
mod connack;
mod connect;
mod publish;
mod simple;
mod subscribe;

pub use ack::{Puback, Pubcomp, Pubrec, Pubrel, Unsuback};
pub use connack::Connack;
pub use connect::{Connect, Will};
pub use publish::Publish;
pub use simple::{Disconnect, Pingreq, Pingresp};
pub use subscribe::{SubEntry, Suback, Subscribe, Unsubscribe};

use crate::mqtt_ep::codec;
use crate::mqtt_ep::connection_error::MqttError;

/// Control packet type, the high nibble of the fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    Connack = 2,
    Publish = 3,
    Puback = 4,
    Pubrec = 5,
    Pubrel = 6,
    Pubcomp = 7,
    Subscribe = 8,
    Suback = 9,
    Unsubscribe = 10,
    Unsuback = 11,
    Pingreq = 12,
    Pingresp = 13,
    Disconnect = 14,
}

impl PacketType {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            1 => Some(PacketType::Connect),
            2 => Some(PacketType::Connack),
            3 => Some(PacketType::Publish),
            4 => Some(PacketType::Puback),
            5 => Some(PacketType::Pubrec),
            6 => Some(PacketType::Pubrel),
            7 => Some(PacketType::Pubcomp),
            8 => Some(PacketType::Subscribe),
            9 => Some(PacketType::Suback),
            10 => Some(PacketType::Unsubscribe),
            11 => Some(PacketType::Unsuback),
            12 => Some(PacketType::Pingreq),
            13 => Some(PacketType::Pingresp),
            14 => Some(PacketType::Disconnect),
            _ => None,
        }
    }

    /// The flag nibble the protocol requires for this type, `None` for
    /// PUBLISH whose flags carry DUP/QoS/RETAIN.
    pub(crate) fn required_flags(self) -> Option<u8> {
        match self {
            PacketType::Publish => None,
            PacketType::Pubrel | PacketType::Subscribe | PacketType::Unsubscribe => Some(0b0010),
            _ => Some(0b0000),
        }
    }
}

/// Quality of service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Qos {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl Qos {
    pub fn from_u8(value: u8) -> Result<Self, MqttError> {
        match value {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            _ => Err(MqttError::ProtocolError),
        }
    }
}

/// CONNACK return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectReturnCode {
    Accepted = 0,
    UnacceptableProtocolVersion = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadUserNameOrPassword = 4,
    NotAuthorized = 5,
}

impl ConnectReturnCode {
    pub fn from_u8(value: u8) -> Result<Self, MqttError> {
        match value {
            0 => Ok(ConnectReturnCode::Accepted),
            1 => Ok(ConnectReturnCode::UnacceptableProtocolVersion),
            2 => Ok(ConnectReturnCode::IdentifierRejected),
            3 => Ok(ConnectReturnCode::ServerUnavailable),
            4 => Ok(ConnectReturnCode::BadUserNameOrPassword),
            5 => Ok(ConnectReturnCode::NotAuthorized),
            _ => Err(MqttError::ProtocolError),
        }
    }
}

/// SUBACK per-filter result: the granted QoS, or 0x80 for failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SubackReturnCode {
    SuccessMaximumQos0 = 0x00,
    SuccessMaximumQos1 = 0x01,
    SuccessMaximumQos2 = 0x02,
    Failure = 0x80,
}

impl SubackReturnCode {
    pub fn from_u8(value: u8) -> Result<Self, MqttError> {
        match value {
            0x00 => Ok(SubackReturnCode::SuccessMaximumQos0),
            0x01 => Ok(SubackReturnCode::SuccessMaximumQos1),
            0x02 => Ok(SubackReturnCode::SuccessMaximumQos2),
            0x80 => Ok(SubackReturnCode::Failure),
            _ => Err(MqttError::ProtocolError),
        }
    }

    /// The granted QoS, `None` on failure.
    pub fn granted_qos(self) -> Option<Qos> {
        match self {
            SubackReturnCode::SuccessMaximumQos0 => Some(Qos::AtMostOnce),
            SubackReturnCode::SuccessMaximumQos1 => Some(Qos::AtLeastOnce),
            SubackReturnCode::SuccessMaximumQos2 => Some(Qos::ExactlyOnce),
            SubackReturnCode::Failure => None,
        }
    }

    pub fn granted(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => SubackReturnCode::SuccessMaximumQos0,
            Qos::AtLeastOnce => SubackReturnCode::SuccessMaximumQos1,
            Qos::ExactlyOnce => SubackReturnCode::SuccessMaximumQos2,
        }
    }
}

/// A complete but untyped frame off the wire: fixed-header byte plus the
/// payload announced by the remaining-length field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub fixed_header: u8,
    pub payload: Vec<u8>,
}

impl RawFrame {
    pub fn type_nibble(&self) -> u8 {
        self.fixed_header >> 4
    }

    pub fn flags(&self) -> u8 {
        self.fixed_header & 0x0F
    }
}

/// Any parsed v3.1.1 control packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    Connack(Connack),
    Publish(Publish),
    Puback(Puback),
    Pubrec(Pubrec),
    Pubrel(Pubrel),
    Pubcomp(Pubcomp),
    Subscribe(Subscribe),
    Suback(Suback),
    Unsubscribe(Unsubscribe),
    Unsuback(Unsuback),
    Pingreq(Pingreq),
    Pingresp(Pingresp),
    Disconnect(Disconnect),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::Connack(_) => PacketType::Connack,
            Packet::Publish(_) => PacketType::Publish,
            Packet::Puback(_) => PacketType::Puback,
            Packet::Pubrec(_) => PacketType::Pubrec,
            Packet::Pubrel(_) => PacketType::Pubrel,
            Packet::Pubcomp(_) => PacketType::Pubcomp,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::Suback(_) => PacketType::Suback,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::Unsuback(_) => PacketType::Unsuback,
            Packet::Pingreq(_) => PacketType::Pingreq,
            Packet::Pingresp(_) => PacketType::Pingresp,
            Packet::Disconnect(_) => PacketType::Disconnect,
        }
    }
}

/// Parse an untyped frame into a typed packet.
///
/// Validates the type nibble and, for every type except PUBLISH, that the
/// flag nibble matches the value the standard reserves.
pub fn parse(frame: &RawFrame) -> Result<Packet, MqttError> {
    let packet_type =
        PacketType::from_nibble(frame.type_nibble()).ok_or(MqttError::ProtocolError)?;
    if let Some(required) = packet_type.required_flags() {
        if frame.flags() != required {
            return Err(MqttError::ProtocolError);
        }
    }
    let mut reader = Reader::new(&frame.payload);
    let packet = match packet_type {
        PacketType::Connect => Packet::Connect(Connect::parse(&mut reader)?),
        PacketType::Connack => Packet::Connack(Connack::parse(&mut reader)?),
        PacketType::Publish => Packet::Publish(Publish::parse(frame.flags(), &mut reader)?),
        PacketType::Puback => Packet::Puback(Puback::parse(&mut reader)?),
        PacketType::Pubrec => Packet::Pubrec(Pubrec::parse(&mut reader)?),
        PacketType::Pubrel => Packet::Pubrel(Pubrel::parse(&mut reader)?),
        PacketType::Pubcomp => Packet::Pubcomp(Pubcomp::parse(&mut reader)?),
        PacketType::Subscribe => Packet::Subscribe(Subscribe::parse(&mut reader)?),
        PacketType::Suback => Packet::Suback(Suback::parse(&mut reader)?),
        PacketType::Unsubscribe => Packet::Unsubscribe(Unsubscribe::parse(&mut reader)?),
        PacketType::Unsuback => Packet::Unsuback(Unsuback::parse(&mut reader)?),
        PacketType::Pingreq => Packet::Pingreq(Pingreq::parse(&mut reader)?),
        PacketType::Pingresp => Packet::Pingresp(Pingresp::parse(&mut reader)?),
        PacketType::Disconnect => Packet::Disconnect(Disconnect::parse(&mut reader)?),
    };
    Ok(packet)
}

/// Sequential reader over a frame payload.
///
/// Every accessor fails with `MessageSize` when the payload is shorter than
/// the fields its header claims.
pub(crate) struct Reader<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.payload.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, MqttError> {
        if self.remaining() < 1 {
            return Err(MqttError::MessageSize);
        }
        let byte = self.payload[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> Result<u16, MqttError> {
        if self.remaining() < 2 {
            return Err(MqttError::MessageSize);
        }
        let value = codec::make_u16(self.payload[self.pos], self.payload[self.pos + 1]);
        self.pos += 2;
        Ok(value)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], MqttError> {
        if self.remaining() < len {
            return Err(MqttError::MessageSize);
        }
        let bytes = &self.payload[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Read a 16-bit length prefix followed by that many UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<String, MqttError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| MqttError::ProtocolError)
    }

    /// Read a 16-bit length prefix followed by that many opaque bytes.
    pub fn read_binary(&mut self) -> Result<Vec<u8>, MqttError> {
        let len = self.read_u16()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    /// The rest of the payload, consuming it.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.payload[self.pos..];
        self.pos = self.payload.len();
        rest
    }

    /// Fail unless the payload is fully consumed.
    pub fn expect_end(&self) -> Result<(), MqttError> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(MqttError::MessageSize)
        }
    }
}
