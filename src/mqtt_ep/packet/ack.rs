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

//! The five acknowledgment packets whose variable header is exactly one
//! packet identifier: PUBACK, PUBREC, PUBREL, PUBCOMP and UNSUBACK.

use super::Reader;
use crate::mqtt_ep::codec::make_fixed_header;
use crate::mqtt_ep::connection_error::MqttError;
use crate::mqtt_ep::packet::PacketType;
use crate::mqtt_ep::send_buffer::{Frame, SendBuffer};

macro_rules! packet_id_only_packet {
    ($(#[$doc:meta])* $name:ident, $packet_type:expr, $flags:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub packet_id: u16,
        }

        impl $name {
            pub fn new(packet_id: u16) -> Self {
                Self { packet_id }
            }

            pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self, MqttError> {
                if reader.remaining() != 2 {
                    return Err(MqttError::MessageSize);
                }
                Ok(Self {
                    packet_id: reader.read_u16()?,
                })
            }

            pub(crate) fn to_frame(&self) -> Result<Frame, MqttError> {
                let mut sb = SendBuffer::new();
                sb.push_u16(self.packet_id);
                sb.finalize(make_fixed_header($packet_type, $flags))
            }
        }
    };
}

packet_id_only_packet!(
    /// PUBACK: terminal acknowledgment of a QoS 1 PUBLISH.
    Puback,
    PacketType::Puback,
    0b0000
);
packet_id_only_packet!(
    /// PUBREC: first receiver-side step of the QoS 2 handshake.
    Pubrec,
    PacketType::Pubrec,
    0b0000
);
packet_id_only_packet!(
    /// PUBREL: sender-side release in the QoS 2 handshake; flags are
    /// fixed at 0010 by the standard.
    Pubrel,
    PacketType::Pubrel,
    0b0010
);
packet_id_only_packet!(
    /// PUBCOMP: terminal acknowledgment of a QoS 2 PUBLISH.
    Pubcomp,
    PacketType::Pubcomp,
    0b0000
);
packet_id_only_packet!(
    /// UNSUBACK: acknowledgment of an UNSUBSCRIBE.
    Unsuback,
    PacketType::Unsuback,
    0b0000
);
