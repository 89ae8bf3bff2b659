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

//! Bodyless control packets: PINGREQ, PINGRESP and DISCONNECT.

use super::Reader;
use crate::mqtt_ep::codec::make_fixed_header;
use crate::mqtt_ep::connection_error::MqttError;
use crate::mqtt_ep::packet::PacketType;
use crate::mqtt_ep::send_buffer::{Frame, SendBuffer};

macro_rules! empty_packet {
    ($(#[$doc:meta])* $name:ident, $packet_type:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl $name {
            pub fn new() -> Self {
                Self
            }

            pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self, MqttError> {
                reader.expect_end()?;
                Ok(Self)
            }

            pub(crate) fn to_frame(&self) -> Result<Frame, MqttError> {
                SendBuffer::new().finalize(make_fixed_header($packet_type, 0))
            }
        }
    };
}

empty_packet!(
    /// PINGREQ keep-alive probe.
    Pingreq,
    PacketType::Pingreq
);
empty_packet!(
    /// PINGRESP keep-alive answer.
    Pingresp,
    PacketType::Pingresp
);
empty_packet!(
    /// DISCONNECT: clean session end; suppresses the will.
    Disconnect,
    PacketType::Disconnect
);
