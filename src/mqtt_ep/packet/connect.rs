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
use crate::mqtt_ep::codec::{self, make_fixed_header, validate_mqtt_string};
use crate::mqtt_ep::connection_error::MqttError;
use crate::mqtt_ep::packet::PacketType;
use crate::mqtt_ep::send_buffer::{Frame, SendBuffer};

mod connect_flags {
    pub const CLEAN_SESSION: u8 = 0b0000_0010;
    pub const WILL_FLAG: u8 = 0b0000_0100;
    pub const WILL_RETAIN: u8 = 0b0010_0000;
    pub const PASSWORD: u8 = 0b0100_0000;
    pub const USER_NAME: u8 = 0b1000_0000;
    pub const WILL_QOS_SHIFT: u8 = 3;
}

/// A will message carried in CONNECT and published by the broker when the
/// session ends without a clean DISCONNECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub message: String,
    pub qos: Qos,
    pub retain: bool,
}

impl Will {
    pub fn new(
        topic: impl Into<String>,
        message: impl Into<String>,
        qos: Qos,
        retain: bool,
    ) -> Self {
        Self {
            topic: topic.into(),
            message: message.into(),
            qos,
            retain,
        }
    }
}

/// CONNECT packet: protocol name "MQTT" at level 4, connect flags,
/// keep-alive, client identifier and the optional will/credential fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub client_id: String,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub will: Option<Will>,
    pub user_name: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl Connect {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self, MqttError> {
        let name_len = reader.read_u16()?;
        if name_len != 4 || reader.read_bytes(4)? != b"MQTT" {
            return Err(MqttError::ProtocolError);
        }
        if reader.read_u8()? != 4 {
            return Err(MqttError::ProtocolError);
        }
        let flags = reader.read_u8()?;
        let keep_alive = reader.read_u16()?;
        let client_id = reader.read_string()?;

        let will = if flags & connect_flags::WILL_FLAG != 0 {
            let topic = reader.read_string()?;
            let message = reader.read_string()?;
            let qos = Qos::from_u8((flags >> connect_flags::WILL_QOS_SHIFT) & 0b11)?;
            Some(Will {
                topic,
                message,
                qos,
                retain: flags & connect_flags::WILL_RETAIN != 0,
            })
        } else {
            None
        };
        let user_name = if flags & connect_flags::USER_NAME != 0 {
            Some(reader.read_string()?)
        } else {
            None
        };
        let password = if flags & connect_flags::PASSWORD != 0 {
            Some(reader.read_binary()?)
        } else {
            None
        };
        reader.expect_end()?;
        Ok(Connect {
            client_id,
            clean_session: flags & connect_flags::CLEAN_SESSION != 0,
            keep_alive,
            will,
            user_name,
            password,
        })
    }

    pub(crate) fn to_frame(&self) -> Result<Frame, MqttError> {
        let mut sb = SendBuffer::new();
        sb.push_u16(4);
        sb.push_bytes(b"MQTT");
        sb.push_u8(4);

        let mut flags = 0u8;
        if self.clean_session {
            flags |= connect_flags::CLEAN_SESSION;
        }
        if let Some(will) = &self.will {
            flags |= connect_flags::WILL_FLAG;
            flags |= (will.qos as u8) << connect_flags::WILL_QOS_SHIFT;
            if will.retain {
                flags |= connect_flags::WILL_RETAIN;
            }
        }
        if self.user_name.is_some() {
            flags |= connect_flags::USER_NAME;
        }
        if self.password.is_some() {
            flags |= connect_flags::PASSWORD;
        }
        sb.push_u8(flags);
        sb.push_u16(self.keep_alive);

        sb.push_mqtt_string(&self.client_id)?;
        if let Some(will) = &self.will {
            sb.push_mqtt_string(&will.topic)?;
            if will.message.len() > u16::MAX as usize {
                return Err(MqttError::WillMessageLengthError);
            }
            if !codec::is_valid_utf8_contents(&will.message) {
                return Err(MqttError::Utf8ContentsError);
            }
            sb.push_u16(will.message.len() as u16);
            sb.push_bytes(will.message.as_bytes());
        }
        if let Some(user_name) = &self.user_name {
            validate_mqtt_string(user_name)?;
            sb.push_u16(user_name.len() as u16);
            sb.push_bytes(user_name.as_bytes());
        }
        if let Some(password) = &self.password {
            sb.push_binary(password)?;
        }
        sb.finalize(make_fixed_header(PacketType::Connect, 0))
    }
}
