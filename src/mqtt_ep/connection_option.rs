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

use std::collections::HashSet;

use derive_builder::Builder;
use getset::Getters;

use crate::mqtt_ep::packet::Will;
use crate::mqtt_ep::store::StorePacket;

/// MQTT connection options - configuration for one attach
///
/// Carries the session identity the CONNECT frame is built from (set once,
/// before the transport is attached) and the behavior switches that govern
/// the endpoint while the transport lives.
///
/// # Usage
///
/// ```ignore
/// use mqtt311_endpoint_tokio::mqtt_ep::ConnectionOption;
///
/// let options = ConnectionOption::builder()
///     .client_id("sensor-17")
///     .clean_session(true)
///     .auto_pub_response(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Builder, Getters)]
#[builder(derive(Debug), pattern = "owned", setter(into))]
#[getset(get = "pub")]
pub struct ConnectionOption {
    /// Client identifier placed in CONNECT
    ///
    /// # Default
    /// empty (the broker may assign one)
    #[builder(default)]
    client_id: String,

    /// Request that the broker discard prior session state
    ///
    /// Also selects the endpoint's own store handling when CONNACK
    /// accepts: clear on `true`, DUP retransmission on `false`.
    ///
    /// # Default
    /// false
    #[builder(default = "false")]
    clean_session: bool,

    /// Will message carried in CONNECT
    ///
    /// Published by the broker if the session ends without DISCONNECT.
    ///
    /// # Default
    /// none
    #[builder(default = "None", setter(into, strip_option))]
    will: Option<Will>,

    /// User name for CONNECT authentication
    ///
    /// # Default
    /// none
    #[builder(default = "None", setter(into, strip_option))]
    user_name: Option<String>,

    /// Password for CONNECT authentication, opaque bytes
    ///
    /// # Default
    /// none
    #[builder(default = "None", setter(into, strip_option))]
    password: Option<Vec<u8>>,

    /// Enable automatic PUBLISH response handling
    ///
    /// When enabled, the endpoint answers inbound PUBLISH/PUBREC/PUBREL
    /// with PUBACK, PUBREC, PUBREL and PUBCOMP as the QoS level requires.
    ///
    /// # Default
    /// true
    #[builder(default = "true")]
    auto_pub_response: bool,

    /// Route automatic responses through the transmit queue
    ///
    /// When `false`, automatic responses are written directly, ahead of
    /// anything queued.
    ///
    /// # Default
    /// false
    #[builder(default = "false")]
    auto_pub_response_async: bool,

    /// Receive buffer size in bytes
    ///
    /// # Default
    /// 4096
    #[builder(default = "4096")]
    recv_buffer_size: usize,

    /// Graceful transport shutdown timeout in milliseconds
    ///
    /// # Default
    /// 5000
    #[builder(default = "5000")]
    shutdown_timeout_ms: u64,

    /// Stored frames from a previous session to restore into the outbound
    /// store (their packet identifiers are re-registered)
    ///
    /// # Default
    /// empty
    #[builder(default)]
    restore_packets: Vec<StorePacket>,

    /// Packet identifiers of inbound QoS 2 publishes already delivered in
    /// a previous session
    ///
    /// # Default
    /// empty
    #[builder(default)]
    restore_qos2_publish_handled: HashSet<u16>,
}

/// Session identity moved out of the options at attach time.
pub(crate) struct SessionIdentity {
    pub client_id: String,
    pub clean_session: bool,
    pub will: Option<Will>,
    pub user_name: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl ConnectionOption {
    pub fn builder() -> ConnectionOptionBuilder {
        ConnectionOptionBuilder::default()
    }

    /// Move the large collections out without cloning.
    pub(crate) fn into_session_state(
        self,
    ) -> (SessionIdentity, Vec<StorePacket>, HashSet<u16>) {
        (
            SessionIdentity {
                client_id: self.client_id,
                clean_session: self.clean_session,
                will: self.will,
                user_name: self.user_name,
                password: self.password,
            },
            self.restore_packets,
            self.restore_qos2_publish_handled,
        )
    }
}

impl Default for ConnectionOption {
    fn default() -> Self {
        ConnectionOptionBuilder::default()
            .build()
            .expect("all fields have defaults")
    }
}
