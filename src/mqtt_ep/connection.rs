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

//! Delivery state engine.
//!
//! [`Connection`] holds everything the QoS contracts need across I/O
//! completions: session identity, the `connected` flag, the outbound
//! store, the packet identifier space and the set of inbound QoS 2
//! publishes already delivered to the application. The three pieces of
//! delivery state mutate together under single ownership by the endpoint
//! event loop; no method here performs I/O.

use std::collections::HashSet;

use tracing::trace;

use crate::mqtt_ep::connection_error::MqttError;
use crate::mqtt_ep::connection_option::ConnectionOption;
use crate::mqtt_ep::packet::{
    Connack, Connect, ConnectReturnCode, PacketType, Publish, Pubrel, Qos, Will,
};
use crate::mqtt_ep::packet_id::PacketIdAllocator;
use crate::mqtt_ep::send_buffer::Frame;
use crate::mqtt_ep::store::{Store, StorePacket};

/// Store handling decided by an inbound CONNACK.
pub(crate) enum ConnackAction {
    /// Session rejected or nothing stored: no retransmission.
    None,
    /// Accepted with a clean session: the store was cleared.
    Cleared,
    /// Accepted resuming a session: retransmit these frames, in order,
    /// before any queued send proceeds.
    Replay(Vec<Frame>),
}

pub(crate) struct Connection {
    client_id: String,
    clean_session: bool,
    will: Option<Will>,
    user_name: Option<String>,
    password: Option<Vec<u8>>,
    connected: bool,
    auto_pub_response: bool,
    auto_pub_response_async: bool,
    store: Store,
    packet_ids: PacketIdAllocator,
    qos2_publish_handled: HashSet<u16>,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            client_id: String::new(),
            clean_session: false,
            will: None,
            user_name: None,
            password: None,
            connected: false,
            auto_pub_response: true,
            auto_pub_response_async: false,
            store: Store::new(),
            packet_ids: PacketIdAllocator::new(),
            qos2_publish_handled: HashSet::new(),
        }
    }

    /// Take over session identity and behavior switches at attach time.
    pub fn apply_options(&mut self, options: ConnectionOption) {
        self.auto_pub_response = *options.auto_pub_response();
        self.auto_pub_response_async = *options.auto_pub_response_async();
        let (identity, restore_store, restore_handled) = options.into_session_state();
        self.client_id = identity.client_id;
        self.clean_session = identity.clean_session;
        self.will = identity.will;
        self.user_name = identity.user_name;
        self.password = identity.password;
        for packet in restore_store {
            let _ = self.packet_ids.register(packet.packet_id);
            self.store.insert(
                packet.packet_id,
                packet.expected_response,
                Frame::from_bytes(packet.bytes),
            );
        }
        self.qos2_publish_handled.extend(restore_handled);
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn set_auto_pub_response(&mut self, enable: bool, async_mode: bool) {
        self.auto_pub_response = enable;
        self.auto_pub_response_async = async_mode;
    }

    /// `None` when automatic responses are off, otherwise whether the
    /// response goes through the transmit queue (`true`) or is written
    /// directly (`false`).
    pub fn auto_response_mode(&self) -> Option<bool> {
        self.auto_pub_response.then_some(self.auto_pub_response_async)
    }

    pub fn acquire_packet_id(&mut self) -> Result<u16, MqttError> {
        self.packet_ids.acquire()
    }

    pub fn register_packet_id(&mut self, packet_id: u16) -> Result<(), MqttError> {
        self.packet_ids.register(packet_id)
    }

    pub fn release_packet_id(&mut self, packet_id: u16) {
        self.packet_ids.release(packet_id);
    }

    /// Build the CONNECT frame from the identity captured at attach time.
    pub fn make_connect(&self, keep_alive: u16) -> Result<Frame, MqttError> {
        Connect {
            client_id: self.client_id.clone(),
            clean_session: self.clean_session,
            keep_alive,
            will: self.will.clone(),
            user_name: self.user_name.clone(),
            password: self.password.clone(),
        }
        .to_frame()
    }

    /// Encode a PUBLISH and, for QoS >= 1, persist it awaiting its
    /// acknowledgment. Encoding errors surface before any state changes.
    pub fn make_publish(
        &mut self,
        topic_name: &str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
        dup: bool,
        packet_id: Option<u16>,
    ) -> Result<Frame, MqttError> {
        let frame = Publish {
            dup,
            qos,
            retain,
            topic_name: topic_name.to_owned(),
            packet_id,
            payload,
        }
        .to_frame()?;
        if qos != Qos::AtMostOnce {
            let packet_id = packet_id.ok_or(MqttError::ProtocolError)?;
            let expected = match qos {
                Qos::AtLeastOnce => PacketType::Puback,
                _ => PacketType::Pubrec,
            };
            trace!(packet_id, ?expected, "storing publish");
            self.store.insert(packet_id, expected, frame.clone());
        }
        Ok(frame)
    }

    /// Client side: CONNACK decides the fate of the stored session.
    pub fn handle_connack(&mut self, connack: &Connack) -> ConnackAction {
        if connack.return_code != ConnectReturnCode::Accepted {
            return ConnackAction::None;
        }
        self.connected = true;
        if self.clean_session {
            self.store.clear();
            ConnackAction::Cleared
        } else {
            ConnackAction::Replay(self.store.replay_frames())
        }
    }

    /// Server side: CONNECT captures the peer's clean-session request and
    /// marks the session live so responses may flow.
    pub fn handle_connect(&mut self, connect: &Connect) {
        self.clean_session = connect.clean_session;
        self.connected = true;
    }

    /// Inbound QoS 2 PUBLISH: should it reach the application?
    ///
    /// The first arrival of a packet identifier is delivered and recorded;
    /// duplicates sharing the identifier are suppressed until PUBREL clears
    /// it. PUBREC is sent either way.
    pub fn qos2_delivery_allowed(&mut self, packet_id: u16) -> bool {
        self.qos2_publish_handled.insert(packet_id)
    }

    /// PUBACK: terminal for QoS 1; the entry dies and the id frees.
    pub fn handle_puback(&mut self, packet_id: u16) {
        self.store.erase_response(packet_id, PacketType::Puback);
        self.packet_ids.release(packet_id);
    }

    /// PUBREC: the PUBLISH entry retires but the identifier stays held;
    /// it is reused for the PUBREL/PUBCOMP half of the handshake.
    pub fn handle_pubrec(&mut self, packet_id: u16) {
        self.store.erase_response(packet_id, PacketType::Pubrec);
    }

    /// Build and persist the PUBREL answering a PUBREC. The entry awaits
    /// PUBCOMP under the same identifier. The frame is returned for
    /// sending when the session is live, otherwise it only waits in the
    /// store for replay.
    pub fn make_pubrel(&mut self, packet_id: u16) -> Result<Option<Frame>, MqttError> {
        let frame = Pubrel::new(packet_id).to_frame()?;
        self.store
            .insert(packet_id, PacketType::Pubcomp, frame.clone());
        Ok(self.connected.then_some(frame))
    }

    /// PUBREL: the handled-set entry for this identifier retires, letting
    /// a future publish reuse the id.
    pub fn handle_pubrel(&mut self, packet_id: u16) {
        self.qos2_publish_handled.remove(&packet_id);
    }

    /// PUBCOMP: terminal for QoS 2 on the sending side.
    pub fn handle_pubcomp(&mut self, packet_id: u16) {
        self.store.erase_response(packet_id, PacketType::Pubcomp);
        self.packet_ids.release(packet_id);
    }

    /// Drop a stored publish and free its identifier without waiting for
    /// the acknowledgment. Calling this mid-QoS 2 handshake releases an id
    /// the peer still considers live; the caller owns that risk.
    pub fn clear_stored_publish(&mut self, packet_id: u16) {
        self.store.erase_packet_id(packet_id);
        self.packet_ids.release(packet_id);
    }

    pub fn stored_packets(&self) -> Vec<StorePacket> {
        self.store.snapshot()
    }

    pub fn qos2_publish_handled_pids(&self) -> HashSet<u16> {
        self.qos2_publish_handled.clone()
    }

    #[cfg(test)]
    fn store_len(&self) -> usize {
        self.store.len()
    }
}
