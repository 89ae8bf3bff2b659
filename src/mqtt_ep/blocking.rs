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

//! Blocking facade over the async endpoint.
//!
//! The async core is the single implementation; this wrapper owns a small
//! tokio runtime whose worker thread drives the endpoint's event loop,
//! and every method blocks the calling thread until the operation
//! completes. Inbound packets keep flowing between calls because the
//! worker thread never stops.
//!
//! Do not mix this wrapper and direct async access to the same endpoint.

use std::collections::HashSet;

use crate::mqtt_ep::connection_error::ConnectionError;
use crate::mqtt_ep::connection_option::ConnectionOption;
use crate::mqtt_ep::endpoint;

pub use crate::mqtt_ep::endpoint::Mode;
use crate::mqtt_ep::handler::EndpointHandler;
use crate::mqtt_ep::packet::{ConnectReturnCode, Qos, SubEntry, SubackReturnCode};
use crate::mqtt_ep::store::StorePacket;
use crate::mqtt_ep::transport::TransportOps;

/// Synchronous MQTT endpoint.
///
/// # Examples
///
/// ```ignore
/// use mqtt311_endpoint_tokio::mqtt_ep::blocking;
///
/// let endpoint = blocking::Endpoint::new()?;
/// let stream = endpoint.connect_tcp("127.0.0.1:1883")?;
/// endpoint.attach(stream, blocking::Mode::Client)?;
/// endpoint.connect(30)?;
/// let id = endpoint.publish_at_least_once("a/b", b"hi".to_vec(), false)?;
/// ```
pub struct Endpoint {
    runtime: tokio::runtime::Runtime,
    inner: endpoint::Endpoint,
}

impl Endpoint {
    /// Create an endpoint backed by a dedicated single-worker runtime.
    pub fn new() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        let inner = {
            let _guard = runtime.enter();
            endpoint::Endpoint::new()
        };
        Ok(Self { runtime, inner })
    }

    /// The async endpoint this wrapper drives.
    pub fn inner(&self) -> &endpoint::Endpoint {
        &self.inner
    }

    pub fn set_handler<H>(&self, handler: H) -> Result<(), ConnectionError>
    where
        H: EndpointHandler + 'static,
    {
        self.runtime.block_on(self.inner.set_handler(handler))
    }

    pub fn attach<T>(&self, transport: T, mode: Mode) -> Result<(), ConnectionError>
    where
        T: TransportOps + Send + 'static,
    {
        self.runtime.block_on(self.inner.attach(transport, mode))
    }

    pub fn attach_with_options<T>(
        &self,
        transport: T,
        mode: Mode,
        options: ConnectionOption,
    ) -> Result<(), ConnectionError>
    where
        T: TransportOps + Send + 'static,
    {
        self.runtime
            .block_on(self.inner.attach_with_options(transport, mode, options))
    }

    /// Dial a TCP connection on the wrapper's runtime.
    pub fn connect_tcp(
        &self,
        addr: &str,
    ) -> Result<crate::mqtt_ep::transport::TcpTransport, ConnectionError> {
        let stream = self
            .runtime
            .block_on(crate::mqtt_ep::transport::connect_helper::connect_tcp(
                addr, None,
            ))?;
        Ok(crate::mqtt_ep::transport::TcpTransport::from_stream(stream))
    }

    pub fn connect(&self, keep_alive: u16) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.connect(keep_alive))
    }

    pub fn connack(
        &self,
        session_present: bool,
        return_code: ConnectReturnCode,
    ) -> Result<(), ConnectionError> {
        self.runtime
            .block_on(self.inner.connack(session_present, return_code))
    }

    pub fn publish(
        &self,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        qos: Qos,
        retain: bool,
    ) -> Result<Option<u16>, ConnectionError> {
        self.runtime
            .block_on(self.inner.publish(topic_name, payload, qos, retain))
    }

    pub fn publish_at_most_once(
        &self,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        retain: bool,
    ) -> Result<(), ConnectionError> {
        self.runtime
            .block_on(self.inner.publish_at_most_once(topic_name, payload, retain))
    }

    pub fn publish_at_least_once(
        &self,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        retain: bool,
    ) -> Result<u16, ConnectionError> {
        self.runtime
            .block_on(self.inner.publish_at_least_once(topic_name, payload, retain))
    }

    pub fn publish_exactly_once(
        &self,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        retain: bool,
    ) -> Result<u16, ConnectionError> {
        self.runtime
            .block_on(self.inner.publish_exactly_once(topic_name, payload, retain))
    }

    pub fn publish_dup(
        &self,
        packet_id: u16,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        qos: Qos,
        retain: bool,
    ) -> Result<bool, ConnectionError> {
        self.runtime.block_on(
            self.inner
                .publish_dup(packet_id, topic_name, payload, qos, retain),
        )
    }

    pub fn subscribe(&self, entries: impl Into<Vec<SubEntry>>) -> Result<u16, ConnectionError> {
        self.runtime.block_on(self.inner.subscribe(entries))
    }

    pub fn unsubscribe(
        &self,
        topic_filters: impl Into<Vec<String>>,
    ) -> Result<u16, ConnectionError> {
        self.runtime.block_on(self.inner.unsubscribe(topic_filters))
    }

    pub fn puback(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.puback(packet_id))
    }

    pub fn pubrec(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.pubrec(packet_id))
    }

    pub fn pubrel(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.pubrel(packet_id))
    }

    pub fn pubcomp(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.pubcomp(packet_id))
    }

    pub fn suback(
        &self,
        packet_id: u16,
        return_codes: impl Into<Vec<SubackReturnCode>>,
    ) -> Result<(), ConnectionError> {
        self.runtime
            .block_on(self.inner.suback(packet_id, return_codes))
    }

    pub fn unsuback(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.unsuback(packet_id))
    }

    pub fn pingreq(&self) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.pingreq())
    }

    pub fn pingresp(&self) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.pingresp())
    }

    pub fn disconnect(&self) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.disconnect())
    }

    pub fn force_disconnect(&self) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.force_disconnect())
    }

    pub fn acquire_packet_id(&self) -> Result<u16, ConnectionError> {
        self.runtime.block_on(self.inner.acquire_packet_id())
    }

    pub fn register_packet_id(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.register_packet_id(packet_id))
    }

    pub fn release_packet_id(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.runtime.block_on(self.inner.release_packet_id(packet_id))
    }

    pub fn clear_stored_publish(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.runtime
            .block_on(self.inner.clear_stored_publish(packet_id))
    }

    pub fn get_stored_packets(&self) -> Result<Vec<StorePacket>, ConnectionError> {
        self.runtime.block_on(self.inner.get_stored_packets())
    }

    pub fn get_qos2_publish_handled_pids(&self) -> Result<HashSet<u16>, ConnectionError> {
        self.runtime
            .block_on(self.inner.get_qos2_publish_handled_pids())
    }

    pub fn set_auto_pub_response(
        &self,
        enable: bool,
        async_mode: bool,
    ) -> Result<(), ConnectionError> {
        self.runtime
            .block_on(self.inner.set_auto_pub_response(enable, async_mode))
    }
}
