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

use std::collections::{HashSet, VecDeque};
use std::future;
use std::io::IoSlice;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace};

use crate::mqtt_ep::connection::{ConnackAction, Connection};
use crate::mqtt_ep::connection_error::{ConnectionError, MqttError};
use crate::mqtt_ep::connection_option::ConnectionOption;
use crate::mqtt_ep::frame_decoder::FrameDecoder;
use crate::mqtt_ep::handler::{EndpointHandler, NullHandler};
use crate::mqtt_ep::packet::{
    self, Connack, ConnectReturnCode, Packet, Pingresp, Puback, Pubcomp, Publish, Pubrec, Qos,
    RawFrame, SubEntry, Suback, SubackReturnCode, Subscribe, Unsuback, Unsubscribe,
};
use crate::mqtt_ep::request_response::Request;
use crate::mqtt_ep::send_buffer::Frame;
use crate::mqtt_ep::store::StorePacket;
use crate::mqtt_ep::transport::{TransportError, TransportOps};

/// Connection mode for the attach operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Client mode - this side sends CONNECT and expects CONNACK
    Client,
    /// Server mode - this side receives CONNECT on an accepted transport
    Server,
}

/// Symmetric MQTT v3.1.1 endpoint.
///
/// One endpoint owns one transport, one receive pipeline, one transmit
/// queue, one outbound store and one packet identifier space. The same
/// type serves both roles: a client attaches a transport it dialed and
/// calls [`connect`](Self::connect); a broker attaches a transport it
/// accepted and answers the inbound CONNECT with
/// [`connack`](Self::connack).
///
/// All protocol state lives in a background event-loop task spawned at
/// construction; the handle is cheap to use from any task. Dropping the
/// endpoint stops the loop and closes the transport.
///
/// # Examples
///
/// ```ignore
/// use mqtt311_endpoint_tokio::mqtt_ep;
///
/// let endpoint = mqtt_ep::Endpoint::new();
/// let stream = mqtt_ep::transport::connect_helper::connect_tcp("127.0.0.1:1883", None).await?;
/// endpoint
///     .attach(mqtt_ep::transport::TcpTransport::from_stream(stream), mqtt_ep::Mode::Client)
///     .await?;
/// endpoint.connect(30).await?;
/// ```
pub struct Endpoint {
    tx_send: mpsc::UnboundedSender<Request>,
    event_loop_handle: tokio::task::JoinHandle<()>,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint {
    /// Create a new endpoint with no transport attached.
    ///
    /// The event loop starts immediately; register a handler with
    /// [`set_handler`](Self::set_handler) and attach a transport before
    /// exchanging packets.
    pub fn new() -> Self {
        let (tx_send, rx_send) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new();
        let event_loop_handle = tokio::spawn(event_loop.run(rx_send));
        Self {
            tx_send,
            event_loop_handle,
        }
    }

    /// Register the application callback table.
    ///
    /// Must happen before [`attach`](Self::attach): callbacks registered
    /// later miss packets that already arrived. Without a handler every
    /// inbound packet is accepted and discarded.
    pub async fn set_handler<H>(&self, handler: H) -> Result<(), ConnectionError>
    where
        H: EndpointHandler + 'static,
    {
        self.request(|response_tx| Request::SetHandler {
            handler: Box::new(handler),
            response_tx,
        })
        .await
    }

    /// Attach an established transport with default options.
    pub async fn attach<T>(&self, transport: T, mode: Mode) -> Result<(), ConnectionError>
    where
        T: TransportOps + Send + 'static,
    {
        self.attach_with_options(transport, mode, ConnectionOption::default())
            .await
    }

    /// Attach an established transport with explicit options.
    ///
    /// The options carry the session identity (client id, will,
    /// credentials, clean-session) that a later [`connect`](Self::connect)
    /// moves into the CONNECT frame, plus the automatic-response switches.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::AlreadyConnected`] when a transport is attached;
    /// close it first with [`force_disconnect`](Self::force_disconnect).
    pub async fn attach_with_options<T>(
        &self,
        transport: T,
        mode: Mode,
        options: ConnectionOption,
    ) -> Result<(), ConnectionError>
    where
        T: TransportOps + Send + 'static,
    {
        self.request(|response_tx| Request::Attach {
            transport: Box::new(transport),
            mode,
            options,
            response_tx,
        })
        .await
    }

    /// Send CONNECT, advertising `keep_alive` seconds.
    ///
    /// The frame is built from the identity supplied at attach time.
    /// Keep-alive probing itself is the application's responsibility; see
    /// [`pingreq`](Self::pingreq).
    pub async fn connect(&self, keep_alive: u16) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::Connect {
            keep_alive,
            response_tx,
        })
        .await
    }

    /// Broker side: answer CONNECT.
    pub async fn connack(
        &self,
        session_present: bool,
        return_code: ConnectReturnCode,
    ) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::Connack {
            session_present,
            return_code,
            response_tx,
        })
        .await
    }

    /// Publish with the QoS chosen at runtime.
    ///
    /// Returns the packet identifier allocated for QoS 1/2, `None` for
    /// QoS 0.
    pub async fn publish(
        &self,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        qos: Qos,
        retain: bool,
    ) -> Result<Option<u16>, ConnectionError> {
        let topic_name = topic_name.into();
        let payload = payload.into();
        self.request(|response_tx| Request::Publish {
            topic_name,
            payload,
            qos,
            retain,
            dup: false,
            packet_id: None,
            response_tx,
        })
        .await
    }

    /// Fire-and-forget publish (QoS 0). No identifier, no store entry,
    /// no acknowledgment.
    pub async fn publish_at_most_once(
        &self,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        retain: bool,
    ) -> Result<(), ConnectionError> {
        self.publish(topic_name, payload, Qos::AtMostOnce, retain)
            .await
            .map(|_| ())
    }

    /// Publish at least once (QoS 1); the returned identifier frees when
    /// PUBACK arrives.
    pub async fn publish_at_least_once(
        &self,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        retain: bool,
    ) -> Result<u16, ConnectionError> {
        self.publish(topic_name, payload, Qos::AtLeastOnce, retain)
            .await
            .map(|id| id.expect("QoS 1 publish always allocates an identifier"))
    }

    /// Publish exactly once (QoS 2); the returned identifier stays held
    /// through the PUBREC/PUBREL handshake and frees on PUBCOMP.
    pub async fn publish_exactly_once(
        &self,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        retain: bool,
    ) -> Result<u16, ConnectionError> {
        self.publish(topic_name, payload, Qos::ExactlyOnce, retain)
            .await
            .map(|id| id.expect("QoS 2 publish always allocates an identifier"))
    }

    /// QoS 1 publish under a caller-chosen identifier.
    ///
    /// Returns `Ok(false)` without sending when the identifier is zero or
    /// already in use.
    pub async fn publish_at_least_once_with_id(
        &self,
        packet_id: u16,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        retain: bool,
    ) -> Result<bool, ConnectionError> {
        let topic_name = topic_name.into();
        let payload = payload.into();
        Self::accepted(
            self.request(|response_tx| Request::Publish {
                topic_name,
                payload,
                qos: Qos::AtLeastOnce,
                retain,
                dup: false,
                packet_id: Some(packet_id),
                response_tx,
            })
            .await,
        )
    }

    /// QoS 2 publish under a caller-chosen identifier.
    pub async fn publish_exactly_once_with_id(
        &self,
        packet_id: u16,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        retain: bool,
    ) -> Result<bool, ConnectionError> {
        let topic_name = topic_name.into();
        let payload = payload.into();
        Self::accepted(
            self.request(|response_tx| Request::Publish {
                topic_name,
                payload,
                qos: Qos::ExactlyOnce,
                retain,
                dup: false,
                packet_id: Some(packet_id),
                response_tx,
            })
            .await,
        )
    }

    /// Publish with the DUP flag already set, under a caller-chosen
    /// identifier. For manual retransmission; the reconnect replay sets
    /// DUP on stored frames itself.
    pub async fn publish_dup(
        &self,
        packet_id: u16,
        topic_name: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        qos: Qos,
        retain: bool,
    ) -> Result<bool, ConnectionError> {
        let topic_name = topic_name.into();
        let payload = payload.into();
        Self::accepted(
            self.request(|response_tx| Request::Publish {
                topic_name,
                payload,
                qos,
                retain,
                dup: true,
                packet_id: (qos != Qos::AtMostOnce).then_some(packet_id),
                response_tx,
            })
            .await,
        )
    }

    /// Subscribe to the given filters; the returned identifier frees when
    /// SUBACK arrives.
    pub async fn subscribe(
        &self,
        entries: impl Into<Vec<SubEntry>>,
    ) -> Result<u16, ConnectionError> {
        let entries = entries.into();
        self.request(|response_tx| Request::Subscribe {
            entries,
            packet_id: None,
            response_tx,
        })
        .await
    }

    /// Subscribe under a caller-chosen identifier.
    pub async fn subscribe_with_id(
        &self,
        packet_id: u16,
        entries: impl Into<Vec<SubEntry>>,
    ) -> Result<bool, ConnectionError> {
        let entries = entries.into();
        Self::accepted(
            self.request(|response_tx| Request::Subscribe {
                entries,
                packet_id: Some(packet_id),
                response_tx,
            })
            .await,
        )
    }

    /// Unsubscribe from the given filters; the returned identifier frees
    /// when UNSUBACK arrives.
    pub async fn unsubscribe(
        &self,
        topic_filters: impl Into<Vec<String>>,
    ) -> Result<u16, ConnectionError> {
        let topic_filters = topic_filters.into();
        self.request(|response_tx| Request::Unsubscribe {
            topic_filters,
            packet_id: None,
            response_tx,
        })
        .await
    }

    /// Unsubscribe under a caller-chosen identifier.
    pub async fn unsubscribe_with_id(
        &self,
        packet_id: u16,
        topic_filters: impl Into<Vec<String>>,
    ) -> Result<bool, ConnectionError> {
        let topic_filters = topic_filters.into();
        Self::accepted(
            self.request(|response_tx| Request::Unsubscribe {
                topic_filters,
                packet_id: Some(packet_id),
                response_tx,
            })
            .await,
        )
    }

    /// Broker side: acknowledge a QoS 1 PUBLISH. Used when automatic
    /// responses are disabled.
    pub async fn puback(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::Puback {
            packet_id,
            response_tx,
        })
        .await
    }

    /// Broker side: first acknowledgment of a QoS 2 PUBLISH.
    pub async fn pubrec(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::Pubrec {
            packet_id,
            response_tx,
        })
        .await
    }

    /// Release a QoS 2 publish. The PUBREL frame is stored awaiting
    /// PUBCOMP, like the automatic response to PUBREC.
    pub async fn pubrel(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::Pubrel {
            packet_id,
            response_tx,
        })
        .await
    }

    /// Complete a QoS 2 delivery.
    pub async fn pubcomp(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::Pubcomp {
            packet_id,
            response_tx,
        })
        .await
    }

    /// Broker side: answer SUBSCRIBE with explicit per-filter results.
    pub async fn suback(
        &self,
        packet_id: u16,
        return_codes: impl Into<Vec<SubackReturnCode>>,
    ) -> Result<(), ConnectionError> {
        let return_codes = return_codes.into();
        self.request(|response_tx| Request::Suback {
            packet_id,
            return_codes,
            response_tx,
        })
        .await
    }

    /// Broker side: answer SUBSCRIBE granting every filter at the given
    /// QoS levels.
    pub async fn suback_granted(
        &self,
        packet_id: u16,
        granted: impl IntoIterator<Item = Qos>,
    ) -> Result<(), ConnectionError> {
        let return_codes: Vec<SubackReturnCode> = granted
            .into_iter()
            .map(SubackReturnCode::granted)
            .collect();
        self.suback(packet_id, return_codes).await
    }

    /// Broker side: answer UNSUBSCRIBE.
    pub async fn unsuback(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::Unsuback {
            packet_id,
            response_tx,
        })
        .await
    }

    /// Send a keep-alive probe.
    pub async fn pingreq(&self) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::Pingreq { response_tx })
            .await
    }

    /// Broker side: answer PINGREQ.
    pub async fn pingresp(&self) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::Pingresp { response_tx })
            .await
    }

    /// Send DISCONNECT if the session is live, otherwise do nothing.
    ///
    /// A clean disconnect suppresses the will. The transport stays open
    /// for the peer to close; use
    /// [`force_disconnect`](Self::force_disconnect) to tear it down.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::Disconnect { response_tx })
            .await
    }

    /// Tear the transport down without DISCONNECT.
    ///
    /// Broker-side, the will fires. Pending writes complete with an
    /// error. Idempotent: succeeds when already detached.
    pub async fn force_disconnect(&self) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::ForceDisconnect { response_tx })
            .await
    }

    /// Acquire a free packet identifier for manual packet management.
    pub async fn acquire_packet_id(&self) -> Result<u16, ConnectionError> {
        self.request(|response_tx| Request::AcquirePacketId { response_tx })
            .await
    }

    /// Register a caller-chosen packet identifier.
    ///
    /// # Errors
    ///
    /// [`MqttError::PacketIdCollision`] when the identifier is zero or in
    /// use.
    pub async fn register_packet_id(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::RegisterPacketId {
            packet_id,
            response_tx,
        })
        .await
    }

    /// Return a packet identifier to the free pool.
    pub async fn release_packet_id(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::ReleasePacketId {
            packet_id,
            response_tx,
        })
        .await
    }

    /// Drop the stored frames under `packet_id` and free the identifier
    /// without waiting for an acknowledgment.
    ///
    /// Escape hatch: calling this during an active QoS 2 handshake
    /// releases an identifier the peer still considers in flight.
    pub async fn clear_stored_publish(&self, packet_id: u16) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::ClearStoredPublish {
            packet_id,
            response_tx,
        })
        .await
    }

    /// Copy out the stored, unacknowledged frames in insertion order, for
    /// inspection or session persistence.
    pub async fn get_stored_packets(&self) -> Result<Vec<StorePacket>, ConnectionError> {
        self.request(|response_tx| Request::GetStoredPackets { response_tx })
            .await
    }

    /// Packet identifiers of inbound QoS 2 publishes delivered to the
    /// handler whose PUBREL has not yet arrived.
    pub async fn get_qos2_publish_handled_pids(&self) -> Result<HashSet<u16>, ConnectionError> {
        self.request(|response_tx| Request::GetQos2PublishHandledPids { response_tx })
            .await
    }

    /// Switch automatic PUBLISH responses on or off, and select whether
    /// they go through the transmit queue (`async_mode`) or are written
    /// directly.
    pub async fn set_auto_pub_response(
        &self,
        enable: bool,
        async_mode: bool,
    ) -> Result<(), ConnectionError> {
        self.request(|response_tx| Request::SetAutoPubResponse {
            enable,
            async_mode,
            response_tx,
        })
        .await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, ConnectionError>>) -> Request,
    ) -> Result<T, ConnectionError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx_send
            .send(make(response_tx))
            .map_err(|_| ConnectionError::ChannelClosed)?;
        response_rx
            .await
            .map_err(|_| ConnectionError::ChannelClosed)?
    }

    /// Map a caller-supplied-identifier outcome to the accepted flag:
    /// a collision is a refusal, not an error.
    fn accepted<T>(result: Result<T, ConnectionError>) -> Result<bool, ConnectionError> {
        match result {
            Ok(_) => Ok(true),
            Err(ConnectionError::Mqtt(MqttError::PacketIdCollision)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.event_loop_handle.abort();
    }
}

/// Everything the event loop owns: protocol state, transport, receive
/// pipeline and transmit queue. One instance per endpoint, driven by one
/// task, so the store, the identifier space and the handled set always
/// mutate together.
struct EventLoop {
    connection: Connection,
    handler: Box<dyn EndpointHandler>,
    transport: Option<Box<dyn TransportOps + Send>>,
    decoder: FrameDecoder,
    read_buffer: Vec<u8>,
    /// Receive pipeline re-arms only while this holds.
    reading: bool,
    /// FIFO of frames awaiting the single in-flight write.
    tx_queue: VecDeque<Frame>,
    shutdown_timeout: Duration,
}

const DEFAULT_RECV_BUFFER_SIZE: usize = 4096;

impl EventLoop {
    fn new() -> Self {
        Self {
            connection: Connection::new(),
            handler: Box::new(NullHandler),
            transport: None,
            decoder: FrameDecoder::new(),
            read_buffer: vec![0u8; DEFAULT_RECV_BUFFER_SIZE],
            reading: false,
            tx_queue: VecDeque::new(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    async fn run(mut self, mut rx_send: mpsc::UnboundedReceiver<Request>) {
        loop {
            tokio::select! {
                request = rx_send.recv() => {
                    match request {
                        Some(request) => self.handle_request(request).await,
                        None => break, // every Endpoint handle dropped
                    }
                }
                read_result = Self::read_some(&mut self.transport, &mut self.read_buffer, self.reading) => {
                    self.handle_read(read_result).await;
                }
            }
        }
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown(self.shutdown_timeout).await;
        }
    }

    /// Resolve with transport bytes while attached and reading; otherwise
    /// park so the select loop only answers API requests.
    async fn read_some(
        transport: &mut Option<Box<dyn TransportOps + Send>>,
        read_buffer: &mut [u8],
        reading: bool,
    ) -> Result<usize, TransportError> {
        match transport.as_mut() {
            Some(t) if reading => t.recv(read_buffer).await,
            _ => future::pending().await,
        }
    }

    async fn handle_request(&mut self, request: Request) {
        match request {
            Request::SetHandler {
                handler,
                response_tx,
            } => {
                self.handler = handler;
                let _ = response_tx.send(Ok(()));
            }
            Request::Attach {
                transport,
                mode,
                options,
                response_tx,
            } => {
                if self.transport.is_some() {
                    let _ = response_tx.send(Err(ConnectionError::AlreadyConnected));
                    return;
                }
                debug!(?mode, "attaching transport");
                let recv_buffer_size = *options.recv_buffer_size();
                if recv_buffer_size != self.read_buffer.len() {
                    self.read_buffer = vec![0u8; recv_buffer_size];
                }
                self.shutdown_timeout = Duration::from_millis(*options.shutdown_timeout_ms());
                self.connection.apply_options(options);
                self.decoder = FrameDecoder::new();
                self.transport = Some(transport);
                self.reading = true;
                let _ = response_tx.send(Ok(()));
            }
            Request::Connect {
                keep_alive,
                response_tx,
            } => {
                let result = match self.connection.make_connect(keep_alive) {
                    Ok(frame) => self.enqueue_and_drain(frame).await,
                    Err(e) => Err(e.into()),
                };
                let _ = response_tx.send(result);
            }
            Request::Connack {
                session_present,
                return_code,
                response_tx,
            } => {
                let connack = Connack {
                    session_present,
                    return_code,
                };
                let result = match connack.to_frame() {
                    Ok(frame) => self.enqueue_and_drain(frame).await,
                    Err(e) => Err(e.into()),
                };
                let _ = response_tx.send(result);
            }
            Request::Publish {
                topic_name,
                payload,
                qos,
                retain,
                dup,
                packet_id,
                response_tx,
            } => {
                let result = self
                    .handle_publish_request(topic_name, payload, qos, retain, dup, packet_id)
                    .await;
                let _ = response_tx.send(result);
            }
            Request::Subscribe {
                entries,
                packet_id,
                response_tx,
            } => {
                let result = self.handle_subscribe_request(entries, packet_id).await;
                let _ = response_tx.send(result);
            }
            Request::Unsubscribe {
                topic_filters,
                packet_id,
                response_tx,
            } => {
                let result = self
                    .handle_unsubscribe_request(topic_filters, packet_id)
                    .await;
                let _ = response_tx.send(result);
            }
            Request::Puback {
                packet_id,
                response_tx,
            } => {
                let result = self.send_pub_response(Puback::new(packet_id).to_frame()).await;
                if result.is_ok() {
                    self.handler.on_pub_res_sent(packet_id);
                }
                let _ = response_tx.send(result);
            }
            Request::Pubrec {
                packet_id,
                response_tx,
            } => {
                let result = self.send_pub_response(Pubrec::new(packet_id).to_frame()).await;
                let _ = response_tx.send(result);
            }
            Request::Pubrel {
                packet_id,
                response_tx,
            } => {
                // manual counterpart of the automatic PUBREC response:
                // the PUBREL is stored awaiting PUBCOMP before it is sent
                let result = match self.connection.make_pubrel(packet_id) {
                    Ok(Some(frame)) => self.enqueue_and_drain(frame).await,
                    Ok(None) => Ok(()),
                    Err(e) => Err(e.into()),
                };
                let _ = response_tx.send(result);
            }
            Request::Pubcomp {
                packet_id,
                response_tx,
            } => {
                let result = self.send_pub_response(Pubcomp::new(packet_id).to_frame()).await;
                if result.is_ok() {
                    self.handler.on_pub_res_sent(packet_id);
                }
                let _ = response_tx.send(result);
            }
            Request::Suback {
                packet_id,
                return_codes,
                response_tx,
            } => {
                let suback = Suback {
                    packet_id,
                    return_codes,
                };
                let result = match suback.to_frame() {
                    Ok(frame) => self.enqueue_and_drain(frame).await,
                    Err(e) => Err(e.into()),
                };
                let _ = response_tx.send(result);
            }
            Request::Unsuback {
                packet_id,
                response_tx,
            } => {
                let result = self
                    .send_pub_response(Unsuback::new(packet_id).to_frame())
                    .await;
                let _ = response_tx.send(result);
            }
            Request::Pingreq { response_tx } => {
                let result = match packet::Pingreq::new().to_frame() {
                    Ok(frame) => self.enqueue_and_drain(frame).await,
                    Err(e) => Err(e.into()),
                };
                let _ = response_tx.send(result);
            }
            Request::Pingresp { response_tx } => {
                let result = match Pingresp::new().to_frame() {
                    Ok(frame) => self.enqueue_and_drain(frame).await,
                    Err(e) => Err(e.into()),
                };
                let _ = response_tx.send(result);
            }
            Request::Disconnect { response_tx } => {
                let result = if self.connection.connected() && self.transport.is_some() {
                    self.connection.set_connected(false);
                    match packet::Disconnect::new().to_frame() {
                        Ok(frame) => self.enqueue_and_drain(frame).await,
                        Err(e) => Err(e.into()),
                    }
                } else {
                    Ok(())
                };
                let _ = response_tx.send(result);
            }
            Request::ForceDisconnect { response_tx } => {
                if self.transport.is_some() {
                    self.teardown().await;
                    self.handler.on_close();
                }
                let _ = response_tx.send(Ok(()));
            }
            Request::AcquirePacketId { response_tx } => {
                let _ = response_tx.send(self.connection.acquire_packet_id().map_err(Into::into));
            }
            Request::RegisterPacketId {
                packet_id,
                response_tx,
            } => {
                let _ = response_tx.send(
                    self.connection
                        .register_packet_id(packet_id)
                        .map_err(Into::into),
                );
            }
            Request::ReleasePacketId {
                packet_id,
                response_tx,
            } => {
                self.connection.release_packet_id(packet_id);
                let _ = response_tx.send(Ok(()));
            }
            Request::ClearStoredPublish {
                packet_id,
                response_tx,
            } => {
                self.connection.clear_stored_publish(packet_id);
                let _ = response_tx.send(Ok(()));
            }
            Request::GetStoredPackets { response_tx } => {
                let _ = response_tx.send(Ok(self.connection.stored_packets()));
            }
            Request::GetQos2PublishHandledPids { response_tx } => {
                let _ = response_tx.send(Ok(self.connection.qos2_publish_handled_pids()));
            }
            Request::SetAutoPubResponse {
                enable,
                async_mode,
                response_tx,
            } => {
                self.connection.set_auto_pub_response(enable, async_mode);
                let _ = response_tx.send(Ok(()));
            }
        }
    }

    async fn handle_publish_request(
        &mut self,
        topic_name: String,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
        dup: bool,
        requested_id: Option<u16>,
    ) -> Result<Option<u16>, ConnectionError> {
        if self.transport.is_none() {
            return Err(ConnectionError::NotConnected);
        }
        let packet_id = if qos == Qos::AtMostOnce {
            None
        } else {
            Some(match requested_id {
                Some(id) => {
                    self.connection.register_packet_id(id)?;
                    id
                }
                None => self.connection.acquire_packet_id()?,
            })
        };
        let frame = match self
            .connection
            .make_publish(&topic_name, payload, qos, retain, dup, packet_id)
        {
            Ok(frame) => frame,
            Err(e) => {
                // encoding failed before anything was stored or sent;
                // an identifier acquired here goes back to the pool
                if let (Some(id), None) = (packet_id, requested_id) {
                    self.connection.release_packet_id(id);
                }
                return Err(e.into());
            }
        };
        // a write failure leaves the QoS >= 1 entry stored; it is
        // retransmitted with DUP on the next non-clean session
        self.enqueue_and_drain(frame).await?;
        Ok(packet_id)
    }

    async fn handle_subscribe_request(
        &mut self,
        entries: Vec<SubEntry>,
        requested_id: Option<u16>,
    ) -> Result<u16, ConnectionError> {
        if self.transport.is_none() {
            return Err(ConnectionError::NotConnected);
        }
        let packet_id = match requested_id {
            Some(id) => {
                self.connection.register_packet_id(id)?;
                id
            }
            None => self.connection.acquire_packet_id()?,
        };
        let subscribe = Subscribe { packet_id, entries };
        match subscribe.to_frame() {
            Ok(frame) => {
                self.enqueue_and_drain(frame).await?;
                Ok(packet_id)
            }
            Err(e) => {
                if requested_id.is_none() {
                    self.connection.release_packet_id(packet_id);
                }
                Err(e.into())
            }
        }
    }

    async fn handle_unsubscribe_request(
        &mut self,
        topic_filters: Vec<String>,
        requested_id: Option<u16>,
    ) -> Result<u16, ConnectionError> {
        if self.transport.is_none() {
            return Err(ConnectionError::NotConnected);
        }
        let packet_id = match requested_id {
            Some(id) => {
                self.connection.register_packet_id(id)?;
                id
            }
            None => self.connection.acquire_packet_id()?,
        };
        let unsubscribe = Unsubscribe {
            packet_id,
            topic_filters,
        };
        match unsubscribe.to_frame() {
            Ok(frame) => {
                self.enqueue_and_drain(frame).await?;
                Ok(packet_id)
            }
            Err(e) => {
                if requested_id.is_none() {
                    self.connection.release_packet_id(packet_id);
                }
                Err(e.into())
            }
        }
    }

    async fn send_pub_response(
        &mut self,
        frame: Result<Frame, MqttError>,
    ) -> Result<(), ConnectionError> {
        match frame {
            Ok(frame) => self.enqueue_and_drain(frame).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_read(&mut self, read_result: Result<usize, TransportError>) {
        match read_result {
            Ok(0) => {
                debug!("transport closed by peer");
                self.teardown().await;
                self.handler.on_close();
            }
            Ok(n) => {
                let mut offset = 0;
                while offset < n {
                    let (consumed, result) = self.decoder.feed(&self.read_buffer[offset..n]);
                    offset += consumed;
                    match result {
                        Ok(Some(raw)) => {
                            if !self.process_frame(raw).await {
                                self.reading = false;
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "receive pipeline failed");
                            self.handler.on_error(&ConnectionError::Mqtt(e));
                            self.teardown().await;
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                // EOF-like terminations count as clean close, the rest
                // surface through the error handler
                let clean = matches!(
                    &e,
                    TransportError::Io(io)
                        if matches!(
                            io.kind(),
                            std::io::ErrorKind::UnexpectedEof
                                | std::io::ErrorKind::ConnectionReset
                        )
                );
                self.teardown().await;
                if clean {
                    self.handler.on_close();
                } else {
                    self.handler.on_error(&ConnectionError::Transport(e));
                }
            }
        }
    }

    /// Dispatch one inbound frame. Returns whether the receive pipeline
    /// re-arms; parse failures and peer DISCONNECT stop it.
    async fn process_frame(&mut self, raw: RawFrame) -> bool {
        let packet = match packet::parse(&raw) {
            Ok(packet) => packet,
            Err(e) => {
                error!(fixed_header = raw.fixed_header, error = %e, "malformed packet");
                self.handler.on_error(&ConnectionError::Mqtt(e));
                self.teardown().await;
                return false;
            }
        };
        trace!(packet_type = ?packet.packet_type(), "packet received");
        match packet {
            Packet::Connect(connect) => {
                self.connection.handle_connect(&connect);
                self.handler.on_connect(&connect)
            }
            Packet::Connack(connack) => {
                match self.connection.handle_connack(&connack) {
                    ConnackAction::Replay(frames) => {
                        // stored frames go out ahead of anything queued,
                        // written directly in insertion order
                        for frame in frames {
                            if let Err(e) = self.write_direct(&frame).await {
                                self.handler.on_error(&e);
                                return false;
                            }
                        }
                    }
                    ConnackAction::Cleared | ConnackAction::None => {}
                }
                self.handler
                    .on_connack(connack.session_present, connack.return_code)
            }
            Packet::Publish(publish) => self.handle_inbound_publish(publish).await,
            Packet::Puback(puback) => {
                self.connection.handle_puback(puback.packet_id);
                self.handler.on_puback(puback.packet_id)
            }
            Packet::Pubrec(pubrec) => {
                let packet_id = pubrec.packet_id;
                self.connection.handle_pubrec(packet_id);
                if !self.handler.on_pubrec(packet_id) {
                    return false;
                }
                if self.connection.auto_response_mode().is_some() {
                    match self.connection.make_pubrel(packet_id) {
                        Ok(Some(frame)) => {
                            if let Err(e) = self.enqueue_and_drain(frame).await {
                                self.handler.on_error(&e);
                                return self.transport.is_some();
                            }
                        }
                        Ok(None) => {} // disconnected: PUBREL waits in the store
                        Err(e) => {
                            self.handler.on_error(&ConnectionError::Mqtt(e));
                            return false;
                        }
                    }
                }
                true
            }
            Packet::Pubrel(pubrel) => {
                let packet_id = pubrel.packet_id;
                self.connection.handle_pubrel(packet_id);
                if !self.handler.on_pubrel(packet_id) {
                    return false;
                }
                if let Some(async_mode) = self.connection.auto_response_mode() {
                    if self.connection.connected() {
                        let sent = self
                            .respond(Pubcomp::new(packet_id).to_frame(), async_mode)
                            .await;
                        if sent {
                            self.handler.on_pub_res_sent(packet_id);
                        }
                        return self.transport.is_some();
                    }
                }
                true
            }
            Packet::Pubcomp(pubcomp) => {
                self.connection.handle_pubcomp(pubcomp.packet_id);
                self.handler.on_pubcomp(pubcomp.packet_id)
            }
            Packet::Subscribe(subscribe) => self
                .handler
                .on_subscribe(subscribe.packet_id, &subscribe.entries),
            Packet::Suback(suback) => {
                self.connection.release_packet_id(suback.packet_id);
                self.handler
                    .on_suback(suback.packet_id, &suback.return_codes)
            }
            Packet::Unsubscribe(unsubscribe) => self
                .handler
                .on_unsubscribe(unsubscribe.packet_id, &unsubscribe.topic_filters),
            Packet::Unsuback(unsuback) => {
                self.connection.release_packet_id(unsuback.packet_id);
                self.handler.on_unsuback(unsuback.packet_id)
            }
            Packet::Pingreq(_) => self.handler.on_pingreq(),
            Packet::Pingresp(_) => self.handler.on_pingresp(),
            Packet::Disconnect(_) => {
                self.connection.set_connected(false);
                self.handler.on_disconnect();
                false
            }
        }
    }

    async fn handle_inbound_publish(&mut self, publish: Publish) -> bool {
        let Publish {
            dup,
            qos,
            retain,
            topic_name,
            packet_id,
            payload,
        } = publish;
        match qos {
            Qos::AtMostOnce => self
                .handler
                .on_publish(dup, qos, retain, packet_id, &topic_name, &payload),
            Qos::AtLeastOnce => {
                let id = packet_id.expect("parser guarantees an identifier for QoS > 0");
                if !self
                    .handler
                    .on_publish(dup, qos, retain, packet_id, &topic_name, &payload)
                {
                    return false;
                }
                if let Some(async_mode) = self.connection.auto_response_mode() {
                    if self.connection.connected() {
                        let sent = self.respond(Puback::new(id).to_frame(), async_mode).await;
                        if sent {
                            self.handler.on_pub_res_sent(id);
                        }
                        return self.transport.is_some();
                    }
                }
                true
            }
            Qos::ExactlyOnce => {
                let id = packet_id.expect("parser guarantees an identifier for QoS > 0");
                // deliver only the first arrival of this identifier;
                // PUBREC goes out every time
                if self.connection.qos2_delivery_allowed(id)
                    && !self
                        .handler
                        .on_publish(dup, qos, retain, packet_id, &topic_name, &payload)
                {
                    return false;
                }
                if let Some(async_mode) = self.connection.auto_response_mode() {
                    if self.connection.connected() {
                        self.respond(Pubrec::new(id).to_frame(), async_mode).await;
                        return self.transport.is_some();
                    }
                }
                true
            }
        }
    }

    /// Ship an automatic response, through the queue or directly per the
    /// configured mode. Returns whether the write succeeded; failures are
    /// reported through the error handler and tear the transport down.
    async fn respond(&mut self, frame: Result<Frame, MqttError>, async_mode: bool) -> bool {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                self.handler.on_error(&ConnectionError::Mqtt(e));
                return false;
            }
        };
        let result = if async_mode {
            self.enqueue_and_drain(frame).await
        } else {
            self.write_direct(&frame).await
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                self.handler.on_error(&e);
                false
            }
        }
    }

    /// Push a frame onto the transmit FIFO and drive the queue until
    /// empty. The loop is the only writer, so at most one transport write
    /// is outstanding; on failure the queue is cleared and the transport
    /// torn down.
    async fn enqueue_and_drain(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        self.tx_queue.push_back(frame);
        while let Some(front) = self.tx_queue.front() {
            let Some(transport) = self.transport.as_mut() else {
                self.tx_queue.clear();
                return Err(ConnectionError::NotConnected);
            };
            let buffers = [IoSlice::new(front.as_bytes())];
            match transport.send(&buffers).await {
                Ok(()) => {
                    self.tx_queue.pop_front();
                }
                Err(e) => {
                    self.tx_queue.clear();
                    self.teardown().await;
                    return Err(ConnectionError::Transport(e));
                }
            }
        }
        Ok(())
    }

    /// Write a frame ahead of the queue. Used for reconnect replay and
    /// for synchronous automatic responses.
    async fn write_direct(&mut self, frame: &Frame) -> Result<(), ConnectionError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(ConnectionError::NotConnected);
        };
        let buffers = [IoSlice::new(frame.as_bytes())];
        match transport.send(&buffers).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.teardown().await;
                Err(ConnectionError::Transport(e))
            }
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown(self.shutdown_timeout).await;
        }
        self.connection.set_connected(false);
        self.reading = false;
        self.tx_queue.clear();
        self.decoder = FrameDecoder::new();
    }
}
