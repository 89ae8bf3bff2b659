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

use tokio::sync::oneshot;

use crate::mqtt_ep::connection_error::ConnectionError;
use crate::mqtt_ep::connection_option::ConnectionOption;
use crate::mqtt_ep::endpoint::Mode;
use crate::mqtt_ep::handler::EndpointHandler;
use crate::mqtt_ep::packet::{ConnectReturnCode, Qos, SubEntry, SubackReturnCode};
use crate::mqtt_ep::store::StorePacket;
use crate::mqtt_ep::transport::TransportOps;

type ResponseTx<T> = oneshot::Sender<Result<T, ConnectionError>>;

/// Requests carried from the public API to the endpoint event loop. Every
/// variant pairs its inputs with a oneshot for the result.
pub(crate) enum Request {
    Attach {
        transport: Box<dyn TransportOps + Send>,
        mode: Mode,
        options: ConnectionOption,
        response_tx: ResponseTx<()>,
    },
    SetHandler {
        handler: Box<dyn EndpointHandler>,
        response_tx: ResponseTx<()>,
    },
    Connect {
        keep_alive: u16,
        response_tx: ResponseTx<()>,
    },
    Connack {
        session_present: bool,
        return_code: ConnectReturnCode,
        response_tx: ResponseTx<()>,
    },
    Publish {
        topic_name: String,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
        dup: bool,
        /// `None` allocates; `Some` uses a caller-registered identifier.
        packet_id: Option<u16>,
        response_tx: ResponseTx<Option<u16>>,
    },
    Subscribe {
        entries: Vec<SubEntry>,
        packet_id: Option<u16>,
        response_tx: ResponseTx<u16>,
    },
    Unsubscribe {
        topic_filters: Vec<String>,
        packet_id: Option<u16>,
        response_tx: ResponseTx<u16>,
    },
    Puback {
        packet_id: u16,
        response_tx: ResponseTx<()>,
    },
    Pubrec {
        packet_id: u16,
        response_tx: ResponseTx<()>,
    },
    Pubrel {
        packet_id: u16,
        response_tx: ResponseTx<()>,
    },
    Pubcomp {
        packet_id: u16,
        response_tx: ResponseTx<()>,
    },
    Suback {
        packet_id: u16,
        return_codes: Vec<SubackReturnCode>,
        response_tx: ResponseTx<()>,
    },
    Unsuback {
        packet_id: u16,
        response_tx: ResponseTx<()>,
    },
    Pingreq {
        response_tx: ResponseTx<()>,
    },
    Pingresp {
        response_tx: ResponseTx<()>,
    },
    Disconnect {
        response_tx: ResponseTx<()>,
    },
    ForceDisconnect {
        response_tx: ResponseTx<()>,
    },
    AcquirePacketId {
        response_tx: ResponseTx<u16>,
    },
    RegisterPacketId {
        packet_id: u16,
        response_tx: ResponseTx<()>,
    },
    ReleasePacketId {
        packet_id: u16,
        response_tx: ResponseTx<()>,
    },
    ClearStoredPublish {
        packet_id: u16,
        response_tx: ResponseTx<()>,
    },
    GetStoredPackets {
        response_tx: ResponseTx<Vec<StorePacket>>,
    },
    GetQos2PublishHandledPids {
        response_tx: ResponseTx<HashSet<u16>>,
    },
    SetAutoPubResponse {
        enable: bool,
        async_mode: bool,
        response_tx: ResponseTx<()>,
    },
}
