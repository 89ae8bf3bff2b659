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

use crate::mqtt_ep::connection_error::ConnectionError;
use crate::mqtt_ep::packet::{Connect, ConnectReturnCode, Qos, SubEntry, SubackReturnCode};

/// Application callback table.
///
/// One handler is registered per endpoint, before the transport is
/// attached. The receive loop invokes the matching method for every
/// inbound control packet; methods returning `bool` decide whether the
/// loop keeps reading - `false` stops it cleanly, which is not an error.
///
/// Callbacks run on the endpoint's event-loop task, on the thread that
/// observed the I/O completion. They must not block indefinitely: the
/// endpoint neither reads nor writes while a callback is running.
///
/// Every method has a default: continue-deciders return `true`,
/// notifications do nothing, so an implementation only overrides the
/// packets it cares about.
///
/// # Examples
///
/// ```ignore
/// use mqtt311_endpoint_tokio::mqtt_ep::{EndpointHandler, Qos};
///
/// struct Printer;
///
/// impl EndpointHandler for Printer {
///     fn on_publish(
///         &mut self,
///         _dup: bool,
///         _qos: Qos,
///         _retain: bool,
///         _packet_id: Option<u16>,
///         topic: &str,
///         payload: &[u8],
///     ) -> bool {
///         println!("{topic}: {payload:?}");
///         true
///     }
/// }
/// ```
#[allow(unused_variables)]
pub trait EndpointHandler: Send {
    /// The transport closed cleanly: EOF, connection reset observed as a
    /// clean end, or TLS short read.
    fn on_close(&mut self) {}

    /// The receive side failed with a protocol or transport error. The
    /// transport is closed after this returns.
    fn on_error(&mut self, error: &ConnectionError) {}

    /// Broker side: an inbound CONNECT arrived and parsed.
    fn on_connect(&mut self, connect: &Connect) -> bool {
        true
    }

    /// Client side: CONNACK arrived. Store handling (clear or replay) has
    /// already happened when this runs.
    fn on_connack(&mut self, session_present: bool, return_code: ConnectReturnCode) -> bool {
        true
    }

    /// An application message arrived. For inbound QoS 2 duplicates this
    /// fires at most once per packet identifier.
    fn on_publish(
        &mut self,
        dup: bool,
        qos: Qos,
        retain: bool,
        packet_id: Option<u16>,
        topic_name: &str,
        payload: &[u8],
    ) -> bool {
        true
    }

    fn on_puback(&mut self, packet_id: u16) -> bool {
        true
    }

    fn on_pubrec(&mut self, packet_id: u16) -> bool {
        true
    }

    fn on_pubrel(&mut self, packet_id: u16) -> bool {
        true
    }

    fn on_pubcomp(&mut self, packet_id: u16) -> bool {
        true
    }

    /// An automatic PUBACK or PUBCOMP response finished writing.
    fn on_pub_res_sent(&mut self, packet_id: u16) {}

    /// Broker side: SUBSCRIBE arrived. Routing is the application's job;
    /// answer with [`suback`](crate::mqtt_ep::Endpoint::suback).
    fn on_subscribe(&mut self, packet_id: u16, entries: &[SubEntry]) -> bool {
        true
    }

    fn on_suback(&mut self, packet_id: u16, return_codes: &[SubackReturnCode]) -> bool {
        true
    }

    /// Broker side: UNSUBSCRIBE arrived.
    fn on_unsubscribe(&mut self, packet_id: u16, topic_filters: &[String]) -> bool {
        true
    }

    fn on_unsuback(&mut self, packet_id: u16) -> bool {
        true
    }

    fn on_pingreq(&mut self) -> bool {
        true
    }

    fn on_pingresp(&mut self) -> bool {
        true
    }

    /// DISCONNECT arrived; the receive loop stops after this returns.
    fn on_disconnect(&mut self) {}
}

/// Default handler: accepts everything, ignores everything.
#[derive(Debug, Default)]
pub(crate) struct NullHandler;

impl EndpointHandler for NullHandler {}
