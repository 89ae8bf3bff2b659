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

//! # MQTT v3.1.1 Endpoint Tokio
//!
//! A symmetric async MQTT v3.1.1 client/server endpoint library for Rust with
//! tokio, covering the complete QoS 0/1/2 delivery state machine over TCP and
//! TLS transports.
//!
//! The endpoint is usable from both roles: as a client that initiates CONNECT,
//! and as a broker-side endpoint that accepts an already-established transport
//! and responds. Subscription routing and retained-message storage are left to
//! the application; the endpoint surfaces every inbound control packet through
//! the [`mqtt_ep::EndpointHandler`] callback table and generates the automatic
//! acknowledgments the protocol requires.
//!
//! ## Features
//!
//! - **Wire codec**: variable-byte remaining length, length-prefixed UTF-8
//!   strings with MQTT §1.5.3 validation, strict fixed-header flag checks
//! - **Delivery state engine**: packet-id allocation, in-memory store of
//!   unacknowledged PUBLISH/PUBREL frames, DUP retransmission on reconnect,
//!   exactly-once duplicate suppression on inbound QoS 2
//! - **Transmit serialization**: one in-flight write per endpoint, FIFO order
//!   preserved across concurrent producers
//! - **Client and Server Roles**: both sides of the handshake from one type
//! - **Async/Await**: built on tokio, with a blocking facade for synchronous
//!   callers
//!
//! ## Quick Start
//!
//! ```ignore
//! use mqtt311_endpoint_tokio::mqtt_ep;
//!
//! // Create a client endpoint
//! let endpoint = mqtt_ep::Endpoint::new();
//!
//! // Connect a TCP transport
//! let stream = mqtt_ep::transport::connect_helper::connect_tcp("localhost:1883", None).await?;
//! let transport = mqtt_ep::transport::TcpTransport::from_stream(stream);
//! endpoint.attach(transport, mqtt_ep::Mode::Client).await?;
//!
//! // Send CONNECT and publish
//! endpoint.connect(30).await?;
//! let packet_id = endpoint.publish_at_least_once("a/b", b"hi".to_vec(), false).await?;
//! ```
//!
//! ## Main Components
//!
//! - [`mqtt_ep::endpoint`]: Core endpoint functionality for both roles
//! - [`mqtt_ep::transport`]: Transport layer implementations (TCP, TLS)
//! - [`mqtt_ep::connection_option`]: Session identity and behavior switches
//! - [`mqtt_ep::packet`]: MQTT v3.1.1 packet types, parsers and builders
//! - [`mqtt_ep::handler`]: Application callback table
//! - [`mqtt_ep::blocking`]: Synchronous wrapper over the async endpoint

pub mod mqtt_ep;
