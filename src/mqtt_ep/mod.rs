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

pub mod blocking;
pub mod codec;
pub mod connection_error;
pub mod connection_option;
pub mod endpoint;
pub mod handler;
pub mod packet;
pub mod packet_id;
pub mod send_buffer;
pub mod store;
pub mod transport;

pub(crate) mod connection;
pub(crate) mod frame_decoder;
pub(crate) mod request_response;

pub use connection_error::{ConnectionError, MqttError};
pub use connection_option::ConnectionOption;
pub use endpoint::{Endpoint, Mode};
pub use handler::EndpointHandler;
pub use packet::{ConnectReturnCode, PacketType, Qos, SubEntry, SubackReturnCode};
pub use send_buffer::Frame;
pub use store::StorePacket;
pub use transport::{TransportError, TransportOps};
