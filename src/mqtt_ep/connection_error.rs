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

use crate::mqtt_ep::transport::TransportError;

/// MQTT protocol-level error
///
/// Covers wire-format violations detected while decoding inbound frames,
/// encoding rules enforced before outbound frames are assembled, and
/// delivery-state errors from the packet identifier space.
///
/// # Error Categories
///
/// - **Wire errors**: [`RemainingLengthOverflow`](Self::RemainingLengthOverflow),
///   [`ProtocolError`](Self::ProtocolError), [`MessageSize`](Self::MessageSize)
/// - **Encoding errors**: [`Utf8LengthError`](Self::Utf8LengthError),
///   [`Utf8ContentsError`](Self::Utf8ContentsError),
///   [`WillMessageLengthError`](Self::WillMessageLengthError),
///   [`PasswordLengthError`](Self::PasswordLengthError)
/// - **State errors**: [`PacketIdExhausted`](Self::PacketIdExhausted),
///   [`PacketIdCollision`](Self::PacketIdCollision)
///
/// Encoding errors are raised synchronously from the originating public API
/// call, before any bytes reach the transport. Wire errors are reported
/// through [`EndpointHandler::on_error`](crate::mqtt_ep::EndpointHandler::on_error)
/// and terminate the receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttError {
    /// The remaining-length field carried a fifth continuation byte,
    /// or an outbound payload exceeded 2^28 - 1 bytes
    RemainingLengthOverflow,

    /// Protocol violation: wrong protocol name or level in CONNECT,
    /// reserved fixed-header flag bits set, or a malformed field layout
    ProtocolError,

    /// The payload was too short for the fields its header claims
    MessageSize,

    /// A UTF-8 string field exceeded the 16-bit length prefix
    Utf8LengthError,

    /// A UTF-8 string field contained U+0000 or a code point MQTT
    /// forbids (MQTT v3.1.1 section 1.5.3)
    Utf8ContentsError,

    /// The will message exceeded 65,535 bytes
    WillMessageLengthError,

    /// The password exceeded 65,535 bytes
    PasswordLengthError,

    /// 65,534 packet identifiers are outstanding; none can be acquired
    PacketIdExhausted,

    /// Manual registration of a packet identifier that is zero or
    /// already in use
    PacketIdCollision,
}

impl std::fmt::Display for MqttError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MqttError::RemainingLengthOverflow => write!(f, "remaining length overflow"),
            MqttError::ProtocolError => write!(f, "protocol error"),
            MqttError::MessageSize => write!(f, "message size mismatch"),
            MqttError::Utf8LengthError => write!(f, "utf8 string length error"),
            MqttError::Utf8ContentsError => write!(f, "utf8 string contents error"),
            MqttError::WillMessageLengthError => write!(f, "will message length error"),
            MqttError::PasswordLengthError => write!(f, "password length error"),
            MqttError::PacketIdExhausted => write!(f, "packet identifier exhausted"),
            MqttError::PacketIdCollision => write!(f, "packet identifier collision"),
        }
    }
}

impl std::error::Error for MqttError {}

/// Unified error type for MQTT endpoint operations
///
/// Every public endpoint operation returns `Result<T, ConnectionError>`.
/// The variants separate protocol-level failures from transport-level
/// failures and from endpoint lifecycle misuse:
///
/// ```text
/// ConnectionError
/// ├── Mqtt(MqttError)           - protocol or encoding violation
/// ├── Transport(TransportError) - I/O and network errors
/// ├── ChannelClosed             - endpoint event loop has terminated
/// ├── NotConnected              - operation requires an attached transport
/// └── AlreadyConnected          - a transport is already attached
/// ```
///
/// `MqttError` and `TransportError` convert automatically via `From`, so
/// both propagate with the `?` operator.
#[derive(Debug)]
pub enum ConnectionError {
    /// MQTT protocol-level error, see [`MqttError`]
    Mqtt(MqttError),

    /// I/O or transport-level error, see [`TransportError`]
    Transport(TransportError),

    /// Internal channel to the endpoint event loop is closed
    ///
    /// The background task has stopped; the endpoint instance should be
    /// recreated rather than retried.
    ChannelClosed,

    /// The endpoint is not attached to any transport
    NotConnected,

    /// A transport is already attached to this endpoint
    AlreadyConnected,
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Mqtt(e) => write!(f, "MQTT protocol error: {e}"),
            ConnectionError::Transport(e) => write!(f, "Transport error: {e}"),
            ConnectionError::ChannelClosed => write!(f, "Internal channel closed"),
            ConnectionError::NotConnected => write!(f, "Not connected"),
            ConnectionError::AlreadyConnected => write!(f, "Already connected"),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<MqttError> for ConnectionError {
    fn from(e: MqttError) -> Self {
        ConnectionError::Mqtt(e)
    }
}

impl From<TransportError> for ConnectionError {
    fn from(e: TransportError) -> Self {
        ConnectionError::Transport(e)
    }
}
