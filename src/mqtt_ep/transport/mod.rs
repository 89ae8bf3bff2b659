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

//! Transport layer abstractions for MQTT connections.
//!
//! The endpoint works against any reliable, ordered, bidirectional byte
//! stream exposed through [`TransportOps`]: plain TCP, TLS, or a test
//! double. Message boundaries are not preserved; the codec re-frames.
//!
//! # Built-in Transports
//!
//! - **TCP**: [`TcpTransport`]
//! - **TLS**: [`TlsTransport`] behind the `tls` feature
//!
//! Custom transports implement [`TransportOps`] directly.

pub mod connect_helper;
mod tcp;
#[cfg(feature = "tls")]
mod tls;

pub use tcp::TcpTransport;
#[cfg(feature = "tls")]
pub use tls::TlsTransport;

use std::future::Future;
use std::io::IoSlice;
use std::pin::Pin;
use tokio::time::Duration;

/// Error types that can occur during transport operations.
#[derive(Debug)]
pub enum TransportError {
    Io(std::io::Error),
    #[cfg(feature = "tls")]
    Tls(Box<dyn std::error::Error + Send + Sync>),
    Timeout,
    Connect(String),
    NotConnected,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "IO error: {e}"),
            #[cfg(feature = "tls")]
            TransportError::Tls(e) => write!(f, "TLS error: {e}"),
            TransportError::Timeout => write!(f, "Operation timed out"),
            TransportError::Connect(msg) => write!(f, "Connection failed: {msg}"),
            TransportError::NotConnected => write!(f, "Transport not connected"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e)
    }
}

/// Core trait that defines the transport operations the endpoint needs.
///
/// # Contract
///
/// - `send` completes only after every byte of every buffer is written; a
///   short write is an error, not a partial success.
/// - `recv` returning `Ok(0)` means the peer closed the stream cleanly.
/// - `shutdown` is idempotent and bounded by the supplied timeout.
///
/// # Custom Transport Implementation
///
/// ```rust
/// use mqtt311_endpoint_tokio::mqtt_ep::transport::{TransportOps, TransportError};
/// use std::io::IoSlice;
/// use std::pin::Pin;
/// use std::future::Future;
/// use tokio::time::Duration;
///
/// struct MyTransport;
///
/// impl TransportOps for MyTransport {
///     fn send<'a>(
///         &'a mut self,
///         buffers: &'a [IoSlice<'a>],
///     ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
///         Box::pin(async move { Ok(()) })
///     }
///
///     fn recv<'a>(
///         &'a mut self,
///         buffer: &'a mut [u8],
///     ) -> Pin<Box<dyn Future<Output = Result<usize, TransportError>> + Send + 'a>> {
///         Box::pin(async move { Ok(0) })
///     }
///
///     fn shutdown<'a>(
///         &'a mut self,
///         timeout: Duration,
///     ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
///         Box::pin(async move {})
///     }
/// }
/// ```
pub trait TransportOps {
    /// Send all bytes of all buffers through the transport.
    ///
    /// Implementations should use vectored I/O where the platform allows
    /// and must loop on partial writes.
    fn send<'a>(
        &'a mut self,
        buffers: &'a [IoSlice<'a>],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    /// Read available bytes into `buffer`, returning the count read.
    /// `Ok(0)` signals clean close.
    fn recv<'a>(
        &'a mut self,
        buffer: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, TransportError>> + Send + 'a>>;

    /// Gracefully shut the transport down within `timeout`; after the
    /// timeout the connection is dropped regardless.
    fn shutdown<'a>(
        &'a mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Dynamic dispatch support so endpoints can hold any transport.
impl TransportOps for Box<dyn TransportOps + Send> {
    fn send<'a>(
        &'a mut self,
        buffers: &'a [IoSlice<'a>],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        (**self).send(buffers)
    }

    fn recv<'a>(
        &'a mut self,
        buffer: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, TransportError>> + Send + 'a>> {
        (**self).recv(buffer)
    }

    fn shutdown<'a>(
        &'a mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        (**self).shutdown(timeout)
    }
}
